use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use crate::{
    context::WorkflowState,
    error::{FlowError, Result},
    task::Step,
};

/// An immutable chain of named steps with zero or more interrupt points.
///
/// An interrupt after step `k` means a phase stops once `k` has completed and
/// its update has been merged; the next phase starts at `k + 1`.
pub struct Workflow<S: WorkflowState> {
    id: String,
    steps: Vec<Arc<dyn Step<S>>>,
    interrupts: BTreeSet<usize>,
}

impl<S: WorkflowState> Workflow<S> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[Arc<dyn Step<S>>] {
        &self.steps
    }

    /// Position of the step called `name`
    pub fn step_index(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|step| step.id() == name)
    }

    pub fn is_interrupt(&self, index: usize) -> bool {
        self.interrupts.contains(&index)
    }

    /// Names of the steps after which execution pauses, in order
    pub fn interrupt_points(&self) -> Vec<&str> {
        self.interrupts
            .iter()
            .map(|&index| self.steps[index].id())
            .collect()
    }
}

/// Builder for creating workflows
pub struct WorkflowBuilder<S: WorkflowState> {
    id: String,
    steps: Vec<Arc<dyn Step<S>>>,
    interrupt_names: Vec<String>,
}

impl<S: WorkflowState> WorkflowBuilder<S> {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            steps: Vec::new(),
            interrupt_names: Vec::new(),
        }
    }

    /// Append a step; steps run in the order they are added
    pub fn add_step(mut self, step: Arc<dyn Step<S>>) -> Self {
        self.steps.push(step);
        self
    }

    /// Pause after the step called `name` completes
    pub fn interrupt_after(mut self, name: impl Into<String>) -> Self {
        self.interrupt_names.push(name.into());
        self
    }

    pub fn build(self) -> Result<Workflow<S>> {
        if self.steps.is_empty() {
            return Err(FlowError::InvalidWorkflow(format!(
                "workflow '{}' has no steps",
                self.id
            )));
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.id()) {
                return Err(FlowError::InvalidWorkflow(format!(
                    "duplicate step '{}' in workflow '{}'",
                    step.id(),
                    self.id
                )));
            }
        }

        let last = self.steps.len() - 1;
        let mut interrupts = BTreeSet::new();
        for name in &self.interrupt_names {
            let index = self
                .steps
                .iter()
                .position(|step| step.id() == name)
                .ok_or_else(|| {
                    FlowError::InvalidWorkflow(format!(
                        "interrupt names unknown step '{}'",
                        name
                    ))
                })?;
            if index == last {
                return Err(FlowError::InvalidWorkflow(format!(
                    "cannot interrupt after final step '{}': nothing would be left to resume",
                    name
                )));
            }
            interrupts.insert(index);
        }

        Ok(Workflow {
            id: self.id,
            steps: self.steps,
            interrupts,
        })
    }
}

#[cfg(test)]
pub(crate) mod test_steps {
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::context::test_state::{Counter, CounterUpdate};
    use crate::error::{FlowError, Result};
    use crate::task::Step;

    /// Appends its name to `trail` and records how often it ran.
    pub struct Mark {
        pub name: &'static str,
        pub runs: AtomicUsize,
    }

    impl Mark {
        pub fn new(name: &'static str) -> Self {
            Self {
                name,
                runs: AtomicUsize::new(0),
            }
        }

        pub fn runs(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Step<Counter> for Mark {
        fn id(&self) -> &str {
            self.name
        }

        async fn run(&self, state: &Counter) -> Result<CounterUpdate> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            let mut trail = state.trail.clone();
            trail.push(self.name.to_string());
            Ok(CounterUpdate {
                trail: Some(trail),
                ..Default::default()
            })
        }
    }

    /// Sets `level`, which the state validates as non-negative.
    pub struct SetLevel(pub &'static str, pub i64);

    #[async_trait]
    impl Step<Counter> for SetLevel {
        fn id(&self) -> &str {
            self.0
        }

        async fn run(&self, _state: &Counter) -> Result<CounterUpdate> {
            Ok(CounterUpdate {
                level: Some(self.1),
                ..Default::default()
            })
        }
    }

    /// Fails on its first `failures` invocations, then succeeds.
    pub struct Flaky {
        pub name: &'static str,
        pub failures: AtomicUsize,
    }

    impl Flaky {
        pub fn new(name: &'static str, failures: usize) -> Self {
            Self {
                name,
                failures: AtomicUsize::new(failures),
            }
        }
    }

    #[async_trait]
    impl Step<Counter> for Flaky {
        fn id(&self) -> &str {
            self.name
        }

        async fn run(&self, state: &Counter) -> Result<CounterUpdate> {
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(FlowError::TaskExecutionFailed("upstream unavailable".into()));
            }
            Ok(CounterUpdate {
                label: Some(format!("{} after {}", self.name, state.trail.join(","))),
                ..Default::default()
            })
        }
    }
}
