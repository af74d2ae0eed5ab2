use serde::{Serialize, de::DeserializeOwned};
use std::fmt::Debug;

use crate::error::Result;

/// Typed state threaded through a workflow.
///
/// `Update` is the partial-update structure steps return and callers supply
/// as corrections. Merging is keywise: every field set in the update replaces
/// the state's value, every other field is left alone.
pub trait WorkflowState:
    Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    type Update: Clone + Debug + Default + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Pure merge of `update` into `self`.
    fn merge(&self, update: Self::Update) -> Self;

    /// Range checks applied to every update before it is merged.
    fn validate_update(_update: &Self::Update) -> Result<()> {
        Ok(())
    }
}

/// Container holding one session's state while a phase runs.
#[derive(Clone, Debug)]
pub struct Context<S: WorkflowState> {
    state: S,
}

impl<S: WorkflowState> Context<S> {
    pub fn new(state: S) -> Self {
        Self { state }
    }

    /// Validates and folds `update` into the held state.
    pub fn merge(&mut self, update: S::Update) -> Result<()> {
        S::validate_update(&update)?;
        self.state = self.state.merge(update);
        Ok(())
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    /// Immutable copy for persistence or for handing back to a caller.
    pub fn snapshot(&self) -> S {
        self.state.clone()
    }

    pub fn into_inner(self) -> S {
        self.state
    }
}

#[cfg(test)]
pub(crate) mod test_state {
    use super::*;
    use crate::error::FlowError;
    use serde::Deserialize;

    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
    pub struct Counter {
        pub input: String,
        pub trail: Vec<String>,
        pub level: Option<i64>,
        pub label: Option<String>,
    }

    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    pub struct CounterUpdate {
        pub trail: Option<Vec<String>>,
        pub level: Option<i64>,
        pub label: Option<String>,
    }

    impl WorkflowState for Counter {
        type Update = CounterUpdate;

        fn merge(&self, update: CounterUpdate) -> Self {
            let mut next = self.clone();
            if let Some(trail) = update.trail {
                next.trail = trail;
            }
            if let Some(level) = update.level {
                next.level = Some(level);
            }
            if let Some(label) = update.label {
                next.label = Some(label);
            }
            next
        }

        fn validate_update(update: &CounterUpdate) -> Result<()> {
            match update.level {
                Some(level) if level < 0 => Err(FlowError::Validation(format!(
                    "level should be non-negative, got {level}"
                ))),
                _ => Ok(()),
            }
        }
    }
}
