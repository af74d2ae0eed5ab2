pub mod config;
pub mod controller;
pub mod genres;
pub mod index;
pub mod llm;
pub mod models;
pub mod service;
pub mod state;
pub mod tasks;
pub mod workflow;

#[cfg(test)]
pub(crate) mod test_support;
