pub mod backoff;
pub mod bootstrap;
pub mod executor;
pub mod limiter;
pub mod orchestrator;
pub mod outcome;
pub mod paths;
pub mod walker;

#[cfg(test)]
pub(crate) mod testing;
