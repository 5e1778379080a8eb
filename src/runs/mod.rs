pub mod executor;

pub use executor::{ActionCall, ExecutorConfig, MultiActExecutor, MultiActReport, StopReason};
