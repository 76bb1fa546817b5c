pub mod backend;
pub mod config;
pub mod diagnostics;
pub mod locator;
pub mod poller;
pub mod protocol;
pub mod session;
pub mod workflow;

pub use backend::{Backend, BackendError};
pub use config::{ConfigError, ConfigLoader, LabelgrabConfig};
pub use workflow::{EmptyReason, RunContext, RunError, RunOutcome, execute_run};
