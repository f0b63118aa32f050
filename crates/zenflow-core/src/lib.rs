//! `zenflow-core`: task model, configuration and shared error types.

pub mod config;
pub mod error;
pub mod types;

pub use config::ZenflowConfig;
pub use error::{CoreError, Result};
pub use types::{Quality, Task, TaskId};
