use thiserror::Error;

/// Errors raised inside the reminder subsystem.
///
/// None of these escape a poll tick or a user transition: callers log and
/// carry on.
#[derive(Debug, Error)]
pub enum ReminderError {
    /// The audio backend could not be opened or refused to start.
    #[error("Audio error: {0}")]
    Audio(String),

    /// A configured external program is not on `PATH`.
    #[error("Program not found: {program}")]
    ProgramNotFound { program: String },

    /// The operation needs a Tokio runtime and none is active.
    #[error("No async runtime available")]
    NoRuntime,
}

pub type Result<T> = std::result::Result<T, ReminderError>;
