use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown quality '{0}' (expected perfect, good, fair or needs-work)")]
    InvalidQuality(String),
}

impl CoreError {
    /// Short error code string, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Config(_) => "CONFIG_ERROR",
            CoreError::Io(_) => "IO_ERROR",
            CoreError::InvalidQuality(_) => "INVALID_QUALITY",
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
