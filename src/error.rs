use std::io;

/// All error types for the level compiler and loader.
#[derive(thiserror::Error, Debug)]
pub enum LevelError {
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("Input error: {0}")]
    Input(String),
    #[error("Format error: {0}")]
    Format(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl LevelError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        LevelError::Parse {
            line,
            message: message.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LevelError>;
