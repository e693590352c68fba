/// Core error types for the Inkreel engine.
use std::path::PathBuf;

/// A specialized Result type for Inkreel operations.
pub type InkreelResult<T> = Result<T, InkreelError>;

/// Top-level error type encompassing all Inkreel subsystems.
#[derive(Debug, thiserror::Error)]
pub enum InkreelError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("mux error: {0}")]
    Mux(String),

    #[error("asset error: {message} ({path:?})")]
    Asset { message: String, path: PathBuf },

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Other(String),
}

impl InkreelError {
    /// Create an asset error.
    pub fn asset(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        InkreelError::Asset {
            message: message.into(),
            path: path.into(),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        InkreelError::Validation(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = InkreelError::validation("scene list is empty");
        assert_eq!(err.to_string(), "validation error: scene list is empty");
    }

    #[test]
    fn test_asset_error_display() {
        let err = InkreelError::asset("file not found", "/assets/hand.png");
        assert!(err.to_string().contains("file not found"));
        assert!(err.to_string().contains("hand.png"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: InkreelError = io.into();
        assert!(matches!(err, InkreelError::Io(_)));
    }
}
