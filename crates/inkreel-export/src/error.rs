use inkreel_core::InkreelError;

/// Why an export did not complete. Cancellation is not an error; see
/// [`crate::ExportOutcome::Cancelled`].
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Rejected before any encoder or muxer was allocated.
    #[error("invalid export configuration: {0}")]
    Configuration(String),

    /// The encoder or muxer could not be created, or stopped making progress.
    #[error("export resource unavailable: {0}")]
    Resource(#[source] InkreelError),

    /// Failure while rendering, encoding or muxing.
    #[error("export failed: {0}")]
    Encode(#[source] InkreelError),
}

impl ExportError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, ExportError::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ExportError::Configuration("fps must be positive".into());
        assert_eq!(err.to_string(), "invalid export configuration: fps must be positive");
        assert!(err.is_configuration());

        let err = ExportError::Resource(InkreelError::Encode("stalled".into()));
        assert_eq!(err.to_string(), "export resource unavailable: encode error: stalled");
        assert!(std::error::Error::source(&err).is_some());
    }
}
