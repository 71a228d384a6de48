//! Error types for packslip.

use thiserror::Error;

/// Result type alias using packslip's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for packslip operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Job not found
    #[error("Job not found: {0}")]
    JobNotFound(uuid::Uuid),

    /// Job exists but has not produced its archive yet
    #[error("Job not ready: {0}")]
    NotReady(uuid::Uuid),

    /// Source document has no pages
    #[error("Document is empty or corrupted: {0}")]
    EmptyDocument(String),

    /// Document library failure (load, parse, copy, write)
    #[error("Document error: {0}")]
    Document(String),

    /// Archiver failure
    #[error("Archive error: {0}")]
    Archive(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("test resource".to_string());
        assert_eq!(err.to_string(), "Not found: test resource");
    }

    #[test]
    fn test_error_display_job_not_found() {
        let id = Uuid::nil();
        let err = Error::JobNotFound(id);
        assert_eq!(err.to_string(), format!("Job not found: {}", id));
    }

    #[test]
    fn test_error_display_not_ready() {
        let id = Uuid::new_v4();
        let err = Error::NotReady(id);
        assert!(err.to_string().contains(&id.to_string()));
        assert!(err.to_string().starts_with("Job not ready"));
    }

    #[test]
    fn test_error_display_empty_document() {
        let err = Error::EmptyDocument("upload.pdf".to_string());
        assert_eq!(
            err.to_string(),
            "Document is empty or corrupted: upload.pdf"
        );
    }

    #[test]
    fn test_error_display_document() {
        let err = Error::Document("bad xref".to_string());
        assert_eq!(err.to_string(), "Document error: bad xref");
    }

    #[test]
    fn test_error_display_archive() {
        let err = Error::Archive("disk full".to_string());
        assert_eq!(err.to_string(), "Archive error: disk full");
    }

    #[test]
    fn test_error_display_config() {
        let err = Error::Config("bad regex".to_string());
        assert_eq!(err.to_string(), "Configuration error: bad regex");
    }

    #[test]
    fn test_error_display_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::Io(io_err);
        assert!(err.to_string().contains("I/O error:"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number");
        assert!(json_err.is_err());

        let err: Error = json_err.unwrap_err().into();
        match err {
            Error::Serialization(msg) => {
                assert!(!msg.is_empty());
            }
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
