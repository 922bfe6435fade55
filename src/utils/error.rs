use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Invalid value for '{field}': {value} ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid query '{query}': {message}")]
    QueryError { query: String, message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Image metadata error: {message}")]
    MetadataError { message: String },

    #[error("OCR error: {message}")]
    OcrError { message: String },

    #[error("Segmentation error: {message}")]
    SegmentationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Data,
    Filesystem,
    Configuration,
    Vision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// Process exit code for a run that failed with this severity.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl EtlError {
    pub fn processing(message: impl Into<String>) -> Self {
        EtlError::ProcessingError {
            message: message.into(),
        }
    }

    pub fn metadata(message: impl Into<String>) -> Self {
        EtlError::MetadataError {
            message: message.into(),
        }
    }

    pub fn ocr(message: impl Into<String>) -> Self {
        EtlError::OcrError {
            message: message.into(),
        }
    }

    pub fn segmentation(message: impl Into<String>) -> Self {
        EtlError::SegmentationError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ApiError(_) => ErrorCategory::Network,
            EtlError::CsvError(_)
            | EtlError::SerializationError(_)
            | EtlError::QueryError { .. }
            | EtlError::ProcessingError { .. } => ErrorCategory::Data,
            EtlError::IoError(_) => ErrorCategory::Filesystem,
            EtlError::InvalidConfigValueError { .. } | EtlError::MissingConfigError { .. } => {
                ErrorCategory::Configuration
            }
            EtlError::ImageError(_)
            | EtlError::MetadataError { .. }
            | EtlError::OcrError { .. }
            | EtlError::SegmentationError { .. } => ErrorCategory::Vision,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EtlError::MetadataError { .. } => ErrorSeverity::Low,
            EtlError::ApiError(_) => ErrorSeverity::Medium,
            EtlError::IoError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => {
                "Check your network connection and the source URL, then re-run; finished items are skipped"
            }
            ErrorCategory::Data => {
                "Check the source data file and the query string (column names with spaces need back-quotes)"
            }
            ErrorCategory::Filesystem => {
                "Check that the cache and output directories exist and are writable"
            }
            ErrorCategory::Configuration => "Run with --help to see the accepted options",
            ErrorCategory::Vision => {
                "Check the input images and that the model files and the tesseract binary are available"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EtlError::ApiError(e) if e.is_timeout() => "The request timed out".to_string(),
            EtlError::ApiError(_) => "Could not reach the remote API".to_string(),
            EtlError::QueryError { query, message } => {
                format!("The query \"{}\" could not be used: {}", query, message)
            }
            EtlError::InvalidConfigValueError { field, reason, .. } => {
                format!("Option '{}' is invalid: {}", field, reason)
            }
            EtlError::MissingConfigError { field } => format!("Option '{}' is required", field),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_exit_codes() {
        let err = EtlError::InvalidConfigValueError {
            field: "query".to_string(),
            value: "".to_string(),
            reason: "empty".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.severity().exit_code(), 1);

        let err = EtlError::IoError(std::io::Error::new(std::io::ErrorKind::NotFound, "x"));
        assert_eq!(err.severity().exit_code(), 3);

        assert_eq!(EtlError::metadata("no exif").severity().exit_code(), 0);
    }

    #[test]
    fn test_user_friendly_query_message() {
        let err = EtlError::QueryError {
            query: "a ==".to_string(),
            message: "unexpected end of input".to_string(),
        };
        assert!(err.user_friendly_message().contains("a =="));
        assert_eq!(err.category(), ErrorCategory::Data);
    }
}
