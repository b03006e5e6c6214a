use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Malformed venue record '{venue}': {field} {reason}")]
    MalformedInput {
        venue: String,
        field: String,
        reason: String,
    },

    #[error("Conflicting records for venue '{venue}': {detail}")]
    Conflict { venue: String, detail: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Input,
    Storage,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// 根據錯誤嚴重程度決定退出碼
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
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            EtlError::ApiError(_) => ErrorCategory::Network,
            EtlError::MalformedInput { .. }
            | EtlError::Conflict { .. }
            | EtlError::SerializationError(_) => ErrorCategory::Input,
            EtlError::ZipError(_) | EtlError::CsvError(_) | EtlError::IoError(_) => {
                ErrorCategory::Storage
            }
            EtlError::ProcessingError { .. } => ErrorCategory::Processing,
        }
    }

    /// Per-venue input problems are `Low`: the batch carries on without that venue.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EtlError::MalformedInput { .. } | EtlError::Conflict { .. } => ErrorSeverity::Low,
            EtlError::ApiError(_) => ErrorSeverity::Medium,
            EtlError::SerializationError(_) | EtlError::ProcessingError { .. } => {
                ErrorSeverity::High
            }
            EtlError::ConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::ZipError(_)
            | EtlError::CsvError(_)
            | EtlError::IoError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check the configuration file and command line flags".to_string()
            }
            ErrorCategory::Network => {
                "Check that the venue feed endpoint is reachable and try again".to_string()
            }
            ErrorCategory::Input => match self {
                EtlError::Conflict { .. } => {
                    "Review the upstream venue grouping; the records do not describe the same venue"
                        .to_string()
                }
                _ => "Fix or drop the offending venue record in the feed".to_string(),
            },
            ErrorCategory::Storage => {
                "Check that the output path exists and is writable".to_string()
            }
            ErrorCategory::Processing => "Re-run with --verbose for details".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EtlError::ApiError(_) => "Could not fetch the venue feed".to_string(),
            EtlError::IoError(e) => format!("File access failed: {}", e),
            EtlError::MalformedInput { venue, .. } => {
                format!("Venue '{}' has invalid data and was skipped", venue)
            }
            EtlError::Conflict { venue, .. } => {
                format!("Venue '{}' could not be merged across providers", venue)
            }
            other => other.to_string(),
        }
    }

    pub(crate) fn malformed(
        venue: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        EtlError::MalformedInput {
            venue: venue.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_venue_errors_are_low_severity() {
        let err = EtlError::malformed("v1", "price_level", "must be between 0 and 4");
        assert_eq!(err.category(), ErrorCategory::Input);
        assert_eq!(err.severity(), ErrorSeverity::Low);

        let err = EtlError::Conflict {
            venue: "v1".to_string(),
            detail: "locations 900m apart".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Low);
        assert!(err.recovery_suggestion().contains("grouping"));
    }

    #[test]
    fn test_config_errors_are_critical() {
        let err = EtlError::MissingConfigError {
            field: "source.endpoint".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.severity().exit_code(), 3);
    }
}
