use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("Missing required column(s) for {entity}: {}", fields.join(", "))]
    MissingRequiredColumn { entity: String, fields: Vec<String> },

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing configuration value: {field}")]
    MissingConfigError { field: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

/// 錯誤分類，用於日誌與退出碼
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Configuration,
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

impl MatchError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            MatchError::MissingRequiredColumn { .. } | MatchError::CsvError(_) => {
                ErrorCategory::Input
            }
            MatchError::ConfigValidationError { .. }
            | MatchError::InvalidConfigValueError { .. }
            | MatchError::MissingConfigError { .. } => ErrorCategory::Configuration,
            MatchError::IoError(_) | MatchError::ZipError(_) => ErrorCategory::Storage,
            MatchError::SerializationError(_) | MatchError::ProcessingError { .. } => {
                ErrorCategory::Processing
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Storage => ErrorSeverity::Critical,
            ErrorCategory::Processing => ErrorSeverity::Medium,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            MatchError::MissingRequiredColumn { entity, fields } => format!(
                "Add a column for {} to the {} file, or extend [columns.{}] in the config with the header you use",
                fields.join(", "),
                entity,
                entity
            ),
            MatchError::CsvError(_) => {
                "Check that the file is valid UTF-8 CSV with a single header row".to_string()
            }
            MatchError::IoError(_) => {
                "Make sure the input files exist and the output directory is writable".to_string()
            }
            MatchError::ZipError(_) => {
                "Disable compression or choose a different output path".to_string()
            }
            MatchError::SerializationError(_) => {
                "Report this as a bug together with the input files".to_string()
            }
            MatchError::ConfigValidationError { field, .. }
            | MatchError::InvalidConfigValueError { field, .. }
            | MatchError::MissingConfigError { field } => {
                format!("Fix the '{}' setting and run again", field)
            }
            MatchError::ProcessingError { .. } => {
                "Re-run with --verbose to see which record caused the failure".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            MatchError::MissingRequiredColumn { entity, fields } => format!(
                "The {} file has no column for: {}",
                entity,
                fields.join(", ")
            ),
            MatchError::IoError(e) => format!("Could not read or write a file: {}", e),
            other => other.to_string(),
        }
    }

    pub fn processing(message: impl Into<String>) -> Self {
        MatchError::ProcessingError {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MatchError>;
