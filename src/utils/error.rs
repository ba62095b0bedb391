use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractorError {
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

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("PDF text extraction failed: {message}")]
    PdfError { message: String },

    #[error("OCR failed: {message}")]
    OcrError { message: String },

    #[error("Unsupported document: {path}")]
    UnsupportedDocument { path: String },

    #[error("LLM error: {message}")]
    LlmError { message: String },

    #[error("LLM API returned {status}: {body}")]
    LlmApiError { status: u16, body: String },

    #[error("Could not repair model output: {message}")]
    RepairError { message: String },

    #[error("Extraction failed schema validation: {}", issues.join("; "))]
    SchemaValidationError { issues: Vec<String> },

    #[error("Extraction did not finish within {max_turns} turns")]
    TurnBudgetExhausted { max_turns: usize },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Document,
    Model,
    Output,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ExtractorError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. }
            | Self::TomlError(_) => ErrorCategory::Configuration,
            Self::ApiError(_) | Self::LlmApiError { .. } => ErrorCategory::Network,
            Self::PdfError { .. } | Self::OcrError { .. } | Self::UnsupportedDocument { .. } => {
                ErrorCategory::Document
            }
            Self::LlmError { .. }
            | Self::RepairError { .. }
            | Self::SchemaValidationError { .. }
            | Self::TurnBudgetExhausted { .. } => ErrorCategory::Model,
            Self::ZipError(_) | Self::CsvError(_) | Self::IoError(_) => ErrorCategory::Output,
            Self::SerializationError(_) | Self::ProcessingError { .. } => ErrorCategory::Internal,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Document | ErrorCategory::Model => ErrorSeverity::High,
            ErrorCategory::Configuration | ErrorCategory::Output => ErrorSeverity::High,
            ErrorCategory::Internal => ErrorSeverity::Critical,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::LlmApiError { status: 401, .. } | Self::LlmApiError { status: 403, .. } => {
                "The LLM API rejected the credentials".to_string()
            }
            Self::LlmApiError { status: 429, .. } => "The LLM API is rate limiting requests".to_string(),
            Self::ApiError(e) if e.is_timeout() => "The LLM API request timed out".to_string(),
            Self::TurnBudgetExhausted { max_turns } => format!(
                "The model did not submit an invoice within {} turns",
                max_turns
            ),
            Self::UnsupportedDocument { path } => {
                format!("'{}' is not a PDF or a supported image", path)
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => "Check the command line flags and the TOML config file",
            ErrorCategory::Network => "Check the API endpoint, the API key and network access, then run again",
            ErrorCategory::Document => "Check the input file, or configure OCR commands for scanned documents",
            ErrorCategory::Model => "Try a larger --max-turns value or a more capable model",
            ErrorCategory::Output => "Check that the output directory is writable",
            ErrorCategory::Internal => "Run again with --verbose and report the log",
        }
    }
}

pub type Result<T> = std::result::Result<T, ExtractorError>;
