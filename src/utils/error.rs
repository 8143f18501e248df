use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for {field}: {value} ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Ingress queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("Pipeline is closed, no further items are accepted")]
    PipelineClosed,

    #[error("Persistence backend unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    #[error("Failed to bind ingress listener on {addr}: {source}")]
    BindError {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failure from the remote verification service. Transport, status and
/// decoding failures all collapse into this one opaque error.
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {status} for {id}")]
    Status { id: String, status: u16 },

    #[error("malformed response for {id}: {message}")]
    Malformed { id: String, message: String },
}

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("coin with id {id} already known")]
    AlreadyKnown { id: String },

    #[error("upstream verification failed for {id}: {source}")]
    Upstream {
        id: String,
        #[source]
        source: LookupError,
    },

    #[error("upstream verification for {id} timed out after {after:?}")]
    Timeout { id: String, after: Duration },
}

impl VerifyError {
    pub fn id(&self) -> &str {
        match self {
            VerifyError::AlreadyKnown { id }
            | VerifyError::Upstream { id, .. }
            | VerifyError::Timeout { id, .. } => id,
        }
    }

    /// Timeouts are reported the same way as any other upstream failure.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            VerifyError::Upstream { .. } | VerifyError::Timeout { .. }
        )
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no item exists with id: {id}")]
    NotFound { id: String },

    #[error("item with id {id} is already stored")]
    Duplicate { id: String },

    #[error("store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("store backend error: {message}")]
    Backend { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Ingress,
    Persistence,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl TokenError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TokenError::ConfigError { .. }
            | TokenError::InvalidConfigValueError { .. }
            | TokenError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            TokenError::ValidationError { .. }
            | TokenError::QueueFull { .. }
            | TokenError::PipelineClosed
            | TokenError::CsvError(_)
            | TokenError::SerializationError(_) => ErrorCategory::Ingress,
            TokenError::StoreUnavailable(_) => ErrorCategory::Persistence,
            TokenError::IoError(_) | TokenError::BindError { .. } => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TokenError::QueueFull { .. } => ErrorSeverity::Low,
            TokenError::ValidationError { .. }
            | TokenError::CsvError(_)
            | TokenError::SerializationError(_) => ErrorSeverity::Medium,
            TokenError::ConfigError { .. }
            | TokenError::InvalidConfigValueError { .. }
            | TokenError::ConfigValidationError { .. }
            | TokenError::PipelineClosed => ErrorSeverity::High,
            TokenError::StoreUnavailable(_)
            | TokenError::BindError { .. }
            | TokenError::IoError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => "Check the command line flags and the TOML config file",
            ErrorCategory::Ingress => "Check the request body format ('coins' JSON list or CSV header)",
            ErrorCategory::Persistence => "Check that the data directory exists and is writable",
            ErrorCategory::System => "Check that the port is free and the process has permission to use it",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::Ingress => format!("Could not accept request: {}", self),
            ErrorCategory::Persistence => format!("Could not open the item store: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, TokenError>;
