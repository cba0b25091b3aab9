//! Error types for replen operations.
//!
//! Errors carry a structured [`ErrorCode`] for programmatic handling and an
//! optional suggestion for resolution, so the request layer can map them onto
//! its own responses without string matching.

use thiserror::Error;

use crate::intent::IntentStatus;

/// Result type alias for replen operations.
pub type ReplenResult<T> = Result<T, ReplenError>;

/// Main error type for all replen operations.
#[derive(Error, Debug)]
pub enum ReplenError {
    /// Input validation failed.
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        code: ErrorCode,
        field: Option<String>,
        suggestion: Option<String>,
    },

    /// Intent not found in the registry.
    #[error("Intent not found: {message}")]
    NotFound {
        message: String,
        code: ErrorCode,
        intent_id: Option<String>,
    },

    /// Requested status transition is not allowed.
    #[error("Invalid transition: {message}")]
    InvalidTransition {
        message: String,
        code: ErrorCode,
        intent_id: String,
        from: IntentStatus,
        to: IntentStatus,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network error.
    #[error("Network error: {message}")]
    Network {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Validation (VAL_xxx)
    ValMissingField,
    ValInvalidAmount,

    // Intent (INTENT_xxx)
    IntentNotFound,
    IntentTerminal,

    // Configuration (CFG_xxx)
    CfgInvalid,

    // Network (NET_xxx)
    NetTimeout,
    NetConnectionFailed,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValMissingField => "VAL_001",
            ErrorCode::ValInvalidAmount => "VAL_002",
            ErrorCode::IntentNotFound => "INTENT_001",
            ErrorCode::IntentTerminal => "INTENT_002",
            ErrorCode::CfgInvalid => "CFG_001",
            ErrorCode::NetTimeout => "NET_001",
            ErrorCode::NetConnectionFailed => "NET_002",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl ReplenError {
    /// Create a validation error for a missing or empty field.
    pub fn missing_field(field: impl Into<String>) -> Self {
        let field = field.into();
        Self::Validation {
            message: format!("Field '{}' is required", field),
            code: ErrorCode::ValMissingField,
            suggestion: Some(format!("Provide a non-empty '{}'", field)),
            field: Some(field),
        }
    }

    /// Create a validation error for an unusable amount.
    pub fn invalid_amount(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidAmount,
            field: Some("amount".to_string()),
            suggestion: Some("Amounts are integer minor units greater than zero".to_string()),
        }
    }

    /// Create a not found error.
    pub fn not_found(intent_id: impl Into<String>) -> Self {
        let id = intent_id.into();
        Self::NotFound {
            message: format!("Intent with id '{}' not found", id),
            code: ErrorCode::IntentNotFound,
            intent_id: Some(id),
        }
    }

    /// Create an invalid transition error.
    pub fn invalid_transition(
        intent_id: impl Into<String>,
        from: IntentStatus,
        to: IntentStatus,
    ) -> Self {
        let intent_id = intent_id.into();
        Self::InvalidTransition {
            message: format!("Intent '{}' cannot move from {} to {}", intent_id, from, to),
            code: ErrorCode::IntentTerminal,
            intent_id,
            from,
            to,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { code, .. } => *code,
            Self::NotFound { code, .. } => *code,
            Self::InvalidTransition { code, .. } => *code,
            Self::Network { code, .. } => *code,
            Self::Configuration(_) => ErrorCode::CfgInvalid,
            _ => ErrorCode::Internal,
        }
    }

    /// Get a user-friendly suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Validation { suggestion, .. } => suggestion.as_deref(),
            Self::NotFound { .. } => Some("Please check the intent ID and ensure it exists"),
            Self::InvalidTransition { .. } => {
                Some("Only PENDING intents can be executed, failed or cancelled")
            }
            Self::Configuration(_) => Some("Please check your replen configuration"),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ReplenError {
    fn from(err: reqwest::Error) -> Self {
        let code = if err.is_timeout() {
            ErrorCode::NetTimeout
        } else {
            ErrorCode::NetConnectionFailed
        };
        Self::Network {
            message: err.to_string(),
            code,
            source: Some(Box::new(err)),
        }
    }
}
