//! Error types for quire operations.
//!
//! Every failure carries a structured error code so tool callers can react
//! programmatically, plus an optional suggestion for resolution.

use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for quire operations.
pub type QuireResult<T> = Result<T, QuireError>;

/// Main error type for all quire operations.
#[derive(Error, Debug)]
pub enum QuireError {
    /// Missing or invalid input field.
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        code: ErrorCode,
        details: HashMap<String, String>,
        suggestion: Option<String>,
    },

    /// Campaign, target, prospect or file absent.
    #[error("Not found: {message}")]
    NotFound {
        message: String,
        code: ErrorCode,
        resource: Option<String>,
    },

    /// Operation requires the other targets schema.
    #[error("Schema mismatch: {message}")]
    SchemaMismatch {
        message: String,
        code: ErrorCode,
        suggestion: Option<String>,
    },

    /// Path does not resolve to an array.
    #[error("Array shape error: {message}")]
    ArrayShape {
        message: String,
        code: ErrorCode,
        path: String,
    },

    /// Sender or collaborator failed or timed out.
    #[error("External call failed: {message}")]
    ExternalCall {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Could not acquire a document lock.
    #[error("Lock error: {message}")]
    Lock { message: String, code: ErrorCode },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Validation (VAL_xxx)
    ValInvalidInput,
    ValMissingField,
    ValIndexOutOfRange,
    ValAlreadyExists,

    // Not found (NF_xxx)
    NfCampaign,
    NfTarget,
    NfProspect,
    NfFile,
    NfPath,

    // Schema (SCH_xxx)
    SchLegacyTargets,
    SchReferenceTargets,

    // Array shape (ARR_xxx)
    ArrNotArray,

    // External (EXT_xxx)
    ExtFailed,
    ExtTimeout,
    ExtUnsupported,

    // Lock (LCK_xxx)
    LckAcquireFailed,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValInvalidInput => "VAL_001",
            ErrorCode::ValMissingField => "VAL_002",
            ErrorCode::ValIndexOutOfRange => "VAL_003",
            ErrorCode::ValAlreadyExists => "VAL_004",
            ErrorCode::NfCampaign => "NF_001",
            ErrorCode::NfTarget => "NF_002",
            ErrorCode::NfProspect => "NF_003",
            ErrorCode::NfFile => "NF_004",
            ErrorCode::NfPath => "NF_005",
            ErrorCode::SchLegacyTargets => "SCH_001",
            ErrorCode::SchReferenceTargets => "SCH_002",
            ErrorCode::ArrNotArray => "ARR_001",
            ErrorCode::ExtFailed => "EXT_001",
            ErrorCode::ExtTimeout => "EXT_002",
            ErrorCode::ExtUnsupported => "EXT_003",
            ErrorCode::LckAcquireFailed => "LCK_001",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl QuireError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
            details: HashMap::new(),
            suggestion: None,
        }
    }

    /// Create a validation error with suggestion.
    pub fn validation_with_suggestion(
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
            details: HashMap::new(),
            suggestion: Some(suggestion.into()),
        }
    }

    /// Create a missing-field validation error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        let field = field.into();
        let mut details = HashMap::new();
        details.insert("field".to_string(), field.clone());
        Self::Validation {
            message: format!("Missing required field: {}", field),
            code: ErrorCode::ValMissingField,
            details,
            suggestion: None,
        }
    }

    /// Create an index out of range error.
    pub fn index_out_of_range(index: i64, len: usize) -> Self {
        Self::Validation {
            message: format!("Index {} out of range for array of length {}", index, len),
            code: ErrorCode::ValIndexOutOfRange,
            details: HashMap::new(),
            suggestion: None,
        }
    }

    /// Create an already-exists validation error.
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValAlreadyExists,
            details: HashMap::new(),
            suggestion: None,
        }
    }

    /// Create a campaign not found error.
    pub fn campaign_not_found(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::NotFound {
            message: format!("Campaign '{}' not found", name),
            code: ErrorCode::NfCampaign,
            resource: Some(name),
        }
    }

    /// Create a target not found error.
    pub fn target_not_found(id: impl Into<String>) -> Self {
        let id = id.into();
        Self::NotFound {
            message: format!("Target '{}' not found", id),
            code: ErrorCode::NfTarget,
            resource: Some(id),
        }
    }

    /// Create a prospect not found error.
    pub fn prospect_not_found(slug: impl Into<String>) -> Self {
        let slug = slug.into();
        Self::NotFound {
            message: format!("Prospect '{}' not found", slug),
            code: ErrorCode::NfProspect,
            resource: Some(slug),
        }
    }

    /// Create a file not found error.
    pub fn file_not_found(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::NotFound {
            message: format!("File not found: {}", path),
            code: ErrorCode::NfFile,
            resource: Some(path),
        }
    }

    /// Create a path not found error.
    pub fn path_not_found(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::NotFound {
            message: format!("Path {} not found", path),
            code: ErrorCode::NfPath,
            resource: Some(path),
        }
    }

    /// The operation needs reference-format targets but found legacy ones.
    pub fn legacy_targets(message: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            message: message.into(),
            code: ErrorCode::SchLegacyTargets,
            suggestion: Some(
                "Use update_target, or run migrate_targets_to_prospects first".to_string(),
            ),
        }
    }

    /// The operation needs legacy targets but found reference ones.
    pub fn reference_targets(message: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            message: message.into(),
            code: ErrorCode::SchReferenceTargets,
            suggestion: None,
        }
    }

    /// Create an array shape error.
    pub fn not_an_array(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::ArrayShape {
            message: format!("Path {} is not an array", path),
            code: ErrorCode::ArrNotArray,
            path,
        }
    }

    /// Create an external call error.
    pub fn external(message: impl Into<String>) -> Self {
        Self::ExternalCall {
            message: message.into(),
            code: ErrorCode::ExtFailed,
            source: None,
        }
    }

    /// Create an external timeout error.
    pub fn external_timeout(message: impl Into<String>) -> Self {
        Self::ExternalCall {
            message: message.into(),
            code: ErrorCode::ExtTimeout,
            source: None,
        }
    }

    /// Create an unsupported-action external error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::ExternalCall {
            message: message.into(),
            code: ErrorCode::ExtUnsupported,
            source: None,
        }
    }

    /// Create a lock error.
    pub fn lock(message: impl Into<String>) -> Self {
        Self::Lock {
            message: message.into(),
            code: ErrorCode::LckAcquireFailed,
        }
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { code, .. } => *code,
            Self::NotFound { code, .. } => *code,
            Self::SchemaMismatch { code, .. } => *code,
            Self::ArrayShape { code, .. } => *code,
            Self::ExternalCall { code, .. } => *code,
            Self::Lock { code, .. } => *code,
            _ => ErrorCode::Internal,
        }
    }

    /// Get a user-friendly suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Validation { suggestion, .. } => suggestion.as_deref(),
            Self::SchemaMismatch { suggestion, .. } => suggestion.as_deref(),
            Self::NotFound { .. } => Some("Please check the name or id and ensure it exists"),
            Self::ArrayShape { .. } => Some("append and remove require a path to an array"),
            Self::ExternalCall { .. } => {
                Some("The action stays approved and can be retried with execute")
            }
            Self::Lock { .. } => Some("Another process may be writing this document"),
            _ => None,
        }
    }

    /// Whether the error is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
