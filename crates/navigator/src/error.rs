use dms_protocol::ErrorEnvelope;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, NavError>;
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Failure reported by a collaborator (fetch, billing).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("no bearer credential available")]
    MissingCredential,

    #[error("server responded with {status}: {message}")]
    Status { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("decode error: {0}")]
    Decode(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NavError {
    #[error("Load failed: {0}")]
    Load(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("Stale reference: {0}")]
    StaleReference(String),

    #[error("No bearer credential available")]
    MissingCredential,

    #[error("Operation already in progress: {0}")]
    Busy(String),

    #[error("{0}")]
    Internal(String),
}

impl NavError {
    /// Maps a collaborator failure; `context` names what was being fetched.
    pub fn from_fetch(err: FetchError, context: impl std::fmt::Display) -> Self {
        match err {
            FetchError::MissingCredential => NavError::MissingCredential,
            FetchError::Status { status: 404, message } => {
                NavError::NotFound(format!("{context}: {message}"))
            }
            FetchError::Status {
                status: 401 | 403,
                message,
            } => NavError::Permission(format!("{context}: {message}")),
            other => NavError::Load(format!("{context}: {other}")),
        }
    }

    pub const fn code(&self) -> &'static str {
        match self {
            NavError::Load(_) => "load_error",
            NavError::NotFound(_) => "not_found",
            NavError::Validation(_) => "validation_error",
            NavError::Permission(_) => "permission_denied",
            NavError::StaleReference(_) => "stale_reference",
            NavError::MissingCredential => "missing_credential",
            NavError::Busy(_) => "busy",
            NavError::Internal(_) => "internal",
        }
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self {
            NavError::Load(_) => Some("Retry the action or reload the active plan"),
            NavError::StaleReference(_) => Some("Reload the current view to resynchronize"),
            NavError::MissingCredential => Some("Provide a bearer token (--token or DMS_AUTH_TOKEN)"),
            NavError::Busy(_) => Some("Wait for the running operation to finish"),
            _ => None,
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            code: self.code().to_string(),
            message: self.to_string(),
            details: None,
            hint: self.hint().map(str::to_string),
        }
    }
}
