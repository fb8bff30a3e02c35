use reqwest::StatusCode;
use tally_core::ValidationError;
use thiserror::Error;

/// Failure talking to the expense API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{status} from {url}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    /// Response body for status errors (used to pull field-level messages).
    pub fn body(&self) -> Option<&str> {
        match self {
            ApiError::Status { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Login or registration rejected. Shown inline; the session is untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("{0}")]
    Registration(String),

    #[error("Could not store session: {0}")]
    Storage(String),
}

/// Create-expense failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// Rejected before sending; nothing reached the server.
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// The server or network refused the write. The draft is kept for resubmission.
    #[error("Error creating expense.")]
    Failed(String),
}
