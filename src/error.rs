use thiserror::Error;

/// Failure talking to the remote auth or chat service.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("service rejected request ({status}){}", suffix(.detail))]
    Rejected {
        status: u16,
        detail: Option<String>,
    },

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("not logged in")]
    NoSession,

    #[error("request task failed: {0}")]
    Task(String),
}

fn suffix(detail: &Option<String>) -> String {
    detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default()
}

impl ApiError {
    /// The human readable message the service attached to a rejection, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::Rejected { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }
}

/// Failure reading or writing the persisted session / config files.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not determine config directory")]
    NoConfigDir,
}
