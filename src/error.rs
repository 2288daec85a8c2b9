use thiserror::Error;

/// Errors surfaced by the flow runner and its helpers
#[derive(Debug, Error)]
pub enum FlowError {
    /// Health endpoint could not be reached at all
    #[error("cannot reach server at {url}: {reason}")]
    Unreachable { url: String, reason: String },

    /// Health endpoint answered with something other than 200
    #[error("server at {url} is not healthy (HTTP {status})")]
    Unhealthy { url: String, status: u16 },

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid edge case file {path}: {reason}")]
    Cases { path: String, reason: String },

    #[error("failed to write report: {0}")]
    Report(#[from] std::io::Error),
}

impl FlowError {
    /// Whether this error aborts the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FlowError::Unreachable { .. } | FlowError::Unhealthy { .. }
        )
    }
}
