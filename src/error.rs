use thiserror::Error;

/// Failures of the two consumed capabilities (document fetch and news search).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{url} could not be reached: rate limited (HTTP 429)")]
    RateLimited { url: String },
    #[error("{url} could not be reached: HTTP {status}")]
    FetchFailed { url: String, status: u16 },
    #[error("connection to {url} failed: {message}")]
    Connection { url: String, message: String },
}

/// What a single task-runner item can fail with. The runner decides per variant
/// whether the worker keeps going.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("fetch failed: {0}")]
    FetchFailed(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl From<FetchError> for TaskError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::RateLimited { .. } => TaskError::RateLimited(err.to_string()),
            FetchError::FetchFailed { .. } | FetchError::Connection { .. } => TaskError::FetchFailed(err.to_string()),
        }
    }
}

impl TaskError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        TaskError::InvalidInput(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_errors_map_onto_task_taxonomy() {
        let limited: TaskError = FetchError::RateLimited { url: "https://x".into() }.into();
        assert!(matches!(limited, TaskError::RateLimited(_)));

        let failed: TaskError = FetchError::FetchFailed { url: "https://x".into(), status: 404 }.into();
        assert!(matches!(failed, TaskError::FetchFailed(ref m) if m.contains("404")));

        let conn: TaskError = FetchError::Connection { url: "https://x".into(), message: "reset".into() }.into();
        assert!(matches!(conn, TaskError::FetchFailed(ref m) if m.contains("reset")));
    }
}
