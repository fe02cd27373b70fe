use std::fmt;

/// What was missing when a fetch found nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotFound {
    /// The repository is reachable but no probed branch has the file.
    File { path: String, tried: Vec<String> },
    /// The repository doesn't exist or the token can't see it.
    Repo { repo: String },
}

impl fmt::Display for NotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotFound::File { path, tried } => write!(
                f,
                "File {} not found (tried branches: {})",
                path,
                tried.join(",")
            ),
            NotFound::Repo { repo } => write!(
                f,
                "Repository {} not found or not accessible (check owner/repo)",
                repo
            ),
        }
    }
}

/// Errors returned by the remote content host.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("Invalid token or insufficient permissions")]
    Auth,

    #[error("{0}")]
    NotFound(NotFound),

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    /// The version token sent with an update no longer matches the remote.
    #[error("Remote changed since it was read (precondition failed)")]
    PreconditionFailed,

    #[error("HTTP error {0}")]
    Http(u16),

    #[error("Invalid response from remote: {0}")]
    Decode(String),
}

impl RemoteError {
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RemoteError::Timeout
        } else {
            RemoteError::Network(err.to_string())
        }
    }

    pub(crate) fn from_status(status: reqwest::StatusCode) -> Self {
        match status.as_u16() {
            401 => RemoteError::Auth,
            409 | 412 => RemoteError::PreconditionFailed,
            code => RemoteError::Http(code),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound(_))
    }

    /// Timeouts and connection failures; the remote state is unknown.
    pub fn is_network(&self) -> bool {
        matches!(self, RemoteError::Timeout | RemoteError::Network(_))
    }
}
