use super::error::SyncError;
use crate::remote::{ContentClient, RemoteError};

pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_FILE_PATH: &str = "lotes_template.csv";
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Everything the engine needs to reach the remote and attribute commits.
///
/// Passed in explicitly; the engine holds no process-wide state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// `owner/name`
    pub repo: Option<String>,
    pub token: Option<String>,
    /// Name recorded in commit messages.
    pub user: Option<String>,
    pub branch: String,
    pub file_path: String,
    pub api_base: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            repo: None,
            token: None,
            user: None,
            branch: DEFAULT_BRANCH.to_string(),
            file_path: DEFAULT_FILE_PATH.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl SyncSettings {
    pub fn token(&self) -> Option<&str> {
        present(&self.token)
    }

    /// The repository, if it looks like `owner/name`.
    pub fn repo(&self) -> Option<&str> {
        present(&self.repo).filter(|r| r.contains('/'))
    }

    pub fn user(&self) -> Option<&str> {
        present(&self.user)
    }

    /// Checks what reading from the remote needs.
    pub fn require_remote(&self) -> Result<(), SyncError> {
        if self.token().is_none() {
            return Err(SyncError::MissingToken);
        }
        if self.repo().is_none() {
            return Err(SyncError::MissingRepo);
        }
        Ok(())
    }

    /// Checks what writing to the remote needs, returning the commit author.
    pub fn require_upload(&self) -> Result<&str, SyncError> {
        self.require_remote()?;
        self.user().ok_or(SyncError::MissingUser)
    }

    /// Builds the HTTP client for these settings.
    pub fn client(&self) -> Result<ContentClient, RemoteError> {
        ContentClient::new(
            &self.api_base,
            self.repo().unwrap_or_default(),
            &self.file_path,
            self.token().unwrap_or_default(),
        )
    }
}
