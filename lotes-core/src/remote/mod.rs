//! Remote content host access.
//!
//! The host stores the ledger as a single file addressed by repository, path
//! and branch. Every update carries the version token (`sha`) of the content
//! it replaces so the host can refuse blind overwrites.

mod client;
mod error;

use std::future::Future;
use std::time::Duration;

pub use client::ContentClient;
pub use error::{NotFound, RemoteError};

/// Conventional branch names probed after the configured one.
pub const FALLBACK_BRANCHES: [&str; 2] = ["main", "master"];

/// File content as stored on the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBlob {
    pub content: String,
    /// Opaque version token, required as precondition on update.
    pub sha: String,
    /// Branch the content was found on.
    pub branch: String,
}

/// A create-or-update request. Without `sha` the file is created.
#[derive(Debug, Clone)]
pub struct PutRequest {
    pub content: String,
    pub message: String,
    pub branch: String,
    pub sha: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Created,
    Updated,
}

/// Access to the single remote ledger file.
pub trait RemoteStore: Send + Sync {
    /// Fetches the file from the first branch that has it.
    ///
    /// Branches are tried in order. When none has the file the error tells
    /// apart a missing file from an inaccessible repository.
    fn fetch(
        &self,
        branches: &[String],
        timeout: Duration,
    ) -> impl Future<Output = Result<RemoteBlob, RemoteError>> + Send;

    fn put(&self, request: PutRequest)
        -> impl Future<Output = Result<PutOutcome, RemoteError>> + Send;
}

/// Probe order: the preferred branch, then the conventional fallbacks.
pub fn branch_candidates(preferred: &str) -> Vec<String> {
    let mut candidates = Vec::with_capacity(3);
    if !preferred.is_empty() {
        candidates.push(preferred.to_string());
    }
    for branch in FALLBACK_BRANCHES {
        if !candidates.iter().any(|c| c == branch) {
            candidates.push(branch.to_string());
        }
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_candidates_order() {
        assert_eq!(branch_candidates("develop"), vec!["develop", "main", "master"]);
    }

    #[test]
    fn test_branch_candidates_dedup() {
        assert_eq!(branch_candidates("master"), vec!["master", "main"]);
        assert_eq!(branch_candidates(""), vec!["main", "master"]);
    }
}
