// Timeline source trait: the only outbound network dependency of the core.
//
// The HTTP client implements this for the real API; tests implement it with
// canned timelines. Failures are typed so the poller can tell a rate limit
// (pause, then move on) from an account that simply vanished.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::posts::Post;

/// Identity of a watched account as reported by the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub id: String,
    pub display_name: String,
    pub handle: String,
}

/// Why a timeline call failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("account not found: {0}")]
    NotFound(String),
    #[error("timeline source rejected the credential")]
    Unauthorized,
    #[error("rate limited by timeline source")]
    RateLimited { retry_after: Option<Duration> },
    #[error("timeline request failed: {0}")]
    Transient(String),
}

#[async_trait]
pub trait TimelineSource: Send + Sync {
    /// Fetch up to `limit` of the account's most recent posts.
    /// Order is whatever the source returns; callers must not rely on it.
    async fn fetch_recent(&self, account_id: &str, limit: u32) -> Result<Vec<Post>, FetchError>;

    /// Resolve a handle (without the leading @) to the account behind it.
    async fn lookup_account(&self, handle: &str) -> Result<AccountInfo, FetchError>;
}
