// Timeline source: account lookup and recent-post fetching.
//
// The core only sees the TimelineSource trait. The HTTP client, its request
// budget, and the shared handle that owns the live instance live here too.

pub mod client;
pub mod posts;
pub mod rate_limit;
pub mod shared;
pub mod traits;

pub use posts::{MediaAttachment, MediaKind, ParsePostIdError, Post, PostId};
pub use shared::SharedTimeline;
pub use traits::{AccountInfo, FetchError, TimelineSource};
