// Update detection: which posts in a fetched batch are new.
//
// Ids are Snowflake-style, so "newer" means "numerically larger id". The
// source's ordering is not trusted: results are sorted here, and the next
// watermark is the largest id actually evaluated, never just the first
// element of the batch.

use tracing::warn;

use crate::timeline::{Post, PostId};

/// Outcome of comparing one batch against one watermark.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Posts newer than the watermark, oldest first.
    pub new_posts: Vec<Post>,
    /// Where the watermark should move to. `None` only when there was no
    /// watermark and nothing in the batch had a usable id.
    pub next_watermark: Option<PostId>,
}

/// Compare a fetched batch against the last-seen id.
///
/// With no watermark this is an initialization: nothing is delivered and the
/// watermark becomes the largest id in the batch. Otherwise the new posts are
/// those with an id strictly greater than the watermark. Posts whose id does
/// not parse are logged and left out.
pub fn detect_new(watermark: Option<&PostId>, batch: &[Post]) -> Detection {
    let mut parsed: Vec<(PostId, &Post)> = batch
        .iter()
        .filter_map(|post| match post.post_id() {
            Ok(id) => Some((id, post)),
            Err(e) => {
                warn!(post_id = %post.id, author = %post.author_id, error = %e, "Skipping post with malformed id");
                None
            }
        })
        .collect();

    let Some(watermark) = watermark else {
        let next_watermark = parsed.into_iter().map(|(id, _)| id).max();
        return Detection {
            new_posts: Vec::new(),
            next_watermark,
        };
    };

    parsed.retain(|(id, _)| id > watermark);
    parsed.sort_by(|(a, _), (b, _)| a.cmp(b));
    // A source can repeat a post within one page; deliver it once.
    parsed.dedup_by(|(a, _), (b, _)| a == b);

    let next_watermark = parsed
        .last()
        .map(|(id, _)| id.clone())
        .unwrap_or_else(|| watermark.clone());

    Detection {
        new_posts: parsed.into_iter().map(|(_, post)| post.clone()).collect(),
        next_watermark: Some(next_watermark),
    }
}

/// The newest id in a batch, for seeding a watermark outside a poll cycle.
pub fn latest_id(batch: &[Post]) -> Option<PostId> {
    detect_new(None, batch).next_watermark
}
