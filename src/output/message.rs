// Chat message rendering for posts and subscription lists.
//
// Plain text with light markdown, which every supported sink passes
// through unchanged.

use chrono::{FixedOffset, Offset, Utc};

use crate::db::models::Subscription;
use crate::timeline::{MediaKind, Post};

/// Knobs for post rendering, taken from config.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub include_media: bool,
    pub utc_offset: FixedOffset,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            include_media: false,
            utc_offset: Utc.fix(),
        }
    }
}

/// Canonical link to a post.
pub fn post_url(handle: &str, post_id: &str) -> String {
    format!("https://x.com/{handle}/status/{post_id}")
}

/// Render one post for delivery to `sub`'s channel.
pub fn format_post_message(post: &Post, sub: &Subscription, options: &RenderOptions) -> String {
    let mut message = format!(
        "{} (@{}) posted:",
        sub.account_display_name, sub.account_handle
    );

    if let Some(created_at) = post.created_at {
        let local = created_at.with_timezone(&options.utc_offset);
        message.push_str(&format!(
            "\nPosted at: {}",
            local.format("%Y-%m-%d %H:%M:%S %:z")
        ));
    }

    let body = strip_trailing_short_links(&post.text);
    if !body.is_empty() {
        message.push_str("\n\n");
        message.push_str(body);
    }

    if options.include_media {
        for media in post.media.iter().filter(|m| m.kind == MediaKind::Photo) {
            message.push('\n');
            message.push_str(&media.url);
        }
    }

    message.push_str("\n\n");
    message.push_str(&post_url(&sub.account_handle, &post.id));
    message
}

/// Drop the `https://t.co/...` links the source appends for media and quotes.
/// The canonical link is added separately.
pub fn strip_trailing_short_links(text: &str) -> &str {
    let mut rest = text.trim_end();
    loop {
        let (head, last) = rest
            .rsplit_once(char::is_whitespace)
            .unwrap_or(("", rest));
        let is_short_link = last
            .strip_prefix("https://t.co/")
            .is_some_and(|slug| !slug.is_empty() && slug.chars().all(|c| c.is_ascii_alphanumeric()));
        if !is_short_link {
            return rest;
        }
        rest = head.trim_end();
    }
}

/// Render the list of subscriptions for a channel as a markdown table.
pub fn format_subscription_list(subs: &[Subscription]) -> String {
    if subs.is_empty() {
        return "No accounts are being watched here.".to_string();
    }

    let mut out = String::from("Watched accounts:\n| Account | Status | Filter |\n|---------|--------|--------|");
    for sub in subs {
        let status = if sub.active { "watching" } else { "stopped" };
        let filter = sub.filter_pattern.as_deref().unwrap_or("none");
        out.push_str(&format!(
            "\n| @{} | {} | {} |",
            escape_cell(&sub.account_handle),
            status,
            escape_cell(filter)
        ));
    }
    out
}

// A bare pipe would end the table cell.
fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}
