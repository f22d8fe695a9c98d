// Content filters: per-subscription case-insensitive regex on post text.
//
// Patterns are validated when a subscription is created, but a stored
// pattern that no longer compiles must not silence a channel: at delivery
// time a broken filter lets everything through and logs why.

use regex::{Regex, RegexBuilder};
use thiserror::Error;
use tracing::{debug, warn};

use crate::output::truncate_chars;
use crate::timeline::Post;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid filter pattern {pattern:?}: {reason}")]
pub struct FilterError {
    pub pattern: String,
    pub reason: String,
}

/// Normalize and check a user-supplied pattern before it is stored.
///
/// Blank input means "no filter" and yields `Ok(None)`.
pub fn validate_pattern(pattern: Option<&str>) -> Result<Option<String>, FilterError> {
    let Some(pattern) = pattern.map(str::trim).filter(|p| !p.is_empty()) else {
        return Ok(None);
    };
    compile(pattern).map_err(|e| FilterError {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;
    Ok(Some(pattern.to_string()))
}

fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

/// A subscription's filter, compiled once per cycle.
#[derive(Debug, Clone)]
pub enum ContentFilter {
    /// No pattern: deliver everything.
    All,
    Matching(Regex),
    /// The stored pattern failed to compile; fail open.
    Broken { pattern: String },
}

impl ContentFilter {
    pub fn compile(pattern: Option<&str>) -> Self {
        let Some(pattern) = pattern.map(str::trim).filter(|p| !p.is_empty()) else {
            return ContentFilter::All;
        };
        match compile(pattern) {
            Ok(regex) => ContentFilter::Matching(regex),
            Err(e) => {
                warn!(pattern = pattern, error = %e, "Filter pattern failed to compile, delivering unfiltered");
                ContentFilter::Broken {
                    pattern: pattern.to_string(),
                }
            }
        }
    }

    pub fn allows(&self, post: &Post) -> bool {
        match self {
            ContentFilter::All | ContentFilter::Broken { .. } => true,
            ContentFilter::Matching(regex) => {
                let matched = regex.is_match(&post.text);
                if matched {
                    debug!(
                        post_id = %post.id,
                        pattern = regex.as_str(),
                        text = %truncate_chars(&post.text, 100),
                        "Post matched filter"
                    );
                }
                matched
            }
        }
    }
}

/// Decide whether one post passes a subscription's filter.
pub fn should_deliver(post: &Post, pattern: Option<&str>) -> bool {
    ContentFilter::compile(pattern).allows(post)
}
