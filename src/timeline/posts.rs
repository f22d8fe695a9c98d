// Posts and post identifiers.
//
// Post ids are Snowflake-style: time-ordered and larger than any float can
// hold exactly. They are parsed into an arbitrary-precision integer for every
// comparison and stored as decimal text, so ordering never goes through f64.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// The id text was not a non-negative decimal integer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid post id {raw:?}: expected a decimal integer")]
pub struct ParsePostIdError {
    pub raw: String,
}

/// A full-precision post identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PostId(BigUint);

impl FromStr for PostId {
    type Err = ParsePostIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim();
        // BigUint's parser accepts a leading '+' and '_' separators; ids never have those.
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParsePostIdError { raw: s.to_string() });
        }
        BigUint::from_str(digits)
            .map(PostId)
            .map_err(|_| ParsePostIdError { raw: s.to_string() })
    }
}

impl From<u64> for PostId {
    fn from(value: u64) -> Self {
        PostId(BigUint::from(value))
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for PostId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PostId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Kind of media attached to a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
    AnimatedGif,
}

/// A media attachment, reduced to what the message renderer needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAttachment {
    pub kind: MediaKind,
    pub url: String,
}

/// A post from a watched account's timeline.
///
/// `id` is kept exactly as the source sent it. Parsing happens at the point
/// of comparison so one malformed id can be skipped without losing the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub media: Vec<MediaAttachment>,
}

impl Post {
    /// Parse this post's id at full precision.
    pub fn post_id(&self) -> Result<PostId, ParsePostIdError> {
        self.id.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_beyond_f64_precision() {
        // These two differ by 1 and collapse to the same f64.
        let a: PostId = "1793475912345678901".parse().unwrap();
        let b: PostId = "1793475912345678902".parse().unwrap();
        assert_eq!(
            "1793475912345678901".parse::<f64>().unwrap(),
            "1793475912345678902".parse::<f64>().unwrap()
        );
        assert!(a < b);
    }

    #[test]
    fn test_ordering_is_numeric_not_lexical() {
        let short: PostId = "99".parse().unwrap();
        let long: PostId = "100".parse().unwrap();
        assert!(short < long);
    }

    #[test]
    fn test_rejects_non_numeric_ids() {
        for raw in ["", "   ", "abc", "12a", "-5", "+5", "1_000", "1.5"] {
            assert!(raw.parse::<PostId>().is_err(), "{raw:?} should not parse");
        }
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        let id: PostId = " 42 ".parse().unwrap();
        assert_eq!(id, PostId::from(42));
    }

    #[test]
    fn test_serde_uses_decimal_string() {
        let id: PostId = "18446744073709551616".parse().unwrap(); // u64::MAX + 1
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#""18446744073709551616""#);
        let back: PostId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<PostId>(r#""nope""#).is_err());
    }
}
