// HTTP timeline client: bearer-authenticated REST calls to a v2-style API.
//
// A thin reqwest wrapper with one generic GET helper, in the same shape as
// our other API clients. Status codes are mapped onto FetchError so callers
// can branch on rate limits and missing accounts without string matching.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::posts::{MediaAttachment, MediaKind, Post};
use super::rate_limit::RateLimiter;
use super::traits::{AccountInfo, FetchError, TimelineSource};

/// Default API base URL.
pub const DEFAULT_API_URL: &str = "https://api.twitter.com/2";

/// Smallest and largest page the user-timeline endpoint accepts.
pub const MIN_PAGE_SIZE: u32 = 5;
pub const MAX_PAGE_SIZE: u32 = 100;

pub struct HttpTimelineClient {
    client: reqwest::Client,
    base_url: String,
    credential: String,
    limiter: RateLimiter,
}

impl HttpTimelineClient {
    pub fn new(base_url: &str, credential: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("xwatch/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credential: credential.to_string(),
            limiter: RateLimiter::default(),
        })
    }

    /// GET `{base_url}/{path}` and deserialize the JSON body.
    async fn api_get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
        subject: &str,
    ) -> Result<T, FetchError> {
        self.limiter.acquire().await;

        let url = format!("{}/{}", self.base_url, path);
        debug!(path = path, "Timeline API GET");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.credential)
            .query(params)
            .send()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, retry_after, subject, &body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| FetchError::Transient(format!("malformed response for {path}: {e}")))
    }
}

#[async_trait]
impl TimelineSource for HttpTimelineClient {
    async fn fetch_recent(&self, account_id: &str, limit: u32) -> Result<Vec<Post>, FetchError> {
        let max_results = limit.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE).to_string();
        let path = format!("users/{account_id}/tweets");
        let page: TimelinePage = self
            .api_get(
                &path,
                &[
                    ("max_results", &max_results),
                    ("tweet.fields", "created_at,author_id,attachments"),
                    ("expansions", "attachments.media_keys"),
                    ("media.fields", "type,url,preview_image_url"),
                ],
                account_id,
            )
            .await?;

        let mut posts = page.into_posts(account_id);
        // The endpoint's minimum page can exceed what the caller asked for.
        posts.truncate(limit as usize);
        Ok(posts)
    }

    async fn lookup_account(&self, handle: &str) -> Result<AccountInfo, FetchError> {
        let path = format!("users/by/username/{handle}");
        let resp: UserLookupResponse = self.api_get(&path, &[], handle).await?;

        // The API answers unknown users with 200 and an `errors` array.
        match resp.data {
            Some(user) => Ok(AccountInfo {
                id: user.id,
                display_name: user.name,
                handle: user.username,
            }),
            None => Err(FetchError::NotFound(handle.to_string())),
        }
    }
}

/// Map a non-success status onto the fetch error taxonomy.
pub fn classify_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    subject: &str,
    body: &str,
) -> FetchError {
    match status {
        StatusCode::NOT_FOUND => FetchError::NotFound(subject.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FetchError::Unauthorized,
        StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited { retry_after },
        _ => FetchError::Transient(format!("{status}: {}", body.trim())),
    }
}

/// Read `retry-after` (seconds) or `x-rate-limit-reset` (epoch seconds).
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
    };

    if let Some(secs) = header("retry-after") {
        return Some(Duration::from_secs(secs.max(0) as u64));
    }
    header("x-rate-limit-reset").map(|reset| {
        let remaining = reset - Utc::now().timestamp();
        Duration::from_secs(remaining.max(0) as u64)
    })
}

// -- Serde types for the v2 user endpoints --

#[derive(Debug, Deserialize)]
pub struct UserLookupResponse {
    pub data: Option<UserData>,
}

#[derive(Debug, Deserialize)]
pub struct UserData {
    pub id: String,
    pub name: String,
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct TimelinePage {
    #[serde(default)]
    pub data: Vec<TweetData>,
    #[serde(default)]
    pub includes: Includes,
}

#[derive(Debug, Deserialize)]
pub struct TweetData {
    pub id: String,
    pub text: String,
    pub author_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub attachments: Option<Attachments>,
}

#[derive(Debug, Deserialize)]
pub struct Attachments {
    #[serde(default)]
    pub media_keys: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Includes {
    #[serde(default)]
    pub media: Vec<MediaData>,
}

#[derive(Debug, Deserialize)]
pub struct MediaData {
    pub media_key: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: Option<String>,
    pub preview_image_url: Option<String>,
}

impl TimelinePage {
    /// Flatten the page into posts, joining media from `includes`.
    pub fn into_posts(self, account_id: &str) -> Vec<Post> {
        let media: HashMap<&str, &MediaData> = self
            .includes
            .media
            .iter()
            .map(|m| (m.media_key.as_str(), m))
            .collect();

        self.data
            .iter()
            .map(|tweet| {
                let attachments = tweet
                    .attachments
                    .as_ref()
                    .map(|a| {
                        a.media_keys
                            .iter()
                            .filter_map(|key| media.get(key.as_str()))
                            .filter_map(|m| media_attachment(m))
                            .collect()
                    })
                    .unwrap_or_default();

                Post {
                    id: tweet.id.clone(),
                    author_id: tweet
                        .author_id
                        .clone()
                        .unwrap_or_else(|| account_id.to_string()),
                    text: tweet.text.clone(),
                    created_at: tweet.created_at,
                    media: attachments,
                }
            })
            .collect()
    }
}

fn media_attachment(media: &MediaData) -> Option<MediaAttachment> {
    let kind = match media.kind.as_str() {
        "photo" => MediaKind::Photo,
        "video" => MediaKind::Video,
        "animated_gif" => MediaKind::AnimatedGif,
        _ => return None,
    };
    // Videos and GIFs only carry a preview image URL.
    let url = media.url.clone().or_else(|| media.preview_image_url.clone())?;
    Some(MediaAttachment { kind, url })
}
