use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::FixedOffset;

use crate::output::message::RenderOptions;
use crate::timeline::client::{DEFAULT_API_URL, MAX_PAGE_SIZE, MIN_PAGE_SIZE};
use crate::watch::dispatch::DEFAULT_SEND_DELAY;
use crate::watch::poller::{PollSettings, DEFAULT_FETCH_LIMIT, DEFAULT_RATE_LIMIT_PAUSE};

/// Central configuration loaded from environment variables.
///
/// The credential comes from the environment only. The .env file is loaded
/// automatically at startup via dotenvy.
pub struct Config {
    /// Opaque credential for the timeline API.
    pub auth_key: String,
    pub api_url: String,
    pub interval_minutes: u64,
    /// Recent posts requested per account, within the API's page bounds.
    pub fetch_limit: u32,
    pub send_delay: Duration,
    pub rate_limit_pause: Duration,
    pub db_path: String,
    /// When set, the `webhook` sink posts here.
    pub webhook_url: Option<String>,
    pub include_media: bool,
    pub utc_offset: FixedOffset,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Everything has a default except the credential, which is only needed
    /// by commands that talk to the timeline API.
    pub fn load() -> Result<Self> {
        let interval_minutes = check_interval(parse_var("XWATCH_INTERVAL_MINUTES", 5u64)?)?;

        let fetch_limit = parse_var("XWATCH_FETCH_LIMIT", DEFAULT_FETCH_LIMIT)?
            .clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE);

        let utc_offset = match env::var("XWATCH_UTC_OFFSET") {
            Ok(raw) if !raw.trim().is_empty() => parse_utc_offset(raw.trim())?,
            _ => FixedOffset::east_opt(0).context("zero offset out of range")?,
        };

        Ok(Self {
            auth_key: env::var("XWATCH_AUTH_KEY").unwrap_or_default(),
            api_url: env::var("XWATCH_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            interval_minutes,
            fetch_limit,
            send_delay: Duration::from_millis(parse_var(
                "XWATCH_SEND_DELAY_MS",
                DEFAULT_SEND_DELAY.as_millis() as u64,
            )?),
            rate_limit_pause: Duration::from_secs(parse_var(
                "XWATCH_RATE_LIMIT_PAUSE_SECS",
                DEFAULT_RATE_LIMIT_PAUSE.as_secs(),
            )?),
            db_path: env::var("XWATCH_DB_PATH").unwrap_or_else(|_| "./xwatch.db".to_string()),
            webhook_url: env::var("XWATCH_WEBHOOK_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            include_media: parse_bool("XWATCH_INCLUDE_MEDIA")?,
            utc_offset,
        })
    }

    /// Check that the timeline credential is configured.
    /// Call this before anything that fetches or looks up accounts.
    pub fn require_credential(&self) -> Result<()> {
        if self.auth_key.is_empty() {
            bail!(
                "XWATCH_AUTH_KEY not set. Add it to your .env file.\n\
                 See .env.example for the required variables."
            );
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            fetch_limit: self.fetch_limit,
            rate_limit_pause: self.rate_limit_pause,
        }
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            include_media: self.include_media,
            utc_offset: self.utc_offset,
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {name}={raw:?}: {e}")),
        _ => Ok(default),
    }
}

fn check_interval(minutes: u64) -> Result<u64> {
    if minutes < 1 {
        bail!("XWATCH_INTERVAL_MINUTES must be at least 1 (got {minutes})");
    }
    if minutes.checked_mul(60).is_none() {
        bail!("XWATCH_INTERVAL_MINUTES is too large (got {minutes})");
    }
    Ok(minutes)
}

fn parse_bool(name: &str) -> Result<bool> {
    match env::var(name).map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Ok("1" | "true" | "yes" | "on") => Ok(true),
        Ok("" | "0" | "false" | "no" | "off") | Err(_) => Ok(false),
        Ok(other) => bail!("Invalid {name}={other:?}: expected true or false"),
    }
}

/// Parse `+08:00`, `-0530` or `Z` into a fixed offset.
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset> {
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).context("zero offset out of range");
    }
    let (sign, digits) = match raw.split_at_checked(1) {
        Some(("+", rest)) => (1, rest),
        Some(("-", rest)) => (-1, rest),
        _ => bail!("Invalid UTC offset {raw:?}: expected +HH:MM or -HH:MM"),
    };
    let digits: String = digits.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        bail!("Invalid UTC offset {raw:?}: expected +HH:MM or -HH:MM");
    }
    let hours: i32 = digits[..2].parse()?;
    let minutes: i32 = digits[2..].parse()?;
    if hours > 23 || minutes > 59 {
        bail!("Invalid UTC offset {raw:?}: out of range");
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .with_context(|| format!("Invalid UTC offset {raw:?}"))
}
