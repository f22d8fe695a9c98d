// Subscription lifecycle: watch, unwatch and list for one chat channel.
//
// These are the operations behind the CLI's subscription commands. Errors
// come back as `CommandError`, whose messages are safe to show the person
// who asked; store failures are logged in full and shown generically.

use anyhow::Context;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::db::models::{NewSubscription, Subscription, SubscriptionKey, SubscriptionUpdate};
use crate::db::Database;
use crate::timeline::{AccountInfo, FetchError, PostId, SharedTimeline};
use crate::watch::detector::latest_id;
use crate::watch::filter::{validate_pattern, FilterError};

/// How many recent posts to look at when seeding a watermark at watch time.
const SEED_FETCH_LIMIT: u32 = 5;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0:?} is not a valid handle; use letters, digits and underscores only")]
    InvalidHandle(String),
    #[error(transparent)]
    InvalidFilter(#[from] FilterError),
    #[error("could not find @{handle}: {reason}")]
    Lookup { handle: String, reason: String },
    #[error("@{0} is not being watched here")]
    NotFound(String),
    /// The detail is logged; only the generic text is displayed.
    #[error("internal error, please try again later")]
    Internal(String),
}

impl CommandError {
    fn internal(e: anyhow::Error) -> Self {
        let detail = format!("{e:#}");
        error!(error = %detail, "Subscription command failed");
        CommandError::Internal(detail)
    }

    fn lookup(handle: &str, e: FetchError) -> Self {
        let reason = match e {
            FetchError::NotFound(_) => "no such account".to_string(),
            FetchError::Unauthorized => "the timeline credential was rejected".to_string(),
            FetchError::RateLimited { .. } => "rate limited, try again later".to_string(),
            FetchError::Transient(msg) => msg,
        };
        CommandError::Lookup {
            handle: handle.to_string(),
            reason,
        }
    }
}

/// Who is asking, and for which channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub platform: String,
    pub channel_id: String,
    pub user_id: String,
    pub bot_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WatchOutcome {
    Created(Subscription),
    Reactivated(Subscription),
    /// Already active; names and filter refreshed.
    Updated(Subscription),
}

impl WatchOutcome {
    pub fn subscription(&self) -> &Subscription {
        match self {
            WatchOutcome::Created(s) | WatchOutcome::Reactivated(s) | WatchOutcome::Updated(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnwatchOutcome {
    Deactivated(Subscription),
    AlreadyInactive(Subscription),
}

/// Trim, drop one leading `@`, and check the handle's characters.
pub fn normalize_handle(raw: &str) -> Result<String, CommandError> {
    let trimmed = raw.trim();
    let handle = trimmed.strip_prefix('@').unwrap_or(trimmed);
    if handle.is_empty()
        || !handle
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(CommandError::InvalidHandle(raw.to_string()));
    }
    Ok(handle.to_string())
}

/// Start (or resume, or refresh) watching `handle` in the requester's channel.
pub async fn watch(
    db: &dyn Database,
    timeline: &SharedTimeline,
    handle: &str,
    filter: Option<&str>,
    requester: &Requester,
) -> Result<WatchOutcome, CommandError> {
    let handle = normalize_handle(handle)?;
    let filter_pattern = validate_pattern(filter)?;

    let source = timeline.get().await.map_err(CommandError::internal)?;
    let account: AccountInfo = source
        .lookup_account(&handle)
        .await
        .map_err(|e| CommandError::lookup(&handle, e))?;

    let key = SubscriptionKey {
        platform: requester.platform.clone(),
        channel_id: requester.channel_id.clone(),
        account_id: account.id.clone(),
    };
    let existing = db
        .get_subscription(&key)
        .await
        .context("Failed to read subscription")
        .map_err(CommandError::internal)?;

    match existing {
        None => {
            let watermark = seed_watermark(timeline, &account).await;
            db.create_subscription(&NewSubscription {
                platform: requester.platform.clone(),
                channel_id: requester.channel_id.clone(),
                user_id: requester.user_id.clone(),
                bot_id: requester.bot_id.clone(),
                account_id: account.id.clone(),
                account_handle: account.handle.clone(),
                account_display_name: account.display_name.clone(),
                watermark,
                filter_pattern,
            })
            .await
            .context("Failed to create subscription")
            .map_err(CommandError::internal)?;

            info!(account = %account.handle, channel = %requester.channel_id, "Subscription created");
            Ok(WatchOutcome::Created(reload(db, &key).await?))
        }
        Some(sub) if !sub.active => {
            let watermark = seed_watermark(timeline, &account).await.or(sub.watermark);
            let update = SubscriptionUpdate {
                account_handle: Some(account.handle.clone()),
                account_display_name: Some(account.display_name.clone()),
                watermark: Some(watermark),
                filter_pattern: Some(filter_pattern),
                active: Some(true),
            };
            apply(db, &key, &update).await?;
            info!(account = %account.handle, channel = %requester.channel_id, "Subscription reactivated");
            Ok(WatchOutcome::Reactivated(reload(db, &key).await?))
        }
        Some(_) => {
            let update = SubscriptionUpdate {
                account_handle: Some(account.handle.clone()),
                account_display_name: Some(account.display_name.clone()),
                filter_pattern: Some(filter_pattern),
                ..SubscriptionUpdate::default()
            };
            apply(db, &key, &update).await?;
            Ok(WatchOutcome::Updated(reload(db, &key).await?))
        }
    }
}

/// Stop watching `handle` in a channel. The row is kept so a later watch
/// resumes it.
///
/// The handle is matched against the channel's rows first; only if none
/// matches (the account may have been renamed) is it looked up upstream.
pub async fn unwatch(
    db: &dyn Database,
    timeline: &SharedTimeline,
    handle: &str,
    platform: &str,
    channel_id: &str,
) -> Result<UnwatchOutcome, CommandError> {
    let handle = normalize_handle(handle)?;

    let rows = db
        .list_channel_subscriptions(platform, channel_id)
        .await
        .context("Failed to list channel subscriptions")
        .map_err(CommandError::internal)?;

    let sub = match rows
        .into_iter()
        .find(|s| s.account_handle.eq_ignore_ascii_case(&handle))
    {
        Some(sub) => sub,
        None => {
            let source = timeline.get().await.map_err(CommandError::internal)?;
            let account = source
                .lookup_account(&handle)
                .await
                .map_err(|e| CommandError::lookup(&handle, e))?;
            let key = SubscriptionKey {
                platform: platform.to_string(),
                channel_id: channel_id.to_string(),
                account_id: account.id,
            };
            db.get_subscription(&key)
                .await
                .context("Failed to read subscription")
                .map_err(CommandError::internal)?
                .ok_or_else(|| CommandError::NotFound(handle.clone()))?
        }
    };

    if !sub.active {
        return Ok(UnwatchOutcome::AlreadyInactive(sub));
    }

    let key = sub.key();
    apply(
        db,
        &key,
        &SubscriptionUpdate {
            active: Some(false),
            ..SubscriptionUpdate::default()
        },
    )
    .await?;
    info!(account = %sub.account_handle, channel = %channel_id, "Subscription deactivated");
    Ok(UnwatchOutcome::Deactivated(reload(db, &key).await?))
}

/// Every subscription in a channel, active or not.
pub async fn list(
    db: &dyn Database,
    platform: &str,
    channel_id: &str,
) -> Result<Vec<Subscription>, CommandError> {
    db.list_channel_subscriptions(platform, channel_id)
        .await
        .context("Failed to list channel subscriptions")
        .map_err(CommandError::internal)
}

/// Best-effort starting watermark: the newest of the account's recent posts.
/// `None` leaves initialization to the first poll cycle.
async fn seed_watermark(timeline: &SharedTimeline, account: &AccountInfo) -> Option<PostId> {
    let source = match timeline.get().await {
        Ok(source) => source,
        Err(e) => {
            warn!(error = %e, "Timeline client unavailable, watermark left for the poll cycle");
            return None;
        }
    };
    match source.fetch_recent(&account.id, SEED_FETCH_LIMIT).await {
        Ok(posts) => latest_id(&posts),
        Err(e) => {
            warn!(account = %account.handle, error = %e, "Could not fetch latest post, watermark left for the poll cycle");
            None
        }
    }
}

async fn apply(
    db: &dyn Database,
    key: &SubscriptionKey,
    update: &SubscriptionUpdate,
) -> Result<(), CommandError> {
    let updated = db
        .update_subscription(key, update)
        .await
        .context("Failed to update subscription")
        .map_err(CommandError::internal)?;
    if !updated {
        return Err(CommandError::internal(anyhow::anyhow!(
            "subscription {}/{}/{} vanished during update",
            key.platform,
            key.channel_id,
            key.account_id
        )));
    }
    Ok(())
}

async fn reload(db: &dyn Database, key: &SubscriptionKey) -> Result<Subscription, CommandError> {
    db.get_subscription(key)
        .await
        .context("Failed to read subscription")
        .map_err(CommandError::internal)?
        .ok_or_else(|| {
            CommandError::internal(anyhow::anyhow!(
                "subscription {}/{}/{} missing after write",
                key.platform,
                key.channel_id,
                key.account_id
            ))
        })
}
