// Data models: Rust structs that map to subscription rows.
//
// Kept apart from the queries so the watch pipeline can use them without
// depending on rusqlite directly.

use serde::{Deserialize, Serialize};

use crate::timeline::PostId;

/// One (chat destination, watched account) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub platform: String,
    pub channel_id: String,
    /// Who asked for the subscription.
    pub user_id: String,
    /// Which bot identity should deliver to the channel.
    pub bot_id: String,
    pub account_id: String,
    pub account_handle: String,
    pub account_display_name: String,
    /// Id of the newest post already accounted for. None until initialized.
    pub watermark: Option<PostId>,
    pub filter_pattern: Option<String>,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Subscription {
    pub fn key(&self) -> SubscriptionKey {
        SubscriptionKey {
            platform: self.platform.clone(),
            channel_id: self.channel_id.clone(),
            account_id: self.account_id.clone(),
        }
    }

    pub fn destination(&self) -> Destination {
        Destination {
            platform: self.platform.clone(),
            channel_id: self.channel_id.clone(),
            bot_id: self.bot_id.clone(),
        }
    }
}

/// The natural key: at most one row exists per (platform, channel, account).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    pub platform: String,
    pub channel_id: String,
    pub account_id: String,
}

/// Where a subscription's messages go.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    pub platform: String,
    pub channel_id: String,
    pub bot_id: String,
}

/// Fields for inserting a new subscription row.
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub platform: String,
    pub channel_id: String,
    pub user_id: String,
    pub bot_id: String,
    pub account_id: String,
    pub account_handle: String,
    pub account_display_name: String,
    pub watermark: Option<PostId>,
    pub filter_pattern: Option<String>,
}

/// A partial update. `None` leaves the column alone; for nullable columns
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionUpdate {
    pub account_handle: Option<String>,
    pub account_display_name: Option<String>,
    pub watermark: Option<Option<PostId>>,
    pub filter_pattern: Option<Option<String>>,
    pub active: Option<bool>,
}

impl SubscriptionUpdate {
    pub fn watermark(id: PostId) -> Self {
        Self {
            watermark: Some(Some(id)),
            ..Self::default()
        }
    }
}

/// Row counts for the status display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionCounts {
    pub total: i64,
    pub active: i64,
    pub accounts: i64,
}
