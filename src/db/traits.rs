// Database trait: the subscription store behind an async interface.
//
// SqliteDatabase implements it today. Everything above the db layer holds an
// `Arc<dyn Database>` so the poller and the subscription commands never see
// rusqlite.

use anyhow::Result;
use async_trait::async_trait;

use super::models::{NewSubscription, Subscription, SubscriptionCounts, SubscriptionKey, SubscriptionUpdate};

#[async_trait]
pub trait Database: Send + Sync {
    // --- Lifecycle ---

    /// Count the number of user-created tables in the database.
    async fn table_count(&self) -> Result<i64>;

    // --- Subscriptions ---

    /// Every active subscription.
    async fn list_active_subscriptions(&self) -> Result<Vec<Subscription>>;

    /// Every subscription for one channel, active or not.
    async fn list_channel_subscriptions(
        &self,
        platform: &str,
        channel_id: &str,
    ) -> Result<Vec<Subscription>>;

    /// The row for a (platform, channel, account) key, if any.
    async fn get_subscription(&self, key: &SubscriptionKey) -> Result<Option<Subscription>>;

    /// Insert a new active subscription and return its id.
    async fn create_subscription(&self, sub: &NewSubscription) -> Result<i64>;

    /// Apply a partial update; false if no row matched.
    async fn update_subscription(
        &self,
        key: &SubscriptionKey,
        update: &SubscriptionUpdate,
    ) -> Result<bool>;

    /// Row counts for status display.
    async fn count_subscriptions(&self) -> Result<SubscriptionCounts>;

    // --- Scan state ---

    /// Get a scan state value by key.
    async fn get_scan_state(&self, key: &str) -> Result<Option<String>>;

    /// Set a scan state value (upsert).
    async fn set_scan_state(&self, key: &str, value: &str) -> Result<()>;
}
