// Watermark store: durable "newest post accounted for" per subscription.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::db::models::{Subscription, SubscriptionUpdate};
use crate::db::Database;
use crate::timeline::PostId;

pub struct WatermarkStore {
    db: Arc<dyn Database>,
}

impl WatermarkStore {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Move the subscription's watermark forward to `next`.
    ///
    /// Never moves it backwards: a `next` at or below the stored value is a
    /// no-op and returns `Ok(false)`.
    pub async fn advance(&self, sub: &Subscription, next: &PostId) -> Result<bool> {
        if sub.watermark.as_ref().is_some_and(|current| next <= current) {
            return Ok(false);
        }

        let updated = self
            .db
            .update_subscription(&sub.key(), &SubscriptionUpdate::watermark(next.clone()))
            .await
            .with_context(|| {
                format!(
                    "Failed to store watermark {} for @{} in {}",
                    next, sub.account_handle, sub.channel_id
                )
            })?;

        if updated {
            debug!(
                account = %sub.account_handle,
                channel = %sub.channel_id,
                from = ?sub.watermark.as_ref().map(ToString::to_string),
                to = %next,
                "Advanced watermark"
            );
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::NewSubscription;
    use crate::db::SqliteDatabase;

    async fn setup(watermark: Option<PostId>) -> (Arc<dyn Database>, Subscription) {
        let db: Arc<dyn Database> = Arc::new(SqliteDatabase::in_memory().unwrap());
        db.create_subscription(&NewSubscription {
            platform: "console".to_string(),
            channel_id: "c1".to_string(),
            user_id: "u1".to_string(),
            bot_id: "b1".to_string(),
            account_id: "44".to_string(),
            account_handle: "nasa".to_string(),
            account_display_name: "NASA".to_string(),
            watermark,
            filter_pattern: None,
        })
        .await
        .unwrap();
        let sub = db.list_active_subscriptions().await.unwrap().remove(0);
        (db, sub)
    }

    #[tokio::test]
    async fn test_advance_from_null() {
        let (db, sub) = setup(None).await;
        let store = WatermarkStore::new(db.clone());
        assert!(store.advance(&sub, &PostId::from(70)).await.unwrap());

        let stored = db.get_subscription(&sub.key()).await.unwrap().unwrap();
        assert_eq!(stored.watermark, Some(PostId::from(70)));
    }

    #[tokio::test]
    async fn test_never_regresses() {
        let (db, sub) = setup(Some(PostId::from(110))).await;
        let store = WatermarkStore::new(db.clone());
        assert!(!store.advance(&sub, &PostId::from(105)).await.unwrap());
        assert!(!store.advance(&sub, &PostId::from(110)).await.unwrap());

        let stored = db.get_subscription(&sub.key()).await.unwrap().unwrap();
        assert_eq!(stored.watermark, Some(PostId::from(110)));
    }
}
