// SqliteDatabase: rusqlite backend implementing the Database trait.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is !Sync.
// Trait methods lock the mutex, do synchronous rusqlite work, and return.
// Queries are short point lookups, so holding the lock for each is fine.

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::Mutex;

use super::models::{NewSubscription, Subscription, SubscriptionCounts, SubscriptionKey, SubscriptionUpdate};
use super::traits::Database;

pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    /// Wrap an already-opened rusqlite Connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// An in-memory database with the schema applied.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        super::schema::create_tables(&conn)?;
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn table_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::schema::table_count(&conn)
    }

    async fn list_active_subscriptions(&self) -> Result<Vec<Subscription>> {
        let conn = self.conn.lock().await;
        super::queries::list_active_subscriptions(&conn)
    }

    async fn list_channel_subscriptions(
        &self,
        platform: &str,
        channel_id: &str,
    ) -> Result<Vec<Subscription>> {
        let conn = self.conn.lock().await;
        super::queries::list_channel_subscriptions(&conn, platform, channel_id)
    }

    async fn get_subscription(&self, key: &SubscriptionKey) -> Result<Option<Subscription>> {
        let conn = self.conn.lock().await;
        super::queries::get_subscription(&conn, key)
    }

    async fn create_subscription(&self, sub: &NewSubscription) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::queries::create_subscription(&conn, sub)
    }

    async fn update_subscription(
        &self,
        key: &SubscriptionKey,
        update: &SubscriptionUpdate,
    ) -> Result<bool> {
        let conn = self.conn.lock().await;
        super::queries::update_subscription(&conn, key, update)
    }

    async fn count_subscriptions(&self) -> Result<SubscriptionCounts> {
        let conn = self.conn.lock().await;
        super::queries::count_subscriptions(&conn)
    }

    async fn get_scan_state(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().await;
        super::queries::get_scan_state(&conn, key)
    }

    async fn set_scan_state(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        super::queries::set_scan_state(&conn, key, value)
    }
}
