// Database queries: CRUD operations for subscriptions and scan state.
//
// Every SQL statement lives here; the rest of the crate goes through the
// Database trait.

use anyhow::{Context, Result};
use rusqlite::types::ToSqlOutput;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, ToSql};
use tracing::warn;

use super::models::{NewSubscription, Subscription, SubscriptionCounts, SubscriptionKey, SubscriptionUpdate};
use crate::timeline::{ParsePostIdError, PostId};

// Post ids are stored as decimal TEXT, never as INTEGER/REAL.
impl ToSql for PostId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

const SUBSCRIPTION_COLUMNS: &str = "id, platform, channel_id, user_id, bot_id, account_id,
    account_handle, account_display_name, watermark, filter_pattern, active,
    created_at, updated_at";

// The watermark is read as raw text and parsed per row, so one bad value
// only costs that row.
struct SubscriptionRow {
    sub: Subscription,
    raw_watermark: Option<String>,
}

impl SubscriptionRow {
    fn parse(self) -> Result<Subscription, ParsePostIdError> {
        let SubscriptionRow {
            mut sub,
            raw_watermark,
        } = self;
        sub.watermark = raw_watermark.as_deref().map(str::parse::<PostId>).transpose()?;
        Ok(sub)
    }
}

fn subscription_from_row(row: &Row<'_>) -> rusqlite::Result<SubscriptionRow> {
    let sub = Subscription {
        id: row.get(0)?,
        platform: row.get(1)?,
        channel_id: row.get(2)?,
        user_id: row.get(3)?,
        bot_id: row.get(4)?,
        account_id: row.get(5)?,
        account_handle: row.get(6)?,
        account_display_name: row.get(7)?,
        watermark: None,
        filter_pattern: row.get(9)?,
        active: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    };
    Ok(SubscriptionRow {
        sub,
        raw_watermark: row.get(8)?,
    })
}

/// Collect rows, dropping any whose watermark doesn't parse.
fn readable_subscriptions(
    rows: impl Iterator<Item = rusqlite::Result<SubscriptionRow>>,
) -> Result<Vec<Subscription>> {
    let mut subs = Vec::new();
    for row in rows {
        let row = row?;
        let id = row.sub.id;
        match row.parse() {
            Ok(sub) => subs.push(sub),
            Err(e) => warn!(
                subscription_id = id,
                error = %e,
                "Skipping subscription with unreadable watermark"
            ),
        }
    }
    Ok(subs)
}

// --- Subscriptions ---

/// All active subscriptions, grouped by account for stable iteration.
pub fn list_active_subscriptions(conn: &Connection) -> Result<Vec<Subscription>> {
    let sql = format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE active = 1 ORDER BY account_id, id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], subscription_from_row)?;

    readable_subscriptions(rows)
}

/// Every subscription (active or not) for one chat channel.
pub fn list_channel_subscriptions(
    conn: &Connection,
    platform: &str,
    channel_id: &str,
) -> Result<Vec<Subscription>> {
    let sql = format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
         WHERE platform = ?1 AND channel_id = ?2
         ORDER BY account_handle COLLATE NOCASE"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![platform, channel_id], subscription_from_row)?;

    readable_subscriptions(rows)
}

/// Look up the single row for a (platform, channel, account) key.
pub fn get_subscription(conn: &Connection, key: &SubscriptionKey) -> Result<Option<Subscription>> {
    let sql = format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
         WHERE platform = ?1 AND channel_id = ?2 AND account_id = ?3"
    );
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt
        .query_row(
            params![key.platform, key.channel_id, key.account_id],
            subscription_from_row,
        )
        .optional()?;
    row.map(SubscriptionRow::parse)
        .transpose()
        .context("Stored watermark is unreadable")
}

/// Insert a new active subscription and return its row id.
///
/// Fails on the UNIQUE constraint if the key already exists; callers check
/// with `get_subscription` first and update instead.
pub fn create_subscription(conn: &Connection, sub: &NewSubscription) -> Result<i64> {
    conn.execute(
        "INSERT INTO subscriptions
            (platform, channel_id, user_id, bot_id, account_id, account_handle,
             account_display_name, watermark, filter_pattern, active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1)",
        params![
            sub.platform,
            sub.channel_id,
            sub.user_id,
            sub.bot_id,
            sub.account_id,
            sub.account_handle,
            sub.account_display_name,
            sub.watermark,
            sub.filter_pattern,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Apply a partial update. Returns false if no row matched the key.
pub fn update_subscription(
    conn: &Connection,
    key: &SubscriptionKey,
    update: &SubscriptionUpdate,
) -> Result<bool> {
    let mut sets: Vec<&str> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(handle) = &update.account_handle {
        sets.push("account_handle = ?");
        values.push(Box::new(handle.clone()));
    }
    if let Some(name) = &update.account_display_name {
        sets.push("account_display_name = ?");
        values.push(Box::new(name.clone()));
    }
    if let Some(watermark) = &update.watermark {
        sets.push("watermark = ?");
        values.push(Box::new(watermark.clone()));
    }
    if let Some(pattern) = &update.filter_pattern {
        sets.push("filter_pattern = ?");
        values.push(Box::new(pattern.clone()));
    }
    if let Some(active) = update.active {
        sets.push("active = ?");
        values.push(Box::new(active));
    }
    sets.push("updated_at = datetime('now')");

    let sql = format!(
        "UPDATE subscriptions SET {} WHERE platform = ? AND channel_id = ? AND account_id = ?",
        sets.join(", ")
    );
    values.push(Box::new(key.platform.clone()));
    values.push(Box::new(key.channel_id.clone()));
    values.push(Box::new(key.account_id.clone()));

    let changed = conn.execute(&sql, params_from_iter(values.iter()))?;
    Ok(changed > 0)
}

/// Total rows, active rows, and distinct actively-watched accounts.
pub fn count_subscriptions(conn: &Connection) -> Result<SubscriptionCounts> {
    let counts = conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(active), 0),
                COUNT(DISTINCT CASE WHEN active = 1 THEN account_id END)
         FROM subscriptions",
        [],
        |row| {
            Ok(SubscriptionCounts {
                total: row.get(0)?,
                active: row.get(1)?,
                accounts: row.get(2)?,
            })
        },
    )?;
    Ok(counts)
}

// --- Scan state ---

/// Get a scan state value by key (e.g., "last_cycle_at").
pub fn get_scan_state(conn: &Connection, key: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare("SELECT value FROM scan_state WHERE key = ?1")?;
    let result = stmt.query_row(params![key], |row| row.get(0)).optional()?;
    Ok(result)
}

/// Set a scan state value (upsert).
pub fn set_scan_state(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO scan_state (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
        params![key, value],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::create_tables;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        conn
    }

    fn new_sub(channel: &str, account: &str) -> NewSubscription {
        NewSubscription {
            platform: "console".to_string(),
            channel_id: channel.to_string(),
            user_id: "u1".to_string(),
            bot_id: "b1".to_string(),
            account_id: account.to_string(),
            account_handle: format!("handle{account}"),
            account_display_name: format!("Account {account}"),
            watermark: None,
            filter_pattern: None,
        }
    }

    fn key(channel: &str, account: &str) -> SubscriptionKey {
        SubscriptionKey {
            platform: "console".to_string(),
            channel_id: channel.to_string(),
            account_id: account.to_string(),
        }
    }

    #[test]
    fn test_create_and_get() {
        let conn = test_conn();
        let mut sub = new_sub("general", "44");
        sub.watermark = Some("1793475912345678901".parse().unwrap());
        sub.filter_pattern = Some("launch".to_string());
        let id = create_subscription(&conn, &sub).unwrap();
        assert!(id > 0);

        let found = get_subscription(&conn, &key("general", "44")).unwrap().unwrap();
        assert_eq!(found.id, id);
        assert!(found.active);
        assert_eq!(
            found.watermark.unwrap().to_string(),
            "1793475912345678901"
        );
        assert_eq!(found.filter_pattern.as_deref(), Some("launch"));
        assert!(get_subscription(&conn, &key("general", "45")).unwrap().is_none());
    }

    #[test]
    fn test_watermark_stored_as_text() {
        let conn = test_conn();
        let mut sub = new_sub("general", "44");
        sub.watermark = Some("18446744073709551616".parse().unwrap());
        create_subscription(&conn, &sub).unwrap();

        let (kind, raw): (String, String) = conn
            .query_row(
                "SELECT typeof(watermark), watermark FROM subscriptions",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(kind, "text");
        assert_eq!(raw, "18446744073709551616");
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let conn = test_conn();
        create_subscription(&conn, &new_sub("general", "44")).unwrap();
        assert!(create_subscription(&conn, &new_sub("general", "44")).is_err());
    }

    #[test]
    fn test_partial_update_only_touches_set_fields() {
        let conn = test_conn();
        let mut sub = new_sub("general", "44");
        sub.filter_pattern = Some("keep me".to_string());
        create_subscription(&conn, &sub).unwrap();

        let changed = update_subscription(
            &conn,
            &key("general", "44"),
            &SubscriptionUpdate::watermark(PostId::from(110)),
        )
        .unwrap();
        assert!(changed);

        let found = get_subscription(&conn, &key("general", "44")).unwrap().unwrap();
        assert_eq!(found.watermark, Some(PostId::from(110)));
        assert_eq!(found.filter_pattern.as_deref(), Some("keep me"));
        assert_eq!(found.account_handle, "handle44");
    }

    #[test]
    fn test_update_can_clear_nullable_fields() {
        let conn = test_conn();
        let mut sub = new_sub("general", "44");
        sub.filter_pattern = Some("old".to_string());
        create_subscription(&conn, &sub).unwrap();

        let update = SubscriptionUpdate {
            filter_pattern: Some(None),
            active: Some(false),
            ..Default::default()
        };
        update_subscription(&conn, &key("general", "44"), &update).unwrap();

        let found = get_subscription(&conn, &key("general", "44")).unwrap().unwrap();
        assert!(found.filter_pattern.is_none());
        assert!(!found.active);
    }

    #[test]
    fn test_update_missing_row_returns_false() {
        let conn = test_conn();
        let update = SubscriptionUpdate {
            active: Some(false),
            ..Default::default()
        };
        assert!(!update_subscription(&conn, &key("general", "404"), &update).unwrap());
    }

    #[test]
    fn test_list_active_skips_inactive() {
        let conn = test_conn();
        create_subscription(&conn, &new_sub("general", "44")).unwrap();
        create_subscription(&conn, &new_sub("random", "44")).unwrap();
        create_subscription(&conn, &new_sub("general", "50")).unwrap();
        update_subscription(
            &conn,
            &key("random", "44"),
            &SubscriptionUpdate {
                active: Some(false),
                ..Default::default()
            },
        )
        .unwrap();

        let active = list_active_subscriptions(&conn).unwrap();
        assert_eq!(active.len(), 2);
        assert!(active.iter().all(|s| s.active));

        let channel = list_channel_subscriptions(&conn, "console", "random").unwrap();
        assert_eq!(channel.len(), 1);
        assert!(!channel[0].active);

        let counts = count_subscriptions(&conn).unwrap();
        assert_eq!(
            counts,
            SubscriptionCounts {
                total: 3,
                active: 2,
                accounts: 2
            }
        );
    }

    #[test]
    fn test_corrupt_stored_watermark_is_an_error() {
        let conn = test_conn();
        create_subscription(&conn, &new_sub("general", "44")).unwrap();
        conn.execute("UPDATE subscriptions SET watermark = '1.7e18'", [])
            .unwrap();
        assert!(get_subscription(&conn, &key("general", "44")).is_err());
    }

    #[test]
    fn test_listing_skips_rows_with_corrupt_watermark() {
        let conn = test_conn();
        let mut good = new_sub("general", "44");
        good.watermark = Some(PostId::from(100));
        create_subscription(&conn, &good).unwrap();
        create_subscription(&conn, &new_sub("general", "45")).unwrap();
        conn.execute(
            "UPDATE subscriptions SET watermark = '1.79e18' WHERE account_id = '45'",
            [],
        )
        .unwrap();

        let active = list_active_subscriptions(&conn).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].account_id, "44");
        assert_eq!(active[0].watermark, Some(PostId::from(100)));

        let channel = list_channel_subscriptions(&conn, "console", "general").unwrap();
        assert_eq!(channel.len(), 1);
    }

    #[test]
    fn test_scan_state_roundtrip() {
        let conn = test_conn();
        assert_eq!(get_scan_state(&conn, "last_cycle_at").unwrap(), None);
        set_scan_state(&conn, "last_cycle_at", "2024-05-23T01:02:03Z").unwrap();
        set_scan_state(&conn, "last_cycle_at", "2024-05-23T01:07:03Z").unwrap();
        assert_eq!(
            get_scan_state(&conn, "last_cycle_at").unwrap().as_deref(),
            Some("2024-05-23T01:07:03Z")
        );
    }
}
