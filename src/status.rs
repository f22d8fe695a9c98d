// System status display: database size, subscription counts, last cycle.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use crate::db::Database;
use crate::watch::scheduler::LAST_CYCLE_KEY;

/// Display system status to the terminal.
pub async fn show(db: &Arc<dyn Database>, db_display_path: &str) -> Result<()> {
    let file_size = std::fs::metadata(db_display_path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!("Database: {} ({})", db_display_path, file_size);

    let counts = db.count_subscriptions().await?;
    println!(
        "Subscriptions: {} total, {} active, watching {} accounts",
        counts.total, counts.active, counts.accounts
    );
    if counts.active == 0 {
        println!("  Run `xwatch watch <handle> --platform console --channel <name>` to add one");
    }

    match db.get_scan_state(LAST_CYCLE_KEY).await? {
        Some(at) => println!("Last poll cycle: {}", at),
        None => println!("Last poll cycle: never"),
    }

    Ok(())
}

/// Whether the database file exists yet.
pub fn is_initialized(db_path: &str) -> bool {
    Path::new(db_path).exists()
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
