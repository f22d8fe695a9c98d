// Colored terminal output for subscription lists and cycle reports.
//
// The CLI's display functions delegate here; chat-facing text lives in
// `output::message`.

use colored::Colorize;

use crate::db::models::Subscription;
use crate::subscriptions::{UnwatchOutcome, WatchOutcome};
use crate::watch::{CycleOutcome, CycleReport};

/// Display a channel's subscriptions in the terminal.
pub fn display_subscriptions(platform: &str, channel_id: &str, subs: &[Subscription]) {
    if subs.is_empty() {
        println!("No accounts are being watched in {platform}/{channel_id}.");
        return;
    }

    println!(
        "\n{}",
        format!("=== {platform}/{channel_id} ({} accounts) ===", subs.len()).bold()
    );
    println!();
    println!(
        "  {:<24} {:<9} {:<22} {}",
        "Account".dimmed(),
        "Status".dimmed(),
        "Last seen".dimmed(),
        "Filter".dimmed(),
    );
    println!("  {}", "-".repeat(70).dimmed());

    for sub in subs {
        let status = if sub.active {
            "watching".green()
        } else {
            "stopped".dimmed()
        };
        let watermark = sub
            .watermark
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  @{:<23} {:<9} {:<22} {}",
            sub.account_handle,
            status,
            watermark,
            sub.filter_pattern.as_deref().unwrap_or("none"),
        );
    }
    println!();
}

pub fn display_watch_outcome(outcome: &WatchOutcome) {
    let (verb, sub) = match outcome {
        WatchOutcome::Created(sub) => ("Now watching", sub),
        WatchOutcome::Reactivated(sub) => ("Resumed watching", sub),
        WatchOutcome::Updated(sub) => ("Updated", sub),
    };
    println!(
        "{} {} ({}) in {}/{}",
        verb.green().bold(),
        format!("@{}", sub.account_handle).bold(),
        sub.account_display_name,
        sub.platform,
        sub.channel_id
    );
    if let Some(pattern) = &sub.filter_pattern {
        println!("  Filter: {pattern}");
    }
    if sub.watermark.is_none() {
        println!(
            "  {}",
            "Starting point will be set on the next poll cycle".dimmed()
        );
    }
}

pub fn display_unwatch_outcome(handle: &str, outcome: &UnwatchOutcome) {
    match outcome {
        UnwatchOutcome::Deactivated(_) => {
            println!("{} @{handle}", "Stopped watching".yellow().bold())
        }
        UnwatchOutcome::AlreadyInactive(_) => {
            println!("@{handle} was already stopped here")
        }
    }
}

/// Display the result of one `xwatch poll`.
pub fn display_cycle_outcome(outcome: &CycleOutcome) {
    match outcome {
        CycleOutcome::AlreadyRunning => {
            println!("{}", "A poll cycle is already running; skipped.".yellow())
        }
        CycleOutcome::Completed(report) => display_cycle_report(report),
    }
}

fn display_cycle_report(report: &CycleReport) {
    println!("\n{}", "=== Poll cycle ===".bold());
    println!(
        "  Accounts:      {} checked, {} empty, {}",
        report.accounts_checked,
        report.accounts_empty,
        colorize_count(report.accounts_failed, "failed")
    );
    println!(
        "  Subscriptions: {} processed, {} initialized, {}",
        report.subscriptions_processed,
        report.subscriptions_initialized,
        colorize_count(report.subscriptions_failed, "failed")
    );
    println!(
        "  Posts:         {} delivered, {} filtered out, {}",
        report.posts_delivered.to_string().green(),
        report.posts_filtered,
        colorize_count(report.posts_failed, "failed")
    );
    println!();
}

fn colorize_count(count: usize, label: &str) -> String {
    let text = format!("{count} {label}");
    if count == 0 {
        text.dimmed().to_string()
    } else {
        text.red().to_string()
    }
}
