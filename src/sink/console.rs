// Console sink: prints messages to stdout.
//
// Platform "console". Useful for trying out subscriptions locally before a
// webhook is wired up.

use async_trait::async_trait;
use colored::Colorize;

use super::traits::{MessageSink, SendError};
use crate::db::models::Destination;

pub const PLATFORM: &str = "console";

pub struct ConsoleSink;

#[async_trait]
impl MessageSink for ConsoleSink {
    async fn send(&self, destination: &Destination, message: &str) -> Result<(), SendError> {
        println!(
            "{}",
            format!("--- #{} ---", destination.channel_id).dimmed()
        );
        println!("{message}");
        println!();
        Ok(())
    }
}
