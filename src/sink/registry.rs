// Sink registry: maps a destination onto the sink that can reach it.
//
// A sink registered for a specific (platform, bot) pair wins over one
// registered for the whole platform.

use std::collections::HashMap;
use std::sync::Arc;

use super::traits::{MessageSink, SendError};
use crate::db::models::Destination;

#[derive(Default, Clone)]
pub struct SinkRegistry {
    by_bot: HashMap<(String, String), Arc<dyn MessageSink>>,
    by_platform: HashMap<String, Arc<dyn MessageSink>>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `sink` for every destination on `platform`.
    pub fn register(&mut self, platform: &str, sink: Arc<dyn MessageSink>) -> &mut Self {
        self.by_platform.insert(platform.to_string(), sink);
        self
    }

    /// Use `sink` only for destinations on `platform` served by `bot_id`.
    pub fn register_bot(
        &mut self,
        platform: &str,
        bot_id: &str,
        sink: Arc<dyn MessageSink>,
    ) -> &mut Self {
        self.by_bot
            .insert((platform.to_string(), bot_id.to_string()), sink);
        self
    }

    pub fn resolve(&self, destination: &Destination) -> Result<Arc<dyn MessageSink>, SendError> {
        self.by_bot
            .get(&(destination.platform.clone(), destination.bot_id.clone()))
            .or_else(|| self.by_platform.get(&destination.platform))
            .cloned()
            .ok_or_else(|| SendError::NoSink {
                platform: destination.platform.clone(),
                bot_id: destination.bot_id.clone(),
            })
    }

    pub fn platforms(&self) -> Vec<String> {
        let mut platforms: Vec<String> = self
            .by_platform
            .keys()
            .chain(self.by_bot.keys().map(|(p, _)| p))
            .cloned()
            .collect();
        platforms.sort();
        platforms.dedup();
        platforms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Named(&'static str);

    #[async_trait]
    impl MessageSink for Named {
        async fn send(&self, _: &Destination, _: &str) -> Result<(), SendError> {
            Err(SendError::Transport(self.0.to_string()))
        }
    }

    fn dest(platform: &str, bot: &str) -> Destination {
        Destination {
            platform: platform.to_string(),
            channel_id: "c1".to_string(),
            bot_id: bot.to_string(),
        }
    }

    async fn which(registry: &SinkRegistry, d: &Destination) -> String {
        match registry.resolve(d).unwrap().send(d, "").await {
            Err(SendError::Transport(name)) => name,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bot_specific_sink_wins() {
        let mut registry = SinkRegistry::new();
        registry
            .register("discord", Arc::new(Named("platform")))
            .register_bot("discord", "bot-2", Arc::new(Named("bot-2")));

        assert_eq!(which(&registry, &dest("discord", "bot-1")).await, "platform");
        assert_eq!(which(&registry, &dest("discord", "bot-2")).await, "bot-2");
    }

    #[test]
    fn test_unknown_platform_is_no_sink() {
        let registry = SinkRegistry::new();
        assert!(matches!(
            registry.resolve(&dest("telegram", "b")),
            Err(SendError::NoSink { .. })
        ));
    }

    #[test]
    fn test_platforms_listed_once() {
        let mut registry = SinkRegistry::new();
        registry
            .register("console", Arc::new(Named("a")))
            .register_bot("console", "b", Arc::new(Named("b")))
            .register_bot("webhook", "b", Arc::new(Named("c")));
        assert_eq!(registry.platforms(), vec!["console", "webhook"]);
    }
}
