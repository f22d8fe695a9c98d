// Dispatch: paced, best-effort delivery of new posts to one subscription.
//
// Each post is an independent attempt. A failed send (or a destination with
// no sink) is logged and recorded, and the next post is still tried.

use std::time::Duration;

use tracing::{debug, warn};

use crate::db::models::Subscription;
use crate::output::message::{format_post_message, RenderOptions};
use crate::sink::{SendError, SinkRegistry};
use crate::timeline::Post;

pub const DEFAULT_SEND_DELAY: Duration = Duration::from_secs(1);

/// What happened to one subscription's batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub attempted: usize,
    pub delivered: usize,
    /// Raw post id and the error for every send that failed.
    pub failed: Vec<(String, SendError)>,
}

pub struct Dispatcher {
    sinks: SinkRegistry,
    pacing: Duration,
    render: RenderOptions,
}

impl Dispatcher {
    pub fn new(sinks: SinkRegistry, pacing: Duration, render: RenderOptions) -> Self {
        Self {
            sinks,
            pacing,
            render,
        }
    }

    /// Send `posts` (already filtered, oldest first) to the subscription's
    /// channel, one message each, waiting `pacing` between sends.
    pub async fn deliver(&self, sub: &Subscription, posts: &[Post]) -> DeliveryOutcome {
        let destination = sub.destination();
        let mut outcome = DeliveryOutcome::default();

        for (i, post) in posts.iter().enumerate() {
            if i > 0 && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
            outcome.attempted += 1;

            let result = match self.sinks.resolve(&destination) {
                Ok(sink) => {
                    let message = format_post_message(post, sub, &self.render);
                    sink.send(&destination, &message).await
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => {
                    debug!(
                        post_id = %post.id,
                        platform = %destination.platform,
                        channel = %destination.channel_id,
                        "Delivered post"
                    );
                    outcome.delivered += 1;
                }
                Err(e) => {
                    warn!(
                        post_id = %post.id,
                        account = %sub.account_handle,
                        platform = %destination.platform,
                        channel = %destination.channel_id,
                        error = %e,
                        "Failed to deliver post"
                    );
                    outcome.failed.push((post.id.clone(), e));
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Destination;
    use crate::sink::MessageSink;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(Instant, String)>>,
        fail_containing: Option<&'static str>,
    }

    #[async_trait]
    impl MessageSink for Recorder {
        async fn send(&self, _: &Destination, message: &str) -> Result<(), SendError> {
            self.sent
                .lock()
                .unwrap()
                .push((Instant::now(), message.to_string()));
            match self.fail_containing {
                Some(needle) if message.contains(needle) => {
                    Err(SendError::Transport("boom".to_string()))
                }
                _ => Ok(()),
            }
        }
    }

    fn sub() -> Subscription {
        Subscription {
            id: 1,
            platform: "test".to_string(),
            channel_id: "c1".to_string(),
            user_id: "u1".to_string(),
            bot_id: "b1".to_string(),
            account_id: "44".to_string(),
            account_handle: "nasa".to_string(),
            account_display_name: "NASA".to_string(),
            watermark: None,
            filter_pattern: None,
            active: true,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn post(id: &str) -> Post {
        Post {
            id: id.to_string(),
            author_id: "44".to_string(),
            text: format!("body-{id}"),
            created_at: None,
            media: Vec::new(),
        }
    }

    fn dispatcher(sink: Arc<Recorder>, pacing: Duration) -> Dispatcher {
        let mut sinks = SinkRegistry::new();
        sinks.register("test", sink);
        Dispatcher::new(sinks, pacing, RenderOptions::default())
    }

    #[tokio::test]
    async fn test_sends_in_order_with_pacing() {
        let sink = Arc::new(Recorder::default());
        let d = dispatcher(sink.clone(), Duration::from_millis(40));

        let outcome = d.deliver(&sub(), &[post("1"), post("2"), post("3")]).await;
        assert_eq!(outcome.attempted, 3);
        assert_eq!(outcome.delivered, 3);

        let sent = sink.sent.lock().unwrap();
        assert!(sent[0].1.contains("body-1"));
        assert!(sent[2].1.contains("body-3"));
        for pair in sent.windows(2) {
            assert!(pair[1].0 - pair[0].0 >= Duration::from_millis(40));
        }
    }

    #[tokio::test]
    async fn test_single_post_has_no_delay() {
        let sink = Arc::new(Recorder::default());
        let d = dispatcher(sink, Duration::from_secs(5));

        let start = Instant::now();
        let outcome = d.deliver(&sub(), &[post("1")]).await;
        assert_eq!(outcome.delivered, 1);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_failed_send_does_not_stop_the_rest() {
        let sink = Arc::new(Recorder {
            fail_containing: Some("body-2"),
            ..Recorder::default()
        });
        let d = dispatcher(sink.clone(), Duration::ZERO);

        let outcome = d.deliver(&sub(), &[post("1"), post("2"), post("3")]).await;
        assert_eq!(outcome.attempted, 3);
        assert_eq!(outcome.delivered, 2);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].0, "2");
        assert_eq!(sink.sent.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_missing_sink_is_per_post_failure() {
        let d = Dispatcher::new(SinkRegistry::new(), Duration::ZERO, RenderOptions::default());
        let outcome = d.deliver(&sub(), &[post("1"), post("2")]).await;
        assert_eq!(outcome.attempted, 2);
        assert_eq!(outcome.delivered, 0);
        assert!(outcome
            .failed
            .iter()
            .all(|(_, e)| matches!(e, SendError::NoSink { .. })));
    }
}
