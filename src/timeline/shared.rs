// Shared timeline handle.
//
// One client instance is reused for every account in every cycle. The
// handle is constructed explicitly and passed to whoever needs it; the
// client itself is built lazily on first use and can be dropped with
// `reset()` so the next caller gets a fresh one (after a credential change,
// or between tests).

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::info;

use super::traits::TimelineSource;

type Factory = Box<dyn Fn() -> Result<Arc<dyn TimelineSource>> + Send + Sync>;

pub struct SharedTimeline {
    factory: Factory,
    current: Mutex<Option<Arc<dyn TimelineSource>>>,
}

impl SharedTimeline {
    /// Create a handle that builds its client with `factory` when first needed.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn TimelineSource>> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            current: Mutex::new(None),
        }
    }

    /// Wrap an already-built source. `reset()` restores the same instance.
    pub fn from_source(source: Arc<dyn TimelineSource>) -> Self {
        let initial = Arc::clone(&source);
        Self {
            factory: Box::new(move || Ok(Arc::clone(&source))),
            current: Mutex::new(Some(initial)),
        }
    }

    /// Return the live client, building it if there isn't one.
    pub async fn get(&self) -> Result<Arc<dyn TimelineSource>> {
        let mut current = self.current.lock().await;
        if let Some(source) = current.as_ref() {
            return Ok(Arc::clone(source));
        }
        let source = (self.factory)()?;
        info!("Timeline client initialized");
        *current = Some(Arc::clone(&source));
        Ok(source)
    }

    /// Drop the live client. The next `get()` rebuilds it.
    pub async fn reset(&self) {
        *self.current.lock().await = None;
        info!("Timeline client reset");
    }
}
