//! After-save hooks: a best-effort side channel invoked once per event
//! after a batch has been durably saved.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::EventEnvelope;

/// Error type returned by hooks. Hooks are owned by other crates, so the
/// store only needs to log whatever they report.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// A collaborator notified of every saved event.
///
/// Failures never roll back the saved batch.
#[async_trait]
pub trait EventHook: Send + Sync {
    /// Name used in log output.
    fn name(&self) -> &'static str;

    async fn after_save(&self, event: &EventEnvelope) -> Result<(), HookError>;
}

/// Registered hooks, shared between clones of a store.
#[derive(Clone, Default)]
pub struct AfterSaveHooks {
    hooks: Arc<RwLock<Vec<Arc<dyn EventHook>>>>,
}

impl AfterSaveHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, hook: Arc<dyn EventHook>) {
        tracing::debug!(hook = hook.name(), "registering after-save hook");
        self.hooks.write().await.push(hook);
    }

    pub async fn len(&self) -> usize {
        self.hooks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.hooks.read().await.is_empty()
    }

    /// Runs every hook for every event, in event order.
    pub async fn run(&self, events: &[EventEnvelope]) {
        // Snapshot so a hook may register further hooks without deadlocking.
        let hooks: Vec<_> = self.hooks.read().await.clone();
        if hooks.is_empty() {
            return;
        }

        for event in events {
            for hook in &hooks {
                if let Err(error) = hook.after_save(event).await {
                    metrics::counter!("event_store_hook_failures_total").increment(1);
                    tracing::warn!(
                        hook = hook.name(),
                        event_id = %event.event_id,
                        aggregate_id = %event.aggregate_id,
                        %error,
                        "after-save hook failed"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHook {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl EventHook for CountingHook {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn after_save(&self, _event: &EventEnvelope) -> Result<(), HookError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err("boom".into());
            }
            Ok(())
        }
    }

    fn event(n: usize) -> EventEnvelope {
        EventEnvelope::builder()
            .event_id("test.happened")
            .aggregate_id(format!("agg-{n}"))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn runs_every_hook_once_per_event() {
        let hooks = AfterSaveHooks::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        hooks
            .register(Arc::new(CountingHook {
                calls: first.clone(),
                fail: false,
            }))
            .await;
        hooks
            .register(Arc::new(CountingHook {
                calls: second.clone(),
                fail: false,
            }))
            .await;

        hooks.run(&[event(1), event(2), event(3)]).await;

        assert_eq!(first.load(Ordering::SeqCst), 3);
        assert_eq!(second.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failing_hook_does_not_stop_the_others() {
        let hooks = AfterSaveHooks::new();
        let failing = Arc::new(AtomicUsize::new(0));
        let healthy = Arc::new(AtomicUsize::new(0));
        hooks
            .register(Arc::new(CountingHook {
                calls: failing.clone(),
                fail: true,
            }))
            .await;
        hooks
            .register(Arc::new(CountingHook {
                calls: healthy.clone(),
                fail: false,
            }))
            .await;

        hooks.run(&[event(1), event(2)]).await;

        assert_eq!(failing.load(Ordering::SeqCst), 2);
        assert_eq!(healthy.load(Ordering::SeqCst), 2);
    }
}
