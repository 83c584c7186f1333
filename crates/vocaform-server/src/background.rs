//! Background tasks for the Vocaform server.
//!
//! Includes:
//! - Reaping conversations that have been idle past their TTL.

use chrono::Utc;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use vocaform_conversation::ConversationEngine;

/// Starts the abandoned-conversation reaper.
///
/// Runs indefinitely. Each pass archives every active conversation whose
/// last activity is older than `ttl_seconds`.
pub async fn start_reaper_task(engine: Arc<ConversationEngine>, ttl_seconds: u64) {
    if ttl_seconds == 0 {
        tracing::warn!("conversation reaper disabled (ttl=0)");
        return;
    }

    // Check every 60 seconds or ttl/2, whichever is smaller (but min 1s)
    let interval_seconds = (ttl_seconds / 2).clamp(1, 60);
    let interval = Duration::from_secs(interval_seconds);

    tracing::info!(
        ttl_seconds,
        interval_seconds,
        "starting conversation reaper task"
    );

    loop {
        sleep(interval).await;

        match engine.reap_stale(Utc::now()).await {
            Ok(reaped) => {
                if !reaped.is_empty() {
                    tracing::debug!(ids = ?reaped, "reaper pass complete");
                }
            }
            Err(e) => {
                tracing::error!("failed to reap stale conversations: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vocaform_conversation::{MemorySessionStore, SessionStore, StaticFormProvider};
    use vocaform_types::{ConversationPolicy, ConversationState};

    #[tokio::test(start_paused = true)]
    async fn reaper_archives_idle_conversations() {
        let store = Arc::new(MemorySessionStore::new());
        let policy = ConversationPolicy {
            inactivity_ttl_seconds: 60,
            ..ConversationPolicy::default()
        };
        let engine = Arc::new(ConversationEngine::new(
            Arc::new(StaticFormProvider::default()),
            store.clone(),
            policy,
        ));

        let idle_since = Utc::now() - chrono::Duration::hours(1);
        store
            .save(&ConversationState::new("idle", "f", "r", vec![], idle_since))
            .await
            .unwrap();
        assert_eq!(store.active_count(), 1);

        let task = tokio::spawn(start_reaper_task(engine, 60));
        tokio::time::sleep(Duration::from_secs(31)).await;
        task.abort();

        assert_eq!(store.active_count(), 0);
    }

    #[tokio::test]
    async fn zero_ttl_returns_immediately() {
        let engine = Arc::new(ConversationEngine::new(
            Arc::new(StaticFormProvider::default()),
            Arc::new(MemorySessionStore::new()),
            ConversationPolicy::default(),
        ));
        start_reaper_task(engine, 0).await;
    }
}
