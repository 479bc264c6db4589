//! # Button Refresh Queue
//!
//! Fire-and-forget re-rendering of vote buttons. The processor and the
//! sweeper push requests without awaiting them; a single worker drains the
//! queue and edits the channel messages.
//!
//! The worker re-reads the post for every request, so the rendered count is
//! the registry's latest value no matter how requests were ordered.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::domain::{VoteAction, VoteButton};
use crate::error::EditError;
use crate::ports::outbound::{ButtonRefresh, MessagingPlatform, ParticipantRegistry, RefreshRequest};

/// Sending half of the refresh queue.
#[derive(Clone, Debug)]
pub struct RefreshQueue {
    tx: mpsc::UnboundedSender<RefreshRequest>,
}

impl ButtonRefresh for RefreshQueue {
    fn schedule(&self, request: RefreshRequest) {
        if let Err(err) = self.tx.send(request) {
            warn!(
                post_id = %err.0.post_id,
                channel = %err.0.channel,
                "Button refresh worker is gone; refresh dropped"
            );
        }
    }
}

/// Counters for one worker lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefreshStats {
    pub applied: u64,
    pub skipped: u64,
    pub failed: u64,
}

enum RefreshResult {
    Applied,
    Skipped,
    Failed,
}

/// Receiving half of the refresh queue.
pub struct RefreshWorker<R, M>
where
    R: ParticipantRegistry,
    M: MessagingPlatform,
{
    rx: mpsc::UnboundedReceiver<RefreshRequest>,
    registry: Arc<R>,
    platform: Arc<M>,
    emoji: String,
    stats: RefreshStats,
}

/// Create a refresh queue and the worker that drains it.
pub fn refresh_channel<R, M>(
    registry: Arc<R>,
    platform: Arc<M>,
    emoji: impl Into<String>,
) -> (RefreshQueue, RefreshWorker<R, M>)
where
    R: ParticipantRegistry,
    M: MessagingPlatform,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let worker = RefreshWorker {
        rx,
        registry,
        platform,
        emoji: emoji.into(),
        stats: RefreshStats::default(),
    };
    (RefreshQueue { tx }, worker)
}

impl<R, M> RefreshWorker<R, M>
where
    R: ParticipantRegistry,
    M: MessagingPlatform,
{
    /// Drain until every queue handle has been dropped.
    pub async fn run(mut self) -> RefreshStats {
        while let Some(request) = self.rx.recv().await {
            self.handle(&request).await;
        }
        self.stats
    }

    /// Drain until the queue closes or shutdown is signalled.
    pub async fn run_until_shutdown(mut self, mut shutdown: watch::Receiver<bool>) -> RefreshStats {
        loop {
            tokio::select! {
                request = self.rx.recv() => match request {
                    Some(request) => self.handle(&request).await,
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("Button refresh worker stopping");
                        break;
                    }
                }
            }
        }
        self.stats
    }

    async fn handle(&mut self, request: &RefreshRequest) {
        match self.refresh_one(request).await {
            RefreshResult::Applied => self.stats.applied += 1,
            RefreshResult::Skipped => self.stats.skipped += 1,
            RefreshResult::Failed => self.stats.failed += 1,
        }
    }

    async fn refresh_one(&self, request: &RefreshRequest) -> RefreshResult {
        let post = match self.registry.get_post(&request.channel, &request.post_id).await {
            Ok(Some(post)) => post,
            Ok(None) => {
                debug!(post_id = %request.post_id, "Post vanished before refresh");
                return RefreshResult::Skipped;
            }
            Err(err) => {
                warn!(post_id = %request.post_id, error = %err, "Could not load post for refresh");
                return RefreshResult::Failed;
            }
        };

        let Some(message_ref) = post.channel_message_ref else {
            debug!(post_id = %post.post_id, "Post has no channel message yet");
            return RefreshResult::Skipped;
        };

        let action = VoteAction::new(post.channel_id.clone(), post.post_id.clone());
        let button = match VoteButton::render(&self.emoji, &action, post.vote_count) {
            Ok(button) => button,
            Err(err) => {
                warn!(post_id = %post.post_id, error = %err, "Could not render vote button");
                return RefreshResult::Failed;
            }
        };

        match self
            .platform
            .edit_message_button(&post.channel_id, message_ref, &button)
            .await
        {
            Ok(()) | Err(EditError::NotModified) => {
                debug!(post_id = %post.post_id, count = post.vote_count, "Vote button refreshed");
                RefreshResult::Applied
            }
            Err(err) => {
                warn!(
                    post_id = %post.post_id,
                    channel = %post.channel_id,
                    error = %err,
                    "Vote button refresh failed"
                );
                RefreshResult::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryParticipantRegistry;
    use crate::adapters::testing::RecordingPlatform;
    use crate::domain::{ChannelId, CountDelta, MessageRef, UserId};

    async fn setup() -> (
        Arc<InMemoryParticipantRegistry>,
        Arc<RecordingPlatform>,
        ChannelId,
        crate::domain::PostId,
    ) {
        let registry = Arc::new(InMemoryParticipantRegistry::new());
        let platform = Arc::new(RecordingPlatform::new());
        let channel = ChannelId::new("contest").unwrap();
        let post = registry.create_post(&channel, UserId(1)).await.unwrap();
        (registry, platform, channel, post.post_id)
    }

    #[tokio::test]
    async fn test_renders_latest_count() {
        let (registry, platform, channel, post_id) = setup().await;
        registry.attach_message_ref(&post_id, MessageRef(10)).await.unwrap();
        registry.increment_count(&post_id, CountDelta::Increment).await.unwrap();
        registry.increment_count(&post_id, CountDelta::Increment).await.unwrap();

        let (queue, worker) = refresh_channel(Arc::clone(&registry), Arc::clone(&platform), "⚡");
        queue.schedule(RefreshRequest::new(channel.clone(), post_id.clone()));
        queue.schedule(RefreshRequest::new(channel, post_id));
        drop(queue);

        let stats = worker.run().await;
        assert_eq!(stats.applied, 2);

        let edits = platform.edits();
        assert_eq!(edits.len(), 2);
        assert_eq!(edits[0].1, MessageRef(10));
        assert_eq!(edits[1].2.label, "⚡ Vote for this participant (2)");
    }

    #[tokio::test]
    async fn test_skips_posts_without_message() {
        let (registry, platform, channel, post_id) = setup().await;
        let (queue, worker) = refresh_channel(registry, Arc::clone(&platform), "⚡");
        queue.schedule(RefreshRequest::new(channel, post_id));
        drop(queue);

        let stats = worker.run().await;
        assert_eq!(stats.skipped, 1);
        assert!(platform.edits().is_empty());
    }

    #[tokio::test]
    async fn test_not_modified_counts_as_applied() {
        let (registry, platform, channel, post_id) = setup().await;
        registry.attach_message_ref(&post_id, MessageRef(10)).await.unwrap();
        platform.fail_edits_with(Some(EditError::NotModified));

        let (queue, worker) = refresh_channel(registry, Arc::clone(&platform), "⚡");
        queue.schedule(RefreshRequest::new(channel, post_id));
        drop(queue);

        assert_eq!(worker.run().await.applied, 1);
    }

    #[tokio::test]
    async fn test_platform_failure_is_counted_and_dropped() {
        let (registry, platform, channel, post_id) = setup().await;
        registry.attach_message_ref(&post_id, MessageRef(10)).await.unwrap();
        platform.fail_edits_with(Some(EditError::Platform {
            reason: "flood wait".to_string(),
        }));

        let (queue, worker) = refresh_channel(registry, Arc::clone(&platform), "⚡");
        queue.schedule(RefreshRequest::new(channel, post_id));
        drop(queue);

        assert_eq!(worker.run().await.failed, 1);
    }

    #[tokio::test]
    async fn test_stops_on_shutdown() {
        let (registry, platform, _channel, _post_id) = setup().await;
        let (queue, worker) = refresh_channel(registry, platform, "⚡");
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(worker.run_until_shutdown(shutdown_rx));
        shutdown_tx.send(true).unwrap();

        let stats = handle.await.unwrap();
        assert_eq!(stats, RefreshStats::default());
        drop(queue);
    }
}
