//! Result delivery to the session layer.
//!
//! The pipeline is fire-and-forget from its caller's perspective; terminal
//! outcomes flow out through a [`ResultSink`] so the session/event layer can
//! enrich or skip the "pending" event it already emitted. Sink failures are
//! warned and swallowed by the orchestrator — delivery is an enrichment, not
//! a dependency.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use clipcast_models::ExtractionUpdate;

/// Consumer of terminal extraction updates.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Deliver one terminal update (result or failure).
    async fn deliver(&self, update: ExtractionUpdate) -> anyhow::Result<()>;
}

/// Sink that logs and drops every update.
///
/// The correct wiring after session teardown: a result arriving for a dead
/// session is recorded and discarded rather than applied.
#[derive(Debug, Clone, Default)]
pub struct DiscardingSink;

#[async_trait]
impl ResultSink for DiscardingSink {
    async fn deliver(&self, update: ExtractionUpdate) -> anyhow::Result<()> {
        debug!(
            artifact_id = %update.artifact_id,
            session_id = %update.session_id,
            stage = update.stage.as_str(),
            "discarding extraction update"
        );
        Ok(())
    }
}

/// Sink backed by a bounded channel, for in-process wiring and tests.
///
/// Sends without blocking; a full or closed channel is an error the
/// orchestrator will log and swallow.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<ExtractionUpdate>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<ExtractionUpdate>) -> Self {
        Self { tx }
    }

    /// Create a sink plus its receiving end.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ExtractionUpdate>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl ResultSink for ChannelSink {
    async fn deliver(&self, update: ExtractionUpdate) -> anyhow::Result<()> {
        self.tx
            .try_send(update)
            .map_err(|err| anyhow::anyhow!("extraction update not delivered: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipcast_models::{ArtifactId, SessionId, TrimRequest};

    fn request() -> TrimRequest {
        TrimRequest::new(
            "/tmp/replay.mp4",
            "/tmp/session",
            ArtifactId::from_string("a1"),
            SessionId::from_string("s1"),
            10.0,
            20.0,
        )
    }

    #[tokio::test]
    async fn test_channel_sink_delivers() {
        let (sink, mut rx) = ChannelSink::channel(4);
        sink.deliver(ExtractionUpdate::failed(&request(), "probe_failed"))
            .await
            .unwrap();

        let update = rx.recv().await.unwrap();
        assert_eq!(update.failure_kind.as_deref(), Some("probe_failed"));
    }

    #[tokio::test]
    async fn test_channel_sink_errors_when_closed() {
        let (sink, rx) = ChannelSink::channel(1);
        drop(rx);

        let result = sink
            .deliver(ExtractionUpdate::failed(&request(), "probe_failed"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_discarding_sink_always_succeeds() {
        let sink = DiscardingSink;
        sink.deliver(ExtractionUpdate::failed(&request(), "transcode_failed"))
            .await
            .unwrap();
    }
}
