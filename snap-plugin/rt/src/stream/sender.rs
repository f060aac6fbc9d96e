use super::batch::{AsWireMetric, OutboundBatch};
use super::settings::{FlushFailurePolicy, StreamSettings};
use super::sink::ReplySink;
use snap_plugin_error::{PluginError, Result};
use snap_plugin_types::rpc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushOutcome {
    Empty,
    Written,
    Failed,
    Cancelled,
}

struct FlowState {
    /// Copies of metrics deferred by earlier send calls, oldest first
    pending: Vec<rpc::Metric>,
    last_flush: Instant,
    consecutive_failures: u32,
    sink: Box<dyn ReplySink>,
}

impl FlowState {
    fn take_pending(&mut self) -> OutboundBatch<'static> {
        OutboundBatch::from_owned(std::mem::take(&mut self.pending))
    }

    async fn flush(
        &mut self,
        batch: OutboundBatch<'_>,
        cancel: &CancellationToken,
        policy: FlushFailurePolicy,
    ) -> Result<FlushOutcome> {
        if batch.is_empty() {
            return Ok(FlushOutcome::Empty);
        }

        // The session is over; the batch (owned copies included) is dropped.
        if cancel.is_cancelled() {
            debug!("Stream cancelled, skipping flush of {} metrics", batch.len());
            return Ok(FlushOutcome::Cancelled);
        }

        let result = self.sink.write_batch(&batch).await;
        let (sent, copies) = (batch.len(), batch.owned_count());
        drop(batch);
        self.last_flush = Instant::now();

        match result {
            Ok(()) => {
                self.consecutive_failures = 0;
                debug!(sent, copies, "Flushed metrics");
                Ok(FlushOutcome::Written)
            }
            Err(e) => {
                self.consecutive_failures += 1;
                warn!(
                    sent,
                    failures = self.consecutive_failures,
                    "Failed to send metrics: {}",
                    e
                );

                if policy.exceeded(self.consecutive_failures) {
                    return Err(PluginError::Transport(format!(
                        "giving up after {} failed writes: {}",
                        self.consecutive_failures, e
                    )));
                }
                Ok(FlushOutcome::Failed)
            }
        }
    }
}

struct FlowControl {
    settings: StreamSettings,
    policy: FlushFailurePolicy,
    cancel: CancellationToken,
    state: Mutex<FlowState>,
}

/// Handle given to a streaming collector for delivering metrics to the
/// host.
///
/// Metrics are written in batches of `max_metrics_buffer` entries. Metrics
/// that do not fill a batch are copied into a buffer and go out with a later
/// call, or as soon as `max_collect_duration` has passed since the previous
/// flush. With a zero buffer size every call is flushed immediately.
///
/// Cloning the sender yields another handle to the same stream.
#[derive(Clone)]
pub struct MetricSender {
    flow: Arc<FlowControl>,
}

impl MetricSender {
    pub(crate) fn new(
        sink: impl ReplySink,
        settings: StreamSettings,
        policy: FlushFailurePolicy,
        cancel: CancellationToken,
    ) -> Self {
        let state = FlowState {
            pending: Vec::new(),
            last_flush: Instant::now(),
            consecutive_failures: 0,
            sink: Box::new(sink),
        };

        Self {
            flow: Arc::new(FlowControl {
                settings,
                policy,
                cancel,
                state: Mutex::new(state),
            }),
        }
    }

    /// Sends metrics to the host, honouring the current buffer limits.
    ///
    /// Metrics that are written by this call are encoded straight from
    /// `metrics`; only the ones left over for a later batch are copied.
    /// Once the stream is cancelled this is a no-op.
    ///
    /// Returns an error only when the flush failure policy gives up on the
    /// stream.
    pub async fn send_metrics<M: AsWireMetric + Sync>(&self, metrics: &[M]) -> Result<()> {
        if self.is_cancelled() {
            return Ok(());
        }

        let limits = self.flow.settings.limits();
        let cancel = &self.flow.cancel;
        let policy = self.flow.policy;
        let mut state = self.flow.state.lock().await;
        // Cancelled while waiting for the lock; pending copies stay put.
        if cancel.is_cancelled() {
            return Ok(());
        }

        let chunk_size = limits.max_metrics_buffer;
        if chunk_size == 0 {
            let mut batch = state.take_pending();
            batch.extend_borrowed(metrics);
            state.flush(batch, cancel, policy).await?;
            return Ok(());
        }

        let chunks = (state.pending.len() + metrics.len()) / chunk_size;
        let mut next = 0;
        for _ in 0..chunks {
            if cancel.is_cancelled() {
                return Ok(());
            }
            let mut batch = state.take_pending();
            while batch.len() < chunk_size && next < metrics.len() {
                batch.push_borrowed(metrics[next].as_wire());
                next += 1;
            }

            // A buffer that shrank below the pending count yields batches
            // without new metrics; stop once nothing is left to flush.
            match state.flush(batch, cancel, policy).await? {
                FlushOutcome::Cancelled | FlushOutcome::Empty => return Ok(()),
                FlushOutcome::Written | FlushOutcome::Failed => {}
            }
        }

        if cancel.is_cancelled() {
            return Ok(());
        }

        let rest = &metrics[next..];
        if state.last_flush.elapsed() >= limits.max_collect_duration {
            let mut batch = state.take_pending();
            batch.extend_borrowed(rest);
            state.flush(batch, cancel, policy).await?;
        } else {
            state
                .pending
                .extend(rest.iter().map(|metric| metric.as_wire().clone()));
        }

        Ok(())
    }

    /// Sends a reply carrying only an error message. Failures are logged.
    pub async fn send_error(&self, message: &str) {
        if self.is_cancelled() {
            return;
        }

        let mut state = self.flow.state.lock().await;
        if let Err(e) = state.sink.write_error(message).await {
            warn!("Failed to send error reply: {}", e);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flow.cancel.is_cancelled()
    }

    /// Resolves when the stream is cancelled.
    pub async fn cancelled(&self) {
        self.flow.cancel.cancelled().await
    }

    pub fn settings(&self) -> &StreamSettings {
        &self.flow.settings
    }

    /// Number of buffered metric copies waiting for a later batch.
    pub async fn pending_len(&self) -> usize {
        self.flow.state.lock().await.pending.len()
    }

    /// Drops the buffered copies, returning how many there were.
    pub(crate) async fn discard_pending(&self) -> usize {
        let mut state = self.flow.state.lock().await;
        let dropped = state.pending.len();
        state.pending.clear();
        dropped
    }
}
