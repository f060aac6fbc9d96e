use parking_lot::Mutex;
use snap_plugin_types::rpc;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Buffering limits of a streaming collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferLimits {
    /// Number of metrics per outbound batch. Zero disables buffering.
    pub max_metrics_buffer: usize,

    /// Maximum age of buffered metrics before they are flushed regardless
    /// of the batch size.
    pub max_collect_duration: Duration,
}

impl Default for BufferLimits {
    fn default() -> Self {
        Self {
            max_metrics_buffer: 0,
            max_collect_duration: Duration::from_secs(10),
        }
    }
}

/// Buffer limits shared between the plugin, the session receiver and the
/// send path.
///
/// Every accessor takes the lock for a single read or write, so readers
/// always observe a consistent pair of values.
#[derive(Debug, Clone, Default)]
pub struct StreamSettings {
    limits: Arc<Mutex<BufferLimits>>,
}

impl StreamSettings {
    pub fn new(limits: BufferLimits) -> Self {
        Self {
            limits: Arc::new(Mutex::new(limits)),
        }
    }

    pub fn limits(&self) -> BufferLimits {
        *self.limits.lock()
    }

    pub fn max_metrics_buffer(&self) -> usize {
        self.limits.lock().max_metrics_buffer
    }

    pub fn set_max_metrics_buffer(&self, value: usize) {
        self.limits.lock().max_metrics_buffer = value;
    }

    pub fn max_collect_duration(&self) -> Duration {
        self.limits.lock().max_collect_duration
    }

    pub fn set_max_collect_duration(&self, value: Duration) {
        self.limits.lock().max_collect_duration = value;
    }

    /// Applies the limits carried by a host message. The duration is in
    /// seconds and the buffer is a metric count; non-positive values leave
    /// the current setting unchanged.
    ///
    /// Returns the updated limits if anything changed.
    pub fn apply(&self, arg: &rpc::CollectArg) -> Option<BufferLimits> {
        if arg.max_collect_duration <= 0 && arg.max_metrics_buffer <= 0 {
            return None;
        }

        let updated = {
            let mut limits = self.limits.lock();
            if arg.max_collect_duration > 0 {
                limits.max_collect_duration = Duration::from_secs(arg.max_collect_duration as u64);
            }
            if arg.max_metrics_buffer > 0 {
                limits.max_metrics_buffer =
                    usize::try_from(arg.max_metrics_buffer).unwrap_or(usize::MAX);
            }
            *limits
        };

        info!(
            max_metrics_buffer = updated.max_metrics_buffer,
            max_collect_duration = ?updated.max_collect_duration,
            "Buffer limits updated"
        );
        Some(updated)
    }
}

/// What to do when writing a batch to the host keeps failing.
///
/// Failed writes are logged and the stream continues. With a limit set,
/// the send call that hits `limit` consecutive failures returns a transport
/// error instead. A successful write resets the count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushFailurePolicy {
    pub limit: Option<u32>,
}

impl FlushFailurePolicy {
    pub fn tolerate() -> Self {
        Self { limit: None }
    }

    pub fn abort_after(limit: u32) -> Self {
        Self { limit: Some(limit) }
    }

    pub(crate) fn exceeded(&self, consecutive_failures: u32) -> bool {
        self.limit.is_some_and(|limit| consecutive_failures >= limit)
    }
}
