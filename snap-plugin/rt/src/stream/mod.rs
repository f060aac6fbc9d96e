//! Flow control for streaming collectors.

mod batch;
mod sender;
mod session;
mod settings;
mod sink;

pub use batch::{AsWireMetric, OutboundBatch, Pending};
pub use sender::MetricSender;
pub use settings::{BufferLimits, FlushFailurePolicy, StreamSettings};
pub use sink::{FramedReplySink, ReplySink};

pub(crate) use session::run_session;
