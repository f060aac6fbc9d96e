use bytes::BufMut;
use prost::encoding::{WireType, encode_key, encode_varint, encoded_len_varint, key_len, message};
use snap_plugin_types::{Metric, MetricRef, rpc};
use std::sync::Arc;

/// Anything that can lend its wire representation to an outbound batch.
pub trait AsWireMetric {
    fn as_wire(&self) -> &rpc::Metric;
}

impl AsWireMetric for rpc::Metric {
    fn as_wire(&self) -> &rpc::Metric {
        self
    }
}

impl AsWireMetric for Metric {
    fn as_wire(&self) -> &rpc::Metric {
        self.wire()
    }
}

impl AsWireMetric for MetricRef<'_> {
    fn as_wire(&self) -> &rpc::Metric {
        self.wire()
    }
}

impl<T: AsWireMetric + ?Sized> AsWireMetric for &T {
    fn as_wire(&self) -> &rpc::Metric {
        (**self).as_wire()
    }
}

impl<T: AsWireMetric + ?Sized> AsWireMetric for Box<T> {
    fn as_wire(&self) -> &rpc::Metric {
        (**self).as_wire()
    }
}

impl<T: AsWireMetric + ?Sized> AsWireMetric for Arc<T> {
    fn as_wire(&self) -> &rpc::Metric {
        (**self).as_wire()
    }
}

/// An entry of an outbound batch: either a reference to a metric still
/// owned by the plugin, or a copy kept by the buffer across send calls.
#[derive(Debug)]
pub enum Pending<'a> {
    Borrowed(&'a rpc::Metric),
    Owned(rpc::Metric),
}

impl Pending<'_> {
    pub fn wire(&self) -> &rpc::Metric {
        match self {
            Pending::Borrowed(metric) => metric,
            Pending::Owned(metric) => metric,
        }
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, Pending::Owned(_))
    }
}

/// Metrics assembled for a single reply to the host.
///
/// Dropping the batch frees the owned copies and detaches the borrowed
/// entries; the plugin's metrics are never touched.
#[derive(Debug, Default)]
pub struct OutboundBatch<'a> {
    entries: Vec<Pending<'a>>,
}

// Field numbers of CollectReply.metrics_reply and MetricsReply.metrics
const METRICS_REPLY_TAG: u32 = 1;
const METRICS_TAG: u32 = 1;

impl<'a> OutboundBatch<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_owned(metrics: Vec<rpc::Metric>) -> Self {
        Self {
            entries: metrics.into_iter().map(Pending::Owned).collect(),
        }
    }

    pub fn push_borrowed(&mut self, metric: &'a rpc::Metric) {
        self.entries.push(Pending::Borrowed(metric));
    }

    pub fn push_owned(&mut self, metric: rpc::Metric) {
        self.entries.push(Pending::Owned(metric));
    }

    pub fn extend_borrowed<M: AsWireMetric>(&mut self, metrics: &'a [M]) {
        self.entries
            .extend(metrics.iter().map(|m| Pending::Borrowed(m.as_wire())));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries that are copies rather than references.
    pub fn owned_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_owned()).count()
    }

    pub fn entries(&self) -> &[Pending<'a>] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &rpc::Metric> {
        self.entries.iter().map(Pending::wire)
    }

    /// Builds an owned reply message. This copies every borrowed metric and
    /// is only needed when the reply has to outlive the send call, e.g. to
    /// cross a channel.
    pub fn to_reply(&self) -> rpc::CollectReply {
        rpc::CollectReply {
            metrics_reply: Some(rpc::MetricsReply {
                metrics: self.iter().cloned().collect(),
                error: String::new(),
            }),
            error: None,
        }
    }

    fn metrics_reply_len(&self) -> usize {
        self.iter()
            .map(|metric| message::encoded_len(METRICS_TAG, metric))
            .sum()
    }

    /// Length in bytes of the encoded `CollectReply`.
    pub fn encoded_len(&self) -> usize {
        let inner = self.metrics_reply_len();
        key_len(METRICS_REPLY_TAG) + encoded_len_varint(inner as u64) + inner
    }

    /// Encodes the batch as a `CollectReply` without copying the metrics.
    /// The output is byte-identical to encoding [`Self::to_reply`].
    pub fn encode(&self, buf: &mut impl BufMut) {
        let inner = self.metrics_reply_len();
        encode_key(METRICS_REPLY_TAG, WireType::LengthDelimited, buf);
        encode_varint(inner as u64, buf);
        for metric in self.iter() {
            message::encode(METRICS_TAG, metric, buf);
        }
    }
}
