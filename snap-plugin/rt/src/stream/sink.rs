use super::batch::OutboundBatch;
use async_trait::async_trait;
use bytes::BytesMut;
use futures::SinkExt;
use snap_plugin_error::{PluginError, Result};
use snap_plugin_types::rpc;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedWrite, LengthDelimitedCodec};
use tonic::Status;

/// Destination of the replies of a streaming session.
#[async_trait]
pub trait ReplySink: Send + 'static {
    /// Writes one batch of metrics. A failed write is reported as
    /// [`PluginError::Transport`].
    async fn write_batch(&mut self, batch: &OutboundBatch<'_>) -> Result<()>;

    /// Writes a reply that carries only an error message.
    async fn write_error(&mut self, message: &str) -> Result<()>;
}

fn error_reply(message: &str) -> rpc::CollectReply {
    rpc::CollectReply {
        metrics_reply: None,
        error: Some(rpc::ErrReply {
            error: message.to_string(),
        }),
    }
}

/// Response channel of a server-streaming call.
#[async_trait]
impl ReplySink for mpsc::Sender<std::result::Result<rpc::CollectReply, Status>> {
    async fn write_batch(&mut self, batch: &OutboundBatch<'_>) -> Result<()> {
        self.send(Ok(batch.to_reply()))
            .await
            .map_err(|_| PluginError::Transport("reply stream closed".to_string()))
    }

    async fn write_error(&mut self, message: &str) -> Result<()> {
        self.send(Ok(error_reply(message)))
            .await
            .map_err(|_| PluginError::Transport("reply stream closed".to_string()))
    }
}

/// Writes each reply as a length-prefixed protobuf frame.
///
/// Batches are encoded straight from the borrowed metrics, so nothing is
/// copied besides the frame itself.
pub struct FramedReplySink<W> {
    frames: FramedWrite<W, LengthDelimitedCodec>,
}

impl<W: AsyncWrite + Unpin + Send + 'static> FramedReplySink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            frames: FramedWrite::new(writer, LengthDelimitedCodec::new()),
        }
    }

    pub fn into_inner(self) -> W {
        self.frames.into_inner()
    }

    async fn write_frame(&mut self, frame: BytesMut) -> Result<()> {
        self.frames
            .send(frame.freeze())
            .await
            .map_err(|e| PluginError::Transport(e.to_string()))
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send + 'static> ReplySink for FramedReplySink<W> {
    async fn write_batch(&mut self, batch: &OutboundBatch<'_>) -> Result<()> {
        let mut frame = BytesMut::with_capacity(batch.encoded_len());
        batch.encode(&mut frame);
        self.write_frame(frame).await
    }

    async fn write_error(&mut self, message: &str) -> Result<()> {
        let reply = error_reply(message);
        let mut frame = BytesMut::with_capacity(prost::Message::encoded_len(&reply));
        prost::Message::encode(&reply, &mut frame)
            .map_err(|e| PluginError::Serialization(e.to_string()))?;
        self.write_frame(frame).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;
    use snap_plugin_types::{Metric, Namespace};

    fn metrics() -> Vec<Metric> {
        (0..3)
            .map(|i| {
                let mut metric = Metric::new(Namespace::from_static(&["test", "value"]), "", "");
                metric.set_data(i as i64);
                metric
            })
            .collect()
    }

    fn split_frames(mut bytes: &[u8]) -> Vec<&[u8]> {
        let mut frames = Vec::new();
        while !bytes.is_empty() {
            let len = u32::from_be_bytes(bytes[..4].try_into().unwrap()) as usize;
            frames.push(&bytes[4..4 + len]);
            bytes = &bytes[4 + len..];
        }
        frames
    }

    #[tokio::test]
    async fn channel_sink_forwards_replies() {
        let (mut tx, mut rx) = mpsc::channel(4);
        let metrics = metrics();

        let mut batch = OutboundBatch::new();
        batch.extend_borrowed(&metrics);
        tx.write_batch(&batch).await.unwrap();
        tx.write_error("sensor offline").await.unwrap();

        let reply = rx.recv().await.unwrap().unwrap();
        assert_eq!(reply.metrics_reply.unwrap().metrics.len(), 3);

        let reply = rx.recv().await.unwrap().unwrap();
        assert_eq!(reply.error.unwrap().error, "sensor offline");
    }

    #[tokio::test]
    async fn channel_sink_reports_closed_stream() {
        let (mut tx, rx) = mpsc::channel(1);
        drop(rx);

        let err = tx.write_batch(&OutboundBatch::new()).await.unwrap_err();
        assert!(matches!(err, PluginError::Transport(_)));
    }

    #[tokio::test]
    async fn framed_sink_writes_length_prefixed_replies() {
        let mut sink = FramedReplySink::new(Vec::new());
        let metrics = metrics();

        let mut batch = OutboundBatch::new();
        batch.extend_borrowed(&metrics);
        sink.write_batch(&batch).await.unwrap();
        sink.write_error("late").await.unwrap();

        let written = sink.into_inner();
        let frames = split_frames(&written);
        assert_eq!(frames.len(), 2);

        let first = rpc::CollectReply::decode(frames[0]).unwrap();
        assert_eq!(first, batch.to_reply());

        let second = rpc::CollectReply::decode(frames[1]).unwrap();
        assert_eq!(second.error.unwrap().error, "late");
        assert!(second.metrics_reply.is_none());
    }
}
