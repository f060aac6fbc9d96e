use super::sender::MetricSender;
use super::settings::{FlushFailurePolicy, StreamSettings};
use super::sink::ReplySink;
use crate::plugin::StreamCollector;
use crate::status::fault_status;
use futures::{Stream, StreamExt};
use snap_plugin_error::{PluginError, Result};
use snap_plugin_types::{Metric, rpc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tonic::Status;
use tracing::{debug, info, warn};

fn collect_fault(err: &PluginError) -> Status {
    fault_status(
        err,
        rpc::CollectReply {
            metrics_reply: None,
            error: Some(rpc::ErrReply {
                error: err.to_string(),
            }),
        },
    )
}

async fn deliver<P: StreamCollector>(plugin: &P, metrics_arg: rpc::MetricsArg) -> Result<()> {
    let metrics: Vec<Metric> = metrics_arg
        .metrics
        .into_iter()
        .map(Metric::from_wire)
        .collect();
    debug!("Host subscribed to {} metrics", metrics.len());
    plugin.get_metrics_in(metrics).await
}

/// Reads host messages after the initial subscription until the session
/// ends. A failing subscription, a read error or the end of the host stream
/// cancels the session.
async fn receive<P, S>(
    plugin: Arc<P>,
    mut inbound: S,
    settings: StreamSettings,
    session: CancellationToken,
) -> Result<()>
where
    P: StreamCollector,
    S: Stream<Item = std::result::Result<rpc::CollectArg, Status>> + Send + Unpin + 'static,
{
    loop {
        let message = tokio::select! {
            _ = session.cancelled() => return Ok(()),
            message = inbound.next() => message,
        };

        match message {
            Some(Ok(arg)) => {
                settings.apply(&arg);
                if let Some(metrics_arg) = arg.metrics_arg {
                    if let Err(e) = deliver(plugin.as_ref(), metrics_arg).await {
                        warn!("Subscription failed, ending stream: {}", e);
                        session.cancel();
                        return Err(e);
                    }
                }
            }
            Some(Err(status)) => {
                info!("Host stream failed, ending session: {}", status);
                session.cancel();
                return Ok(());
            }
            None => {
                info!("Host closed the stream, ending session");
                session.cancel();
                return Ok(());
            }
        }
    }
}

/// Drives one StreamMetrics call.
///
/// Buffer limits from the host are applied until the first message with a
/// subscription arrives; that subscription is delivered before collection
/// starts. Later messages are handled concurrently with the collection,
/// and the session ends once the host stream fails or closes.
/// When the collection returns the receiver is stopped and any metrics
/// still buffered are dropped.
pub(crate) async fn run_session<P, S>(
    plugin: Arc<P>,
    mut inbound: S,
    sink: impl ReplySink,
    policy: FlushFailurePolicy,
    cancel: CancellationToken,
) -> std::result::Result<(), Status>
where
    P: StreamCollector,
    S: Stream<Item = std::result::Result<rpc::CollectArg, Status>> + Send + Unpin + 'static,
{
    let settings = plugin.stream_settings().clone();
    let limits = settings.limits();
    info!(
        "Stream session started (max_metrics_buffer={} max_collect_duration={:?})",
        limits.max_metrics_buffer, limits.max_collect_duration
    );

    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => {
                info!("Stream cancelled before subscription");
                return Ok(());
            }
            message = inbound.next() => message,
        };

        match message {
            Some(Ok(arg)) => {
                settings.apply(&arg);
                if let Some(metrics_arg) = arg.metrics_arg {
                    deliver(plugin.as_ref(), metrics_arg)
                        .await
                        .map_err(|e| collect_fault(&e))?;
                    break;
                }
            }
            Some(Err(status)) => {
                warn!("Host stream failed before subscription: {}", status);
                return Ok(());
            }
            None => {
                info!("Host closed the stream before subscription");
                return Ok(());
            }
        }
    }

    let session = cancel.child_token();
    let receiver = tokio::spawn(receive(
        plugin.clone(),
        inbound,
        settings.clone(),
        session.clone(),
    ));

    let sender = MetricSender::new(sink, settings, policy, session.clone());
    let collected = plugin.stream_metrics(sender.clone()).await;

    session.cancel();
    let received = receiver.await;

    let dropped = sender.discard_pending().await;
    if dropped > 0 {
        info!("Dropped {} buffered metrics at end of stream", dropped);
    }

    if let Err(e) = collected {
        warn!("Stream collection failed: {}", e);
        return Err(collect_fault(&e));
    }

    match received {
        Ok(Ok(())) => {
            info!("Stream session finished");
            Ok(())
        }
        Ok(Err(e)) => Err(collect_fault(&e)),
        Err(e) => Err(Status::internal(format!("stream receiver failed: {}", e))),
    }
}
