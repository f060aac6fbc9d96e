//! Handlers for the RPCs a Snap host issues to a plugin.
//!
//! Each service owns the plugin and the liveness monitor and exposes one
//! method per RPC, taking and returning tonic request/response wrappers so
//! a transport binding can forward to them directly.

use crate::liveness::LivenessMonitor;
use crate::plugin::{Collector, Plugin, StreamCollector};
use crate::status::fault_status;
use crate::stream::{FlushFailurePolicy, ReplySink, run_session};
use futures::Stream;
use snap_plugin_types::{Config, Metric, rpc};
use std::sync::Arc;
use std::time::SystemTime;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};
use tracing::{debug, error};

/// Reply stream returned by [`StreamCollectorService::stream_metrics`].
pub type CollectReplyStream = ReceiverStream<Result<rpc::CollectReply, Status>>;

// Buffered replies between the session and the transport
const REPLY_CHANNEL_CAPACITY: usize = 32;

/// RPCs common to all plugin kinds.
pub struct PluginService<P> {
    plugin: Arc<P>,
    monitor: Arc<LivenessMonitor>,
}

impl<P> Clone for PluginService<P> {
    fn clone(&self) -> Self {
        Self {
            plugin: self.plugin.clone(),
            monitor: self.monitor.clone(),
        }
    }
}

impl<P: Plugin> PluginService<P> {
    pub fn new(plugin: Arc<P>, monitor: Arc<LivenessMonitor>) -> Self {
        Self { plugin, monitor }
    }

    pub fn plugin(&self) -> &Arc<P> {
        &self.plugin
    }

    pub fn monitor(&self) -> &Arc<LivenessMonitor> {
        &self.monitor
    }

    pub async fn ping(&self, _request: Request<rpc::Empty>) -> Result<Response<rpc::ErrReply>, Status> {
        self.monitor.ping();
        Ok(Response::new(rpc::ErrReply::default()))
    }

    pub async fn kill(&self, request: Request<rpc::KillArg>) -> Result<Response<rpc::ErrReply>, Status> {
        let reason = request.into_inner().reason;
        if !self.monitor.kill(reason) {
            debug!("Ignoring kill request, plugin is already terminating");
        }
        Ok(Response::new(rpc::ErrReply::default()))
    }

    pub async fn get_config_policy(
        &self,
        _request: Request<rpc::Empty>,
    ) -> Result<Response<rpc::GetConfigPolicyReply>, Status> {
        match self.plugin.get_config_policy() {
            Ok(policy) => Ok(Response::new(policy.to_wire())),
            Err(e) => {
                error!("GetConfigPolicy failed: {}", e);
                Err(fault_status(
                    &e,
                    rpc::GetConfigPolicyReply {
                        error: e.to_string(),
                        ..Default::default()
                    },
                ))
            }
        }
    }

    /// Advertises the plugin's metric types, stamped with the current time
    /// as both timestamp and last advertised time.
    pub async fn get_metric_types(
        &self,
        request: Request<rpc::GetMetricTypesArg>,
    ) -> Result<Response<rpc::MetricsReply>, Status> {
        let config = request
            .into_inner()
            .config
            .map(Config::from_wire)
            .unwrap_or_default();

        match self.plugin.get_metric_types(config) {
            Ok(metrics) => {
                let now = SystemTime::now();
                let metrics = metrics
                    .into_iter()
                    .map(|mut metric| {
                        metric.set_timestamp(now);
                        metric.set_last_advertised_time(now);
                        metric.into_wire()
                    })
                    .collect();
                Ok(Response::new(rpc::MetricsReply {
                    metrics,
                    error: String::new(),
                }))
            }
            Err(e) => {
                error!("GetMetricTypes failed: {}", e);
                Err(metrics_fault(&e))
            }
        }
    }
}

fn metrics_fault(err: &snap_plugin_error::PluginError) -> Status {
    fault_status(
        err,
        rpc::MetricsReply {
            metrics: Vec::new(),
            error: err.to_string(),
        },
    )
}

/// Service of a request/response collector.
pub struct CollectorService<P> {
    base: PluginService<P>,
}

impl<P> Clone for CollectorService<P> {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
        }
    }
}

impl<P: Collector> CollectorService<P> {
    pub fn new(plugin: Arc<P>, monitor: Arc<LivenessMonitor>) -> Self {
        Self {
            base: PluginService::new(plugin, monitor),
        }
    }

    pub fn base(&self) -> &PluginService<P> {
        &self.base
    }

    pub async fn ping(&self, request: Request<rpc::Empty>) -> Result<Response<rpc::ErrReply>, Status> {
        self.base.ping(request).await
    }

    pub async fn kill(&self, request: Request<rpc::KillArg>) -> Result<Response<rpc::ErrReply>, Status> {
        self.base.kill(request).await
    }

    pub async fn get_config_policy(
        &self,
        request: Request<rpc::Empty>,
    ) -> Result<Response<rpc::GetConfigPolicyReply>, Status> {
        self.base.get_config_policy(request).await
    }

    pub async fn get_metric_types(
        &self,
        request: Request<rpc::GetMetricTypesArg>,
    ) -> Result<Response<rpc::MetricsReply>, Status> {
        self.base.get_metric_types(request).await
    }

    pub async fn collect_metrics(
        &self,
        request: Request<rpc::MetricsArg>,
    ) -> Result<Response<rpc::MetricsReply>, Status> {
        let metrics = request
            .into_inner()
            .metrics
            .into_iter()
            .map(Metric::from_wire)
            .collect();

        match self.base.plugin.collect_metrics(metrics).await {
            Ok(collected) => Ok(Response::new(rpc::MetricsReply {
                metrics: collected.into_iter().map(Metric::into_wire).collect(),
                error: String::new(),
            })),
            Err(e) => {
                error!("CollectMetrics failed: {}", e);
                Err(metrics_fault(&e))
            }
        }
    }
}

/// Service of a streaming collector.
pub struct StreamCollectorService<P> {
    base: PluginService<P>,
    policy: FlushFailurePolicy,
}

impl<P> Clone for StreamCollectorService<P> {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
            policy: self.policy,
        }
    }
}

impl<P: StreamCollector> StreamCollectorService<P> {
    pub fn new(plugin: Arc<P>, monitor: Arc<LivenessMonitor>) -> Self {
        Self {
            base: PluginService::new(plugin, monitor),
            policy: FlushFailurePolicy::default(),
        }
    }

    pub fn with_flush_failure_policy(mut self, policy: FlushFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn base(&self) -> &PluginService<P> {
        &self.base
    }

    pub async fn ping(&self, request: Request<rpc::Empty>) -> Result<Response<rpc::ErrReply>, Status> {
        self.base.ping(request).await
    }

    pub async fn kill(&self, request: Request<rpc::KillArg>) -> Result<Response<rpc::ErrReply>, Status> {
        self.base.kill(request).await
    }

    pub async fn get_config_policy(
        &self,
        request: Request<rpc::Empty>,
    ) -> Result<Response<rpc::GetConfigPolicyReply>, Status> {
        self.base.get_config_policy(request).await
    }

    pub async fn get_metric_types(
        &self,
        request: Request<rpc::GetMetricTypesArg>,
    ) -> Result<Response<rpc::MetricsReply>, Status> {
        self.base.get_metric_types(request).await
    }

    /// Bidirectional StreamMetrics call.
    ///
    /// The session runs in its own task and writes replies to the returned
    /// stream. Dropping the stream cancels the session; a session failure
    /// is delivered as the final item.
    pub async fn stream_metrics<S>(
        &self,
        request: Request<S>,
    ) -> Result<Response<CollectReplyStream>, Status>
    where
        S: Stream<Item = Result<rpc::CollectArg, Status>> + Send + Unpin + 'static,
    {
        let inbound = request.into_inner();
        let (tx, rx) = tokio::sync::mpsc::channel(REPLY_CHANNEL_CAPACITY);
        let plugin = self.base.plugin.clone();
        let policy = self.policy;

        tokio::spawn(async move {
            let cancel = CancellationToken::new();

            let watcher = tokio::spawn({
                let tx = tx.clone();
                let cancel = cancel.clone();
                async move {
                    tokio::select! {
                        _ = tx.closed() => {
                            debug!("Host dropped the reply stream");
                            cancel.cancel();
                        }
                        _ = cancel.cancelled() => {}
                    }
                }
            });

            let result = run_session(plugin, inbound, tx.clone(), policy, cancel.clone()).await;
            cancel.cancel();
            let _ = watcher.await;

            if let Err(status) = result {
                let _ = tx.send(Err(status)).await;
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    /// Runs a StreamMetrics session against a caller-provided sink, e.g. a
    /// [`crate::stream::FramedReplySink`]. Completes when the session ends.
    pub async fn serve_stream<S, K>(
        &self,
        inbound: S,
        sink: K,
        cancel: CancellationToken,
    ) -> Result<(), Status>
    where
        S: Stream<Item = Result<rpc::CollectArg, Status>> + Send + Unpin + 'static,
        K: ReplySink,
    {
        run_session(self.base.plugin.clone(), inbound, sink, self.policy, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liveness::{LivenessState, PingSettings};
    use async_trait::async_trait;
    use prost::Message;
    use snap_plugin_error::{PluginError, Result};
    use snap_plugin_types::{ConfigPolicy, IntRule, Namespace};

    struct Thermometer {
        fail: bool,
    }

    impl Plugin for Thermometer {
        fn get_config_policy(&self) -> Result<ConfigPolicy> {
            if self.fail {
                return Err(PluginError::fault("policy unavailable"));
            }
            let mut policy = ConfigPolicy::new();
            policy.add_rule(&["sensor", "interval"], IntRule::new().with_default(5));
            Ok(policy)
        }

        fn get_metric_types(&self, config: Config) -> Result<Vec<Metric>> {
            if self.fail {
                return Err(PluginError::fault("no sensors"));
            }
            let zone = config.get_string("zone").unwrap_or("default").to_string();
            let mut metric = Metric::new(
                Namespace::from_static(&["thermal", zone.as_str(), "celsius"]),
                "C",
                "temperature",
            );
            metric.set_version(1);
            Ok(vec![metric])
        }
    }

    #[async_trait]
    impl Collector for Thermometer {
        async fn collect_metrics(&self, metrics: Vec<Metric>) -> Result<Vec<Metric>> {
            if self.fail {
                return Err(PluginError::fault("sensor offline"));
            }
            Ok(metrics
                .into_iter()
                .map(|mut metric| {
                    metric.set_data(21.5f64);
                    metric
                })
                .collect())
        }
    }

    fn service(fail: bool) -> CollectorService<Thermometer> {
        CollectorService::new(
            Arc::new(Thermometer { fail }),
            Arc::new(LivenessMonitor::new(PingSettings::default())),
        )
    }

    #[tokio::test]
    async fn ping_starts_watchdog_and_kill_fires_signal() {
        let service = service(false);
        let monitor = service.base().monitor().clone();

        service.ping(Request::new(rpc::Empty {})).await.unwrap();
        assert_eq!(monitor.state(), LivenessState::Watching);

        let kill = rpc::KillArg {
            reason: "host exiting".into(),
        };
        service.kill(Request::new(kill)).await.unwrap();
        assert_eq!(monitor.state(), LivenessState::Killed);
    }

    #[tokio::test]
    async fn metric_types_are_stamped() {
        let before = SystemTime::now();

        let mut config = Config::new();
        config.set_string("zone", "cpu");
        let request = rpc::GetMetricTypesArg {
            config: Some(config.to_wire()),
        };

        let reply = service(false)
            .get_metric_types(Request::new(request))
            .await
            .unwrap()
            .into_inner();

        assert!(reply.error.is_empty());
        let metric = Metric::from_wire(reply.metrics[0].clone());
        assert_eq!(metric.ns().to_path_string(), "thermal/cpu/celsius");
        assert!(metric.timestamp().unwrap() >= before);
        assert_eq!(metric.timestamp(), metric.last_advertised_time());
    }

    #[tokio::test]
    async fn failures_carry_error_reply_in_details() {
        let status = service(true)
            .get_metric_types(Request::new(rpc::GetMetricTypesArg { config: None }))
            .await
            .unwrap_err();

        assert_eq!(status.code(), tonic::Code::Unknown);
        assert_eq!(status.message(), "no sensors");
        let reply = rpc::MetricsReply::decode(status.details()).unwrap();
        assert_eq!(reply.error, "no sensors");
        assert!(reply.metrics.is_empty());

        let status = service(true)
            .get_config_policy(Request::new(rpc::Empty {}))
            .await
            .unwrap_err();
        let reply = rpc::GetConfigPolicyReply::decode(status.details()).unwrap();
        assert_eq!(reply.error, "policy unavailable");
    }

    #[tokio::test]
    async fn config_policy_is_encoded() {
        let reply = service(false)
            .get_config_policy(Request::new(rpc::Empty {}))
            .await
            .unwrap()
            .into_inner();

        let rule = &reply.integer_policy["sensor.interval"];
        assert!(rule.has_default);
        assert_eq!(rule.default, 5);
    }

    #[tokio::test]
    async fn collect_fills_values() {
        let metric = Metric::new(Namespace::from_static(&["thermal", "cpu"]), "C", "");
        let request = rpc::MetricsArg {
            metrics: vec![metric.into_wire()],
        };

        let reply = service(false)
            .collect_metrics(Request::new(request))
            .await
            .unwrap()
            .into_inner();

        let collected = Metric::from_wire(reply.metrics[0].clone());
        assert_eq!(collected.value().as_f64(), Some(21.5));

        let status = service(true)
            .collect_metrics(Request::new(rpc::MetricsArg { metrics: vec![] }))
            .await
            .unwrap_err();
        assert_eq!(status.message(), "sensor offline");
    }
}
