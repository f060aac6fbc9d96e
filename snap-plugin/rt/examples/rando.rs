//! Streaming collector that emits random values.
//!
//! There is no network transport here: a simulated host in the same process
//! pings the plugin, subscribes to its metrics, prints what it receives and
//! finally sends Kill.

use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use futures::StreamExt;
use parking_lot::Mutex;
use rand::Rng;
use snap_plugin_rt::tracing_config::{TracingConfig, initialize_tracing};
use snap_plugin_rt::types::{Config, ConfigPolicy, IntRule, Metric, Namespace, StringRule, rpc};
use snap_plugin_rt::{
    Meta, MetricSender, Plugin, PluginRuntime, PluginType, Result, RuntimeConfig,
    StreamCollector, StreamCollectorService, StreamSettings,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;
use tonic::Request;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "rando")]
#[command(about = "Snap streaming collector emitting random values")]
struct CliArgs {
    /// Path to the runtime configuration file
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Address reported in the preamble
    #[arg(long = "listen-address")]
    listen_address: Option<String>,

    /// How long the simulated host keeps the plugin running
    #[arg(
        long = "run-for",
        default_value = "5s",
        value_parser = humantime_serde::re::humantime::parse_duration
    )]
    run_for: Duration,
}

struct Rando {
    settings: StreamSettings,
    metrics: Mutex<Vec<Metric>>,
}

impl Rando {
    fn new(settings: StreamSettings) -> Self {
        Self {
            settings,
            metrics: Mutex::new(Vec::new()),
        }
    }

    fn sample(&self) -> Vec<Metric> {
        let mut rng = rand::rng();
        self.metrics
            .lock()
            .iter()
            .map(|metric| {
                let mut metric = metric.clone();
                match metric.ns().elements().last().map(|e| e.value().to_string()) {
                    Some(kind) if kind == "float" => metric.set_data(rng.random::<f64>()),
                    Some(kind) if kind == "string" => {
                        metric.set_data(format!("rando-{}", rng.random_range(0..1000)))
                    }
                    _ => metric.set_data(rng.random_range(0i64..100)),
                }
                metric.stamp_timestamp();
                metric
            })
            .collect()
    }
}

impl Plugin for Rando {
    fn get_config_policy(&self) -> Result<ConfigPolicy> {
        let mut policy = ConfigPolicy::new();
        policy
            .add_rule(&["random", "name"], StringRule::new().with_default("bacon"))
            .add_rule(
                &["random", "limit"],
                IntRule::new().with_default(100).with_minimum(1),
            );
        Ok(policy)
    }

    fn get_metric_types(&self, _config: Config) -> Result<Vec<Metric>> {
        let metric = |kind: &str, unit: &str| {
            Metric::new(
                Namespace::from_static(&["random", kind]),
                unit,
                format!("random {} value", kind),
            )
        };
        Ok(vec![
            metric("integer", "count"),
            metric("float", "ratio"),
            metric("string", ""),
        ])
    }
}

#[async_trait]
impl StreamCollector for Rando {
    fn stream_settings(&self) -> &StreamSettings {
        &self.settings
    }

    async fn get_metrics_in(&self, metrics: Vec<Metric>) -> Result<()> {
        info!("Subscribed to {} metrics", metrics.len());
        *self.metrics.lock() = metrics;
        Ok(())
    }

    async fn stream_metrics(&self, sender: MetricSender) -> Result<()> {
        let mut interval = tokio::time::interval(Duration::from_millis(200));

        while !sender.is_cancelled() {
            tokio::select! {
                _ = interval.tick() => {}
                _ = sender.cancelled() => break,
            }

            let batch = self.sample();
            sender.send_metrics(&batch).await?;
        }

        Ok(())
    }
}

/// Plays the host side: heartbeat, subscription, reply consumption and
/// finally Kill.
async fn simulate_host(
    service: StreamCollectorService<Rando>,
    run_for: Duration,
) -> Result<()> {
    let pinger = tokio::spawn({
        let service = service.clone();
        async move {
            let mut interval = tokio::time::interval(Duration::from_millis(500));
            loop {
                interval.tick().await;
                if service.ping(Request::new(rpc::Empty {})).await.is_err() {
                    break;
                }
            }
        }
    });

    let types = service
        .get_metric_types(Request::new(rpc::GetMetricTypesArg { config: None }))
        .await
        .map_err(|status| snap_plugin_rt::PluginError::fault(status.message()))?
        .into_inner();

    let (tx, rx) = tokio::sync::mpsc::channel(4);
    let subscribe = rpc::CollectArg {
        metrics_arg: Some(rpc::MetricsArg {
            metrics: types.metrics,
        }),
        max_collect_duration: 1,
        max_metrics_buffer: 6,
    };
    let _ = tx.send(Ok(subscribe)).await;

    let mut replies = service
        .stream_metrics(Request::new(ReceiverStream::new(rx)))
        .await
        .map_err(|status| snap_plugin_rt::PluginError::fault(status.message()))?
        .into_inner();

    let deadline = tokio::time::sleep(run_for);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            reply = replies.next() => match reply {
                Some(Ok(reply)) => {
                    let metrics = reply.metrics_reply.map(|r| r.metrics).unwrap_or_default();
                    for wire in metrics {
                        let metric = Metric::from_wire(wire);
                        println!("{} = {:?}", metric.ns(), metric.value());
                    }
                }
                Some(Err(status)) => {
                    info!("Stream failed: {}", status);
                    break;
                }
                None => break,
            },
        }
    }

    pinger.abort();
    service
        .kill(Request::new(rpc::KillArg {
            reason: "simulated host finished".to_string(),
        }))
        .await
        .map_err(|status| snap_plugin_rt::PluginError::fault(status.message()))?;

    std::future::pending().await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    initialize_tracing(TracingConfig::default());

    let args = CliArgs::parse();
    let mut config = match &args.config {
        Some(path) => RuntimeConfig::from_yaml_file(path)
            .with_context(|| format!("Loading config from {}", path.display()))?,
        None => RuntimeConfig::default(),
    };
    if let Some(address) = args.listen_address {
        config.listen_address = address;
    }

    let listen_address = config.listen_address.clone();
    let plugin = Arc::new(Rando::new(StreamSettings::new(config.stream.limits())));
    let runtime = PluginRuntime::new(Meta::new(PluginType::StreamCollector, "rando", 1), config);
    let service = runtime.stream_collector_service(plugin);

    let reason = runtime
        .run(&listen_address, simulate_host(service, args.run_for))
        .await?;

    if let Some(reason) = reason {
        info!("Plugin stopped: {}", reason);
    }
    Ok(())
}
