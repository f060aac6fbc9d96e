use crate::stream::{MetricSender, StreamSettings};
use async_trait::async_trait;
use snap_plugin_error::Result;
use snap_plugin_types::{Config, ConfigPolicy, Metric};

/// Operations shared by every plugin kind.
pub trait Plugin: Send + Sync + 'static {
    /// Configuration rules the host should enforce. Defaults to no rules.
    fn get_config_policy(&self) -> Result<ConfigPolicy> {
        Ok(ConfigPolicy::default())
    }

    /// Metrics this plugin can provide for the given configuration.
    fn get_metric_types(&self, config: Config) -> Result<Vec<Metric>>;
}

/// A plugin that returns metric values when asked.
#[async_trait]
pub trait Collector: Plugin {
    async fn collect_metrics(&self, metrics: Vec<Metric>) -> Result<Vec<Metric>>;
}

/// A plugin that pushes metrics over a long-lived stream.
///
/// The host first subscribes to a set of metrics, which are handed to
/// [`StreamCollector::get_metrics_in`]. The runtime then calls
/// [`StreamCollector::stream_metrics`] once; it keeps running for the life
/// of the stream and delivers values through the sender. Further
/// subscriptions arrive through `get_metrics_in` while it runs.
#[async_trait]
pub trait StreamCollector: Plugin {
    /// Buffer limits of this plugin. The runtime updates them when the
    /// host negotiates new values.
    fn stream_settings(&self) -> &StreamSettings;

    async fn get_metrics_in(&self, metrics: Vec<Metric>) -> Result<()>;

    /// Runs the collection. Returning ends the stream; an error is
    /// reported to the host.
    async fn stream_metrics(&self, sender: MetricSender) -> Result<()>;
}
