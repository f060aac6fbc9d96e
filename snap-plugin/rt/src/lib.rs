//! Runtime for Snap plugins.
//!
//! Hosts ping a plugin to keep it alive and kill it when done
//! ([`liveness`]). Request/response collectors answer `CollectMetrics`;
//! streaming collectors push metrics over a long-lived stream whose
//! batching is controlled by the buffer limits in [`stream`].
//!
//! A plugin implements [`Plugin`] plus [`Collector`] or [`StreamCollector`]
//! and is wrapped in the matching service from [`service`]. The
//! [`PluginRuntime`] writes the preamble, owns the liveness monitor and
//! runs until the plugin is killed.

pub mod config;
pub mod liveness;
pub mod preamble;
pub mod service;
pub mod stream;
pub mod tracing_config;

mod plugin;
mod runtime;
mod status;

pub use config::{RuntimeConfig, StreamConfig};
pub use liveness::{KillReason, KillSignal, LivenessMonitor, LivenessState, PingSettings};
pub use plugin::{Collector, Plugin, StreamCollector};
pub use preamble::{Meta, PluginType, RoutingStrategy, RpcType, emit_preamble};
pub use runtime::PluginRuntime;
pub use service::{CollectReplyStream, CollectorService, PluginService, StreamCollectorService};
pub use stream::{
    BufferLimits, FlushFailurePolicy, FramedReplySink, MetricSender, ReplySink, StreamSettings,
};

pub use snap_plugin_error::{PluginError, Result};
pub use snap_plugin_types as types;
