use crate::config::RuntimeConfig;
use crate::liveness::{KillReason, KillSignal, LivenessMonitor};
use crate::plugin::{Collector, StreamCollector};
use crate::preamble::{Meta, emit_preamble};
use crate::service::{CollectorService, StreamCollectorService};
use snap_plugin_error::Result;
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use tracing::{error, info};

/// Owns the liveness monitor of a plugin process and runs it until the
/// host lets go of it.
pub struct PluginRuntime {
    meta: Meta,
    config: RuntimeConfig,
    monitor: Arc<LivenessMonitor>,
}

impl PluginRuntime {
    pub fn new(meta: Meta, config: RuntimeConfig) -> Self {
        let monitor = Arc::new(LivenessMonitor::new(config.ping));
        Self {
            meta,
            config,
            monitor,
        }
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn monitor(&self) -> Arc<LivenessMonitor> {
        self.monitor.clone()
    }

    pub fn kill_signal(&self) -> KillSignal {
        self.monitor.kill_signal()
    }

    pub fn collector_service<P: Collector>(&self, plugin: Arc<P>) -> CollectorService<P> {
        CollectorService::new(plugin, self.monitor.clone())
    }

    pub fn stream_collector_service<P: StreamCollector>(
        &self,
        plugin: Arc<P>,
    ) -> StreamCollectorService<P> {
        StreamCollectorService::new(plugin, self.monitor.clone())
            .with_flush_failure_policy(self.config.stream.flush_failure_policy())
    }

    /// Writes the preamble to stdout and drives `serve` until it completes
    /// or the plugin is killed (Kill request, heartbeat timeout or Ctrl-C).
    ///
    /// Returns the kill reason, or `None` if `serve` finished on its own.
    pub async fn run<F>(self, listen_address: &str, serve: F) -> Result<Option<KillReason>>
    where
        F: Future<Output = Result<()>>,
    {
        self.run_with_writer(listen_address, std::io::stdout(), serve)
            .await
    }

    async fn run_with_writer<W, F>(
        self,
        listen_address: &str,
        writer: W,
        serve: F,
    ) -> Result<Option<KillReason>>
    where
        W: Write,
        F: Future<Output = Result<()>>,
    {
        info!(
            "Starting plugin runtime: {} v{}",
            self.meta.name, self.meta.version
        );

        emit_preamble(&self.meta, listen_address, writer)?;
        self.handle_ctrl_c();

        let kill = self.monitor.kill_signal();
        tokio::select! {
            _ = kill.wait() => {
                let reason = kill.reason().cloned();
                if let Some(reason) = &reason {
                    info!("Shutting down: {}", reason);
                }
                Ok(reason)
            }
            result = serve => {
                result?;
                info!("Transport stopped, shutting down");
                Ok(None)
            }
        }
    }

    // Setup Ctrl-C signal handler
    fn handle_ctrl_c(&self) {
        let kill = self.monitor.kill_signal();

        tokio::spawn(async move {
            tokio::select! {
                result = tokio::signal::ctrl_c() => match result {
                    Ok(()) => {
                        info!("Received Ctrl-C signal, initiating graceful shutdown");
                        kill.fire(KillReason::Interrupted);
                    }
                    Err(e) => {
                        error!("Failed to listen for Ctrl-C signal: {}", e);
                    }
                },
                _ = kill.wait() => {}
            }
        });
    }
}
