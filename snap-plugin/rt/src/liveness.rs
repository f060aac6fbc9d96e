//! Ping/Kill liveness handling.
//!
//! The host pings the plugin periodically. The first ping starts a watchdog
//! task which checks the time since the most recent ping every `timeout`
//! (the first check happens after half a timeout). Each check where no ping
//! arrived within `timeout` counts as a miss; a check that sees a fresh ping
//! resets the count. Once `limit` consecutive misses accumulate the kill
//! signal fires. An explicit Kill from the host fires the same signal.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Why the plugin was asked to terminate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KillReason {
    /// The host sent a Kill request.
    Requested(String),
    /// The host stopped pinging.
    PingTimeout { missed: u32 },
    /// The process received Ctrl-C.
    Interrupted,
}

impl std::fmt::Display for KillReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KillReason::Requested(reason) => write!(f, "kill requested: {}", reason),
            KillReason::PingTimeout { missed } => {
                write!(f, "heartbeat timeout after {} missed pings", missed)
            }
            KillReason::Interrupted => write!(f, "interrupted"),
        }
    }
}

#[derive(Debug, Default)]
struct KillState {
    reason: OnceLock<KillReason>,
    token: CancellationToken,
}

/// One-shot termination signal shared between the services and the runner.
///
/// The first call to [`KillSignal::fire`] wins; later calls are ignored.
#[derive(Debug, Clone, Default)]
pub struct KillSignal {
    state: Arc<KillState>,
}

impl KillSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the signal. Returns `false` if it had already fired.
    pub fn fire(&self, reason: KillReason) -> bool {
        if self.state.reason.set(reason).is_err() {
            return false;
        }

        self.state.token.cancel();
        true
    }

    pub fn is_fired(&self) -> bool {
        self.state.token.is_cancelled()
    }

    pub fn reason(&self) -> Option<&KillReason> {
        self.state.reason.get()
    }

    /// Resolves once the signal has fired.
    pub async fn wait(&self) {
        self.state.token.cancelled().await
    }

    /// Token cancelled when the signal fires, suitable for graceful
    /// shutdown hooks of a transport.
    pub fn token(&self) -> CancellationToken {
        self.state.token.clone()
    }
}

/// Heartbeat parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PingSettings {
    /// Maximum time between two pings before a check counts as a miss
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Consecutive misses that terminate the plugin
    pub limit: u32,
}

impl Default for PingSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(1500),
            limit: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessState {
    /// No ping received yet
    Idle,
    /// The watchdog is running
    Watching,
    /// The kill signal fired
    Killed,
}

/// Tracks pings from the host and fires the kill signal when they stop.
pub struct LivenessMonitor {
    settings: PingSettings,
    last_ping: Arc<Mutex<Instant>>,
    watchdog: Mutex<Option<JoinHandle<()>>>,
    kill: KillSignal,
}

impl LivenessMonitor {
    pub fn new(settings: PingSettings) -> Self {
        Self::with_kill_signal(settings, KillSignal::new())
    }

    pub fn with_kill_signal(settings: PingSettings, kill: KillSignal) -> Self {
        Self {
            settings,
            last_ping: Arc::new(Mutex::new(Instant::now())),
            watchdog: Mutex::new(None),
            kill,
        }
    }

    pub fn settings(&self) -> PingSettings {
        self.settings
    }

    pub fn kill_signal(&self) -> KillSignal {
        self.kill.clone()
    }

    /// Records a ping. The first ping (and any ping arriving after the
    /// watchdog exited) starts the watchdog.
    ///
    /// Must be called from within a tokio runtime.
    pub fn ping(&self) {
        *self.last_ping.lock() = Instant::now();
        info!("Heartbeat received");

        if self.kill.is_fired() {
            return;
        }

        let mut watchdog = self.watchdog.lock();
        if watchdog.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        *watchdog = Some(tokio::spawn(watch(
            self.settings,
            self.last_ping.clone(),
            self.kill.clone(),
        )));
    }

    /// Handles a Kill request. Returns `false` if the plugin was already
    /// terminating.
    pub fn kill(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        info!("Kill requested: {}", reason);
        self.kill.fire(KillReason::Requested(reason))
    }

    pub fn state(&self) -> LivenessState {
        if self.kill.is_fired() {
            return LivenessState::Killed;
        }

        match self.watchdog.lock().as_ref() {
            Some(handle) if !handle.is_finished() => LivenessState::Watching,
            _ => LivenessState::Idle,
        }
    }

    pub fn last_ping(&self) -> Instant {
        *self.last_ping.lock()
    }
}

impl Drop for LivenessMonitor {
    fn drop(&mut self) {
        if let Some(handle) = self.watchdog.get_mut().take() {
            handle.abort();
        }
    }
}

async fn watch(settings: PingSettings, last_ping: Arc<Mutex<Instant>>, kill: KillSignal) {
    *last_ping.lock() = Instant::now();
    info!(
        "Heartbeat watchdog started (timeout {:?}, limit {})",
        settings.timeout, settings.limit
    );

    let mut missed: u32 = 0;
    let mut period = settings.timeout / 2;

    loop {
        tokio::select! {
            _ = kill.wait() => {
                debug!("Heartbeat watchdog stopped");
                return;
            }
            _ = tokio::time::sleep(period) => {}
        }
        period = settings.timeout;

        let elapsed = last_ping.lock().elapsed();
        if elapsed >= settings.timeout {
            missed += 1;
            warn!(missed, limit = settings.limit, elapsed = ?elapsed, "Heartbeat timeout");

            if missed >= settings.limit {
                error!(missed, "Heartbeat timeout expired, terminating");
                kill.fire(KillReason::PingTimeout { missed });
                return;
            }
        } else if missed > 0 {
            info!("Heartbeat timeout reset");
            missed = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    fn settings(timeout_ms: u64, limit: u32) -> PingSettings {
        PingSettings {
            timeout: Duration::from_millis(timeout_ms),
            limit,
        }
    }

    #[test]
    fn kill_signal_fires_once() {
        let kill = KillSignal::new();
        assert!(!kill.is_fired());
        assert!(kill.reason().is_none());

        assert!(kill.fire(KillReason::Requested("first".into())));
        assert!(!kill.fire(KillReason::Interrupted));

        assert!(kill.is_fired());
        assert_eq!(kill.reason(), Some(&KillReason::Requested("first".into())));
    }

    #[tokio::test]
    async fn kill_signal_wakes_waiters() {
        let kill = KillSignal::new();
        let waiter = tokio::spawn({
            let kill = kill.clone();
            async move {
                kill.wait().await;
                kill.reason().cloned()
            }
        });

        kill.fire(KillReason::Interrupted);
        assert_eq!(waiter.await.unwrap(), Some(KillReason::Interrupted));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_until_first_ping() {
        let monitor = LivenessMonitor::new(settings(1000, 3));
        assert_eq!(monitor.state(), LivenessState::Idle);

        // Without a ping there is no watchdog and nothing can expire.
        sleep(Duration::from_secs(60)).await;
        assert_eq!(monitor.state(), LivenessState::Idle);
        assert!(!monitor.kill_signal().is_fired());

        monitor.ping();
        assert_eq!(monitor.state(), LivenessState::Watching);
    }

    #[tokio::test(start_paused = true)]
    async fn regular_pings_keep_plugin_alive() {
        let monitor = LivenessMonitor::new(settings(1500, 3));

        for _ in 0..20 {
            monitor.ping();
            sleep(Duration::from_secs(1)).await;
        }

        assert!(!monitor.kill_signal().is_fired());
        assert_eq!(monitor.state(), LivenessState::Watching);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_pings_kill_after_limit() {
        let monitor = LivenessMonitor::new(settings(1000, 3));
        let kill = monitor.kill_signal();

        // Checks run at 0.5s, 1.5s, 2.5s and 3.5s; misses start at 1.5s.
        monitor.ping();
        sleep(Duration::from_millis(3400)).await;
        assert!(!kill.is_fired());

        sleep(Duration::from_millis(200)).await;
        assert!(kill.is_fired());
        assert_eq!(kill.reason(), Some(&KillReason::PingTimeout { missed: 3 }));
        assert_eq!(monitor.state(), LivenessState::Killed);
    }

    #[tokio::test(start_paused = true)]
    async fn late_ping_resets_missed_count() {
        let monitor = LivenessMonitor::new(settings(1000, 3));
        let kill = monitor.kill_signal();

        monitor.ping();
        // One miss at 1.5s.
        sleep(Duration::from_millis(2000)).await;
        monitor.ping();

        // Reset at 2.5s, then misses at 3.5s, 4.5s and 5.5s.
        sleep(Duration::from_millis(3400)).await;
        assert!(!kill.is_fired());

        sleep(Duration::from_millis(200)).await;
        assert_eq!(kill.reason(), Some(&KillReason::PingTimeout { missed: 3 }));
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_kill_stops_watchdog() {
        let monitor = LivenessMonitor::new(settings(1000, 3));
        monitor.ping();

        assert!(monitor.kill("host shutdown"));
        assert!(!monitor.kill("again"));

        sleep(Duration::from_secs(10)).await;
        let kill = monitor.kill_signal();
        assert_eq!(
            kill.reason(),
            Some(&KillReason::Requested("host shutdown".into()))
        );

        // Pings after the kill do not restart the watchdog.
        monitor.ping();
        assert_eq!(monitor.state(), LivenessState::Killed);
    }

    #[test]
    fn ping_settings_defaults() {
        let settings = PingSettings::default();
        assert_eq!(settings.timeout, Duration::from_millis(1500));
        assert_eq!(settings.limit, 3);
    }
}
