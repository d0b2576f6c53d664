//! Hourly weather poll loop with on-demand wake.
//!
//! One tokio task per handle, so the timer and wake triggers never overlap a
//! fetch. A wake that arrives mid-fetch is absorbed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use skycast_core::{Config, FetchError};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::provider::WeatherSource;
use crate::retry::{with_retry, RetryConfig};
use crate::types::WeatherSnapshot;

pub const DEFAULT_INTERVAL_SECS: u64 = 3600;

/// Published after every scheduled or woken fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum PollUpdate {
    Updated(WeatherSnapshot),
    /// Fetch failed (after the retry, if transient); show the entity as unavailable.
    Unavailable(FetchError),
}

pub type OnUpdate = Arc<dyn Fn(PollUpdate) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub interval: Duration,
    pub retry: RetryConfig,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            retry: RetryConfig::default(),
        }
    }
}

/// Fetches current conditions and holds the latest snapshot.
#[derive(Clone)]
pub struct WeatherPoller {
    source: Arc<dyn WeatherSource>,
    config: PollerConfig,
    latest: Arc<RwLock<Option<WeatherSnapshot>>>,
    /// Held for the duration of a fetch, shared by every loop started from this poller.
    fetching: Arc<Mutex<()>>,
}

impl std::fmt::Debug for WeatherPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherPoller")
            .field("config", &self.config)
            .field("latest", &self.latest.read())
            .finish_non_exhaustive()
    }
}

impl WeatherPoller {
    pub fn new(source: Arc<dyn WeatherSource>, config: PollerConfig) -> Self {
        Self {
            source,
            config,
            latest: Arc::new(RwLock::new(None)),
            fetching: Arc::new(Mutex::new(())),
        }
    }

    /// Last successful snapshot, if any.
    pub fn latest(&self) -> Option<WeatherSnapshot> {
        self.latest.read().clone()
    }

    /// Fetch once with the retry policy applied; replaces the held snapshot on success.
    ///
    /// Fetches never overlap: a call waits for any fetch already running, including
    /// one left over from a stopped loop.
    pub async fn fetch_once(&self, config: &Config) -> Result<WeatherSnapshot, FetchError> {
        let location = config.location.as_ref().ok_or(FetchError::NotConfigured)?;
        let _fetching = self.fetching.lock().await;
        let unit = config.unit();
        let source = &self.source;

        let conditions = with_retry(&self.config.retry, move || source.current(location, unit)).await?;

        let snapshot = WeatherSnapshot::from_conditions(&conditions, unit, Utc::now());
        *self.latest.write() = Some(snapshot.clone());

        tracing::info!(
            "Weather updated for {}: {} - {} ({})",
            location.name,
            snapshot.formatted_temperature(),
            snapshot.description,
            if snapshot.is_day { "day" } else { "night" }
        );
        Ok(snapshot)
    }

    /// Spawn the poll loop: fetch now, then every interval, plus on `wake()`.
    pub fn start(&self, config: Config, on_update: OnUpdate) -> PollerHandle {
        let cancel = CancellationToken::new();
        let wake = Arc::new(Notify::new());
        // The immediate first fetch counts as in flight from the start
        let in_flight = Arc::new(AtomicBool::new(true));

        let task = tokio::spawn(self.clone().run(
            config,
            on_update,
            cancel.clone(),
            wake.clone(),
            in_flight.clone(),
        ));

        tracing::info!("Weather poll loop started (every {:?})", self.config.interval);
        PollerHandle {
            cancel,
            wake,
            in_flight,
            task,
        }
    }

    /// Stop a running loop. See [`PollerHandle::stop`].
    pub fn stop(&self, handle: PollerHandle) {
        handle.stop();
    }

    async fn run(
        self,
        config: Config,
        on_update: OnUpdate,
        cancel: CancellationToken,
        wake: Arc<Notify>,
        in_flight: Arc<AtomicBool>,
    ) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
                _ = wake.notified() => {
                    tracing::debug!("Woken for on-demand fetch");
                    ticker.reset();
                }
            }

            in_flight.store(true, Ordering::SeqCst);
            let result = self.fetch_once(&config).await;
            // A wake that raced past the flag left a permit; it belongs to this fetch
            tokio::select! {
                biased;
                _ = wake.notified() => tracing::debug!("Dropped wake that arrived during fetch"),
                _ = std::future::ready(()) => {}
            }
            in_flight.store(false, Ordering::SeqCst);

            if cancel.is_cancelled() {
                tracing::debug!("Poll loop stopped during fetch, result not published");
                break;
            }

            match result {
                Ok(snapshot) => on_update(PollUpdate::Updated(snapshot)),
                Err(e) => {
                    tracing::warn!("Weather update failed: {}", e);
                    on_update(PollUpdate::Unavailable(e));
                }
            }
        }

        tracing::info!("Weather poll loop exited");
    }
}

/// Control handle for a running poll loop. Dropping it stops the loop.
#[derive(Debug)]
pub struct PollerHandle {
    cancel: CancellationToken,
    wake: Arc<Notify>,
    in_flight: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Request an immediate fetch (device woke, remote reconnected).
    ///
    /// Returns `false` when a fetch is already running and absorbs the request.
    pub fn wake(&self) -> bool {
        if self.in_flight.load(Ordering::SeqCst) {
            tracing::debug!("Fetch already in flight, wake absorbed");
            return false;
        }
        self.wake.notify_one();
        true
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// No further fetch will start; an in-flight fetch may finish but is not published.
    pub fn stop(self) {
        tracing::info!("Stopping weather poll loop");
        self.cancel.cancel();
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
