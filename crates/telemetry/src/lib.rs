//! Logging and in-process metrics for the Leadflow API access layer
//!
//! Logs go to stderr through `tracing-subscriber`, either as compact
//! human-readable lines or as JSON objects. Metrics are kept in a global
//! [`MetricsRegistry`]: monotonic counters, last-value gauges, and latency
//! windows holding the most recent [`LATENCY_WINDOW`] samples per name.

use leadflow_core::config::TelemetrySettings;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use uuid::Uuid;

/// Samples retained per latency window
pub const LATENCY_WINDOW: usize = 1024;

static METRICS: Lazy<MetricsRegistry> = Lazy::new(MetricsRegistry::new);

static SESSION_ID: Lazy<Uuid> = Lazy::new(Uuid::new_v4);

/// Install the global subscriber with default settings
pub fn init() -> anyhow::Result<()> {
    init_with_config(TelemetryConfig::default())
}

/// Install the global subscriber
///
/// `RUST_LOG` takes precedence over `config.log_level`. Fails if a global
/// subscriber is already installed.
pub fn init_with_config(config: TelemetryConfig) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(config.show_target);

    let registry = tracing_subscriber::registry().with(filter);
    if config.json {
        registry.with(layer.json()).try_init()?;
    } else {
        registry.with(layer.compact()).try_init()?;
    }

    tracing::debug!(
        session_id = %session_id(),
        version = env!("CARGO_PKG_VERSION"),
        "Telemetry initialized"
    );
    Ok(())
}

/// Identifier of this process, attached to exported metrics
pub fn session_id() -> Uuid {
    *SESSION_ID
}

/// Subscriber settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_level: String,
    /// Include the event target
    pub show_target: bool,
    /// Emit JSON instead of compact text
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self::from(&TelemetrySettings::default())
    }
}

impl From<&TelemetrySettings> for TelemetryConfig {
    fn from(settings: &TelemetrySettings) -> Self {
        Self {
            log_level: settings.log_level.clone(),
            show_target: settings.show_target,
            json: settings.json,
        }
    }
}

#[derive(Debug, Default)]
struct LatencyWindow {
    samples: VecDeque<Duration>,
    count: u64,
    total: Duration,
}

impl LatencyWindow {
    fn record(&mut self, sample: Duration) {
        if self.samples.len() == LATENCY_WINDOW {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        self.count += 1;
        self.total += sample;
    }

    fn summary(&self) -> LatencySummary {
        let mut sorted: Vec<Duration> = self.samples.iter().copied().collect();
        sorted.sort_unstable();

        let mean_ms = if self.count == 0 {
            0.0
        } else {
            millis(self.total) / self.count as f64
        };

        LatencySummary {
            count: self.count,
            mean_ms,
            p50_ms: nearest_rank(&sorted, 50),
            p95_ms: nearest_rank(&sorted, 95),
            max_ms: sorted.last().copied().map_or(0.0, millis),
        }
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn nearest_rank(sorted: &[Duration], pct: usize) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (pct * sorted.len()).div_ceil(100).max(1);
    millis(sorted[rank - 1])
}

#[derive(Debug, Default)]
struct Series {
    counters: BTreeMap<String, u64>,
    gauges: BTreeMap<String, u64>,
    latencies: BTreeMap<String, LatencyWindow>,
}

/// Counters, gauges, and latency windows keyed by metric name
#[derive(Debug)]
pub struct MetricsRegistry {
    series: Mutex<Series>,
    started: Instant,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            series: Mutex::new(Series::default()),
            started: Instant::now(),
        }
    }

    fn with_series<R>(&self, f: impl FnOnce(&mut Series) -> R) -> R {
        let mut series = self.series.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut series)
    }

    /// Add one to a counter
    pub fn increment(&self, name: &str) {
        self.increment_by(name, 1);
    }

    /// Add `value` to a counter
    pub fn increment_by(&self, name: &str, value: u64) {
        self.with_series(|s| {
            let counter = s.counters.entry(name.to_string()).or_default();
            *counter = counter.saturating_add(value);
        });
    }

    /// Current counter value, 0 if never incremented
    pub fn counter(&self, name: &str) -> u64 {
        self.with_series(|s| s.counters.get(name).copied().unwrap_or(0))
    }

    /// Overwrite a gauge
    pub fn set_gauge(&self, name: &str, value: u64) {
        self.with_series(|s| {
            s.gauges.insert(name.to_string(), value);
        });
    }

    /// Current gauge value, if it was ever set
    pub fn gauge(&self, name: &str) -> Option<u64> {
        self.with_series(|s| s.gauges.get(name).copied())
    }

    /// Add a sample to a latency window
    pub fn record_latency(&self, name: &str, elapsed: Duration) {
        self.with_series(|s| s.latencies.entry(name.to_string()).or_default().record(elapsed));
    }

    /// Summary of a latency window, if any sample was recorded
    pub fn latency(&self, name: &str) -> Option<LatencySummary> {
        self.with_series(|s| s.latencies.get(name).map(LatencyWindow::summary))
    }

    /// Point-in-time copy of every series
    pub fn snapshot(&self) -> MetricsSnapshot {
        let uptime_secs = self.started.elapsed().as_secs();
        self.with_series(|s| MetricsSnapshot {
            session_id: session_id(),
            uptime_secs,
            counters: s.counters.clone(),
            gauges: s.gauges.clone(),
            latencies: s
                .latencies
                .iter()
                .map(|(name, window)| (name.clone(), window.summary()))
                .collect(),
        })
    }

    /// [`Self::snapshot`] as JSON
    pub fn export_json(&self) -> serde_json::Value {
        serde_json::to_value(self.snapshot()).unwrap_or_default()
    }
}

/// Exported view of the registry
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub session_id: Uuid,
    pub uptime_secs: u64,
    pub counters: BTreeMap<String, u64>,
    pub gauges: BTreeMap<String, u64>,
    pub latencies: BTreeMap<String, LatencySummary>,
}

/// Latency statistics; percentiles cover the retained window only
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencySummary {
    /// Samples ever recorded
    pub count: u64,
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub max_ms: f64,
}

/// The process-wide registry
pub fn metrics() -> &'static MetricsRegistry {
    &METRICS
}

/// Records elapsed time into a latency window of the global registry
///
/// Recorded once: on [`Timer::stop`], or on drop if never stopped.
#[derive(Debug)]
pub struct Timer {
    name: &'static str,
    start: Instant,
    recorded: bool,
}

impl Timer {
    /// Start timing
    pub fn start(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
            recorded: false,
        }
    }

    /// Stop timing and record the sample
    pub fn stop(mut self) -> Duration {
        self.finish()
    }

    fn finish(&mut self) -> Duration {
        let elapsed = self.start.elapsed();
        if !self.recorded {
            self.recorded = true;
            metrics().record_latency(self.name, elapsed);
            tracing::trace!(metric = self.name, elapsed_ms = elapsed.as_millis(), "Timer stopped");
        }
        elapsed
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.finish();
    }
}
