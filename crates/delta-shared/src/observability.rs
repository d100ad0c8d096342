//! Observability features including logging and metrics

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::{info, Level};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use crate::config::{LoggingConfig, MetricsConfig, ObservabilityConfig};

/// Set once the global subscriber and recorder are installed
static INITIALIZED: OnceCell<()> = OnceCell::new();

/// Observability system for centralized logging and metrics
pub struct ObservabilitySystem;

impl ObservabilitySystem {
    /// Initialize the observability system. Must be called from within a tokio
    /// runtime when metrics are enabled.
    pub fn init(config: &ObservabilityConfig) -> anyhow::Result<()> {
        if INITIALIZED.get().is_some() {
            anyhow::bail!("Observability system already initialized");
        }

        Self::init_logging(&config.logging)?;

        if config.metrics.enabled {
            Self::init_metrics(&config.metrics)?;
        }

        INITIALIZED
            .set(())
            .map_err(|_| anyhow::anyhow!("Observability system already initialized"))?;

        info!("Observability system initialized");
        Ok(())
    }

    /// Initialize structured logging
    fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
        let level = match config.level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };

        let env_filter = EnvFilter::builder()
            .with_default_directive(level.into())
            .from_env_lossy();

        // stdout carries replayed events, so logs go to stderr
        let registry = tracing_subscriber::registry().with(env_filter);

        match config.format.to_lowercase().as_str() {
            "json" => {
                let json_layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_span_events(FmtSpan::CLOSE);
                registry.with(json_layer).try_init()?;
            }
            _ => {
                let pretty_layer = tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr)
                    .with_span_events(FmtSpan::CLOSE);
                registry.with(pretty_layer).try_init()?;
            }
        }

        Ok(())
    }

    /// Install the Prometheus recorder and its scrape endpoint
    fn init_metrics(config: &MetricsConfig) -> anyhow::Result<()> {
        let bind_addr: SocketAddr = config.bind_address.parse()?;

        PrometheusBuilder::new()
            .with_http_listener(bind_addr)
            .install()?;

        info!("Prometheus metrics initialized on {}", bind_addr);
        Ok(())
    }
}

/// Change event metrics
pub struct EventMetrics;

impl EventMetrics {
    /// Record a raw record handed to the consumer
    pub fn record_received() {
        counter!("delta_records_received_total").increment(1);
    }

    /// Record a raw record that produced no events
    pub fn record_skipped(reason: &'static str) {
        counter!("delta_records_skipped_total", "reason" => reason).increment(1);
    }

    /// Record an emitted schema change event
    pub fn ddl_emitted(operation: &'static str) {
        counter!("delta_ddl_events_total", "operation" => operation).increment(1);
    }

    /// Record an emitted row change event
    pub fn dml_emitted(operation: &'static str, table: &str) {
        counter!("delta_dml_events_total",
                "operation" => operation,
                "table" => table.to_string())
            .increment(1);
    }

    /// Record an emission interrupted by a stop request
    pub fn emit_interrupted() {
        counter!("delta_emit_interrupted_total").increment(1);
    }
}

/// Performance timer helper, records into a histogram on drop
pub struct PerfTimer {
    start: Instant,
    metric_name: &'static str,
    labels: Vec<(&'static str, String)>,
}

impl PerfTimer {
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
            labels: Vec::new(),
        }
    }

    pub fn with_label(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.labels.push((key, value.into()));
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for PerfTimer {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            let labels: Vec<metrics::Label> = self
                .labels
                .iter()
                .map(|(key, value)| metrics::Label::new(*key, value.clone()))
                .collect();
            histogram!(self.metric_name, labels).record(self.start.elapsed().as_secs_f64());
        }
    }
}

/// Health check status
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub enum HealthStatus {
    Healthy,
    Degraded { reason: String },
    Unhealthy { reason: String },
}

/// Component health check trait
pub trait HealthCheck: Send + Sync {
    fn name(&self) -> &str;
    fn check(&self) -> HealthStatus;
}

impl<T: HealthCheck + ?Sized> HealthCheck for std::sync::Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn check(&self) -> HealthStatus {
        (**self).check()
    }
}

/// System health aggregator
pub struct HealthAggregator {
    checks: Vec<Box<dyn HealthCheck>>,
}

impl HealthAggregator {
    pub fn new() -> Self {
        Self { checks: Vec::new() }
    }

    pub fn add_check(mut self, check: Box<dyn HealthCheck>) -> Self {
        self.checks.push(check);
        self
    }

    pub fn check_all(&self) -> Vec<(String, HealthStatus)> {
        self.checks
            .iter()
            .map(|check| (check.name().to_string(), check.check()))
            .collect()
    }

    pub fn overall_status(&self) -> HealthStatus {
        let results = self.check_all();

        let unhealthy: Vec<_> = results
            .iter()
            .filter_map(|(name, status)| match status {
                HealthStatus::Unhealthy { reason } => Some(format!("{}: {}", name, reason)),
                _ => None,
            })
            .collect();

        if !unhealthy.is_empty() {
            return HealthStatus::Unhealthy {
                reason: unhealthy.join(", "),
            };
        }

        let degraded: Vec<_> = results
            .iter()
            .filter_map(|(name, status)| match status {
                HealthStatus::Degraded { reason } => Some(format!("{}: {}", name, reason)),
                _ => None,
            })
            .collect();

        if !degraded.is_empty() {
            return HealthStatus::Degraded {
                reason: degraded.join(", "),
            };
        }

        HealthStatus::Healthy
    }
}

impl Default for HealthAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestHealthCheck {
        name: String,
        status: HealthStatus,
    }

    impl HealthCheck for TestHealthCheck {
        fn name(&self) -> &str {
            &self.name
        }

        fn check(&self) -> HealthStatus {
            self.status.clone()
        }
    }

    #[test]
    fn test_health_aggregator() {
        let healthy_check = TestHealthCheck {
            name: "source".to_string(),
            status: HealthStatus::Healthy,
        };

        let unhealthy_check = TestHealthCheck {
            name: "emitter".to_string(),
            status: HealthStatus::Unhealthy {
                reason: "queue closed".to_string(),
            },
        };

        let aggregator = HealthAggregator::new()
            .add_check(Box::new(healthy_check))
            .add_check(Box::new(unhealthy_check));

        match aggregator.overall_status() {
            HealthStatus::Unhealthy { reason } => {
                assert!(reason.contains("emitter"));
                assert!(reason.contains("queue closed"));
            }
            _ => panic!("Expected unhealthy status"),
        }
    }

    #[test]
    fn test_degraded_wins_over_healthy() {
        let aggregator = HealthAggregator::default()
            .add_check(Box::new(TestHealthCheck {
                name: "source".to_string(),
                status: HealthStatus::Degraded {
                    reason: "slow".to_string(),
                },
            }))
            .add_check(Box::new(TestHealthCheck {
                name: "emitter".to_string(),
                status: HealthStatus::Healthy,
            }));

        assert!(matches!(aggregator.overall_status(), HealthStatus::Degraded { .. }));
    }

    #[test]
    fn test_perf_timer() {
        let timer = PerfTimer::new("test_metric").with_label("table", "dbo.customers");

        assert_eq!(timer.metric_name, "test_metric");
        assert_eq!(timer.labels.len(), 1);

        // recorded on drop, no recorder installed
        drop(timer);
    }
}
