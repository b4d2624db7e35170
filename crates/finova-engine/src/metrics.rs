//! Prometheus metrics for the engine

use finova_common::{FinovaError, Result};
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

pub struct EngineMetrics {
    pub activities_recorded: IntCounter,
    pub duplicate_events: IntCounter,
    pub sessions_started: IntCounter,
    pub sessions_stopped: IntCounterVec,
    pub active_sessions: IntGauge,
    pub rate_queries: IntCounter,
    pub ledger_append_failures: IntCounter,
    pub rate_limited: IntCounter,
    pub xp_awarded: Histogram,
    pub fin_mined: Histogram,
}

impl EngineMetrics {
    pub fn new() -> Result<Self> {
        Ok(Self {
            activities_recorded: IntCounter::new(
                "finova_activities_recorded_total",
                "Activities that produced an XP award",
            )
            .map_err(metric_err)?,
            duplicate_events: IntCounter::new(
                "finova_duplicate_events_total",
                "Replayed event ids answered from the ledger",
            )
            .map_err(metric_err)?,
            sessions_started: IntCounter::new(
                "finova_mining_sessions_started_total",
                "Mining sessions started",
            )
            .map_err(metric_err)?,
            sessions_stopped: IntCounterVec::new(
                Opts::new("finova_mining_sessions_stopped_total", "Mining sessions closed"),
                &["reason"],
            )
            .map_err(metric_err)?,
            active_sessions: IntGauge::new(
                "finova_mining_sessions_active",
                "Currently active mining sessions",
            )
            .map_err(metric_err)?,
            rate_queries: IntCounter::new("finova_rate_queries_total", "Mining rate queries")
                .map_err(metric_err)?,
            ledger_append_failures: IntCounter::new(
                "finova_ledger_append_failures_total",
                "Ledger appends rejected by the store",
            )
            .map_err(metric_err)?,
            rate_limited: IntCounter::new(
                "finova_rate_limited_total",
                "Write operations rejected by the per-user rate limit",
            )
            .map_err(metric_err)?,
            xp_awarded: Histogram::with_opts(
                HistogramOpts::new("finova_xp_awarded", "XP per recorded activity")
                    .buckets(vec![0.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2000.0]),
            )
            .map_err(metric_err)?,
            fin_mined: Histogram::with_opts(
                HistogramOpts::new("finova_fin_mined", "FIN credited per closed session")
                    .buckets(vec![0.0, 1.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0]),
            )
            .map_err(metric_err)?,
        })
    }

    pub fn register(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.activities_recorded.clone())).map_err(metric_err)?;
        registry.register(Box::new(self.duplicate_events.clone())).map_err(metric_err)?;
        registry.register(Box::new(self.sessions_started.clone())).map_err(metric_err)?;
        registry.register(Box::new(self.sessions_stopped.clone())).map_err(metric_err)?;
        registry.register(Box::new(self.active_sessions.clone())).map_err(metric_err)?;
        registry.register(Box::new(self.rate_queries.clone())).map_err(metric_err)?;
        registry.register(Box::new(self.ledger_append_failures.clone())).map_err(metric_err)?;
        registry.register(Box::new(self.rate_limited.clone())).map_err(metric_err)?;
        registry.register(Box::new(self.xp_awarded.clone())).map_err(metric_err)?;
        registry.register(Box::new(self.fin_mined.clone())).map_err(metric_err)?;
        Ok(())
    }
}

/// Text exposition of everything in `registry`
pub fn render(registry: &Registry) -> Result<String> {
    let mut buf = Vec::new();
    TextEncoder::new()
        .encode(&registry.gather(), &mut buf)
        .map_err(metric_err)?;
    String::from_utf8(buf).map_err(|e| FinovaError::Internal(e.to_string()))
}

fn metric_err(err: prometheus::Error) -> FinovaError {
    FinovaError::Internal(format!("metrics: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_render() {
        let registry = Registry::new();
        let metrics = EngineMetrics::new().unwrap();
        metrics.register(&registry).unwrap();

        metrics.activities_recorded.inc();
        metrics.sessions_stopped.with_label_values(&["timeout"]).inc();

        let text = render(&registry).unwrap();
        assert!(text.contains("finova_activities_recorded_total 1"));
        assert!(text.contains("reason=\"timeout\""));
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        let metrics = EngineMetrics::new().unwrap();
        metrics.register(&registry).unwrap();
        assert!(metrics.register(&registry).is_err());
    }
}
