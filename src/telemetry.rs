use crate::error::AppError;
use crate::models::WindowKind;
use prometheus::{GaugeVec, IntCounterVec, Opts, Registry};

#[derive(Clone)]
pub struct RefreshMetrics {
    pub refresh_failures: IntCounterVec,
    pub last_success: GaugeVec,
}

impl RefreshMetrics {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            refresh_failures: IntCounterVec::new(
                Opts::new(
                    "cost_exporter_refresh_failures_total",
                    "Cost refreshes that failed at the fetch step",
                ),
                &["window"],
            )?,
            last_success: GaugeVec::new(
                Opts::new(
                    "cost_exporter_last_success_timestamp_seconds",
                    "Unix time of the last successful refresh",
                ),
                &["window"],
            )?,
        })
    }

    pub fn register(&self, registry: &Registry) -> Result<(), AppError> {
        registry.register(Box::new(self.refresh_failures.clone()))?;
        registry.register(Box::new(self.last_success.clone()))?;
        Ok(())
    }

    pub fn record_success(&self, window: WindowKind, unix_secs: i64) {
        self.last_success
            .with_label_values(&[window.as_label()])
            .set(unix_secs as f64);
    }

    pub fn record_failure(&self, window: WindowKind) {
        self.refresh_failures
            .with_label_values(&[window.as_label()])
            .inc();
    }
}
