use crate::aggregate::aggregate;
use crate::error::AppError;
use crate::gauges::{CostGauge, CostGauges};
use crate::models::{CycleReport, WindowKind};
use crate::source::{CostSource, FetchError};
use crate::telemetry::RefreshMetrics;
use crate::window::compute_range;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    #[default]
    FailFast,
    Isolate,
}

pub struct RefreshJob {
    pub kind: WindowKind,
    pub gauge: CostGauge,
}

pub struct CostRefresher {
    source: Arc<dyn CostSource>,
    metric: String,
    jobs: Vec<RefreshJob>,
    policy: FailurePolicy,
    metrics: Option<RefreshMetrics>,
}

impl CostRefresher {
    pub fn new(
        source: Arc<dyn CostSource>,
        metric: impl Into<String>,
        gauges: &CostGauges,
        policy: FailurePolicy,
    ) -> Self {
        let jobs = gauges
            .iter()
            .map(|gauge| RefreshJob {
                kind: gauge.kind(),
                gauge: gauge.clone(),
            })
            .collect();
        Self {
            source,
            metric: metric.into(),
            jobs,
            policy,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: RefreshMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    async fn refresh_window(&self, job: &RefreshJob, today: NaiveDate) -> Result<usize, FetchError> {
        let range = compute_range(job.kind, today);
        let granularity = job.kind.granularity();
        info!(
            window = %job.kind,
            start = %range.start_str(),
            end = %range.end_str(),
            granularity = granularity.as_label(),
            source = self.source.name(),
            "fetching cost data"
        );

        let groups = self.source.fetch(&range, granularity).await?;
        info!(window = %job.kind, groups = groups.len(), "received cost groups");

        let snapshot = aggregate(&groups, &self.metric);
        let updated = snapshot.len();
        job.gauge.replace(snapshot);
        info!(window = %job.kind, updated, %range, "updated cost metrics");
        Ok(updated)
    }

    /// Refreshes every window in order. A fetch failure never touches the
    /// failed window's gauge; under [`FailurePolicy::FailFast`] it also ends
    /// the cycle and is returned.
    pub async fn run_cycle(&self, today: NaiveDate) -> Result<CycleReport, AppError> {
        let mut report = CycleReport::default();
        for job in &self.jobs {
            match self.refresh_window(job, today).await {
                Ok(updated) => {
                    if let Some(metrics) = &self.metrics {
                        metrics.record_success(job.kind, Utc::now().timestamp());
                    }
                    report.updated.push((job.kind, updated));
                }
                Err(source) => {
                    if let Some(metrics) = &self.metrics {
                        metrics.record_failure(job.kind);
                    }
                    match self.policy {
                        FailurePolicy::FailFast => {
                            return Err(AppError::Refresh {
                                window: job.kind,
                                source,
                            });
                        }
                        FailurePolicy::Isolate => {
                            warn!(window = %job.kind, error = %source, "cost refresh failed, continuing");
                            report.failed.push(job.kind);
                        }
                    }
                }
            }
        }
        Ok(report)
    }
}
