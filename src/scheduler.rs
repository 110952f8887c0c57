use crate::service::CostRefresher;
use crate::window::ReferenceZone;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct Scheduler {
    refresher: Arc<CostRefresher>,
    interval: Duration,
    zone: ReferenceZone,
}

impl Scheduler {
    pub fn new(refresher: Arc<CostRefresher>, interval: Duration, zone: ReferenceZone) -> Self {
        Self {
            refresher,
            interval,
            zone,
        }
    }

    pub async fn startup(&self) {
        info!("updating cost metrics on startup");
        match self.refresher.run_cycle(self.zone.today()).await {
            Ok(report) if report.is_complete() => info!(
                windows = report.updated.len(),
                "startup refresh complete"
            ),
            Ok(report) => warn!(failed = ?report.failed, "startup refresh incomplete"),
            Err(e) => warn!(error = %e, "failed to update cost metrics on startup"),
        }
    }

    /// Runs a cycle every interval until `cancel` fires. The first tick is one
    /// full interval out; [`Scheduler::startup`] covers time zero.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = self.interval.as_secs(), "cost refresh loop started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if cancel.is_cancelled() {
                break;
            }

            match self.refresher.run_cycle(self.zone.today()).await {
                Ok(report) if report.is_complete() => {}
                Ok(report) => warn!(failed = ?report.failed, "cost refresh incomplete"),
                Err(e) => error!(error = %e, "error updating cost metrics"),
            }
        }

        info!("cost refresh loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::DEFAULT_COST_METRIC;
    use crate::gauges::CostGauges;
    use crate::models::{CostGroup, Granularity, TimeRange, WindowKind};
    use crate::service::tests::{group, ScriptedSource};
    use crate::service::FailurePolicy;
    use crate::source::{CostSource, FetchError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    #[derive(Default)]
    struct GatedSource {
        started: Notify,
        release: Notify,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CostSource for GatedSource {
        fn name(&self) -> &'static str {
            "gated"
        }

        async fn fetch(
            &self,
            _range: &TimeRange,
            _granularity: Granularity,
        ) -> Result<Vec<CostGroup>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.started.notify_one();
            self.release.notified().await;
            Ok(vec![group("AmazonEC2", "us-east-1", "4.5")])
        }
    }

    fn scheduler(source: Arc<ScriptedSource>, gauges: &CostGauges) -> Scheduler {
        let refresher = CostRefresher::new(source, DEFAULT_COST_METRIC, gauges, FailurePolicy::FailFast);
        Scheduler::new(Arc::new(refresher), Duration::from_secs(60), ReferenceZone::Utc)
    }

    #[tokio::test]
    async fn startup_failure_is_not_fatal_and_keeps_gauges_empty() {
        let source = Arc::new(ScriptedSource::default());
        let gauges = CostGauges::new(&[WindowKind::Today]).expect("gauges");
        source.push_err("no credentials");

        scheduler(source.clone(), &gauges).startup().await;

        assert_eq!(source.call_count(), 1);
        assert!(gauges.get(WindowKind::Today).expect("gauge").snapshot().is_empty());
    }

    #[tokio::test]
    async fn startup_populates_gauges() {
        let source = Arc::new(ScriptedSource::default());
        let gauges = CostGauges::new(&[WindowKind::Today]).expect("gauges");
        source.push_ok(vec![group("AmazonEC2", "us-east-1", "12.3456")]);

        scheduler(source, &gauges).startup().await;

        assert_eq!(gauges.get(WindowKind::Today).expect("gauge").snapshot().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_ticks_on_interval_until_cancelled() {
        let source = Arc::new(ScriptedSource::default());
        let gauges = CostGauges::new(&[WindowKind::Today]).expect("gauges");
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(scheduler(source.clone(), &gauges).run(cancel.clone()));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(source.call_count(), 0);

        tokio::time::sleep(Duration::from_secs(100)).await;
        assert_eq!(source.call_count(), 2);

        cancel.cancel();
        handle.await.expect("scheduler task");
        assert_eq!(source.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_tick_is_retried_on_next_tick() {
        let source = Arc::new(ScriptedSource::default());
        let gauges = CostGauges::new(&[WindowKind::Today, WindowKind::MonthToDate]).expect("gauges");
        source.push_err("throttled");
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(scheduler(source.clone(), &gauges).run(cancel.clone()));

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(source.call_count(), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.call_count(), 3);

        cancel.cancel();
        handle.await.expect("scheduler task");
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_fetch_completes_after_cancel_and_nothing_follows() {
        let source = Arc::new(GatedSource::default());
        let gauges = CostGauges::new(&[WindowKind::Today]).expect("gauges");
        let refresher =
            CostRefresher::new(source.clone(), DEFAULT_COST_METRIC, &gauges, FailurePolicy::FailFast);
        let scheduler =
            Scheduler::new(Arc::new(refresher), Duration::from_secs(60), ReferenceZone::Utc);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(scheduler.run(cancel.clone()));

        source.started.notified().await;
        cancel.cancel();
        source.release.notify_one();
        handle.await.expect("scheduler task");

        let gauge = gauges.get(WindowKind::Today).expect("gauge");
        assert_eq!(gauge.snapshot().len(), 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_first_tick_runs_nothing() {
        let source = Arc::new(ScriptedSource::default());
        let gauges = CostGauges::new(&[WindowKind::Today]).expect("gauges");
        let cancel = CancellationToken::new();
        cancel.cancel();

        scheduler(source.clone(), &gauges).run(cancel).await;

        assert_eq!(source.call_count(), 0);
    }
}
