use crate::error::AppError;
use crate::models::{GaugeSnapshot, WindowKind};
use parking_lot::RwLock;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{GaugeVec, Opts, Registry};
use std::sync::Arc;
use tracing::warn;

pub const LABELS: [&str; 2] = ["service", "region"];

/// Exposed cost gauge for one window.
///
/// The whole label set lives in one immutable snapshot; `replace` swaps the
/// pointer and `collect` clones it once, so a scrape never sees a mix of two
/// cycles. Clones share state.
#[derive(Clone)]
pub struct CostGauge {
    inner: Arc<GaugeInner>,
}

struct GaugeInner {
    kind: WindowKind,
    template: GaugeVec,
    snapshot: RwLock<Arc<GaugeSnapshot>>,
}

impl CostGauge {
    pub fn new(kind: WindowKind) -> Result<Self, AppError> {
        let template = GaugeVec::new(Self::opts(kind), &LABELS)?;
        Ok(Self {
            inner: Arc::new(GaugeInner {
                kind,
                template,
                snapshot: RwLock::new(Arc::new(GaugeSnapshot::new())),
            }),
        })
    }

    fn opts(kind: WindowKind) -> Opts {
        Opts::new(kind.metric_name(), kind.help())
    }

    pub fn kind(&self) -> WindowKind {
        self.inner.kind
    }

    pub fn replace(&self, snapshot: GaugeSnapshot) {
        *self.inner.snapshot.write() = Arc::new(snapshot);
    }

    pub fn snapshot(&self) -> Arc<GaugeSnapshot> {
        let guard = self.inner.snapshot.read();
        Arc::clone(&*guard)
    }
}

impl Collector for CostGauge {
    fn desc(&self) -> Vec<&Desc> {
        self.inner.template.desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let snapshot = self.snapshot();
        let vec = match GaugeVec::new(Self::opts(self.inner.kind), &LABELS) {
            Ok(vec) => vec,
            Err(e) => {
                warn!(window = %self.inner.kind, error = %e, "failed to build gauge family");
                return Vec::new();
            }
        };
        for (key, amount) in snapshot.iter() {
            vec.with_label_values(&[key.service.as_str(), key.region.as_str()])
                .set(*amount);
        }
        vec.collect()
    }
}

#[derive(Clone)]
pub struct CostGauges {
    gauges: Vec<CostGauge>,
}

impl CostGauges {
    pub fn new(windows: &[WindowKind]) -> Result<Self, AppError> {
        let gauges = windows
            .iter()
            .map(|kind| CostGauge::new(*kind))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { gauges })
    }

    #[cfg(test)]
    pub fn get(&self, kind: WindowKind) -> Option<&CostGauge> {
        self.gauges.iter().find(|g| g.kind() == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CostGauge> {
        self.gauges.iter()
    }

    pub fn register(&self, registry: &Registry) -> Result<(), AppError> {
        for gauge in &self.gauges {
            registry.register(Box::new(gauge.clone()))?;
        }
        Ok(())
    }
}
