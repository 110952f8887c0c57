use crate::models::{CostGroup, CostRecord, GaugeSnapshot};
use tracing::trace;

pub const DEFAULT_COST_METRIC: &str = "UnblendedCost";

pub fn parse_record(group: &CostGroup, metric: &str) -> Option<CostRecord> {
    let [service, region, ..] = group.keys.as_slice() else {
        trace!(keys = ?group.keys, "skipping group without service and region keys");
        return None;
    };

    let Some(raw) = group.metrics.get(metric).and_then(Option::as_deref) else {
        trace!(%service, %region, metric, "skipping group without amount");
        return None;
    };

    match raw.trim().parse::<f64>() {
        Ok(amount) if amount.is_finite() => Some(CostRecord {
            service: service.clone(),
            region: region.clone(),
            amount,
        }),
        _ => {
            trace!(%service, %region, raw, "skipping group with unusable amount");
            None
        }
    }
}

pub fn aggregate(groups: &[CostGroup], metric: &str) -> GaugeSnapshot {
    let mut snapshot = GaugeSnapshot::new();
    for record in groups.iter().filter_map(|g| parse_record(g, metric)) {
        snapshot.insert(record.key(), record.amount);
    }
    snapshot
}
