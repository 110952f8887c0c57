use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum WindowKind {
    Today,
    MonthToDate,
    PreviousDay,
    PreviousMonth,
}

impl WindowKind {
    pub const ALL: [WindowKind; 4] = [
        WindowKind::Today,
        WindowKind::MonthToDate,
        WindowKind::PreviousDay,
        WindowKind::PreviousMonth,
    ];

    pub fn as_label(self) -> &'static str {
        match self {
            WindowKind::Today => "today",
            WindowKind::MonthToDate => "month-to-date",
            WindowKind::PreviousDay => "previous-day",
            WindowKind::PreviousMonth => "previous-month",
        }
    }

    pub fn metric_name(self) -> &'static str {
        match self {
            WindowKind::Today => "aws_daily_cost_usd",
            WindowKind::MonthToDate => "aws_monthly_cost_usd",
            WindowKind::PreviousDay => "aws_previous_day_cost_usd",
            WindowKind::PreviousMonth => "aws_previous_month_cost_usd",
        }
    }

    pub fn help(self) -> &'static str {
        match self {
            WindowKind::Today => "Daily AWS cost in USD",
            WindowKind::MonthToDate => "Monthly AWS cost in USD",
            WindowKind::PreviousDay => "Previous day AWS cost in USD (stable metric)",
            WindowKind::PreviousMonth => "Previous month AWS cost in USD (stable metric)",
        }
    }

    pub fn granularity(self) -> Granularity {
        match self {
            WindowKind::Today | WindowKind::PreviousDay => Granularity::Daily,
            WindowKind::MonthToDate | WindowKind::PreviousMonth => Granularity::Monthly,
        }
    }
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Daily,
    Monthly,
}

impl Granularity {
    pub fn as_label(self) -> &'static str {
        match self {
            Granularity::Daily => "daily",
            Granularity::Monthly => "monthly",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeRange {
    pub fn start_str(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    pub fn end_str(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start_str(), self.end_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostGroup {
    pub keys: Vec<String>,
    pub metrics: HashMap<String, Option<String>>,
}

impl CostGroup {
    #[cfg(test)]
    pub fn new<K, S>(keys: K, metric: &str, amount: Option<&str>) -> Self
    where
        K: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            metrics: HashMap::from([(metric.to_string(), amount.map(ToString::to_string))]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CostKey {
    pub service: String,
    pub region: String,
}

impl CostKey {
    pub fn new(service: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            region: region.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CostRecord {
    pub service: String,
    pub region: String,
    pub amount: f64,
}

impl CostRecord {
    pub fn key(&self) -> CostKey {
        CostKey::new(self.service.clone(), self.region.clone())
    }
}

pub type GaugeSnapshot = BTreeMap<CostKey, f64>;

#[derive(Debug, Default)]
pub struct CycleReport {
    pub updated: Vec<(WindowKind, usize)>,
    pub failed: Vec<WindowKind>,
}

impl CycleReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}
