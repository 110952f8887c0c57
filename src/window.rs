use crate::models::{TimeRange, WindowKind};
use chrono::{Datelike, Days, Local, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceZone {
    #[default]
    Local,
    Utc,
}

impl ReferenceZone {
    pub fn today(self) -> NaiveDate {
        match self {
            ReferenceZone::Local => Local::now().date_naive(),
            ReferenceZone::Utc => Utc::now().date_naive(),
        }
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    // Day 1 exists in every month.
    date - Days::new(u64::from(date.day0()))
}

fn days_before(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_sub_days(Days::new(days)).unwrap_or(NaiveDate::MIN)
}

pub fn compute_range(kind: WindowKind, today: NaiveDate) -> TimeRange {
    match kind {
        WindowKind::Today => TimeRange {
            start: days_before(today, 1),
            end: today,
        },
        WindowKind::MonthToDate => {
            let start = first_of_month(today);
            // On the 1st the month so far is only today, which is still accruing.
            let end = if start == today {
                today.checked_add_days(Days::new(1)).unwrap_or(NaiveDate::MAX)
            } else {
                today
            };
            TimeRange { start, end }
        }
        WindowKind::PreviousDay => TimeRange {
            start: days_before(today, 2),
            end: days_before(today, 1),
        },
        WindowKind::PreviousMonth => {
            let end = first_of_month(today);
            let start = end
                .checked_sub_months(Months::new(1))
                .unwrap_or(NaiveDate::MIN);
            TimeRange { start, end }
        }
    }
}
