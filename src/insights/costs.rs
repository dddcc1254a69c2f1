use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use crate::store::models::CostBreakdownRow;

/// Half-open calendar month window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl MonthWindow {
    /// The calendar month containing `day`.
    pub fn containing(day: NaiveDate) -> Self {
        let start = first_of_month(day.year(), day.month());
        let end = if day.month() == 12 {
            first_of_month(day.year() + 1, 1)
        } else {
            first_of_month(day.year(), day.month() + 1)
        };
        Self { start, end }
    }

    /// The calendar month before this one.
    pub fn previous(&self) -> Self {
        let last_day = self.start.pred_opt().unwrap_or(self.start);
        Self::containing(last_day)
    }

    pub fn start_str(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    pub fn end_str(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }
}

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

/// Total cost per service. Rows without a service are grouped under "unknown".
pub fn totals_by_service(rows: &[CostBreakdownRow]) -> BTreeMap<String, f64> {
    let mut totals = BTreeMap::new();
    for row in rows {
        let service = if row.service.is_empty() {
            "unknown".to_string()
        } else {
            row.service.clone()
        };
        *totals.entry(service).or_insert(0.0) += row.cost;
    }
    totals
}

/// A service whose spend jumped month over month.
#[derive(Debug, Clone, PartialEq)]
pub struct CostAnomaly {
    pub service: String,
    pub previous: f64,
    pub current: f64,
}

impl CostAnomaly {
    pub fn increase(&self) -> f64 {
        self.current - self.previous
    }
}

/// Services with `prev > 0`, `cur > 1.5 * prev` and an absolute increase above 50.
pub fn detect_anomalies(
    current: &BTreeMap<String, f64>,
    previous: &BTreeMap<String, f64>,
) -> Vec<CostAnomaly> {
    current
        .iter()
        .filter_map(|(service, &cur)| {
            let prev = previous.get(service).copied().unwrap_or(0.0);
            (prev > 0.0 && cur > prev * 1.5 && (cur - prev) > 50.0).then(|| CostAnomaly {
                service: service.clone(),
                previous: prev,
                current: cur,
            })
        })
        .collect()
}
