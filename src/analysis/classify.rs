//! Groups hourly records into days and months.

use chrono::NaiveDate;
use tracing::debug;

use super::types::{DataWarning, Day, EnergyTotals, HourlyRecord, Month, RejectedFile, YearMonth};

/// Classified telemetry shared read-only by every analysis module.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    /// Days in date order.
    pub days: Vec<Day>,
    /// Months in calendar order; each indexes a contiguous run of `days`.
    pub months: Vec<Month>,
    /// Loader and classifier warnings.
    pub warnings: Vec<DataWarning>,
    /// Names of the files the records came from.
    pub files: Vec<String>,
    /// Files that failed to load.
    pub rejected_files: Vec<RejectedFile>,
}

impl Dataset {
    /// Builds days and months from records.
    ///
    /// Records need not be sorted. Days below the completeness threshold are
    /// kept (they still count towards monthly totals) and reported as
    /// warnings.
    pub fn from_records(mut records: Vec<HourlyRecord>) -> Self {
        records.sort_by(|a, b| (a.date, a.hour).cmp(&(b.date, b.hour)));

        let mut days: Vec<Day> = Vec::new();
        let mut current: Vec<HourlyRecord> = Vec::new();
        let mut current_date: Option<NaiveDate> = None;
        for record in records {
            if let Some(date) = current_date.filter(|d| *d != record.date) {
                days.push(Day::new(date, std::mem::take(&mut current)));
            }
            current_date = Some(record.date);
            current.push(record);
        }
        if let Some(date) = current_date {
            days.push(Day::new(date, current));
        }

        let warnings = days
            .iter()
            .filter(|d| !d.is_complete)
            .map(|d| DataWarning::IncompleteDay {
                date: d.date,
                records: d.records.len(),
            })
            .collect();

        let months = group_months(&days);
        debug!(
            days = days.len(),
            months = months.len(),
            "classified telemetry"
        );

        Self {
            days,
            months,
            warnings,
            files: Vec::new(),
            rejected_files: Vec::new(),
        }
    }

    /// True when no records were loaded.
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Days belonging to `month`.
    pub fn days_of(&self, month: &Month) -> &[Day] {
        &self.days[month.days.clone()]
    }

    /// Days with at least the minimum number of hourly rows.
    pub fn complete_days(&self) -> impl Iterator<Item = &Day> {
        self.days.iter().filter(|d| d.is_complete)
    }

    /// Every hourly record in date/hour order.
    pub fn records(&self) -> impl Iterator<Item = &HourlyRecord> {
        self.days.iter().flat_map(|d| d.records.iter())
    }

    pub fn record_count(&self) -> usize {
        self.days.iter().map(|d| d.records.len()).sum()
    }

    /// Totals over every record.
    pub fn totals(&self) -> EnergyTotals {
        let mut totals = EnergyTotals::default();
        for m in &self.months {
            totals.merge(&m.totals);
        }
        totals
    }

    /// Whether any record carries battery state data.
    pub fn has_soc_data(&self) -> bool {
        self.records().any(|r| r.soc.max > 0.0)
    }

    /// Applies EV flags to complete days; incomplete days stay `None`.
    pub(crate) fn mark_ev_days(&mut self, is_ev: impl Fn(&Day) -> bool) {
        for day in self.days.iter_mut().filter(|d| d.is_complete) {
            day.is_ev_day = Some(is_ev(day));
        }
    }
}

fn group_months(days: &[Day]) -> Vec<Month> {
    let mut months: Vec<Month> = Vec::new();
    for (i, day) in days.iter().enumerate() {
        let key = YearMonth::of(day.date);
        match months.last_mut() {
            Some(m) if m.key == key => {
                m.days.end = i + 1;
                m.totals.merge(&day.totals);
                m.complete_days += usize::from(day.is_complete);
            }
            _ => months.push(Month {
                key,
                days: i..i + 1,
                totals: day.totals,
                complete_days: usize::from(day.is_complete),
            }),
        }
    }
    months
}
