//! Unavailability calendar and the date-range conflict check.
//!
//! Overlap is inclusive on both ends: a blocked date equal to the rental's first or last
//! day is a conflict, and so is a range touching the candidate at a single day.

pub mod import;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{DurationUnit, UnavailabilityEntry};

pub use import::{CalendarImportError, CalendarImporter};

/// Dates and ranges a product owner has marked as unbookable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnavailabilityCalendar {
    entries: Vec<UnavailabilityEntry>,
}

impl UnavailabilityCalendar {
    pub fn new(entries: Vec<UnavailabilityEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[UnavailabilityEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, entry: UnavailabilityEntry) {
        self.entries.push(entry);
    }

    pub fn check_conflict(
        &self,
        candidate_start: NaiveDate,
        duration: u32,
        unit: DurationUnit,
    ) -> bool {
        check_conflict(candidate_start, duration, unit, &self.entries)
    }
}

impl From<Vec<UnavailabilityEntry>> for UnavailabilityCalendar {
    fn from(entries: Vec<UnavailabilityEntry>) -> Self {
        Self::new(entries)
    }
}

/// Whether the rental `[candidate_start, candidate_start + duration units]` overlaps
/// any entry of `calendar`.
pub fn check_conflict(
    candidate_start: NaiveDate,
    duration: u32,
    unit: DurationUnit,
    calendar: &[UnavailabilityEntry],
) -> bool {
    find_conflict(candidate_start, duration, unit, calendar).is_some()
}

/// First calendar entry overlapping the candidate rental, in calendar order.
pub fn find_conflict<'a>(
    candidate_start: NaiveDate,
    duration: u32,
    unit: DurationUnit,
    calendar: &'a [UnavailabilityEntry],
) -> Option<&'a UnavailabilityEntry> {
    if calendar.is_empty() {
        return None;
    }

    // Past chrono's range the rental is open-ended and blocks every later date.
    let candidate_end = unit
        .end_date(candidate_start, duration)
        .unwrap_or(NaiveDate::MAX);

    let conflict = calendar
        .iter()
        .find(|entry| overlaps(entry, candidate_start, candidate_end));

    if let Some(entry) = conflict {
        debug!(
            %candidate_start,
            %candidate_end,
            ?entry,
            "candidate rental overlaps unavailability"
        );
    }

    conflict
}

fn overlaps(entry: &UnavailabilityEntry, start: NaiveDate, end: NaiveDate) -> bool {
    match *entry {
        UnavailabilityEntry::Date { date } => start <= date && date <= end,
        UnavailabilityEntry::Range {
            start: range_start,
            end: range_end,
        } => start <= range_end && end >= range_start,
    }
}
