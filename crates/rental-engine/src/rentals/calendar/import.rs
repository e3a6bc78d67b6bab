use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

use super::UnavailabilityCalendar;
use crate::rentals::domain::UnavailabilityEntry;

#[derive(Debug)]
pub enum CalendarImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidRow { row: usize, reason: String },
}

impl std::fmt::Display for CalendarImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalendarImportError::Io(err) => write!(f, "failed to read calendar export: {}", err),
            CalendarImportError::Csv(err) => write!(f, "invalid calendar CSV data: {}", err),
            CalendarImportError::InvalidRow { row, reason } => {
                write!(f, "calendar row {} is invalid: {}", row, reason)
            }
        }
    }
}

impl std::error::Error for CalendarImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CalendarImportError::Io(err) => Some(err),
            CalendarImportError::Csv(err) => Some(err),
            CalendarImportError::InvalidRow { .. } => None,
        }
    }
}

impl From<std::io::Error> for CalendarImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for CalendarImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Reads owner calendars exported as `date,range_start,range_end` CSV.
///
/// Each row fills either `date` or both range columns.
pub struct CalendarImporter;

impl CalendarImporter {
    pub fn from_path<P: AsRef<Path>>(
        path: P,
    ) -> Result<UnavailabilityCalendar, CalendarImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<UnavailabilityCalendar, CalendarImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut calendar = UnavailabilityCalendar::default();

        for (index, record) in csv_reader.deserialize::<CalendarRow>().enumerate() {
            let row = record?;
            let entry = row
                .into_entry()
                .map_err(|reason| CalendarImportError::InvalidRow {
                    row: index + 1,
                    reason,
                })?;
            calendar.push(entry);
        }

        Ok(calendar)
    }
}

#[derive(Debug, Deserialize)]
struct CalendarRow {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    date: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    range_start: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    range_end: Option<String>,
}

impl CalendarRow {
    fn into_entry(self) -> Result<UnavailabilityEntry, String> {
        match (self.date, self.range_start, self.range_end) {
            (Some(date), None, None) => Ok(UnavailabilityEntry::date(parse_date(&date)?)),
            (None, Some(start), Some(end)) => {
                UnavailabilityEntry::range(parse_date(&start)?, parse_date(&end)?)
                    .map_err(|err| err.to_string())
            }
            (None, None, None) => Err("row has neither a date nor a range".to_string()),
            (Some(_), _, _) => Err("row has both a date and a range".to_string()),
            (None, _, _) => Err("range rows need both range_start and range_end".to_string()),
        }
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|err| format!("'{value}' is not a YYYY-MM-DD date ({err})"))
}
