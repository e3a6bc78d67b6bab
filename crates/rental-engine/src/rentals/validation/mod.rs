//! Form validation for the three-step rental flow and for listing creation.
//!
//! Validators are pure functions returning [`FieldErrors`]; nothing here throws for user
//! input. Field paths use the dotted/indexed form the UI binds to
//! (`startDate`, `pricingTiers.0.price`).

mod draft;
mod listing;
mod steps;

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{DurationUnit, Pickup, Product, ProductId, UserId};
use super::pricing::{PricingBreakdown, PricingPolicy};

pub use draft::{FormCommand, FormStep, RentalDraft};
pub use listing::{validate_listing, ListingDraft, UnavailabilityDraft};
pub use steps::{
    fields, validate_logistics, validate_schedule, validate_step, validate_submission,
    LogisticsStep, ScheduleStep, StepInput,
};

/// Field path to messages. Ordered so responses are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.0.entry(path.into()).or_default().push(message.into());
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (path, messages) in other.0 {
            self.0.entry(path).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, path: &str) -> Option<&[String]> {
        self.0.get(path).map(Vec::as_slice)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Drop errors for `path` and everything nested below it (`path.0.price`, ...).
    pub fn clear_field(&mut self, path: &str) {
        let nested = format!("{path}.");
        self.0.retain(|key, _| key != path && !key.starts_with(&nested));
    }

    /// `Ok(())` when empty, otherwise the errors themselves.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .0
            .iter()
            .map(|(path, messages)| format!("{path}: {}", messages.join("; ")))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{rendered}")
    }
}

impl std::error::Error for FieldErrors {}

/// Builder for dotted/indexed field paths such as `pricingTiers.0.price`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath(String);

impl FieldPath {
    pub fn new(root: &str) -> Self {
        Self(root.to_string())
    }

    pub fn index(mut self, index: usize) -> Self {
        self.0.push('.');
        self.0.push_str(&index.to_string());
        self
    }

    pub fn field(mut self, name: &str) -> Self {
        self.0.push('.');
        self.0.push_str(name);
        self
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.0
    }
}

/// Inputs the validators read but never change.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    pub product: &'a Product,
    /// Start dates must fall strictly after this date.
    pub today: NaiveDate,
    pub pricing: &'a PricingPolicy,
}

/// Outcome of a successful final submission: everything needed to create the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct ValidatedRental {
    pub product: ProductId,
    pub owner: UserId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub duration: u32,
    pub duration_unit: DurationUnit,
    pub purpose: String,
    pub pickup: Pickup,
    pub pricing: PricingBreakdown,
}
