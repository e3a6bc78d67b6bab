use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{FieldErrors, FieldPath};
use crate::rentals::domain::{PricingTier, Product, ProductId, UnavailabilityEntry, UserId};

/// Raw unavailability row from the listing form; the form lets both shapes be filled in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnavailabilityDraft {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub range_start: Option<NaiveDate>,
    #[serde(default)]
    pub range_end: Option<NaiveDate>,
}

/// Listing creation form as submitted by an owner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub pricing_tiers: Vec<PricingTier>,
    #[serde(default)]
    pub security_deposit: u64,
    #[serde(default)]
    pub unavailability: Vec<UnavailabilityDraft>,
}

impl ListingDraft {
    /// Validate and convert into a [`Product`] owned by `owner`.
    pub fn into_product(self, id: ProductId, owner: UserId) -> Result<Product, FieldErrors> {
        validate_listing(&self).into_result()?;

        let unavailability = self
            .unavailability
            .iter()
            .filter_map(|row| entry_from_row(row).ok())
            .collect();

        Ok(Product {
            id,
            owner,
            title: self.title.trim().to_string(),
            pricing_tiers: self.pricing_tiers,
            security_deposit: self.security_deposit,
            unavailability,
        })
    }
}

pub fn validate_listing(draft: &ListingDraft) -> FieldErrors {
    let mut errors = FieldErrors::new();

    if draft.title.trim().is_empty() {
        errors.add("title", "Title is required");
    }

    if draft.pricing_tiers.is_empty() {
        errors.add("pricingTiers", "Add at least one pricing tier");
    }

    let mut seen_units = HashSet::new();
    for (index, tier) in draft.pricing_tiers.iter().enumerate() {
        let path = || FieldPath::new("pricingTiers").index(index);

        if tier.price == 0 {
            errors.add(path().field("price"), "Price must be greater than zero");
        }
        if tier.max_period == Some(0) {
            errors.add(path().field("maxPeriod"), "Maximum period must be at least 1");
        }
        if !seen_units.insert(tier.duration_unit) {
            errors.add(
                path().field("durationUnit"),
                format!("A {} tier is already defined", tier.duration_unit.label()),
            );
        }
    }

    for (index, row) in draft.unavailability.iter().enumerate() {
        if let Err((field, message)) = entry_from_row(row) {
            let path = FieldPath::new("unavailability").index(index);
            let path = match field {
                Some(field) => path.field(field),
                None => path,
            };
            errors.add(path, message);
        }
    }

    errors
}

fn entry_from_row(
    row: &UnavailabilityDraft,
) -> Result<UnavailabilityEntry, (Option<&'static str>, &'static str)> {
    match (row.date, row.range_start, row.range_end) {
        (Some(date), None, None) => Ok(UnavailabilityEntry::date(date)),
        (None, Some(start), Some(end)) => UnavailabilityEntry::range(start, end)
            .map_err(|_| (Some("rangeEnd"), "Range end must not be before range start")),
        (None, None, None) => Err((None, "Pick a date or a date range")),
        (Some(_), _, _) => Err((None, "Use either a single date or a range, not both")),
        (None, None, Some(_)) => Err((Some("rangeStart"), "Range start is required")),
        (None, Some(_), None) => Err((Some("rangeEnd"), "Range end is required")),
    }
}
