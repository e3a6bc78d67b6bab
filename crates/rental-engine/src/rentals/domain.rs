use chrono::{DateTime, Days, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier wrapper for rental requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RentalRequestId(pub String);

/// Identifier wrapper for listed products.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub String);

/// Identifier wrapper for platform users (renters and owners alike).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

macro_rules! display_id {
    ($($id:ty),*) => {
        $(impl fmt::Display for $id {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        })*
    };
}

display_id!(RentalRequestId, ProductId, UserId);

/// Unit a rental duration and a pricing tier are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationUnit {
    Day,
    Week,
    Month,
}

impl DurationUnit {
    pub const fn label(self) -> &'static str {
        match self {
            DurationUnit::Day => "day",
            DurationUnit::Week => "week",
            DurationUnit::Month => "month",
        }
    }

    /// Last date covered by a rental of `duration` units beginning on `start`.
    ///
    /// Months are calendar months; the day of month is clamped to the end of shorter
    /// months. Returns `None` only when the result leaves chrono's supported range.
    pub fn end_date(self, start: NaiveDate, duration: u32) -> Option<NaiveDate> {
        match self {
            DurationUnit::Day => start.checked_add_days(Days::new(u64::from(duration))),
            DurationUnit::Week => {
                start.checked_add_days(Days::new(u64::from(duration) * 7))
            }
            DurationUnit::Month => start.checked_add_months(Months::new(duration)),
        }
    }
}

/// A `(duration_unit, price, max_period)` pricing option on a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTier {
    #[serde(alias = "durationUnit")]
    pub duration_unit: DurationUnit,
    /// Whole currency units charged per duration unit.
    pub price: u64,
    /// Upper bound on the number of units a single rental may span; unbounded when unset.
    #[serde(default, alias = "maxPeriod")]
    pub max_period: Option<u32>,
}

impl PricingTier {
    /// Whether a rental of `duration` units stays within `max_period`.
    pub fn allows(&self, duration: u32) -> bool {
        self.max_period.map_or(true, |max| duration <= max)
    }
}

/// A single date or an inclusive date range during which a product cannot be rented.
///
/// Exactly one form is populated; the enum makes the "never both" rule structural.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnavailabilityEntry {
    Date { date: NaiveDate },
    Range { start: NaiveDate, end: NaiveDate },
}

impl UnavailabilityEntry {
    pub fn date(date: NaiveDate) -> Self {
        UnavailabilityEntry::Date { date }
    }

    /// Build a ranged entry, rejecting ranges whose end precedes their start.
    pub fn range(start: NaiveDate, end: NaiveDate) -> Result<Self, InvalidRange> {
        if end < start {
            return Err(InvalidRange { start, end });
        }
        Ok(UnavailabilityEntry::Range { start, end })
    }

    pub fn is_range(&self) -> bool {
        matches!(self, UnavailabilityEntry::Range { .. })
    }

    /// First and last blocked dates, inclusive.
    pub fn bounds(&self) -> (NaiveDate, NaiveDate) {
        match *self {
            UnavailabilityEntry::Date { date } => (date, date),
            UnavailabilityEntry::Range { start, end } => (start, end),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unavailability range ends ({end}) before it starts ({start})")]
pub struct InvalidRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Listing snapshot the engine needs to check availability and price a rental.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub owner: UserId,
    pub title: String,
    pub pricing_tiers: Vec<PricingTier>,
    /// Flat refundable deposit, not scaled by duration.
    pub security_deposit: u64,
    #[serde(default)]
    pub unavailability: Vec<UnavailabilityEntry>,
}

impl Product {
    pub fn tier_for(&self, unit: DurationUnit) -> Option<&PricingTier> {
        self.pricing_tiers
            .iter()
            .find(|tier| tier.duration_unit == unit)
    }
}

/// Status tracked throughout the rental request lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RentalStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
    Completed,
}

impl RentalStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RentalStatus::Pending => "pending",
            RentalStatus::Approved => "approved",
            RentalStatus::Rejected => "rejected",
            RentalStatus::Cancelled => "cancelled",
            RentalStatus::Completed => "completed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            RentalStatus::Rejected | RentalStatus::Cancelled | RentalStatus::Completed
        )
    }
}

/// Side of the rental an actor is acting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    Renter,
    Owner,
}

impl Party {
    pub const fn label(self) -> &'static str {
        match self {
            Party::Renter => "renter",
            Party::Owner => "owner",
        }
    }
}

/// How the renter receives the product. Delivery always carries its address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Pickup {
    #[default]
    SelfPickup,
    Delivery { address: String },
}

/// One append-only entry in a request's status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: RentalStatus,
    pub at: DateTime<Utc>,
    pub actor: Party,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Persisted rental request. Only [`crate::rentals::lifecycle`] mutates `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalRequest {
    pub id: RentalRequestId,
    pub product: ProductId,
    pub renter: UserId,
    pub owner: UserId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub duration: u32,
    pub duration_unit: DurationUnit,
    pub purpose: String,
    pub pickup: Pickup,
    pub base_cost: u64,
    pub service_fee: u64,
    pub security_deposit: u64,
    pub renter_charge: u64,
    pub owner_payout: u64,
    pub(crate) status: RentalStatus,
    pub(crate) status_history: Vec<StatusChange>,
    /// Bumped on every transition; storage uses it to reject stale writes.
    pub version: u64,
}

impl RentalRequest {
    pub fn status(&self) -> RentalStatus {
        self.status
    }

    pub fn status_history(&self) -> &[StatusChange] {
        &self.status_history
    }

    /// Resolve which side of this rental `user` is on, if any.
    pub fn party_of(&self, user: &UserId) -> Option<Party> {
        if *user == self.renter {
            Some(Party::Renter)
        } else if *user == self.owner {
            Some(Party::Owner)
        } else {
            None
        }
    }
}
