use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{FieldErrors, ValidatedRental, ValidationContext};
use crate::rentals::calendar::find_conflict;
use crate::rentals::domain::{DurationUnit, Pickup, UnavailabilityEntry};

/// Field paths used by the rental form.
pub mod fields {
    pub const START_DATE: &str = "startDate";
    pub const DURATION: &str = "duration";
    pub const DURATION_UNIT: &str = "durationUnit";
    pub const PURPOSE: &str = "purpose";
    pub const DELIVERY_ADDRESS: &str = "deliveryAddress";
}

/// Step 1: when and for how long.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleStep {
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub duration: Option<u32>,
    pub duration_unit: DurationUnit,
}

impl Default for ScheduleStep {
    fn default() -> Self {
        Self {
            start_date: None,
            duration: Some(1),
            duration_unit: DurationUnit::Day,
        }
    }
}

/// Step 3: why and how the renter will collect the product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogisticsStep {
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub pickup: Pickup,
}

/// Form data keyed by step number. Step 2 is the read-only pricing review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepInput {
    Schedule(ScheduleStep),
    Review,
    Logistics(LogisticsStep),
}

impl StepInput {
    pub const fn step_number(&self) -> u8 {
        match self {
            StepInput::Schedule(_) => 1,
            StepInput::Review => 2,
            StepInput::Logistics(_) => 3,
        }
    }
}

pub fn validate_step(input: &StepInput, ctx: &ValidationContext<'_>) -> FieldErrors {
    match input {
        StepInput::Schedule(schedule) => validate_schedule(schedule, ctx),
        StepInput::Review => FieldErrors::new(),
        StepInput::Logistics(logistics) => validate_logistics(logistics),
    }
}

/// Start date strictly after `today`, duration within the tier's `max_period`, and no
/// overlap with the product's unavailability calendar.
pub fn validate_schedule(schedule: &ScheduleStep, ctx: &ValidationContext<'_>) -> FieldErrors {
    let mut errors = FieldErrors::new();
    let unit = schedule.duration_unit;

    let start_date = match schedule.start_date {
        None => {
            errors.add(fields::START_DATE, "Start date is required");
            None
        }
        Some(date) if date <= ctx.today => {
            errors.add(fields::START_DATE, "Start date must be in the future");
            None
        }
        Some(date) => Some(date),
    };

    let duration = match schedule.duration {
        Some(duration) if duration >= 1 => Some(duration),
        _ => {
            errors.add(fields::DURATION, "Duration must be at least 1");
            None
        }
    };

    match ctx.product.tier_for(unit) {
        None => errors.add(
            fields::DURATION_UNIT,
            format!("This product cannot be rented by the {}", unit.label()),
        ),
        Some(tier) => {
            if let (Some(duration), Some(max)) = (duration, tier.max_period) {
                if !tier.allows(duration) {
                    errors.add(
                        fields::DURATION,
                        format!("Maximum rental period is {max} {}(s)", unit.label()),
                    );
                }
            }
        }
    }

    if let (Some(start), Some(duration)) = (start_date, duration) {
        if unit.end_date(start, duration).is_none() {
            errors.add(fields::DURATION, "Rental period is too long");
        } else if let Some(entry) =
            find_conflict(start, duration, unit, &ctx.product.unavailability)
        {
            errors.add(fields::START_DATE, conflict_message(entry));
        }
    }

    errors
}

pub fn validate_logistics(logistics: &LogisticsStep) -> FieldErrors {
    let mut errors = FieldErrors::new();

    if logistics.purpose.trim().is_empty() {
        errors.add(fields::PURPOSE, "Purpose is required");
    }

    if let Pickup::Delivery { address } = &logistics.pickup {
        if address.trim().is_empty() {
            errors.add(fields::DELIVERY_ADDRESS, "Delivery address is required");
        }
    }

    errors
}

/// Re-run every step and, only when all pass, price the rental.
pub fn validate_submission(
    schedule: &ScheduleStep,
    logistics: &LogisticsStep,
    ctx: &ValidationContext<'_>,
) -> Result<ValidatedRental, FieldErrors> {
    let mut errors = validate_schedule(schedule, ctx);
    errors.merge(validate_logistics(logistics));

    let (Some(start_date), Some(duration)) = (schedule.start_date, schedule.duration) else {
        return Err(errors);
    };
    let end_date = match schedule.duration_unit.end_date(start_date, duration) {
        Some(end_date) if errors.is_empty() => end_date,
        _ => return Err(errors),
    };

    let pricing = ctx
        .pricing
        .compute_pricing(ctx.product, duration, schedule.duration_unit);

    Ok(ValidatedRental {
        product: ctx.product.id.clone(),
        owner: ctx.product.owner.clone(),
        start_date,
        end_date,
        duration,
        duration_unit: schedule.duration_unit,
        purpose: logistics.purpose.trim().to_string(),
        pickup: logistics.pickup.clone(),
        pricing,
    })
}

fn conflict_message(entry: &UnavailabilityEntry) -> String {
    match entry {
        UnavailabilityEntry::Date { date } => {
            format!("Selected dates overlap an unavailable date ({date})")
        }
        UnavailabilityEntry::Range { start, end } => {
            format!("Selected dates overlap an unavailable period ({start} to {end})")
        }
    }
}
