use chrono::NaiveDate;
use serde::Serialize;

use super::steps::{
    fields, validate_step, validate_submission, LogisticsStep, ScheduleStep, StepInput,
};
use super::{FieldErrors, ValidatedRental, ValidationContext};
use crate::rentals::domain::{DurationUnit, Pickup};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormStep {
    Schedule,
    Review,
    Logistics,
}

impl FormStep {
    pub const fn number(self) -> u8 {
        match self {
            FormStep::Schedule => 1,
            FormStep::Review => 2,
            FormStep::Logistics => 3,
        }
    }

    const fn next(self) -> Self {
        match self {
            FormStep::Schedule => FormStep::Review,
            FormStep::Review | FormStep::Logistics => FormStep::Logistics,
        }
    }

    const fn previous(self) -> Self {
        match self {
            FormStep::Schedule | FormStep::Review => FormStep::Schedule,
            FormStep::Logistics => FormStep::Review,
        }
    }
}

/// Edits the UI can make to a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormCommand {
    SetStartDate(Option<NaiveDate>),
    SetDuration(Option<u32>),
    SetDurationUnit(DurationUnit),
    SetPurpose(String),
    SetPickup(Pickup),
    Next,
    Back,
}

/// Immutable snapshot of the multi-step rental form.
///
/// [`RentalDraft::apply`] consumes the draft and returns the next one; nothing is shared
/// or mutated in place between steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RentalDraft {
    step: FormStep,
    schedule: ScheduleStep,
    logistics: LogisticsStep,
    errors: FieldErrors,
}

impl Default for RentalDraft {
    fn default() -> Self {
        Self {
            step: FormStep::Schedule,
            schedule: ScheduleStep::default(),
            logistics: LogisticsStep::default(),
            errors: FieldErrors::new(),
        }
    }
}

impl RentalDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> FormStep {
        self.step
    }

    pub fn schedule(&self) -> &ScheduleStep {
        &self.schedule
    }

    pub fn logistics(&self) -> &LogisticsStep {
        &self.logistics
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn apply(mut self, command: FormCommand, ctx: &ValidationContext<'_>) -> Self {
        match command {
            FormCommand::SetStartDate(start_date) => {
                self.schedule.start_date = start_date;
                self.errors.clear_field(fields::START_DATE);
            }
            // Date conflicts are reported on startDate but depend on the whole window.
            FormCommand::SetDuration(duration) => {
                self.schedule.duration = duration;
                self.errors.clear_field(fields::DURATION);
                self.errors.clear_field(fields::START_DATE);
            }
            FormCommand::SetDurationUnit(unit) => {
                self.schedule.duration_unit = unit;
                self.errors.clear_field(fields::DURATION_UNIT);
                // The max-period message depends on the unit.
                self.errors.clear_field(fields::DURATION);
                self.errors.clear_field(fields::START_DATE);
            }
            FormCommand::SetPurpose(purpose) => {
                self.logistics.purpose = purpose;
                self.errors.clear_field(fields::PURPOSE);
            }
            FormCommand::SetPickup(pickup) => {
                self.logistics.pickup = pickup;
                self.errors.clear_field(fields::DELIVERY_ADDRESS);
            }
            FormCommand::Next => {
                let errors = validate_step(&self.current_input(), ctx);
                if errors.is_empty() {
                    self.step = self.step.next();
                }
                self.errors = errors;
            }
            FormCommand::Back => {
                self.step = self.step.previous();
            }
        }

        self
    }

    /// Final submission: every step is validated again before pricing.
    pub fn submit(&self, ctx: &ValidationContext<'_>) -> Result<ValidatedRental, FieldErrors> {
        validate_submission(&self.schedule, &self.logistics, ctx)
    }

    fn current_input(&self) -> StepInput {
        match self.step {
            FormStep::Schedule => StepInput::Schedule(self.schedule.clone()),
            FormStep::Review => StepInput::Review,
            FormStep::Logistics => StepInput::Logistics(self.logistics.clone()),
        }
    }
}
