use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::calendar::find_conflict;
use super::domain::{
    DurationUnit, Product, ProductId, RentalRequest, RentalRequestId, UnavailabilityEntry, UserId,
};
use super::lifecycle::{RentalAction, TransitionError};
use super::pricing::{PricingBreakdown, PricingPolicy};
use super::repository::{
    ProductCatalog, RentalRequestRepository, RentalStatusEvent, RepositoryError,
    StatusEventPublisher,
};
use super::validation::{
    fields, validate_step, validate_submission, FieldErrors, LogisticsStep, ScheduleStep,
    StepInput, ValidationContext,
};

/// Renter-submitted request body: step 1 and step 3 fields plus who is asking for what.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RentalSubmission {
    pub product_id: ProductId,
    pub renter_id: UserId,
    #[serde(flatten)]
    pub schedule: ScheduleStep,
    #[serde(flatten)]
    pub logistics: LogisticsStep,
}

/// Result of an availability check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailabilityView {
    pub conflict: bool,
    pub end_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflicting_entry: Option<UnavailabilityEntry>,
}

/// Source of the current instant; swapped out in tests.
pub type Clock = fn() -> DateTime<Utc>;

/// Service composing product lookup, validation, pricing, the lifecycle, and storage.
pub struct RentalService<P, R, E> {
    catalog: Arc<P>,
    repository: Arc<R>,
    events: Arc<E>,
    pricing: PricingPolicy,
    clock: Clock,
}

static RENTAL_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_rental_id() -> RentalRequestId {
    let id = RENTAL_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RentalRequestId(format!("rent-{id:06}"))
}

impl<P, R, E> RentalService<P, R, E>
where
    P: ProductCatalog + 'static,
    R: RentalRequestRepository + 'static,
    E: StatusEventPublisher + 'static,
{
    pub fn new(
        catalog: Arc<P>,
        repository: Arc<R>,
        events: Arc<E>,
        pricing: PricingPolicy,
    ) -> Self {
        Self {
            catalog,
            repository,
            events,
            pricing,
            clock: Utc::now,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn pricing(&self) -> &PricingPolicy {
        &self.pricing
    }

    pub fn today(&self) -> NaiveDate {
        (self.clock)().date_naive()
    }

    pub fn product(&self, id: &ProductId) -> Result<Product, RentalServiceError> {
        self.catalog
            .fetch(id)?
            .ok_or_else(|| RentalServiceError::ProductNotFound(id.clone()))
    }

    /// Check the product calendar for a candidate rental.
    pub fn check_availability(
        &self,
        product_id: &ProductId,
        start_date: NaiveDate,
        duration: u32,
        unit: DurationUnit,
    ) -> Result<AvailabilityView, RentalServiceError> {
        let product = self.product(product_id)?;
        if duration == 0 {
            let mut errors = FieldErrors::new();
            errors.add(fields::DURATION, "Duration must be at least 1");
            return Err(RentalServiceError::Validation(errors));
        }

        let conflicting_entry =
            find_conflict(start_date, duration, unit, &product.unavailability).copied();

        Ok(AvailabilityView {
            conflict: conflicting_entry.is_some(),
            end_date: unit.end_date(start_date, duration),
            conflicting_entry,
        })
    }

    /// Price a rental for display. Units without a tier and durations outside the tier's
    /// bounds are refused before any pricing happens.
    pub fn quote(
        &self,
        product_id: &ProductId,
        duration: u32,
        unit: DurationUnit,
    ) -> Result<PricingBreakdown, RentalServiceError> {
        let product = self.product(product_id)?;

        let mut errors = FieldErrors::new();
        if duration == 0 {
            errors.add(fields::DURATION, "Duration must be at least 1");
        }
        match product.tier_for(unit) {
            None => errors.add(
                fields::DURATION_UNIT,
                format!("This product cannot be rented by the {}", unit.label()),
            ),
            Some(tier) => {
                if let Some(max) = tier.max_period.filter(|_| !tier.allows(duration)) {
                    errors.add(
                        fields::DURATION,
                        format!("Maximum rental period is {max} {}(s)", unit.label()),
                    );
                }
            }
        }
        errors.into_result().map_err(RentalServiceError::Validation)?;

        Ok(self.pricing.compute_pricing(&product, duration, unit))
    }

    /// Validate one step of the rental form against the product.
    pub fn validate_step(
        &self,
        product_id: &ProductId,
        input: &StepInput,
    ) -> Result<FieldErrors, RentalServiceError> {
        let product = self.product(product_id)?;
        let ctx = ValidationContext {
            product: &product,
            today: self.today(),
            pricing: &self.pricing,
        };
        Ok(validate_step(input, &ctx))
    }

    /// Validate every step, price, and store a new request in `pending`.
    pub fn submit(
        &self,
        submission: RentalSubmission,
    ) -> Result<RentalRequest, RentalServiceError> {
        let product = self.product(&submission.product_id)?;
        let ctx = ValidationContext {
            product: &product,
            today: self.today(),
            pricing: &self.pricing,
        };

        let validated = validate_submission(&submission.schedule, &submission.logistics, &ctx)
            .map_err(RentalServiceError::Validation)?;
        if submission.renter_id == product.owner {
            let mut errors = FieldErrors::new();
            errors.add("productId", "You cannot rent your own listing");
            return Err(RentalServiceError::Validation(errors));
        }

        let request = RentalRequest::create(
            next_rental_id(),
            submission.renter_id,
            validated,
            (self.clock)(),
        );
        let stored = self.repository.insert(request)?;

        info!(
            rental_id = %stored.id,
            product_id = %stored.product,
            renter_charge = stored.renter_charge,
            "rental request submitted"
        );
        self.announce(&stored);

        Ok(stored)
    }

    /// Apply `action` for `user`, who must be the renter or the owner of the request.
    pub fn transition(
        &self,
        id: &RentalRequestId,
        action: RentalAction,
        user: &UserId,
        note: Option<String>,
    ) -> Result<RentalRequest, RentalServiceError> {
        let mut request = self.get(id)?;
        let actor = request
            .party_of(user)
            .ok_or_else(|| RentalServiceError::NotAParty {
                user: user.clone(),
                rental: id.clone(),
            })?;

        let expected_version = request.version;
        request.transition(action, actor, (self.clock)(), note)?;

        if let Err(err) = self.repository.update(request.clone(), expected_version) {
            if let RepositoryError::VersionConflict { expected, found } = &err {
                warn!(
                    rental_id = %id,
                    expected,
                    found,
                    "concurrent transition lost the race"
                );
            }
            return Err(err.into());
        }

        self.announce(&request);
        Ok(request)
    }

    /// Fetch a request for API responses.
    pub fn get(&self, id: &RentalRequestId) -> Result<RentalRequest, RentalServiceError> {
        let request = self
            .repository
            .fetch(id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(request)
    }

    fn announce(&self, request: &RentalRequest) {
        let Some(change) = request.status_history().last() else {
            return;
        };
        let event = RentalStatusEvent::from_change(request, change);
        // The change is already stored; delivery failures are reported, not rolled back.
        if let Err(err) = self.events.publish(event) {
            error!(rental_id = %request.id, %err, "failed to publish rental status event");
        }
    }
}

/// Error raised by the rental service.
#[derive(Debug, thiserror::Error)]
pub enum RentalServiceError {
    #[error("rental form has errors: {0}")]
    Validation(FieldErrors),
    #[error("product {0} not found")]
    ProductNotFound(ProductId),
    #[error("user {user} is not a party to rental {rental}")]
    NotAParty {
        user: UserId,
        rental: RentalRequestId,
    },
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
