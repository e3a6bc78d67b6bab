//! Rental request engine: availability, pricing, lifecycle, and form validation.

pub mod calendar;
pub mod domain;
pub mod lifecycle;
pub mod pricing;
pub mod repository;
pub mod router;
pub mod service;
pub mod validation;

#[cfg(test)]
mod tests;

pub use calendar::{check_conflict, find_conflict, UnavailabilityCalendar};
pub use domain::{
    DurationUnit, Party, Pickup, PricingTier, Product, ProductId, RentalRequest, RentalRequestId,
    RentalStatus, StatusChange, UnavailabilityEntry, UserId,
};
pub use lifecycle::{replay, transition, RentalAction, TransitionError, TransitionRejection};
pub use pricing::{compute_pricing, PricingBreakdown, PricingPolicy, TierMatch};
pub use repository::{
    ProductCatalog, PublishError, RentalRequestRepository, RentalRequestView, RentalStatusEvent,
    RepositoryError, StatusEventPublisher,
};
pub use router::rental_router;
pub use service::{AvailabilityView, RentalService, RentalServiceError, RentalSubmission};
pub use validation::{
    validate_step, FieldErrors, FieldPath, RentalDraft, StepInput, ValidatedRental,
    ValidationContext,
};
