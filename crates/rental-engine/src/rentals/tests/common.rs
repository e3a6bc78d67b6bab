use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::rentals::domain::{
    DurationUnit, Pickup, PricingTier, Product, ProductId, RentalRequest, RentalRequestId,
    UnavailabilityEntry, UserId,
};
use crate::rentals::pricing::PricingPolicy;
use crate::rentals::repository::{
    ProductCatalog, PublishError, RentalRequestRepository, RentalStatusEvent, RepositoryError,
    StatusEventPublisher,
};
use crate::rentals::service::{RentalService, RentalSubmission};
use crate::rentals::validation::{
    validate_submission, LogisticsStep, ScheduleStep, ValidationContext,
};
use crate::rentals::rental_router;

pub(super) const OWNER: &str = "owner-7";
pub(super) const RENTER: &str = "renter-3";

pub(super) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub(super) fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0)
        .single()
        .expect("valid instant")
}

pub(super) fn today() -> NaiveDate {
    fixed_now().date_naive()
}

pub(super) fn day_tier() -> PricingTier {
    PricingTier {
        duration_unit: DurationUnit::Day,
        price: 100,
        max_period: Some(30),
    }
}

/// Pressure washer listed by [`OWNER`]: 100/day up to 30 days, 600/week up to 4 weeks,
/// deposit 1000, blocked on 2024-07-20 and 2024-07-10..=2024-07-12.
pub(super) fn product() -> Product {
    Product {
        id: ProductId("washer-01".to_string()),
        owner: UserId(OWNER.to_string()),
        title: "Pressure washer".to_string(),
        pricing_tiers: vec![
            day_tier(),
            PricingTier {
                duration_unit: DurationUnit::Week,
                price: 600,
                max_period: Some(4),
            },
        ],
        security_deposit: 1000,
        unavailability: vec![
            UnavailabilityEntry::date(date(2024, 7, 20)),
            UnavailabilityEntry::range(date(2024, 7, 10), date(2024, 7, 12)).expect("valid range"),
        ],
    }
}

pub(super) fn schedule(start: NaiveDate, duration: u32, unit: DurationUnit) -> ScheduleStep {
    ScheduleStep {
        start_date: Some(start),
        duration: Some(duration),
        duration_unit: unit,
    }
}

pub(super) fn logistics() -> LogisticsStep {
    LogisticsStep {
        purpose: "Cleaning the patio".to_string(),
        pickup: Pickup::SelfPickup,
    }
}

pub(super) fn submission() -> RentalSubmission {
    RentalSubmission {
        product_id: product().id,
        renter_id: UserId(RENTER.to_string()),
        schedule: schedule(date(2024, 6, 20), 5, DurationUnit::Day),
        logistics: logistics(),
    }
}

/// A five-day request in `pending`, built without going through storage.
pub(super) fn pending_request() -> RentalRequest {
    let product = product();
    let pricing = PricingPolicy::default();
    let ctx = ValidationContext {
        product: &product,
        today: today(),
        pricing: &pricing,
    };
    let validated = validate_submission(
        &schedule(date(2024, 6, 20), 5, DurationUnit::Day),
        &logistics(),
        &ctx,
    )
    .expect("fixture submission is valid");

    RentalRequest::create(
        RentalRequestId("rent-test".to_string()),
        UserId(RENTER.to_string()),
        validated,
        fixed_now(),
    )
}

pub(super) type TestService = RentalService<MemoryCatalog, MemoryRepository, MemoryEvents>;

pub(super) fn build_service() -> (TestService, Arc<MemoryRepository>, Arc<MemoryEvents>) {
    let catalog = Arc::new(MemoryCatalog::with(vec![product()]));
    let repository = Arc::new(MemoryRepository::default());
    let events = Arc::new(MemoryEvents::default());
    let service = RentalService::new(
        catalog,
        repository.clone(),
        events.clone(),
        PricingPolicy::default(),
    )
    .with_clock(fixed_now);
    (service, repository, events)
}

pub(super) fn router_with_service(service: TestService) -> axum::Router {
    rental_router(Arc::new(service))
}

#[derive(Default)]
pub(super) struct MemoryCatalog {
    products: HashMap<ProductId, Product>,
}

impl MemoryCatalog {
    pub(super) fn with(products: Vec<Product>) -> Self {
        Self {
            products: products
                .into_iter()
                .map(|product| (product.id.clone(), product))
                .collect(),
        }
    }
}

impl ProductCatalog for MemoryCatalog {
    fn fetch(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.products.get(id).cloned())
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) records: Arc<Mutex<HashMap<RentalRequestId, RentalRequest>>>,
}

impl RentalRequestRepository for MemoryRepository {
    fn insert(&self, request: RentalRequest) -> Result<RentalRequest, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&request.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(request.id.clone(), request.clone());
        Ok(request)
    }

    fn update(&self, request: RentalRequest, expected_version: u64) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let stored = guard.get(&request.id).ok_or(RepositoryError::NotFound)?;
        if stored.version != expected_version {
            return Err(RepositoryError::VersionConflict {
                expected: expected_version,
                found: stored.version,
            });
        }
        guard.insert(request.id.clone(), request);
        Ok(())
    }

    fn fetch(&self, id: &RentalRequestId) -> Result<Option<RentalRequest>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

/// Serves stale copies: every fetch returns the request as it was first stored.
#[derive(Default)]
pub(super) struct StaleRepository {
    inner: MemoryRepository,
    snapshots: Mutex<HashMap<RentalRequestId, RentalRequest>>,
}

impl RentalRequestRepository for StaleRepository {
    fn insert(&self, request: RentalRequest) -> Result<RentalRequest, RepositoryError> {
        self.snapshots
            .lock()
            .expect("snapshot mutex poisoned")
            .insert(request.id.clone(), request.clone());
        self.inner.insert(request)
    }

    fn update(&self, request: RentalRequest, expected_version: u64) -> Result<(), RepositoryError> {
        self.inner.update(request, expected_version)
    }

    fn fetch(&self, id: &RentalRequestId) -> Result<Option<RentalRequest>, RepositoryError> {
        Ok(self
            .snapshots
            .lock()
            .expect("snapshot mutex poisoned")
            .get(id)
            .cloned())
    }
}

pub(super) struct UnavailableRepository;

impl RentalRequestRepository for UnavailableRepository {
    fn insert(&self, _request: RentalRequest) -> Result<RentalRequest, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _request: RentalRequest, _expected: u64) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &RentalRequestId) -> Result<Option<RentalRequest>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryEvents {
    events: Arc<Mutex<Vec<RentalStatusEvent>>>,
}

impl MemoryEvents {
    pub(super) fn events(&self) -> Vec<RentalStatusEvent> {
        self.events.lock().expect("event mutex poisoned").clone()
    }
}

impl StatusEventPublisher for MemoryEvents {
    fn publish(&self, event: RentalStatusEvent) -> Result<(), PublishError> {
        self.events
            .lock()
            .expect("event mutex poisoned")
            .push(event);
        Ok(())
    }
}

pub(super) struct FailingEvents;

impl StatusEventPublisher for FailingEvents {
    fn publish(&self, _event: RentalStatusEvent) -> Result<(), PublishError> {
        Err(PublishError::Transport("broker offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
