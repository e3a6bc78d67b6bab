use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use rental_engine::rentals::{
    DurationUnit, PricingTier, Product, ProductCatalog, ProductId, PublishError,
    RentalRequest, RentalRequestId, RentalRequestRepository, RentalStatusEvent, RepositoryError,
    StatusEventPublisher, UnavailabilityEntry, UserId,
};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

pub(crate) const DEMO_PRODUCT_ID: &str = "demo-tent";
pub(crate) const DEMO_OWNER_ID: &str = "owner-demo";

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("in-memory store poisoned".to_string()))
}

/// Listing seeded into the in-memory catalog so the API is usable out of the box.
pub(crate) fn demo_product() -> Product {
    let blocked = |y, m, d| NaiveDate::from_ymd_opt(y, m, d);
    let mut unavailability: Vec<UnavailabilityEntry> = blocked(2030, 7, 4)
        .map(UnavailabilityEntry::date)
        .into_iter()
        .collect();
    if let (Some(start), Some(end)) = (blocked(2030, 8, 10), blocked(2030, 8, 14)) {
        unavailability.extend(UnavailabilityEntry::range(start, end).ok());
    }

    Product {
        id: ProductId(DEMO_PRODUCT_ID.to_string()),
        owner: UserId(DEMO_OWNER_ID.to_string()),
        title: "Four-person camping tent".to_string(),
        pricing_tiers: vec![
            PricingTier {
                duration_unit: DurationUnit::Day,
                price: 25,
                max_period: Some(14),
            },
            PricingTier {
                duration_unit: DurationUnit::Week,
                price: 140,
                max_period: Some(6),
            },
        ],
        security_deposit: 150,
        unavailability,
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryProductCatalog {
    products: Arc<Mutex<HashMap<ProductId, Product>>>,
}

impl InMemoryProductCatalog {
    pub(crate) fn seeded() -> Self {
        let catalog = Self::default();
        catalog.upsert(demo_product());
        catalog
    }

    pub(crate) fn upsert(&self, product: Product) {
        if let Ok(mut guard) = lock(&self.products) {
            guard.insert(product.id.clone(), product);
        }
    }
}

impl ProductCatalog for InMemoryProductCatalog {
    fn fetch(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(lock(&self.products)?.get(id).cloned())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryRentalRepository {
    records: Arc<Mutex<HashMap<RentalRequestId, RentalRequest>>>,
}

impl RentalRequestRepository for InMemoryRentalRepository {
    fn insert(&self, request: RentalRequest) -> Result<RentalRequest, RepositoryError> {
        let mut guard = lock(&self.records)?;
        if guard.contains_key(&request.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(request.id.clone(), request.clone());
        Ok(request)
    }

    fn update(&self, request: RentalRequest, expected_version: u64) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.records)?;
        let found = guard
            .get(&request.id)
            .map(|stored| stored.version)
            .ok_or(RepositoryError::NotFound)?;
        if found != expected_version {
            return Err(RepositoryError::VersionConflict {
                expected: expected_version,
                found,
            });
        }
        guard.insert(request.id.clone(), request);
        Ok(())
    }

    fn fetch(&self, id: &RentalRequestId) -> Result<Option<RentalRequest>, RepositoryError> {
        Ok(lock(&self.records)?.get(id).cloned())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryEventPublisher {
    events: Arc<Mutex<Vec<RentalStatusEvent>>>,
}

impl StatusEventPublisher for InMemoryEventPublisher {
    fn publish(&self, event: RentalStatusEvent) -> Result<(), PublishError> {
        info!(
            rental_id = %event.rental_id,
            status = event.status.label(),
            notify = %event.notify,
            "rental status event"
        );
        self.events
            .lock()
            .map_err(|_| PublishError::Transport("event log poisoned".to_string()))?
            .push(event);
        Ok(())
    }
}

impl InMemoryEventPublisher {
    pub(crate) fn events(&self) -> Vec<RentalStatusEvent> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn parse_duration_unit(raw: &str) -> Result<DurationUnit, String> {
    match raw.trim().to_ascii_lowercase().trim_end_matches('s') {
        "day" => Ok(DurationUnit::Day),
        "week" => Ok(DurationUnit::Week),
        "month" => Ok(DurationUnit::Month),
        other => Err(format!("unknown duration unit '{other}' (expected day, week or month)")),
    }
}
