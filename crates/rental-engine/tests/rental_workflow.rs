use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rental_engine::config::PricingConfig;
use rental_engine::rentals::calendar::CalendarImporter;
use rental_engine::rentals::validation::{LogisticsStep, ScheduleStep};
use rental_engine::rentals::{
    check_conflict, compute_pricing, rental_router, replay, DurationUnit, Party, Pickup,
    PricingPolicy, PricingTier, Product, ProductId, RentalAction, RentalService,
    RentalServiceError, RentalStatus, RentalSubmission, UnavailabilityEntry, UserId,
};
use serde_json::{json, Value};
use tower::ServiceExt;

mod common {
    use super::*;
    use rental_engine::rentals::{
        ProductCatalog, PublishError, RentalRequest, RentalRequestId, RentalRequestRepository,
        RentalStatusEvent, RepositoryError, StatusEventPublisher,
    };

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0)
            .single()
            .expect("valid instant")
    }

    pub fn kayak() -> Product {
        Product {
            id: ProductId("kayak-2".to_string()),
            owner: UserId("lena".to_string()),
            title: "Touring kayak".to_string(),
            pricing_tiers: vec![
                PricingTier {
                    duration_unit: DurationUnit::Day,
                    price: 100,
                    max_period: Some(30),
                },
                PricingTier {
                    duration_unit: DurationUnit::Month,
                    price: 1800,
                    max_period: None,
                },
            ],
            security_deposit: 1000,
            unavailability: vec![
                UnavailabilityEntry::date(date(2025, 3, 15)),
                UnavailabilityEntry::range(date(2025, 4, 10), date(2025, 4, 12))
                    .expect("ordered range"),
            ],
        }
    }

    pub struct Catalog(pub Vec<Product>);

    impl ProductCatalog for Catalog {
        fn fetch(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
            Ok(self.0.iter().find(|product| &product.id == id).cloned())
        }
    }

    #[derive(Default)]
    pub struct Requests(Mutex<HashMap<RentalRequestId, RentalRequest>>);

    impl RentalRequestRepository for Requests {
        fn insert(&self, request: RentalRequest) -> Result<RentalRequest, RepositoryError> {
            let mut guard = self.0.lock().expect("mutex");
            if guard.contains_key(&request.id) {
                return Err(RepositoryError::Conflict);
            }
            guard.insert(request.id.clone(), request.clone());
            Ok(request)
        }

        fn update(
            &self,
            request: RentalRequest,
            expected_version: u64,
        ) -> Result<(), RepositoryError> {
            let mut guard = self.0.lock().expect("mutex");
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
            Ok(self.0.lock().expect("mutex").get(id).cloned())
        }
    }

    #[derive(Default)]
    pub struct Events(pub Mutex<Vec<RentalStatusEvent>>);

    impl StatusEventPublisher for Events {
        fn publish(&self, event: RentalStatusEvent) -> Result<(), PublishError> {
            self.0.lock().expect("mutex").push(event);
            Ok(())
        }
    }

    pub fn service() -> (RentalService<Catalog, Requests, Events>, Arc<Events>) {
        service_with(PricingPolicy::default())
    }

    pub fn service_with(
        pricing: PricingPolicy,
    ) -> (RentalService<Catalog, Requests, Events>, Arc<Events>) {
        let events = Arc::new(Events::default());
        let service = RentalService::new(
            Arc::new(Catalog(vec![kayak()])),
            Arc::new(Requests::default()),
            events.clone(),
            pricing,
        )
        .with_clock(now);
        (service, events)
    }

    pub fn submission(start: NaiveDate, duration: u32, unit: DurationUnit) -> RentalSubmission {
        RentalSubmission {
            product_id: ProductId("kayak-2".to_string()),
            renter_id: UserId("omar".to_string()),
            schedule: ScheduleStep {
                start_date: Some(start),
                duration: Some(duration),
                duration_unit: unit,
            },
            logistics: LogisticsStep {
                purpose: "Lake weekend".to_string(),
                pickup: Pickup::Delivery {
                    address: "4 Harbour Rd".to_string(),
                },
            },
        }
    }
}

use common::*;

#[test]
fn quoted_rental_runs_to_completion() {
    let (service, events) = service();

    let quote = service
        .quote(&kayak().id, 5, DurationUnit::Day)
        .expect("quote");
    assert_eq!(quote.base_cost, 500);
    assert_eq!(quote.renter_charge, 1500);

    let request = service
        .submit(submission(date(2025, 3, 20), 5, DurationUnit::Day))
        .expect("submission accepted");
    assert_eq!(request.renter_charge, quote.renter_charge);
    assert_eq!(request.end_date, date(2025, 3, 25));

    let lena = UserId("lena".to_string());
    let omar = UserId("omar".to_string());
    service
        .transition(&request.id, RentalAction::Approve, &lena, None)
        .expect("owner approves");
    let done = service
        .transition(&request.id, RentalAction::Complete, &omar, None)
        .expect("renter confirms return");

    assert_eq!(done.status(), RentalStatus::Completed);
    assert_eq!(replay(done.status_history()), Ok(RentalStatus::Completed));
    assert_eq!(
        done.status_history()
            .iter()
            .map(|change| change.actor)
            .collect::<Vec<_>>(),
        vec![Party::Renter, Party::Owner, Party::Renter]
    );
    assert_eq!(events.0.lock().expect("mutex").len(), 3);
}

#[test]
fn monthly_rentals_span_calendar_months() {
    let (service, _) = service();

    let request = service
        .submit(submission(date(2025, 5, 31), 1, DurationUnit::Month))
        .expect("monthly rental accepted");

    assert_eq!(request.end_date, date(2025, 6, 30));
    assert_eq!(request.base_cost, 1800);
    assert_eq!(request.service_fee, 90);
    assert_eq!(request.owner_payout, 1710);
}

#[test]
fn blocked_dates_and_long_rentals_are_refused() {
    let (service, _) = service();

    match service.submit(submission(date(2025, 3, 14), 2, DurationUnit::Day)) {
        Err(RentalServiceError::Validation(errors)) => {
            assert_eq!(
                errors.get("startDate"),
                Some(&["Selected dates overlap an unavailable date (2025-03-15)".to_string()][..])
            );
        }
        other => panic!("expected a conflict, got {other:?}"),
    }

    match service.submit(submission(date(2025, 5, 1), 31, DurationUnit::Day)) {
        Err(RentalServiceError::Validation(errors)) => assert!(errors.contains("duration")),
        other => panic!("expected a max-period error, got {other:?}"),
    }
}

#[test]
fn rejected_requests_stay_rejected() {
    let (service, _) = service();
    let request = service
        .submit(submission(date(2025, 3, 20), 2, DurationUnit::Day))
        .expect("submitted");
    let lena = UserId("lena".to_string());

    service
        .transition(&request.id, RentalAction::Reject, &lena, None)
        .expect("owner rejects");

    assert!(matches!(
        service.transition(&request.id, RentalAction::Approve, &lena, None),
        Err(RentalServiceError::Transition(_))
    ));
}

#[test]
fn imported_calendars_drive_conflict_checks() {
    let csv = "date,range_start,range_end\n2025-06-15,,\n,2025-06-10,2025-06-12\n";
    let calendar = CalendarImporter::from_reader(csv.as_bytes()).expect("calendar imports");

    assert!(check_conflict(date(2025, 6, 14), 2, DurationUnit::Day, calendar.entries()));
    assert!(check_conflict(date(2025, 6, 11), 1, DurationUnit::Day, calendar.entries()));
    assert!(!check_conflict(date(2025, 6, 13), 1, DurationUnit::Day, calendar.entries()));
}

#[test]
fn default_pricing_matches_the_service_quote() {
    let (service, _) = service();
    assert_eq!(
        compute_pricing(service.pricing(), &kayak(), 4, DurationUnit::Day),
        service
            .quote(&kayak().id, 4, DurationUnit::Day)
            .expect("quote")
    );
}

#[test]
fn configured_fee_rate_applies_to_every_pricing_path() {
    let policy = PricingPolicy::from(&PricingConfig {
        service_fee_bps: 800,
    });
    let (service, _) = service_with(policy);

    let direct = compute_pricing(&policy, &kayak(), 5, DurationUnit::Day);
    assert_eq!(direct.service_fee, 40);
    assert_eq!(direct.owner_payout, 460);
    assert_eq!(policy.compute_pricing(&kayak(), 5, DurationUnit::Day), direct);

    let quote = service
        .quote(&kayak().id, 5, DurationUnit::Day)
        .expect("quote");
    assert_eq!(quote, direct);

    let request = service
        .submit(submission(date(2025, 3, 20), 5, DurationUnit::Day))
        .expect("submission accepted");
    assert_eq!(request.service_fee, 40);
    assert_eq!(request.owner_payout, 460);
    assert_eq!(request.renter_charge, direct.renter_charge);
}

#[tokio::test]
async fn http_flow_submits_and_transitions() {
    let (service, _) = service();
    let router = rental_router(Arc::new(service));

    let payload = json!({
        "productId": "kayak-2",
        "renterId": "omar",
        "startDate": "2025-03-20",
        "duration": 2,
        "durationUnit": "day",
        "purpose": "Lake weekend",
        "pickup": { "method": "self_pickup" }
    });
    let response = router
        .clone()
        .oneshot(
            Request::post("/api/v1/rentals")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .expect("request"),
        )
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = serde_json::from_slice(
        &axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("body"),
    )
    .expect("json");
    let rental_id = body["rental_id"].as_str().expect("id").to_string();

    let response = router
        .oneshot(
            Request::post(format!("/api/v1/rentals/{rental_id}/transitions"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "action": "cancel", "userId": "lena" }).to_string(),
                ))
                .expect("request"),
        )
        .await
        .expect("router responds");

    // Owners may only cancel once a request is approved.
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
