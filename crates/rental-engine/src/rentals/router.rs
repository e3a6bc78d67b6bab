use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::{DurationUnit, ProductId, RentalRequestId, UserId};
use super::lifecycle::{RentalAction, TransitionError};
use super::repository::{
    ProductCatalog, RentalRequestRepository, RepositoryError, StatusEventPublisher,
};
use super::service::{RentalService, RentalServiceError, RentalSubmission};
use super::validation::{LogisticsStep, ScheduleStep, StepInput};

type SharedService<P, R, E> = Arc<RentalService<P, R, E>>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AvailabilityRequest {
    pub(crate) product_id: ProductId,
    pub(crate) start_date: NaiveDate,
    pub(crate) duration: u32,
    pub(crate) duration_unit: DurationUnit,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuoteRequest {
    pub(crate) product_id: ProductId,
    pub(crate) duration: u32,
    pub(crate) duration_unit: DurationUnit,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StepValidationRequest {
    pub(crate) product_id: ProductId,
    #[serde(default)]
    pub(crate) form: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TransitionRequest {
    pub(crate) action: RentalAction,
    pub(crate) user_id: UserId,
    #[serde(default)]
    pub(crate) note: Option<String>,
}

/// Router builder exposing availability, pricing, validation, and lifecycle endpoints.
pub fn rental_router<P, R, E>(service: SharedService<P, R, E>) -> Router
where
    P: ProductCatalog + 'static,
    R: RentalRequestRepository + 'static,
    E: StatusEventPublisher + 'static,
{
    Router::new()
        .route(
            "/api/v1/rentals/availability",
            post(availability_handler::<P, R, E>),
        )
        .route("/api/v1/rentals/quote", post(quote_handler::<P, R, E>))
        .route(
            "/api/v1/rentals/validate/:step",
            post(validate_step_handler::<P, R, E>),
        )
        .route("/api/v1/rentals", post(submit_handler::<P, R, E>))
        .route("/api/v1/rentals/:rental_id", get(status_handler::<P, R, E>))
        .route(
            "/api/v1/rentals/:rental_id/transitions",
            post(transition_handler::<P, R, E>),
        )
        .with_state(service)
}

pub(crate) async fn availability_handler<P, R, E>(
    State(service): State<SharedService<P, R, E>>,
    axum::Json(request): axum::Json<AvailabilityRequest>,
) -> Response
where
    P: ProductCatalog + 'static,
    R: RentalRequestRepository + 'static,
    E: StatusEventPublisher + 'static,
{
    match service.check_availability(
        &request.product_id,
        request.start_date,
        request.duration,
        request.duration_unit,
    ) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(err) => failure_response(err),
    }
}

pub(crate) async fn quote_handler<P, R, E>(
    State(service): State<SharedService<P, R, E>>,
    axum::Json(request): axum::Json<QuoteRequest>,
) -> Response
where
    P: ProductCatalog + 'static,
    R: RentalRequestRepository + 'static,
    E: StatusEventPublisher + 'static,
{
    match service.quote(&request.product_id, request.duration, request.duration_unit) {
        Ok(breakdown) => (StatusCode::OK, axum::Json(breakdown)).into_response(),
        Err(err) => failure_response(err),
    }
}

pub(crate) async fn validate_step_handler<P, R, E>(
    State(service): State<SharedService<P, R, E>>,
    Path(step): Path<u8>,
    axum::Json(request): axum::Json<StepValidationRequest>,
) -> Response
where
    P: ProductCatalog + 'static,
    R: RentalRequestRepository + 'static,
    E: StatusEventPublisher + 'static,
{
    let input = match parse_step(step, request.form) {
        Ok(input) => input,
        Err(message) => {
            let payload = json!({ "error": message });
            return (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response();
        }
    };

    match service.validate_step(&request.product_id, &input) {
        Ok(errors) => {
            let payload = json!({
                "step": input.step_number(),
                "valid": errors.is_empty(),
                "errors": errors,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => failure_response(err),
    }
}

pub(crate) async fn submit_handler<P, R, E>(
    State(service): State<SharedService<P, R, E>>,
    axum::Json(submission): axum::Json<RentalSubmission>,
) -> Response
where
    P: ProductCatalog + 'static,
    R: RentalRequestRepository + 'static,
    E: StatusEventPublisher + 'static,
{
    match service.submit(submission) {
        Ok(request) => (StatusCode::CREATED, axum::Json(request.view())).into_response(),
        Err(err) => failure_response(err),
    }
}

pub(crate) async fn status_handler<P, R, E>(
    State(service): State<SharedService<P, R, E>>,
    Path(rental_id): Path<String>,
) -> Response
where
    P: ProductCatalog + 'static,
    R: RentalRequestRepository + 'static,
    E: StatusEventPublisher + 'static,
{
    match service.get(&RentalRequestId(rental_id)) {
        Ok(request) => (StatusCode::OK, axum::Json(request.view())).into_response(),
        Err(err) => failure_response(err),
    }
}

pub(crate) async fn transition_handler<P, R, E>(
    State(service): State<SharedService<P, R, E>>,
    Path(rental_id): Path<String>,
    axum::Json(request): axum::Json<TransitionRequest>,
) -> Response
where
    P: ProductCatalog + 'static,
    R: RentalRequestRepository + 'static,
    E: StatusEventPublisher + 'static,
{
    let id = RentalRequestId(rental_id);
    match service.transition(&id, request.action, &request.user_id, request.note) {
        Ok(updated) => (StatusCode::OK, axum::Json(updated.view())).into_response(),
        Err(err) => failure_response(err),
    }
}

fn parse_step(step: u8, form: serde_json::Value) -> Result<StepInput, String> {
    match step {
        1 => serde_json::from_value::<ScheduleStep>(form)
            .map(StepInput::Schedule)
            .map_err(|err| format!("invalid schedule form: {err}")),
        2 => Ok(StepInput::Review),
        3 => serde_json::from_value::<LogisticsStep>(form)
            .map(StepInput::Logistics)
            .map_err(|err| format!("invalid logistics form: {err}")),
        other => Err(format!("unknown rental form step {other}")),
    }
}

fn failure_response(err: RentalServiceError) -> Response {
    let (status, payload) = match &err {
        RentalServiceError::Validation(errors) => {
            (StatusCode::UNPROCESSABLE_ENTITY, json!({ "errors": errors }))
        }
        RentalServiceError::ProductNotFound(_)
        | RentalServiceError::Repository(RepositoryError::NotFound) => {
            (StatusCode::NOT_FOUND, json!({ "error": err.to_string() }))
        }
        RentalServiceError::NotAParty { .. } => {
            (StatusCode::FORBIDDEN, json!({ "error": err.to_string() }))
        }
        RentalServiceError::Transition(TransitionError::InvalidTransition { reason, .. }) => (
            StatusCode::CONFLICT,
            json!({ "error": "invalid_transition", "reason": reason }),
        ),
        RentalServiceError::Repository(RepositoryError::VersionConflict { .. }) => (
            StatusCode::CONFLICT,
            json!({ "error": "rental was modified concurrently; reload and retry" }),
        ),
        RentalServiceError::Repository(RepositoryError::Conflict) => (
            StatusCode::CONFLICT,
            json!({ "error": "rental already exists" }),
        ),
        RentalServiceError::Transition(TransitionError::MissingInitialStatus)
        | RentalServiceError::Repository(RepositoryError::Unavailable(_)) => {
            error!(%err, "rental request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": err.to_string() }),
            )
        }
    };

    (status, axum::Json(payload)).into_response()
}
