use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    DurationUnit, Party, Pickup, Product, ProductId, RentalRequest, RentalRequestId,
    RentalStatus, StatusChange, UserId,
};

/// Read access to listings; listing storage itself lives outside the engine.
pub trait ProductCatalog: Send + Sync {
    fn fetch(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError>;
}

/// Storage abstraction for rental requests.
///
/// `update` must compare `expected_version` with the stored version and refuse the write
/// on mismatch, so two concurrent transitions on one request can never both succeed.
pub trait RentalRequestRepository: Send + Sync {
    fn insert(&self, request: RentalRequest) -> Result<RentalRequest, RepositoryError>;
    fn update(&self, request: RentalRequest, expected_version: u64)
        -> Result<(), RepositoryError>;
    fn fetch(&self, id: &RentalRequestId) -> Result<Option<RentalRequest>, RepositoryError>;
}

/// Error enumeration for storage failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("stale write: expected version {expected}, stored version is {found}")]
    VersionConflict { expected: u64, found: u64 },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound hook fired after a request is created or changes status.
pub trait StatusEventPublisher: Send + Sync {
    fn publish(&self, event: RentalStatusEvent) -> Result<(), PublishError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalStatusEvent {
    pub rental_id: RentalRequestId,
    pub product: ProductId,
    pub status: RentalStatus,
    pub actor: Party,
    pub at: DateTime<Utc>,
    /// The other party, who should hear about the change.
    pub notify: UserId,
}

impl RentalStatusEvent {
    pub(crate) fn from_change(request: &RentalRequest, change: &StatusChange) -> Self {
        let notify = match change.actor {
            Party::Renter => request.owner.clone(),
            Party::Owner => request.renter.clone(),
        };

        Self {
            rental_id: request.id.clone(),
            product: request.product.clone(),
            status: change.status,
            actor: change.actor,
            at: change.at,
            notify,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("event transport unavailable: {0}")]
    Transport(String),
}

/// Sanitized representation of a rental request for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct RentalRequestView {
    pub rental_id: RentalRequestId,
    pub product: ProductId,
    pub renter: UserId,
    pub owner: UserId,
    pub status: &'static str,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub duration: u32,
    pub duration_unit: DurationUnit,
    pub pickup: Pickup,
    pub base_cost: u64,
    pub service_fee: u64,
    pub security_deposit: u64,
    pub renter_charge: u64,
    pub owner_payout: u64,
    pub status_history: Vec<StatusChange>,
    pub version: u64,
}

impl RentalRequest {
    pub fn view(&self) -> RentalRequestView {
        RentalRequestView {
            rental_id: self.id.clone(),
            product: self.product.clone(),
            renter: self.renter.clone(),
            owner: self.owner.clone(),
            status: self.status.label(),
            start_date: self.start_date,
            end_date: self.end_date,
            duration: self.duration,
            duration_unit: self.duration_unit,
            pickup: self.pickup.clone(),
            base_cost: self.base_cost,
            service_fee: self.service_fee,
            security_deposit: self.security_deposit,
            renter_charge: self.renter_charge,
            owner_payout: self.owner_payout,
            status_history: self.status_history.clone(),
            version: self.version,
        }
    }
}
