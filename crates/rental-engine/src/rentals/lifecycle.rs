//! Rental request state machine.
//!
//! | from     | action   | actor          | to        |
//! |----------|----------|----------------|-----------|
//! | pending  | approve  | owner          | approved  |
//! | pending  | reject   | owner          | rejected  |
//! | pending  | cancel   | renter         | cancelled |
//! | approved | cancel   | either         | cancelled |
//! | approved | complete | either         | completed |
//!
//! Terminal statuses accept nothing. Every accepted transition appends one
//! [`StatusChange`] and bumps the request version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::domain::{Party, RentalRequest, RentalRequestId, RentalStatus, StatusChange, UserId};
use super::validation::ValidatedRental;

/// Actions a party can take on a rental request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RentalAction {
    Approve,
    Reject,
    Cancel,
    /// Also reached as `confirm_return` once the product is handed back.
    #[serde(alias = "confirm_return")]
    Complete,
}

impl RentalAction {
    pub const fn label(self) -> &'static str {
        match self {
            RentalAction::Approve => "approve",
            RentalAction::Reject => "reject",
            RentalAction::Cancel => "cancel",
            RentalAction::Complete => "complete",
        }
    }

    /// The action that moves `from` to `to`, if the table has one.
    pub fn between(from: RentalStatus, to: RentalStatus) -> Option<Self> {
        use RentalStatus::*;
        match (from, to) {
            (Pending, Approved) => Some(RentalAction::Approve),
            (Pending, Rejected) => Some(RentalAction::Reject),
            (Pending, Cancelled) | (Approved, Cancelled) => Some(RentalAction::Cancel),
            (Approved, Completed) => Some(RentalAction::Complete),
            _ => None,
        }
    }
}

/// Why a transition was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionRejection {
    TerminalState,
    ActionNotAvailable,
    ActorNotPermitted,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("invalid transition: cannot {action:?} a {from:?} rental as {actor:?} ({reason:?})")]
    InvalidTransition {
        from: RentalStatus,
        action: RentalAction,
        actor: Party,
        reason: TransitionRejection,
    },
    #[error("status history is empty or does not start in pending")]
    MissingInitialStatus,
}

/// Status reached by `action` from `from` when performed by `actor`.
pub fn next_status(
    from: RentalStatus,
    action: RentalAction,
    actor: Party,
) -> Result<RentalStatus, TransitionRejection> {
    use RentalStatus::*;

    if from.is_terminal() {
        return Err(TransitionRejection::TerminalState);
    }

    let (to, permitted) = match (from, action) {
        (Pending, RentalAction::Approve) => (Approved, actor == Party::Owner),
        (Pending, RentalAction::Reject) => (Rejected, actor == Party::Owner),
        (Pending, RentalAction::Cancel) => (Cancelled, actor == Party::Renter),
        (Approved, RentalAction::Cancel) => (Cancelled, true),
        (Approved, RentalAction::Complete) => (Completed, true),
        _ => return Err(TransitionRejection::ActionNotAvailable),
    };

    if permitted {
        Ok(to)
    } else {
        Err(TransitionRejection::ActorNotPermitted)
    }
}

impl RentalRequest {
    /// Create a request in `pending` from a fully validated draft.
    pub fn create(
        id: RentalRequestId,
        renter: UserId,
        validated: ValidatedRental,
        at: DateTime<Utc>,
    ) -> Self {
        let ValidatedRental {
            product,
            owner,
            start_date,
            end_date,
            duration,
            duration_unit,
            purpose,
            pickup,
            pricing,
        } = validated;

        Self {
            id,
            product,
            renter,
            owner,
            start_date,
            end_date,
            duration,
            duration_unit,
            purpose,
            pickup,
            base_cost: pricing.base_cost,
            service_fee: pricing.service_fee,
            security_deposit: pricing.security_deposit,
            renter_charge: pricing.renter_charge,
            owner_payout: pricing.owner_payout,
            status: RentalStatus::Pending,
            status_history: vec![StatusChange {
                status: RentalStatus::Pending,
                at,
                actor: Party::Renter,
                note: None,
            }],
            version: 0,
        }
    }

    /// Apply `action` on behalf of `actor`, appending to the status history.
    pub fn transition(
        &mut self,
        action: RentalAction,
        actor: Party,
        at: DateTime<Utc>,
        note: Option<String>,
    ) -> Result<RentalStatus, TransitionError> {
        let from = self.status;
        let to = next_status(from, action, actor).map_err(|reason| {
            error!(
                rental_id = %self.id,
                from = from.label(),
                action = action.label(),
                actor = actor.label(),
                ?reason,
                "rejected rental status transition"
            );
            TransitionError::InvalidTransition {
                from,
                action,
                actor,
                reason,
            }
        })?;

        self.status = to;
        self.status_history.push(StatusChange {
            status: to,
            at,
            actor,
            note,
        });
        self.version += 1;

        info!(
            rental_id = %self.id,
            from = from.label(),
            to = to.label(),
            actor = actor.label(),
            "rental status changed"
        );

        Ok(to)
    }
}

/// Consuming form of [`RentalRequest::transition`].
pub fn transition(
    mut request: RentalRequest,
    action: RentalAction,
    actor: Party,
    at: DateTime<Utc>,
) -> Result<RentalRequest, TransitionError> {
    request.transition(action, actor, at, None)?;
    Ok(request)
}

/// Walk `history` through the state machine and return the status it ends in.
pub fn replay(history: &[StatusChange]) -> Result<RentalStatus, TransitionError> {
    let (first, rest) = history
        .split_first()
        .ok_or(TransitionError::MissingInitialStatus)?;
    if first.status != RentalStatus::Pending {
        return Err(TransitionError::MissingInitialStatus);
    }

    rest.iter().try_fold(RentalStatus::Pending, |current, change| {
        let invalid = |action: RentalAction, reason: TransitionRejection| {
            TransitionError::InvalidTransition {
                from: current,
                action,
                actor: change.actor,
                reason,
            }
        };
        let action = RentalAction::between(current, change.status).ok_or_else(|| {
            // No action links the two statuses; report the one the entry claims to reach.
            let claimed = match change.status {
                RentalStatus::Approved => RentalAction::Approve,
                RentalStatus::Rejected => RentalAction::Reject,
                RentalStatus::Completed => RentalAction::Complete,
                RentalStatus::Cancelled | RentalStatus::Pending => RentalAction::Cancel,
            };
            let reason = if current.is_terminal() {
                TransitionRejection::TerminalState
            } else {
                TransitionRejection::ActionNotAvailable
            };
            invalid(claimed, reason)
        })?;
        next_status(current, action, change.actor).map_err(|reason| invalid(action, reason))
    })
}
