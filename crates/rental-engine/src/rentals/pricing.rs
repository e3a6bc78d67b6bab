use serde::{Deserialize, Serialize};
use tracing::error;

use super::domain::{DurationUnit, PricingTier, Product};
use crate::config::PricingConfig;

/// Platform service fee when nothing is configured: 5% of the base cost.
pub const DEFAULT_SERVICE_FEE_BPS: u32 = 500;

const BASIS_POINTS: u64 = 10_000;

/// Tier used when a product has no tier for the requested unit. Reaching it means the
/// listing data is broken; it is logged and flagged, never treated as a normal quote.
pub const FALLBACK_TIER: PricingTier = PricingTier {
    duration_unit: DurationUnit::Day,
    price: 0,
    max_period: Some(30),
};

/// Whether the quoted tier came from the product or from [`FALLBACK_TIER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierMatch {
    Exact,
    Fallback,
}

/// Cost breakdown for one rental. The service fee comes out of the owner's payout and is
/// not part of the renter charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingBreakdown {
    pub tier: PricingTier,
    pub tier_match: TierMatch,
    pub duration: u32,
    pub base_cost: u64,
    pub service_fee: u64,
    pub security_deposit: u64,
    pub renter_charge: u64,
    pub owner_payout: u64,
}

/// Holds the single platform-wide service fee rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingPolicy {
    service_fee_bps: u32,
}

impl PricingPolicy {
    pub fn new(service_fee_bps: u32) -> Self {
        Self {
            service_fee_bps: service_fee_bps.min(BASIS_POINTS as u32),
        }
    }

    pub fn service_fee_bps(&self) -> u32 {
        self.service_fee_bps
    }

    /// Fee on `base_cost`, rounded half-up to a whole unit.
    pub fn service_fee_for(&self, base_cost: u64) -> u64 {
        let scaled = u128::from(base_cost) * u128::from(self.service_fee_bps);
        let rounded = (scaled + u128::from(BASIS_POINTS / 2)) / u128::from(BASIS_POINTS);
        rounded.min(u128::from(u64::MAX)) as u64
    }

    /// Select the tier for `unit` and price `duration` units of `product`.
    pub fn compute_pricing(
        &self,
        product: &Product,
        duration: u32,
        unit: DurationUnit,
    ) -> PricingBreakdown {
        let (tier, tier_match) = select_tier(product, unit);

        let base_cost = tier.price.saturating_mul(u64::from(duration));
        let service_fee = self.service_fee_for(base_cost);
        let security_deposit = product.security_deposit;

        PricingBreakdown {
            tier,
            tier_match,
            duration,
            base_cost,
            service_fee,
            security_deposit,
            renter_charge: base_cost.saturating_add(security_deposit),
            owner_payout: base_cost.saturating_sub(service_fee),
        }
    }
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE_FEE_BPS)
    }
}

impl From<&PricingConfig> for PricingPolicy {
    fn from(config: &PricingConfig) -> Self {
        Self::new(config.service_fee_bps)
    }
}

/// Price a rental under `policy`; callers pass the policy built from [`PricingConfig`].
pub fn compute_pricing(
    policy: &PricingPolicy,
    product: &Product,
    duration: u32,
    unit: DurationUnit,
) -> PricingBreakdown {
    policy.compute_pricing(product, duration, unit)
}

fn select_tier(product: &Product, unit: DurationUnit) -> (PricingTier, TierMatch) {
    match product.tier_for(unit) {
        Some(tier) => (tier.clone(), TierMatch::Exact),
        None => {
            error!(
                product_id = %product.id,
                requested_unit = unit.label(),
                "product has no pricing tier for requested unit; quoting fallback tier"
            );
            (FALLBACK_TIER, TierMatch::Fallback)
        }
    }
}
