//! Rental engine: availability checks, tiered pricing, and the rental request lifecycle.
//!
//! The core modules under [`rentals`] are synchronous and free of I/O. Storage, product
//! lookup, and event delivery are reached through the traits in
//! [`rentals::repository`] so the HTTP service can plug in its own adapters.

pub mod config;
pub mod error;
pub mod rentals;
pub mod telemetry;
