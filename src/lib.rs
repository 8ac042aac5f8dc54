//! Vehicle Insurance Quote API Library
//!
//! Simulates a vehicle insurance quote: the vehicle's FIPE market value and the driver's
//! accident history are fetched from external providers, the driver is scored and
//! classified into a risk tier, and the requested coverages are priced.
//!
//! # Modules
//!
//! - `api`: API-layer namespace (HTTP handlers).
//! - `core`: Core business logic (pricing, simulation, models, errors).
//! - `integrations`: External data providers.
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP router and request handlers.
//! - `models`: Request, response and provider data models.
//! - `pricing`: Risk scoring and premium calculation.
//! - `services`: FIPE and accident history providers.
//! - `simulation`: Quote simulation workflow.

pub mod api;
pub mod core;
pub mod integrations;

// Re-export primary modules for shared use in tests and the binary
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod pricing;
pub mod services;
pub mod simulation;
