//! Kaakazini core library.
//!
//! Client-side core of a craftsman marketplace: session handling, the role
//! based access policy, the job request lifecycle and payment settlement.
//! The authoritative back end is reached through the [`domain::ports::Gateway`]
//! port; [`outbound`] provides HTTP and in-memory implementations.

pub mod config;
pub mod domain;
pub mod outbound;
pub mod services;
pub mod telemetry;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use config::CoreSettings;
pub use services::{CoreServices, WiringError};
