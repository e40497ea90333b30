//! Outbound adapters implementing domain ports.
//!
//! - **http**: reqwest-backed gateway speaking bearer-authenticated JSON
//! - **memory**: authoritative in-process gateway for offline use and tests
//! - **credentials**: session credential slots (in memory or on disk)
//!
//! Adapters translate between domain types and transport representations.
//! They contain no business logic beyond what the gateway contract requires.

pub mod credentials;
pub mod http;
pub mod memory;
