//! In-process gateway adapter.
//!
//! Provides an authoritative [`Gateway`](crate::domain::ports::Gateway) that
//! keeps all state in memory, for offline use and behaviour tests.

mod gateway;

pub use gateway::{DEFAULT_SESSION_TTL_MINUTES, InMemoryGateway};
