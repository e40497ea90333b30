//! HTTP gateway adapter.
//!
//! A thin reqwest implementation of the `Gateway` port using a single
//! bearer-token transport.

mod dto;
mod http_gateway;

pub use http_gateway::HttpGateway;
