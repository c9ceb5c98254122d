//! Shared types for the network speed test.
//!
//! This crate contains:
//! - **Protocol messages** - JSON messages exchanged over the session WebSocket
//! - **Result models** - latency and upload results returned to clients
//! - **Statistics** - throughput formula, latency aggregation, rounding
//! - **Ratings** - qualitative tiers for throughput and latency figures

pub mod models;
pub mod protocol;
pub mod rating;
pub mod stats;
