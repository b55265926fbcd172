//! HTTP layer for the chart repository server.
//!
//! Provides the axum-based server that accepts chart uploads, serves charts
//! through the cache consistency resolver, and exposes health and metrics
//! endpoints.

pub mod handler;
