//! HTTP API: router, request scope extraction and error mapping.

pub mod app;
pub mod context;
pub mod middleware;
