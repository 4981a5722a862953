//! HTTP application wiring (axum router + built-in endpoints).
//!
//! - `routes/`: binds registry entries to axum routes
//! - `builtins/`: endpoints every server carries (index, run mode, files, logs)
//! - `request.rs`: query/body extraction into request parameters
//! - `errors.rs`: outcome and envelope responses

pub mod builtins;
pub mod errors;
pub mod request;
pub mod routes;
