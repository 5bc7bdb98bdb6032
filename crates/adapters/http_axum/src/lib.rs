//! # climacal-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve a small JSON API for operators (`/api/status`, `/api/flag`,
//!   `/api/bindings`, `/api/slots`, ...)
//! - Stream notifications as Server-Sent Events
//! - Map HTTP requests into coordinator calls (driving adapter)
//!
//! ## Dependency rule
//! Depends on `climacal-app` (for the coordinator and port traits) and
//! `climacal-domain` (for request/response types). Never leaks axum types
//! into the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;

#[cfg(test)]
mod test_support;
