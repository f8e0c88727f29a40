//! HTTP API layer for pollbooth.
//!
//! JSON RPC over HTTP: every endpoint is a `POST` taking a JSON body.
//!
//! - **Endpoints**: poll management, voting and results under `/polls`
//! - **Extractors**: authenticated and optional user
//! - **Middleware**: bearer-token authentication
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::router;
