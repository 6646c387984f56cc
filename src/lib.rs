//! lb-probe: a health and diagnostic endpoint for instances behind a load balancer.
//!
//! Answers the balancer's liveness probe on `/healthz` and, on `/`, reports
//! how the request arrived together with the instance's network identity
//! taken from the cloud instance metadata service.

pub mod config;
pub mod error;
pub mod http;
pub mod metadata;
pub mod middleware;
pub mod routes;
pub mod state;

pub use error::AppError;
pub use routes::create_router;
pub use state::AppState;
