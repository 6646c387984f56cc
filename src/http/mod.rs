//! HTTP server module.
//!
//! Serves the probe router over plain HTTP; TLS is terminated by the load
//! balancer in front of it. The server includes:
//! - Peer address capture for the `ip_cliente` fallback
//! - Graceful shutdown on SIGTERM/SIGINT

mod server;
mod shutdown;

pub use server::{start_server, ServerError};
