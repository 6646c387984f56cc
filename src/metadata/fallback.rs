//! Private address fallback via local name resolution.

use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::config::PLACEHOLDER_UNKNOWN;

/// Resolve the local host name to an address, preferring IPv4.
///
/// Returns the placeholder when the host name is unreadable, does not
/// resolve, or the lookup takes longer than `timeout`.
pub async fn fallback_private_address(timeout: Duration) -> String {
    let host = match hostname::get() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(e) => {
            tracing::debug!(error = %e, "Failed to read local host name");
            return PLACEHOLDER_UNKNOWN.to_string();
        }
    };

    match resolve_host(&host, timeout).await {
        Some(ip) => ip.to_string(),
        None => PLACEHOLDER_UNKNOWN.to_string(),
    }
}

/// Resolve `host` with the system resolver, preferring the first IPv4 result.
pub async fn resolve_host(host: &str, timeout: Duration) -> Option<IpAddr> {
    if host.is_empty() {
        return None;
    }

    // lookup_host needs a port; it is discarded
    let addrs = bounded_lookup(host, tokio::net::lookup_host((host, 0)), timeout).await?;

    addrs
        .iter()
        .copied()
        .find(IpAddr::is_ipv4)
        .or_else(|| addrs.first().copied())
}

/// Await a resolver future for at most `timeout`.
async fn bounded_lookup<F, I>(host: &str, lookup: F, timeout: Duration) -> Option<Vec<IpAddr>>
where
    F: Future<Output = io::Result<I>>,
    I: Iterator<Item = SocketAddr>,
{
    match tokio::time::timeout(timeout, lookup).await {
        Ok(Ok(addrs)) => Some(addrs.map(|addr| addr.ip()).collect()),
        Ok(Err(e)) => {
            tracing::debug!(host, error = %e, "Local host name did not resolve");
            None
        }
        Err(_) => {
            tracing::debug!(
                host,
                timeout_ms = timeout.as_millis() as u64,
                "Local host name lookup timed out"
            );
            None
        }
    }
}
