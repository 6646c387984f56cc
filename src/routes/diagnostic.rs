//! Diagnostic root endpoint.
//!
//! Reports how the request reached the instance (host, scheme, client
//! address as seen through the load balancer) together with the instance's
//! own network identity. Every piece of instance data has a placeholder, so
//! the handler always renders a complete payload.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header::HOST, HeaderMap, Method, Uri};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{
    BRT_OFFSET_HOURS, BRT_TIME_FORMAT, DEFAULT_SCHEME, PLACEHOLDER_UNKNOWN, PROBE_VERSION,
    UTC_TIME_FORMAT,
};
use crate::metadata::{InstanceFacts, ResolvedFacts};
use crate::state::AppState;

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_FORWARDED_HOST: &str = "x-forwarded-host";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// What the probe knows about the inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub host: String,
    pub scheme: String,
    pub method: String,
    pub path: String,
    pub client_ip: Option<String>,
}

impl RequestContext {
    /// Build the context from a request, reading the peer address from
    /// `ConnectInfo` when the server provides it.
    pub fn from_request(request: &Request) -> Self {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Self::from_parts(request.headers(), request.uri(), request.method(), peer)
    }

    /// Build the context, preferring proxy-forwarded headers over raw values.
    pub fn from_parts(
        headers: &HeaderMap,
        uri: &Uri,
        method: &Method,
        peer: Option<SocketAddr>,
    ) -> Self {
        let host = header_str(headers, X_FORWARDED_HOST)
            .or_else(|| header_str(headers, HOST.as_str()))
            .or_else(|| uri.host().map(str::to_string))
            .unwrap_or_else(|| PLACEHOLDER_UNKNOWN.to_string());

        let scheme = header_str(headers, X_FORWARDED_PROTO)
            .or_else(|| uri.scheme_str().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_SCHEME.to_string());

        let client_ip = header_str(headers, X_FORWARDED_FOR)
            .or_else(|| peer.map(|addr| addr.ip().to_string()));

        Self {
            host,
            scheme,
            method: method.as_str().to_string(),
            path: uri.path().to_string(),
            client_ip,
        }
    }
}

/// Non-empty header value as text; unreadable values count as absent.
fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// `acesso` section of the payload.
#[derive(Debug, Clone, Serialize)]
pub struct AccessInfo {
    pub dns_usado: String,
    pub esquema: String,
    pub metodo: String,
    pub path: String,
    pub ip_cliente: Option<String>,
}

impl From<RequestContext> for AccessInfo {
    fn from(context: RequestContext) -> Self {
        Self {
            dns_usado: context.host,
            esquema: context.scheme,
            metodo: context.method,
            path: context.path,
            ip_cliente: context.client_ip,
        }
    }
}

/// `instancia` section of the payload.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceInfo {
    pub ip_publico_vm: String,
    pub ip_privado_vm: String,
    pub instance_id: String,
    pub availability_zone: String,
}

impl From<ResolvedFacts> for InstanceInfo {
    fn from(facts: ResolvedFacts) -> Self {
        Self {
            ip_publico_vm: facts.public_ip,
            ip_privado_vm: facts.private_ip,
            instance_id: facts.instance_id,
            availability_zone: facts.availability_zone,
        }
    }
}

/// Full JSON body of the root endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticPayload {
    pub ok: bool,
    pub mensagem: String,
    pub acesso: AccessInfo,
    pub instancia: InstanceInfo,
    pub ping_ms: f64,
    pub server_time_utc: String,
    pub server_time_brt: String,
    pub version: String,
}

impl DiagnosticPayload {
    /// Assemble the payload. Both timestamps come from the same `now`.
    pub fn assemble(
        message: &str,
        context: RequestContext,
        facts: ResolvedFacts,
        elapsed: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            ok: true,
            mensagem: message.to_string(),
            acesso: context.into(),
            instancia: facts.into(),
            ping_ms: round_ms(elapsed),
            server_time_utc: format_utc(now),
            server_time_brt: format_brt(now),
            version: PROBE_VERSION.to_string(),
        }
    }
}

/// Milliseconds rounded to two decimal places.
pub fn round_ms(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 100_000.0).round() / 100.0
}

/// ISO 8601 with microseconds and a literal `Z`.
pub fn format_utc(now: DateTime<Utc>) -> String {
    format!("{}Z", now.format(UTC_TIME_FORMAT))
}

/// Wall-clock time at a fixed UTC-3 offset. No daylight saving is applied.
pub fn format_brt(now: DateTime<Utc>) -> String {
    let shifted = now.naive_utc() - chrono::Duration::hours(i64::from(BRT_OFFSET_HOURS));
    shifted.format(BRT_TIME_FORMAT).to_string()
}

/// `/` for any method: request metadata plus instance identity.
pub async fn root(State(state): State<AppState>, request: Request) -> Json<DiagnosticPayload> {
    let start = Instant::now();
    let context = RequestContext::from_request(&request);

    let facts = InstanceFacts::gather(state.metadata.as_ref(), state.config.metadata.parallel)
        .await
        .resolve(Duration::from_millis(state.config.metadata.timeout_ms))
        .await;

    tracing::debug!(
        host = %context.host,
        client_ip = ?context.client_ip,
        instance_id = %facts.instance_id,
        availability_zone = %facts.availability_zone,
        "Assembled diagnostic payload"
    );

    Json(DiagnosticPayload::assemble(
        &state.config.probe.message,
        context,
        facts,
        start.elapsed(),
        Utc::now(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use chrono::TimeZone;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(*value));
        }
        map
    }

    fn peer() -> Option<SocketAddr> {
        Some("10.1.2.3:51234".parse().unwrap())
    }

    #[test]
    fn test_context_raw_values() {
        let uri: Uri = "/".parse().unwrap();
        let context = RequestContext::from_parts(
            &headers(&[("host", "probe.internal:8000")]),
            &uri,
            &Method::GET,
            peer(),
        );

        assert_eq!(context.host, "probe.internal:8000");
        assert_eq!(context.scheme, "http");
        assert_eq!(context.method, "GET");
        assert_eq!(context.path, "/");
        assert_eq!(context.client_ip.as_deref(), Some("10.1.2.3"));
    }

    #[test]
    fn test_context_prefers_forwarded_headers() {
        let uri: Uri = "/".parse().unwrap();
        let context = RequestContext::from_parts(
            &headers(&[
                ("host", "10.0.0.5:8000"),
                ("x-forwarded-host", "lb-123.sa-east-1.elb.amazonaws.com"),
                ("x-forwarded-proto", "https"),
                ("x-forwarded-for", "1.2.3.4, 10.0.0.9"),
            ]),
            &uri,
            &Method::POST,
            peer(),
        );

        assert_eq!(context.host, "lb-123.sa-east-1.elb.amazonaws.com");
        assert_eq!(context.scheme, "https");
        assert_eq!(context.method, "POST");
        assert_eq!(context.client_ip.as_deref(), Some("1.2.3.4, 10.0.0.9"));
    }

    #[test]
    fn test_context_absolute_uri_fallback() {
        let uri: Uri = "https://probe.example.com/".parse().unwrap();
        let context = RequestContext::from_parts(&HeaderMap::new(), &uri, &Method::GET, None);

        assert_eq!(context.host, "probe.example.com");
        assert_eq!(context.scheme, "https");
        assert_eq!(context.client_ip, None);
    }

    #[test]
    fn test_context_nothing_known() {
        let uri: Uri = "/".parse().unwrap();
        let context = RequestContext::from_parts(&HeaderMap::new(), &uri, &Method::HEAD, None);

        assert_eq!(context.host, PLACEHOLDER_UNKNOWN);
        assert_eq!(context.scheme, "http");
        assert_eq!(context.client_ip, None);
    }

    #[test]
    fn test_empty_forwarded_header_ignored() {
        let uri: Uri = "/".parse().unwrap();
        let context = RequestContext::from_parts(
            &headers(&[("x-forwarded-for", ""), ("host", "a.example")]),
            &uri,
            &Method::GET,
            peer(),
        );
        assert_eq!(context.client_ip.as_deref(), Some("10.1.2.3"));
    }

    #[test]
    fn test_round_ms() {
        assert_eq!(round_ms(Duration::ZERO), 0.0);
        assert_eq!(round_ms(Duration::from_micros(1_234_567)), 1234.57);
        assert_eq!(round_ms(Duration::from_nanos(4_999)), 0.0);
        assert_eq!(round_ms(Duration::from_millis(250)), 250.0);
    }

    #[test]
    fn test_format_utc() {
        let now = Utc.with_ymd_and_hms(2025, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(format_utc(now), "2025-03-09T14:05:07.000000Z");
    }

    #[test]
    fn test_format_brt_afternoon() {
        let now = Utc.with_ymd_and_hms(2025, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(format_brt(now), "09/03/2025 11:05:07 AM UTC-3");
    }

    #[test]
    fn test_format_brt_crosses_midnight() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 1, 30, 0).unwrap();
        assert_eq!(format_brt(now), "31/12/2024 10:30:00 PM UTC-3");
    }

    #[test]
    fn test_payload_serializes_all_keys() {
        let uri: Uri = "/".parse().unwrap();
        let context = RequestContext::from_parts(&HeaderMap::new(), &uri, &Method::GET, None);
        let facts = ResolvedFacts {
            public_ip: "indisponivel".to_string(),
            private_ip: "desconhecido".to_string(),
            instance_id: "desconhecido".to_string(),
            availability_zone: "desconhecida".to_string(),
        };
        let now = Utc.with_ymd_and_hms(2025, 3, 9, 14, 5, 7).unwrap();

        let payload =
            DiagnosticPayload::assemble("hello", context, facts, Duration::from_millis(3), now);
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["ok"], true);
        assert_eq!(json["mensagem"], "hello");
        assert!(json["acesso"]["ip_cliente"].is_null());
        assert_eq!(json["instancia"]["availability_zone"], "desconhecida");
        assert_eq!(json["ping_ms"], 3.0);
        assert_eq!(json["server_time_utc"], "2025-03-09T14:05:07.000000Z");
        assert_eq!(json["server_time_brt"], "09/03/2025 11:05:07 AM UTC-3");
        assert_eq!(json["version"], PROBE_VERSION);
    }
}
