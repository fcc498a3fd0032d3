//! Request identity and enrichment.
//!
//! # Responsibilities
//! - Resolve the correlation id (caller supplied or generated)
//! - Resolve the client address behind proxies
//! - Collect the per-request context that every log line of the request carries
//!
//! # Design Decisions
//! - Context lives in the request's span plus a request extension; nothing
//!   is shared across requests
//! - Absent facts are left empty in the span rather than logged as placeholders

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, HeaderName, Request};
use serde::Serialize;
use tracing::field::Empty;
use tracing::Span;
use uuid::Uuid;

use crate::observability::tracing::extract_trace_ids;

pub const X_CORRELATION_ID: HeaderName = HeaderName::from_static("x-correlation-id");
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Correlation id of the current request, inserted by `CorrelationIdLayer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identity established by an upstream authentication layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: String,
}

/// Session established by an upstream session layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(pub String);

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Trimmed `X-Correlation-ID` when present and non-empty, else a fresh UUID v4.
pub fn resolve_correlation_id(headers: &HeaderMap) -> String {
    header_str(headers, &X_CORRELATION_ID)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// First `X-Forwarded-For` entry, then `X-Real-IP`, then the peer address.
pub fn resolve_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(first) = header_str(headers, &X_FORWARDED_FOR)
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return first.to_string();
    }
    if let Some(real) = header_str(headers, &X_REAL_IP) {
        return real.to_string();
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Facts about one inbound request, captured before the handler runs.
///
/// Each field is logged under its own snake_case name on the request span.
/// Dashboards built on the PascalCase log schema map as follows:
///
/// | PascalCase             | Logged as        |
/// |------------------------|------------------|
/// | `RequestId`            | `request_id`     |
/// | `CorrelationId`        | `correlation_id` |
/// | `RemoteIpAddress`      | `remote_ip`      |
/// | `StatusCode`           | `status_code`    |
/// | `ElapsedMilliseconds`  | `elapsed_ms`     |
/// | `ExceptionType`        | `failure_type`   |
/// | `ExceptionSource`      | `failure_origin` |
#[derive(Debug, Clone, Serialize)]
pub struct RequestContext {
    pub request_id: String,
    pub correlation_id: String,
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
    pub user_agent: Option<String>,
    pub remote_ip: String,
    pub protocol: String,
    pub method: String,
    pub scheme: String,
    pub host: String,
    pub path: String,
    pub query_string: Option<String>,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
}

impl RequestContext {
    pub fn from_request<B>(request: &Request<B>) -> Self {
        let headers = request.headers();
        let uri = request.uri();

        let correlation_id = request
            .extensions()
            .get::<CorrelationId>()
            .map(|c| c.0.clone())
            .unwrap_or_else(|| resolve_correlation_id(headers));
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let trace = extract_trace_ids(headers);

        let scheme = header_str(headers, &X_FORWARDED_PROTO)
            .map(str::to_ascii_lowercase)
            .or_else(|| uri.scheme_str().map(str::to_string))
            .unwrap_or_else(|| "http".to_string());
        let host = header_str(headers, &header::HOST)
            .map(str::to_string)
            .or_else(|| uri.authority().map(|a| a.to_string()))
            .unwrap_or_default();

        Self {
            request_id: Uuid::new_v4().to_string(),
            correlation_id,
            trace_id: trace.as_ref().map(|t| t.trace_id.clone()),
            span_id: trace.map(|t| t.span_id),
            user_agent: header_str(headers, &header::USER_AGENT).map(str::to_string),
            remote_ip: resolve_client_ip(headers, peer),
            protocol: format!("{:?}", request.version()),
            method: request.method().to_string(),
            scheme,
            host,
            path: uri.path().to_string(),
            query_string: uri.query().map(str::to_string),
            content_type: header_str(headers, &header::CONTENT_TYPE).map(str::to_string),
            content_length: header_str(headers, &header::CONTENT_LENGTH)
                .and_then(|v| v.parse().ok()),
            user_id: request
                .extensions()
                .get::<AuthenticatedUser>()
                .map(|u| u.id.clone()),
            session_id: request
                .extensions()
                .get::<SessionId>()
                .map(|s| s.0.clone()),
        }
    }

    /// Effective URL as the client addressed it.
    pub fn url(&self) -> String {
        let mut url = format!("{}://{}{}", self.scheme, self.host, self.path);
        if let Some(query) = &self.query_string {
            url.push('?');
            url.push_str(query);
        }
        url
    }

    /// Span carrying this context. Completion fields start empty and are
    /// recorded by the request logging layer.
    pub fn span(&self) -> Span {
        let span = tracing::info_span!(
            "http_request",
            request_id = %self.request_id,
            correlation_id = %self.correlation_id,
            trace_id = Empty,
            span_id = Empty,
            user_agent = Empty,
            remote_ip = %self.remote_ip,
            protocol = %self.protocol,
            method = %self.method,
            scheme = %self.scheme,
            host = %self.host,
            path = %self.path,
            query_string = Empty,
            content_type = Empty,
            content_length = Empty,
            user_id = Empty,
            session_id = Empty,
            status_code = Empty,
            elapsed_ms = Empty,
            response_content_type = Empty,
            response_content_length = Empty,
            failure_type = Empty,
            failure_origin = Empty,
        );

        let optional = [
            ("trace_id", &self.trace_id),
            ("span_id", &self.span_id),
            ("user_agent", &self.user_agent),
            ("query_string", &self.query_string),
            ("content_type", &self.content_type),
            ("user_id", &self.user_id),
            ("session_id", &self.session_id),
        ];
        for (field, value) in optional {
            if let Some(value) = value {
                span.record(field, value.as_str());
            }
        }
        if let Some(length) = self.content_length {
            span.record("content_length", length);
        }

        span
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_for_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("1.2.3.4, 5.6.7.8"));
        headers.insert(X_REAL_IP, HeaderValue::from_static("9.9.9.9"));
        let peer: SocketAddr = "10.0.0.1:4000".parse().unwrap();

        assert_eq!(resolve_client_ip(&headers, Some(peer)), "1.2.3.4");
    }

    #[test]
    fn test_client_ip_fallbacks() {
        let mut headers = HeaderMap::new();
        headers.insert(X_REAL_IP, HeaderValue::from_static(" 9.9.9.9 "));
        assert_eq!(resolve_client_ip(&headers, None), "9.9.9.9");

        let peer: SocketAddr = "10.0.0.1:4000".parse().unwrap();
        assert_eq!(resolve_client_ip(&HeaderMap::new(), Some(peer)), "10.0.0.1");
        assert_eq!(resolve_client_ip(&HeaderMap::new(), None), "unknown");

        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static(" , 5.6.7.8"));
        headers.insert(X_REAL_IP, HeaderValue::from_static("9.9.9.9"));
        assert_eq!(resolve_client_ip(&headers, None), "9.9.9.9");
    }

    #[test]
    fn test_correlation_id_resolution() {
        let mut headers = HeaderMap::new();
        headers.insert(X_CORRELATION_ID, HeaderValue::from_static("  abc-123  "));
        assert_eq!(resolve_correlation_id(&headers), "abc-123");

        let mut blank = HeaderMap::new();
        blank.insert(X_CORRELATION_ID, HeaderValue::from_static("   "));
        let generated = resolve_correlation_id(&blank);
        assert!(Uuid::parse_str(&generated).is_ok());
        assert_ne!(generated, resolve_correlation_id(&blank));
    }

    #[test]
    fn test_context_from_request() {
        let mut request = Request::builder()
            .method("POST")
            .uri("/api/orders?dry_run=true")
            .header("host", "shop.local")
            .header("x-forwarded-proto", "HTTPS")
            .header("user-agent", "curl/8.0")
            .header("content-type", "application/json")
            .header("content-length", "42")
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(CorrelationId("corr-1".to_string()));
        request
            .extensions_mut()
            .insert(AuthenticatedUser { id: "user-7".to_string() });

        let ctx = RequestContext::from_request(&request);
        assert_eq!(ctx.correlation_id, "corr-1");
        assert_eq!(ctx.method, "POST");
        assert_eq!(ctx.protocol, "HTTP/1.1");
        assert_eq!(ctx.content_length, Some(42));
        assert_eq!(ctx.user_id.as_deref(), Some("user-7"));
        assert_eq!(ctx.session_id, None);
        assert_eq!(ctx.remote_ip, "unknown");
        assert_eq!(ctx.url(), "https://shop.local/api/orders?dry_run=true");
        assert!(Uuid::parse_str(&ctx.request_id).is_ok());
    }
}
