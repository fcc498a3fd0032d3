//! Request context, timing and completion logging.
//!
//! Every request gets one "started" line and exactly one closing line:
//! completed (severity from the status code), failed (the inner service
//! returned `Err` or panicked) or cancelled (the future was dropped).
//! Failures are re-raised unchanged for the error boundary above.

use std::fmt;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::HttpBody;
use axum::http::{header, Request, Response};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tower::{Layer, Service};
use tracing::{Instrument, Level, Span};

use crate::http::request::RequestContext;
use crate::http::response::panic_message;
use crate::observability::metrics;
use crate::observability::outcome::{short_type_name, type_origin, FailureKind};

const ORIGIN_PANIC: &str = "panic";
const ORIGIN_CLIENT: &str = "client";

/// Severity of the completion line for a response status.
pub fn level_for_status(status: u16) -> Level {
    match status {
        500..=u16::MAX => Level::ERROR,
        400..=499 => Level::WARN,
        _ => Level::INFO,
    }
}

macro_rules! log_at {
    ($level:expr, $($arg:tt)+) => {
        if $level == Level::ERROR {
            tracing::error!($($arg)+)
        } else if $level == Level::WARN {
            tracing::warn!($($arg)+)
        } else {
            tracing::info!($($arg)+)
        }
    };
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLoggingLayer;

impl<S> Layer<S> for RequestLoggingLayer {
    type Service = RequestLoggingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLoggingService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct RequestLoggingService<S> {
    inner: S,
}

impl<S, B, ResBody> Service<Request<B>> for RequestLoggingService<S>
where
    S: Service<Request<B>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: fmt::Display + Send + 'static,
    B: Send + 'static,
    ResBody: HttpBody + Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let context = RequestContext::from_request(&req);
        let span = context.span();
        let url = context.url();
        span.in_scope(|| tracing::info!("HTTP {} {} started", context.method, url));

        let mut in_flight = InFlight {
            span: span.clone(),
            method: context.method.clone(),
            url,
            started: Instant::now(),
            armed: true,
        };
        req.extensions_mut().insert(context);

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let call = span.in_scope(|| catch_unwind(AssertUnwindSafe(|| inner.call(req))));

        Box::pin(
            async move {
                let future = match call {
                    Ok(future) => future,
                    Err(payload) => {
                        in_flight.failed(
                            FailureKind::Panicked.name(),
                            ORIGIN_PANIC,
                            &panic_message(payload.as_ref()),
                        );
                        resume_unwind(payload)
                    }
                };

                match AssertUnwindSafe(future).catch_unwind().await {
                    Ok(Ok(response)) => {
                        in_flight.completed(&response);
                        Ok(response)
                    }
                    Ok(Err(err)) => {
                        in_flight.failed(
                            short_type_name::<S::Error>(),
                            type_origin::<S::Error>(),
                            &err,
                        );
                        Err(err)
                    }
                    Err(payload) => {
                        in_flight.failed(
                            FailureKind::Panicked.name(),
                            ORIGIN_PANIC,
                            &panic_message(payload.as_ref()),
                        );
                        resume_unwind(payload)
                    }
                }
            }
            .instrument(span),
        )
    }
}

/// Timer plus closing log for one request. Logs a cancellation if dropped
/// before either closing method ran.
struct InFlight {
    span: Span,
    method: String,
    url: String,
    started: Instant,
    armed: bool,
}

impl InFlight {
    fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    fn completed<B: HttpBody>(&mut self, response: &Response<B>) {
        self.armed = false;
        let elapsed_ms = self.elapsed_ms();
        let status = response.status().as_u16();

        self.span.record("status_code", status);
        self.span.record("elapsed_ms", elapsed_ms);
        if let Some(content_type) = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            self.span.record("response_content_type", content_type);
        }
        let content_length = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .or_else(|| response.body().size_hint().exact());
        if let Some(length) = content_length {
            self.span.record("response_content_length", length);
        }

        metrics::record_request(&self.method, &status.to_string(), self.started);

        let level = level_for_status(status);
        self.span.in_scope(|| {
            log_at!(
                level,
                "HTTP {} {} completed in {:.4}ms with status {}",
                self.method,
                self.url,
                elapsed_ms,
                status
            )
        });
    }

    fn failed(&mut self, failure_type: &str, origin: &str, detail: &dyn fmt::Display) {
        self.armed = false;
        let elapsed_ms = self.elapsed_ms();

        self.span.record("elapsed_ms", elapsed_ms);
        self.span.record("failure_type", failure_type);
        self.span.record("failure_origin", origin);

        metrics::record_request(&self.method, failure_type, self.started);

        self.span.in_scope(|| {
            tracing::error!(
                error = %detail,
                "HTTP {} {} failed after {:.4}ms with {}",
                self.method,
                self.url,
                elapsed_ms,
                failure_type
            )
        });
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.armed {
            let kind = FailureKind::Cancelled;
            self.failed(kind.name(), ORIGIN_CLIENT, &"request future dropped before completion");
        }
    }
}
