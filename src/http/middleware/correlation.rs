//! Correlation id assignment.
//!
//! Outermost layer of the stack: every response leaving the service,
//! including the ones built by the error boundary, carries the id.

use std::task::{Context, Poll};

use axum::http::{HeaderValue, Request, Response};
use futures_util::future::BoxFuture;
use tower::{Layer, Service};

use crate::http::request::{resolve_correlation_id, CorrelationId, X_CORRELATION_ID};

/// Resolves the correlation id and echoes it on the response.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorrelationIdLayer;

impl<S> Layer<S> for CorrelationIdLayer {
    type Service = CorrelationIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorrelationIdService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct CorrelationIdService<S> {
    inner: S,
}

impl<S, B, ResBody> Service<Request<B>> for CorrelationIdService<S>
where
    S: Service<Request<B>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let correlation_id = resolve_correlation_id(req.headers());
        let header_value = HeaderValue::from_str(&correlation_id).ok();
        req.extensions_mut().insert(CorrelationId(correlation_id));

        // Take the service that was driven to readiness, leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let mut response = inner.call(req).await?;
            if let Some(value) = header_value {
                response.headers_mut().insert(X_CORRELATION_ID, value);
            }
            Ok(response)
        })
    }
}
