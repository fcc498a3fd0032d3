//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, graceful shutdown)
//!     → middleware/ (correlation id, error boundary, request logging, timeout)
//!     → request.rs (request context, client address, correlation id)
//!     → handlers.rs (order API)
//!     → response.rs (status mapping, generic 500 body)
//!     → Send to client
//! ```

pub mod handlers;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{CorrelationId, RequestContext, X_CORRELATION_ID};
pub use response::{ApiError, PipelineError, INTERNAL_ERROR_MESSAGE};
pub use server::{apply_middleware, routes, AppState, HttpServer};
