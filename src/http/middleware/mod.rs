//! Tower layers wrapped around every route.
//!
//! # Layer Order (outermost first)
//! ```text
//! CorrelationIdLayer      resolve id, echo it on every response
//!   HandleErrorLayer      unhandled Err  → generic 500
//!   CatchPanicLayer       panic          → generic 500
//!     RequestLoggingLayer context span, timing, closing log, re-raise
//!       TimeoutLayer      request deadline
//! ```

pub mod correlation;
pub mod request_logging;

pub use correlation::{CorrelationIdLayer, CorrelationIdService};
pub use request_logging::{level_for_status, RequestLoggingLayer, RequestLoggingService};
