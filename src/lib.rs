//! Order API with request correlation and business telemetry.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod orders;

pub use config::schema::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
