//! Order domain.
//!
//! # Data Flow
//! ```text
//! handler
//!     → service.rs (order.create timing, business events)
//!     → order.rs (validation, status transitions)
//!     → repository.rs (order.save / order.fetch timing, storage)
//! ```

pub mod order;
pub mod repository;
pub mod service;

pub use order::{Order, OrderError, OrderStatus};
pub use repository::{
    InMemoryOrderRepository, InstrumentedOrderRepository, OrderRepository, RepositoryError,
};
pub use service::OrderService;
