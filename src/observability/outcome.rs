//! Operation outcomes shared by the recorders and the request pipeline.

use std::fmt;

/// Status tag value for a completed business event.
pub const STATUS_COMPLETED: &str = "completed";
/// Status tag value for a failed business event.
pub const STATUS_FAILED: &str = "failed";

/// Classification of a failed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Caller input rejected by a domain rule.
    Validation,
    /// A persistence or network collaborator failed.
    Downstream,
    /// The caller dropped the operation before it finished.
    Cancelled,
    /// The operation panicked.
    Panicked,
    /// Any other error, named by its type.
    Error(String),
}

impl FailureKind {
    pub fn name(&self) -> &str {
        match self {
            FailureKind::Validation => "Validation",
            FailureKind::Downstream => "Downstream",
            FailureKind::Cancelled => "Cancelled",
            FailureKind::Panicked => "Panicked",
            FailureKind::Error(type_name) => type_name,
        }
    }

    /// Build an `Error` kind from the short name of `T`.
    pub fn of_type<T: ?Sized>() -> Self {
        FailureKind::Error(short_type_name::<T>().to_string())
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of an operation as seen by instrumentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Failed(FailureKind),
}

impl Outcome {
    /// Value of the `status` tag for this outcome.
    pub fn status(&self) -> &'static str {
        match self {
            Outcome::Completed => STATUS_COMPLETED,
            Outcome::Failed(_) => STATUS_FAILED,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

/// Last path segment of a type name, without generic arguments.
///
/// `order_observability::http::response::PipelineError` becomes `PipelineError`.
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Module path a type is declared in, used as the origin of its failures.
///
/// `order_observability::http::response::PipelineError` becomes
/// `order_observability::http::response`.
pub fn type_origin<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit_once("::").map(|(module, _)| module).unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct LocalError;

    #[test]
    fn test_status_tags() {
        assert_eq!(Outcome::Completed.status(), "completed");
        assert_eq!(Outcome::Failed(FailureKind::Validation).status(), "failed");
        assert!(Outcome::Failed(FailureKind::Cancelled).is_failed());
        assert!(!Outcome::Completed.is_failed());
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name::<LocalError>(), "LocalError");
        assert_eq!(short_type_name::<Vec<String>>(), "Vec");
        assert_eq!(FailureKind::of_type::<std::io::Error>().name(), "Error");
        assert_eq!(FailureKind::of_type::<LocalError>().to_string(), "LocalError");
    }

    #[test]
    fn test_type_origin() {
        assert_eq!(type_origin::<LocalError>(), "order_observability::observability::outcome::tests");
        assert_eq!(type_origin::<u8>(), "u8");
    }
}
