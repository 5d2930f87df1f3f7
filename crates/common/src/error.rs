use serde::{Deserialize, Serialize};

/// Caller-facing classification of every failure the engine reports.
///
/// Each crate keeps its own error enum; they all map onto one of these so
/// delivery adapters can translate failures without knowing the details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Order, item, product, cart or saga is absent.
    NotFound,
    /// Invalid status value or unmet transition precondition.
    BadRequest,
    /// Transition from a terminal state or acting on someone else's order.
    Forbidden,
    /// A stock decrease would go negative.
    InsufficientStock,
    /// Assembly produced no usable items from a non-empty request.
    OperationFailed,
    /// Optimistic concurrency check failed; reload and retry.
    Conflict,
    /// A later saga step failed after earlier steps committed.
    SideEffectFailed,
    /// Infrastructure failure (storage, serialization).
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::InsufficientStock => "InsufficientStock",
            ErrorKind::OperationFailed => "OperationFailed",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::SideEffectFailed => "SideEffectFailed",
            ErrorKind::Internal => "Internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
