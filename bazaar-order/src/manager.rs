use bazaar_core::{CoreError, PaymentError, StoreError, TrackingStatus};
use uuid::Uuid;

/// Who is asking for a tracking change. Admins may re-save the current status
/// (to correct a tracking id); the reconciler only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    Admin,
    Reconcile,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Order is already cancelled")]
    AlreadyCancelled,

    #[error("Too late to cancel: order is already {0}")]
    TooLateToCancel(TrackingStatus),

    #[error("Tracking cannot move backward from {from} to {to}")]
    Backward {
        from: TrackingStatus,
        to: TrackingStatus,
    },

    #[error("Order is already {0}")]
    NoChange(TrackingStatus),
}

impl TransitionError {
    /// Stable code for API clients that render different messages per rule.
    pub fn code(&self) -> &'static str {
        match self {
            TransitionError::AlreadyCancelled => "ALREADY_CANCELLED",
            TransitionError::TooLateToCancel(_) => "TOO_LATE_TO_CANCEL",
            TransitionError::Backward { .. } => "BACKWARD_TRANSITION",
            TransitionError::NoChange(_) => "UNSUPPORTED_TRANSITION",
        }
    }
}

/// Legal moves:
/// `Order Placed -> Packed -> Shipped -> Out for Delivery -> Delivered`
/// (forward skips allowed), or sideways to `Cancelled` from `Order Placed`
/// or `Packed`. Nothing leaves `Cancelled`.
pub fn check_transition(
    current: TrackingStatus,
    next: TrackingStatus,
    kind: TransitionKind,
) -> Result<(), TransitionError> {
    if current == TrackingStatus::Cancelled {
        return Err(TransitionError::AlreadyCancelled);
    }

    if next == TrackingStatus::Cancelled {
        return if current.is_cancellable() {
            Ok(())
        } else {
            Err(TransitionError::TooLateToCancel(current))
        };
    }

    // Both sides are on the forward path past this point.
    let (from_rank, to_rank) = match (current.rank(), next.rank()) {
        (Some(from), Some(to)) => (from, to),
        _ => return Err(TransitionError::AlreadyCancelled),
    };

    if to_rank < from_rank {
        return Err(TransitionError::Backward {
            from: current,
            to: next,
        });
    }

    if to_rank == from_rank && kind != TransitionKind::Admin {
        return Err(TransitionError::NoChange(current));
    }

    Ok(())
}

/// True when `next` is strictly ahead of `current` on the forward path.
pub fn is_forward(current: TrackingStatus, next: TrackingStatus) -> bool {
    matches!((current.rank(), next.rank()), (Some(from), Some(to)) if to > from)
}

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order not found: {0}")]
    NotFound(Uuid),

    #[error("Validation failed: missing or invalid {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error(transparent)]
    IllegalTransition(#[from] TransitionError),

    #[error("Order {0} was modified concurrently, retry the request")]
    Conflict(Uuid),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error("Fulfillment failed: {0}")]
    Fulfillment(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<StoreError> for OrderError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => OrderError::NotFound(id),
            StoreError::Conflict { id, .. } => OrderError::Conflict(id),
            other => OrderError::Storage(other.to_string()),
        }
    }
}

impl From<CoreError> for OrderError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ValidationError(fields) => OrderError::Validation(fields),
            CoreError::ParseError(msg) => OrderError::Validation(vec![msg]),
        }
    }
}
