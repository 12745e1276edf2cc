//! Order status lifecycle.
//!
//! ```text
//! pending ──► processing ──► shipped ──► delivered
//!    │             │
//!    └──► cancelled ◄┘
//! ```
//!
//! `delivered` and `cancelled` are terminal. Only administrators drive these transitions.

use crate::{error::AppError, models::OrderStatus};

impl OrderStatus {
    pub fn allowed_transitions(self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[OrderStatus::Processing, OrderStatus::Cancelled],
            OrderStatus::Processing => &[OrderStatus::Shipped, OrderStatus::Cancelled],
            OrderStatus::Shipped => &[OrderStatus::Delivered],
            OrderStatus::Delivered | OrderStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }
}

pub fn ensure_transition(from: OrderStatus, to: OrderStatus) -> Result<(), AppError> {
    if from.can_transition_to(to) {
        return Ok(());
    }
    if from.is_terminal() {
        return Err(AppError::validation(format!(
            "order is already {from} and can no longer change status"
        )));
    }
    Err(AppError::validation(format!(
        "cannot move order from {from} to {to}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    const ALL: [OrderStatus; 5] = [Pending, Processing, Shipped, Delivered, Cancelled];

    #[test]
    fn table_matches_lifecycle() {
        let allowed = [
            (Pending, Processing),
            (Pending, Cancelled),
            (Processing, Shipped),
            (Processing, Cancelled),
            (Shipped, Delivered),
        ];
        for from in ALL {
            for to in ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn skipping_ahead_is_rejected() {
        let err = ensure_transition(Pending, Shipped).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(err.to_string(), "cannot move order from pending to shipped");
    }

    #[test]
    fn terminal_states_reject_everything() {
        assert!(Delivered.is_terminal());
        assert!(Cancelled.is_terminal());
        let err = ensure_transition(Cancelled, Processing).unwrap_err();
        assert!(err.to_string().contains("already cancelled"));
    }
}
