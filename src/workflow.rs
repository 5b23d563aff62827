//! State-machine errors shared by the record workflows (kits, tickets,
//! lab orders, prior authorizations, dual-eligible claims, vaccine lots).

use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransitionError {
    /// The requested move is not an edge of the state machine.
    #[error("{entity} cannot move from {from} to {to}")]
    Invalid {
        entity: &'static str,
        from: String,
        to: String,
    },
    /// The move is legal but the supplied fields are missing or inconsistent.
    #[error("{0}")]
    InvalidInput(String),
    /// The move is legal but the record's current data forbids it.
    #[error("{0}")]
    Rejected(String),
}

impl TransitionError {
    pub fn invalid(entity: &'static str, from: impl Display, to: impl Display) -> Self {
        TransitionError::Invalid {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}
