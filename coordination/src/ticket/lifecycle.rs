//! Ticket status transitions and their legality guard.
//!
//! The scheduler validates every status write against this table so that a
//! resolved or escalated ticket is never silently pulled back into review.
//!
//! ```text
//! Open      → InReview
//! InReview  → Resolved | Escalated | OnHold | Open
//! OnHold    → Open
//! Escalated → Open
//! ```
//!
//! Writing the current status again is always allowed.

use std::fmt;

use super::types::TicketStatus;

/// Whether `from → to` is an edge in the status graph.
pub fn is_legal_transition(from: TicketStatus, to: TicketStatus) -> bool {
    use TicketStatus::*;

    if from == to {
        return true;
    }

    matches!(
        (from, to),
        (Open, InReview)
            | (InReview, Resolved)
            | (InReview, Escalated)
            | (InReview, OnHold)
            // Evicted or manually released tickets go back to the pool
            | (InReview, Open)
            | (OnHold, Open)
            | (Escalated, Open)
    )
}

/// Error returned when an illegal transition is attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IllegalTransition {
    pub from: TicketStatus,
    pub to: TicketStatus,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Illegal ticket transition: {} → {}", self.from, self.to)
    }
}

impl std::error::Error for IllegalTransition {}

/// Check a transition, returning an error describing the rejected edge.
pub fn ensure_transition(from: TicketStatus, to: TicketStatus) -> Result<(), IllegalTransition> {
    if is_legal_transition(from, to) {
        Ok(())
    } else {
        Err(IllegalTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TicketStatus::*;

    #[test]
    fn test_happy_path_is_legal() {
        assert!(is_legal_transition(Open, InReview));
        assert!(is_legal_transition(InReview, Resolved));
        assert!(is_legal_transition(InReview, Escalated));
    }

    #[test]
    fn test_closed_tickets_cannot_reenter_review() {
        assert!(!is_legal_transition(Resolved, InReview));
        assert!(!is_legal_transition(Escalated, InReview));
        assert!(!is_legal_transition(OnHold, InReview));
    }

    #[test]
    fn test_open_cannot_skip_review() {
        let err = ensure_transition(Open, Resolved).unwrap_err();
        assert_eq!(err.from, Open);
        assert_eq!(err.to, Resolved);
        assert!(err.to_string().contains("open"));
    }

    #[test]
    fn test_self_transition_allowed() {
        for s in [Open, InReview, Resolved, Escalated, OnHold] {
            assert!(is_legal_transition(s, s));
        }
    }
}
