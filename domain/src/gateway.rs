//! Gateway request lifecycle.
//!
//! Every request crossing the tool gateway moves through a fixed sequence
//! of phases. Validation and authorization are mandatory: a request can
//! never reach `Dispatched` without passing through both.
//!
//! ```text
//! Received → Validated → Authorized → Dispatched → Completed
//!     └──────────┴───────────┴────────────┴──────→ Rejected
//! ```

use serde::{Deserialize, Serialize};

/// Phase of a request inside the tool gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestPhase {
    Received,
    Validated,
    Authorized,
    Dispatched,
    Completed,
    Rejected,
}

impl RequestPhase {
    /// Whether `next` is a legal successor of this phase.
    ///
    /// Any non-terminal phase may move to `Rejected`; forward progress is
    /// strictly one step at a time so validation and authorization cannot
    /// be skipped.
    pub fn can_advance_to(self, next: RequestPhase) -> bool {
        use RequestPhase::*;
        matches!(
            (self, next),
            (Received, Validated)
                | (Validated, Authorized)
                | (Authorized, Dispatched)
                | (Dispatched, Completed)
                | (Received | Validated | Authorized | Dispatched, Rejected)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RequestPhase::Completed | RequestPhase::Rejected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequestPhase::Received => "received",
            RequestPhase::Validated => "validated",
            RequestPhase::Authorized => "authorized",
            RequestPhase::Dispatched => "dispatched",
            RequestPhase::Completed => "completed",
            RequestPhase::Rejected => "rejected",
        }
    }
}

/// Tracks a request's phase, enforcing legal transitions.
#[derive(Debug, Clone)]
pub struct RequestTrace {
    request_id: String,
    phase: RequestPhase,
}

impl RequestTrace {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            phase: RequestPhase::Received,
        }
    }

    pub fn phase(&self) -> RequestPhase {
        self.phase
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Advance to the next phase. Illegal transitions are a programming
    /// error in the gateway and reported as `Err` rather than panicking.
    pub fn advance(&mut self, next: RequestPhase) -> Result<(), String> {
        if !self.phase.can_advance_to(next) {
            return Err(format!(
                "illegal request transition {} -> {} (request {})",
                self.phase.as_str(),
                next.as_str(),
                self.request_id
            ));
        }
        self.phase = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_walks_every_phase() {
        let mut trace = RequestTrace::new("req-1");
        for next in [
            RequestPhase::Validated,
            RequestPhase::Authorized,
            RequestPhase::Dispatched,
            RequestPhase::Completed,
        ] {
            trace.advance(next).unwrap();
        }
        assert!(trace.phase().is_terminal());
    }

    #[test]
    fn validation_cannot_be_skipped() {
        let mut trace = RequestTrace::new("req-2");
        assert!(trace.advance(RequestPhase::Authorized).is_err());
        assert!(trace.advance(RequestPhase::Dispatched).is_err());
        assert_eq!(trace.phase(), RequestPhase::Received);
    }

    #[test]
    fn authorization_cannot_be_skipped() {
        let mut trace = RequestTrace::new("req-3");
        trace.advance(RequestPhase::Validated).unwrap();
        assert!(trace.advance(RequestPhase::Dispatched).is_err());
    }

    #[test]
    fn any_active_phase_may_reject() {
        for upto in 0..4 {
            let mut trace = RequestTrace::new("req-4");
            let path = [
                RequestPhase::Validated,
                RequestPhase::Authorized,
                RequestPhase::Dispatched,
            ];
            for next in path.iter().take(upto) {
                trace.advance(*next).unwrap();
            }
            trace.advance(RequestPhase::Rejected).unwrap();
            assert!(trace.phase().is_terminal());
        }
    }

    #[test]
    fn terminal_phases_are_final() {
        let mut trace = RequestTrace::new("req-5");
        trace.advance(RequestPhase::Rejected).unwrap();
        assert!(trace.advance(RequestPhase::Validated).is_err());
        assert!(trace.advance(RequestPhase::Rejected).is_err());
    }
}
