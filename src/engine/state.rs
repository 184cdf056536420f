//! Per-request state machine.
//!
//! ```text
//! RECEIVED → VALIDATING → APPLYING → COMMITTED
//!                │            │
//!                └────────────┴────→ REJECTED
//! ```

use std::fmt;

use crate::codec::{ErrorKind, RequestId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Received,
    Validating,
    Applying,
    Committed,
    Rejected,
}

impl RequestState {
    pub fn can_transition_to(self, next: RequestState) -> bool {
        use RequestState::*;
        matches!(
            (self, next),
            (Received, Validating)
                | (Validating, Applying)
                | (Validating, Rejected)
                | (Applying, Committed)
                | (Applying, Rejected)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RequestState::Committed | RequestState::Rejected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequestState::Received => "received",
            RequestState::Validating => "validating",
            RequestState::Applying => "applying",
            RequestState::Committed => "committed",
            RequestState::Rejected => "rejected",
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks one request through the engine.
///
/// Only legal transitions are exposed; each step is traced with the request
/// id so a request can be followed through the logs.
#[derive(Debug)]
pub struct RequestLifecycle {
    request_id: RequestId,
    op: &'static str,
    state: RequestState,
}

impl RequestLifecycle {
    pub fn received(request_id: RequestId, op: &'static str) -> Self {
        tracing::trace!(request_id = %request_id, op, state = "received");
        Self {
            request_id,
            op,
            state: RequestState::Received,
        }
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn validating(&mut self) {
        self.transition(RequestState::Validating);
    }

    pub fn applying(&mut self) {
        self.transition(RequestState::Applying);
    }

    pub fn commit(&mut self) {
        self.transition(RequestState::Committed);
    }

    /// Reject from whichever non-terminal state the request is in.
    pub fn reject(&mut self, kind: ErrorKind) {
        if self.state == RequestState::Received {
            self.transition(RequestState::Validating);
        }
        tracing::debug!(request_id = %self.request_id, op = self.op, kind = %kind, "Request rejected");
        self.transition(RequestState::Rejected);
    }

    fn transition(&mut self, next: RequestState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        tracing::trace!(
            request_id = %self.request_id,
            op = self.op,
            from = %self.state,
            to = %next
        );
        self.state = next;
    }
}
