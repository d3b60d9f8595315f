//! Generation job lifecycle state machine.
//!
//! This module lives in `core` (zero internal deps) so it can be used by
//! the db repositories, the pipeline engine, and the API layer alike.
//!
//! The central invariant of the whole platform is encoded here: a job
//! that has reached `completed` or `failed` never transitions again. The
//! webhook handler and the reconciliation poller may race to resolve the
//! same job; whichever applies its transition second must observe a
//! terminal state and back off.

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Status IDs matching `generation_statuses` seed data (1-based SMALLSERIAL).
///
/// Intentionally duplicated from the `db` crate's `GenerationStatus` enum
/// because `core` must have zero internal deps.
pub mod state_machine {
    /// Returns the set of valid target status IDs reachable from `from_status`.
    ///
    /// Terminal states (Completed=3, Failed=4) return an empty slice because
    /// no further transitions are allowed.
    pub fn valid_transitions(from_status: i16) -> &'static [i16] {
        match from_status {
            // Pending -> Processing, Completed, Failed
            //
            // Pending can jump straight to a terminal state: a webhook may
            // arrive before mark_processing ever ran, and a stale job with
            // no correlation id fails directly out of pending.
            1 => &[2, 3, 4],
            // Processing -> Completed, Failed
            2 => &[3, 4],
            // Terminal states: Completed, Failed
            3 | 4 => &[],
            // Unknown status: no transitions allowed
            _ => &[],
        }
    }

    /// Check whether a transition from `from` to `to` is valid.
    pub fn can_transition(from: i16, to: i16) -> bool {
        valid_transitions(from).contains(&to)
    }

    /// True for statuses that are final and must never be overwritten.
    pub fn is_terminal(status: i16) -> bool {
        matches!(status, 3 | 4)
    }

    /// Validate a state transition, returning an error message for invalid ones.
    pub fn validate_transition(from: i16, to: i16) -> Result<(), String> {
        if can_transition(from, to) {
            Ok(())
        } else {
            let from_name = status_name(from);
            let to_name = status_name(to);
            Err(format!(
                "Invalid transition: {from_name} ({from}) -> {to_name} ({to})"
            ))
        }
    }

    /// Human-readable name for a status ID (for error messages).
    fn status_name(id: i16) -> &'static str {
        match id {
            1 => "Pending",
            2 => "Processing",
            3 => "Completed",
            4 => "Failed",
            _ => "Unknown",
        }
    }
}
