//! Custom error types for the acquisition core.
//!
//! This module defines the primary error type, [`DetectorError`], for the whole
//! crate. Using the `thiserror` crate, it provides a centralized and consistent
//! way to classify everything that can go wrong while orchestrating an
//! acquisition, from misconfigured capability objects to hardware readbacks
//! that never arrive.
//!
//! ## Error Hierarchy
//!
//! Errors fall into five categories:
//!
//! 1. **Validation errors** - `Validation`
//!    - Raised while constructing a [`TriggerInfo`](crate::TriggerInfo)
//!    - Never produce a usable value object; fix the request and rebuild
//!
//! 2. **Configuration errors** - `Configuration`, `Unsupported`,
//!    `UnsupportedTrigger`
//!    - Raised at logic registration or `prepare` time, never retried
//!    - Recovery: attach the right capability objects or change the request
//!
//! 3. **State errors** - `State`, `KickoffBeyondPrepared`
//!    - An operation was issued in a life-cycle state that cannot honor it
//!    - Recovery: run the missing life-cycle step (usually `prepare`)
//!
//! 4. **Timing errors** - `WaitTimeout`, `ReadbackLost`, `BadTerminalState`
//!    - A hardware readback did not reach the expected value in time, went
//!      away entirely, or landed in a terminal state outside the allow-list.
//!      The three cases are reported distinctly so a stuck device can be told
//!      apart from a disconnected one without re-running with extra logging.
//!    - The core never retries these; the caller decides
//!
//! 5. **Consistency errors** - `InconsistentCollections`
//!    - Streamable providers of one detector disagree on how much data has
//!      been durably written; never silently resolved
//!
//! Every message names the offending quantity or state and, where relevant,
//! the allowed set.

use std::collections::BTreeSet;
use std::time::Duration;

use thiserror::Error;

use crate::trigger_info::DetectorTrigger;

/// Convenience alias for results using the crate error type.
pub type Result<T> = std::result::Result<T, DetectorError>;

/// Primary error type for the acquisition orchestration core.
#[derive(Error, Debug)]
pub enum DetectorError {
    /// A [`TriggerInfo`](crate::TriggerInfo) field failed validation.
    ///
    /// Raised while building the value object; the object is never produced.
    #[error("Invalid trigger info: {field}: {message}")]
    Validation {
        /// Field that failed validation.
        field: &'static str,
        /// What was wrong with it.
        message: String,
    },

    /// A capability object combination cannot honor the request.
    ///
    /// Raised at registration or `prepare` time. Examples: registering a
    /// second trigger logic, a data logic that supports no `prepare_*` hook,
    /// or timing parameters on a detector with no trigger logic.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A defaulted capability hook was called on a logic that does not
    /// implement it.
    ///
    /// The orchestrator checks capability flags before dispatching, so seeing
    /// this error means a logic's [`capabilities`] report and its hook
    /// overrides disagree.
    ///
    /// [`capabilities`]: crate::capabilities::DetectorTriggerLogic::capabilities
    #[error("{operation} not implemented by this logic")]
    Unsupported {
        /// The hook that was invoked.
        operation: &'static str,
    },

    /// The requested trigger kind is outside the attached trigger logic's
    /// supported set.
    #[error("Trigger type {requested} not supported, this detector supports {supported:?}")]
    UnsupportedTrigger {
        /// Kind the caller asked for.
        requested: DetectorTrigger,
        /// Kinds the attached logic (or its absence) allows.
        supported: BTreeSet<DetectorTrigger>,
    },

    /// An operation was issued in a life-cycle state that cannot honor it,
    /// e.g. `describe` before `prepare`.
    #[error("{0}")]
    State(String),

    /// A `kickoff` would claim more events than the last `prepare` declared.
    ///
    /// Guards against accumulating more streamed data than the caller asked
    /// for.
    #[error("Kickoff requested {start}:{stop}, but detector was only prepared up to {prepared}")]
    KickoffBeyondPrepared {
        /// Events already kicked off before this call.
        start: u64,
        /// Events that would have been kicked off after this call.
        stop: u64,
        /// Events declared by the last `prepare`.
        prepared: u64,
    },

    /// Streamable providers of one detector disagree on how many collections
    /// have been durably written.
    ///
    /// Never silently resolved by picking one value; the full conflicting set
    /// is reported.
    #[error("Detectors have written different numbers of collections: {counts:?}")]
    InconsistentCollections {
        /// The distinct counts that were observed.
        counts: BTreeSet<u64>,
    },

    /// A bounded wait on a hardware readback elapsed without the value
    /// reaching its target.
    #[error("Timed out after {elapsed:?} waiting for {signal}")]
    WaitTimeout {
        /// Name of the value that was being watched.
        signal: String,
        /// The bound that elapsed.
        elapsed: Duration,
    },

    /// The readback disappeared (producer dropped / disconnected) during a
    /// wait. Reported distinctly from a value that simply has not reached its
    /// target yet.
    #[error("Readback {signal} lost while waiting for a value")]
    ReadbackLost {
        /// Name of the value that was being watched.
        signal: String,
    },

    /// A state readback landed in a terminal state outside the allow-list of
    /// good end states.
    #[error("{signal} not in a good state: {state}, expected one of {allowed:?}")]
    BadTerminalState {
        /// Name of the state readback.
        signal: String,
        /// The offending state that was observed.
        state: String,
        /// The allow-list of acceptable end states.
        allowed: Vec<String>,
    },
}

impl DetectorError {
    /// Shorthand for an [`Unsupported`](DetectorError::Unsupported) hook error.
    pub(crate) fn unsupported(operation: &'static str) -> Self {
        DetectorError::Unsupported { operation }
    }
}
