//! The acquisition request value object.
//!
//! A [`TriggerInfo`] quantitatively describes one requested acquisition: how
//! the hardware will be triggered, how many caller-visible events will be
//! produced, and how physical exposures roll up into durable collections.
//! It is immutable, validated on construction via [`TriggerInfoBuilder`], and
//! is the canonical sizing authority for the rest of the core - nothing else
//! recomputes exposure or collection counts independently.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DetectorError, Result};

/// Type of mechanism for triggering a detector to take frames.
///
/// Gate-style hardware variants map onto the edge/level kinds for deadtime
/// purposes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub enum DetectorTrigger {
    /// Detector generates its own trigger train at a configured rate.
    #[default]
    Internal,
    /// Expect a series of externally supplied edge trigger signals.
    ExternalEdge,
    /// Expect a series of externally supplied gate (level) signals.
    ExternalLevel,
}

impl fmt::Display for DetectorTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DetectorTrigger::Internal => "Internal",
            DetectorTrigger::ExternalEdge => "ExternalEdge",
            DetectorTrigger::ExternalLevel => "ExternalLevel",
        };
        write!(f, "{}", label)
    }
}

/// Minimal set of information required to set up triggering on a detector.
///
/// Construct with [`TriggerInfo::builder`]; the builder rejects zero
/// multiplicities, negative or non-finite times, and non-positive timeouts,
/// so a `TriggerInfo` in hand is always internally consistent.
///
/// # Example
///
/// ```
/// use daq_detector::{DetectorTrigger, TriggerInfo};
///
/// let info = TriggerInfo::builder()
///     .trigger(DetectorTrigger::ExternalEdge)
///     .number_of_events(10)
///     .livetime(0.5)
///     .build()?;
/// assert_eq!(info.number_of_exposures(), 10);
/// # Ok::<(), daq_detector::DetectorError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggerInfo {
    trigger: DetectorTrigger,
    number_of_events: u32,
    exposures_per_collection: u32,
    collections_per_event: u32,
    livetime: Option<f64>,
    deadtime: Option<f64>,
    exposure_timeout: Option<Duration>,
}

impl TriggerInfo {
    /// Start building a `TriggerInfo`. Defaults to one internally triggered
    /// event of one collection of one exposure.
    pub fn builder() -> TriggerInfoBuilder {
        TriggerInfoBuilder::default()
    }

    /// A valid one-event internal acquisition, used by step-scan `trigger()`.
    pub fn single_internal() -> Self {
        TriggerInfo {
            trigger: DetectorTrigger::Internal,
            number_of_events: 1,
            exposures_per_collection: 1,
            collections_per_event: 1,
            livetime: None,
            deadtime: None,
            exposure_timeout: None,
        }
    }

    /// Sort of triggers that will be sent.
    pub fn trigger(&self) -> DetectorTrigger {
        self.trigger
    }

    /// Number of caller-visible events; 0 means unbounded, run until stopped.
    pub fn number_of_events(&self) -> u32 {
        self.number_of_events
    }

    /// Physical exposures averaged or summed into one collection.
    pub fn exposures_per_collection(&self) -> u32 {
        self.exposures_per_collection
    }

    /// Collections that make up one caller-visible event.
    pub fn collections_per_event(&self) -> u32 {
        self.collections_per_event
    }

    /// Maximum high time of the triggers, in seconds.
    pub fn livetime(&self) -> Option<f64> {
        self.livetime
    }

    /// Minimum deadtime between exposures, in seconds. May be omitted and
    /// derived from the attached trigger logic.
    pub fn deadtime(&self) -> Option<f64> {
        self.deadtime
    }

    /// Per-frame wait ceiling, if the caller set one.
    pub fn exposure_timeout(&self) -> Option<Duration> {
        self.exposure_timeout
    }

    /// Total physical exposures the hardware will take.
    pub fn number_of_exposures(&self) -> u64 {
        u64::from(self.number_of_events)
            * u64::from(self.collections_per_event)
            * u64::from(self.exposures_per_collection)
    }

    /// Total durable collections the acquisition will produce.
    pub fn number_of_collections(&self) -> u64 {
        u64::from(self.number_of_events) * u64::from(self.collections_per_event)
    }
}

impl Default for TriggerInfo {
    fn default() -> Self {
        TriggerInfo::single_internal()
    }
}

/// Builder for [`TriggerInfo`]; validation happens in [`build`].
///
/// [`build`]: TriggerInfoBuilder::build
#[derive(Debug, Clone)]
pub struct TriggerInfoBuilder {
    trigger: DetectorTrigger,
    number_of_events: u32,
    exposures_per_collection: u32,
    collections_per_event: u32,
    livetime: Option<f64>,
    deadtime: Option<f64>,
    exposure_timeout: Option<f64>,
}

impl Default for TriggerInfoBuilder {
    fn default() -> Self {
        TriggerInfoBuilder {
            trigger: DetectorTrigger::Internal,
            number_of_events: 1,
            exposures_per_collection: 1,
            collections_per_event: 1,
            livetime: None,
            deadtime: None,
            exposure_timeout: None,
        }
    }
}

impl TriggerInfoBuilder {
    /// Set the trigger kind.
    pub fn trigger(mut self, trigger: DetectorTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    /// Set the number of events; 0 means unbounded.
    pub fn number_of_events(mut self, number_of_events: u32) -> Self {
        self.number_of_events = number_of_events;
        self
    }

    /// Set how many exposures are averaged/summed into one collection.
    pub fn exposures_per_collection(mut self, exposures_per_collection: u32) -> Self {
        self.exposures_per_collection = exposures_per_collection;
        self
    }

    /// Set how many collections make up one event.
    pub fn collections_per_event(mut self, collections_per_event: u32) -> Self {
        self.collections_per_event = collections_per_event;
        self
    }

    /// Set the livetime in seconds.
    pub fn livetime(mut self, livetime: f64) -> Self {
        self.livetime = Some(livetime);
        self
    }

    /// Set the deadtime in seconds.
    pub fn deadtime(mut self, deadtime: f64) -> Self {
        self.deadtime = Some(deadtime);
        self
    }

    /// Set the per-frame wait ceiling in seconds.
    pub fn exposure_timeout(mut self, exposure_timeout: f64) -> Self {
        self.exposure_timeout = Some(exposure_timeout);
        self
    }

    /// Validate and produce the immutable [`TriggerInfo`].
    ///
    /// # Errors
    ///
    /// Returns [`DetectorError::Validation`] naming the offending field when a
    /// multiplicity is zero, a time is negative or non-finite, or the timeout
    /// is not strictly positive. Violations are never silently coerced.
    pub fn build(self) -> Result<TriggerInfo> {
        if self.exposures_per_collection == 0 {
            return Err(DetectorError::Validation {
                field: "exposures_per_collection",
                message: "must be at least 1".into(),
            });
        }
        if self.collections_per_event == 0 {
            return Err(DetectorError::Validation {
                field: "collections_per_event",
                message: "must be at least 1".into(),
            });
        }
        for (field, value) in [("livetime", self.livetime), ("deadtime", self.deadtime)] {
            if let Some(seconds) = value {
                if !seconds.is_finite() || seconds < 0.0 {
                    return Err(DetectorError::Validation {
                        field,
                        message: format!("{} is not a non-negative time in seconds", seconds),
                    });
                }
            }
        }
        let exposure_timeout = match self.exposure_timeout {
            None => None,
            Some(seconds) if seconds.is_finite() && seconds > 0.0 => {
                Some(Duration::from_secs_f64(seconds))
            }
            Some(seconds) => {
                return Err(DetectorError::Validation {
                    field: "exposure_timeout",
                    message: format!("{} is not a positive time in seconds", seconds),
                });
            }
        };
        Ok(TriggerInfo {
            trigger: self.trigger,
            number_of_events: self.number_of_events,
            exposures_per_collection: self.exposures_per_collection,
            collections_per_event: self.collections_per_event,
            livetime: self.livetime,
            deadtime: self.deadtime,
            exposure_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_counts_multiply_out() {
        for (exposures, collections, events, want_exposures, want_collections) in [
            (1u32, 1u32, 1u32, 1u64, 1u64),
            (2, 1, 1, 2, 1),
            (1, 3, 5, 15, 15),
            (2, 3, 5, 30, 15),
            (4, 2, 10, 80, 20),
        ] {
            let info = TriggerInfo::builder()
                .exposures_per_collection(exposures)
                .collections_per_event(collections)
                .number_of_events(events)
                .build()
                .unwrap();
            assert_eq!(info.number_of_exposures(), want_exposures);
            assert_eq!(info.number_of_collections(), want_collections);
        }
    }

    #[test]
    fn zero_events_means_unbounded_and_is_valid() {
        let info = TriggerInfo::builder().number_of_events(0).build().unwrap();
        assert_eq!(info.number_of_collections(), 0);
    }

    #[test]
    fn zero_multiplicities_fail_validation() {
        assert!(matches!(
            TriggerInfo::builder().exposures_per_collection(0).build(),
            Err(DetectorError::Validation {
                field: "exposures_per_collection",
                ..
            })
        ));
        assert!(matches!(
            TriggerInfo::builder().collections_per_event(0).build(),
            Err(DetectorError::Validation {
                field: "collections_per_event",
                ..
            })
        ));
    }

    #[test]
    fn negative_times_fail_validation() {
        assert!(matches!(
            TriggerInfo::builder().livetime(-0.5).build(),
            Err(DetectorError::Validation {
                field: "livetime",
                ..
            })
        ));
        assert!(matches!(
            TriggerInfo::builder().deadtime(f64::NAN).build(),
            Err(DetectorError::Validation {
                field: "deadtime",
                ..
            })
        ));
    }

    #[test]
    fn non_positive_timeout_fails_validation() {
        assert!(matches!(
            TriggerInfo::builder().exposure_timeout(0.0).build(),
            Err(DetectorError::Validation {
                field: "exposure_timeout",
                ..
            })
        ));
        let info = TriggerInfo::builder().exposure_timeout(2.5).build().unwrap();
        assert_eq!(info.exposure_timeout(), Some(Duration::from_secs_f64(2.5)));
    }

    #[test]
    fn zero_livetime_is_allowed() {
        let info = TriggerInfo::builder().livetime(0.0).build().unwrap();
        assert_eq!(info.livetime(), Some(0.0));
    }
}
