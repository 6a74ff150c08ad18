//! Capability contracts for detector hardware.
//!
//! A detector is assembled from up to three independent capability objects:
//!
//! - [`DetectorTriggerLogic`]: programs trigger timing on the hardware
//! - [`DetectorArmLogic`]: starts and stops acquisition
//! - [`DetectorDataLogic`]: sets up data production and describes it
//!
//! Each logic reports what it supports through an explicit capability flag
//! set ([`TriggerCapabilities`] / [`DataCapabilities`]), computed once at
//! registration. The orchestrator dispatches only operations the flags
//! claim; the defaulted hook bodies return a typed error so a flag/override
//! mismatch surfaces as a clear bug report rather than a silent no-op.
//!
//! All hooks are idempotent with respect to retries at the hardware level:
//! a repeated `disarm` on an idle detector succeeds.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::{DetectorError, Result};
use crate::providers::{ReadableDataProvider, StreamableDataProvider};
use crate::signal::{Signal, SignalValues};
use crate::trigger_info::DetectorTrigger;

/// What a [`DetectorTriggerLogic`] can be asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerCapabilities {
    /// Trigger kinds the hardware can be programmed for.
    pub triggers: BTreeSet<DetectorTrigger>,
    /// Whether the hardware can average or sum multiple exposures into one
    /// collection.
    pub exposures_per_collection: bool,
}

impl TriggerCapabilities {
    /// Capabilities of a detector that can only self-trigger.
    ///
    /// Also what the orchestrator assumes when no trigger logic is attached.
    pub fn internal_only() -> Self {
        TriggerCapabilities {
            triggers: BTreeSet::from([DetectorTrigger::Internal]),
            exposures_per_collection: false,
        }
    }

    /// Capabilities spanning the given trigger kinds.
    pub fn with_triggers(triggers: impl IntoIterator<Item = DetectorTrigger>) -> Self {
        TriggerCapabilities {
            triggers: triggers.into_iter().collect(),
            exposures_per_collection: false,
        }
    }

    /// Enable the exposure averaging flag.
    pub fn and_exposures_per_collection(mut self) -> Self {
        self.exposures_per_collection = true;
        self
    }

    /// Whether the given kind is in the supported set.
    pub fn supports(&self, trigger: DetectorTrigger) -> bool {
        self.triggers.contains(&trigger)
    }
}

/// Which data-provider shapes a [`DetectorDataLogic`] can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataCapabilities {
    /// Can produce a one-shot in-band provider (`prepare_single`).
    pub single: bool,
    /// Can produce a streamed external-file provider (`prepare_unbounded`).
    pub unbounded: bool,
}

/// Programs trigger timing on the hardware.
///
/// Exactly one `prepare_*` hook runs per acquisition, selected by the
/// orchestrator from the requested trigger kind. `num` is always the total
/// number of physical exposures.
#[async_trait]
pub trait DetectorTriggerLogic: Send + Sync {
    /// The trigger kinds and options this hardware supports.
    fn capabilities(&self) -> TriggerCapabilities;

    /// Signals whose values feed [`get_deadtime`](Self::get_deadtime).
    ///
    /// The orchestrator snapshots these (with planning overrides applied)
    /// before asking for a deadtime, so the derivation itself stays
    /// synchronous and side-effect free.
    fn config_signals(&self) -> Vec<Signal<f64>> {
        Vec::new()
    }

    /// Minimum time the detector needs between exposures, in seconds.
    ///
    /// `None` means the hardware imposes no deadtime of its own.
    fn get_deadtime(&self, values: &SignalValues) -> Option<f64> {
        let _ = values;
        None
    }

    /// Program `num` internally generated exposures of `livetime` seconds
    /// with `deadtime` seconds between them. `num == 0` means free-running.
    async fn prepare_internal(&self, num: u64, livetime: f64, deadtime: f64) -> Result<()> {
        let _ = (num, livetime, deadtime);
        Err(DetectorError::unsupported("prepare_internal"))
    }

    /// Program `num` exposures of `livetime` seconds, one per external edge.
    async fn prepare_edge(&self, num: u64, livetime: f64) -> Result<()> {
        let _ = (num, livetime);
        Err(DetectorError::unsupported("prepare_edge"))
    }

    /// Program `num` exposures, each gated by an external level signal.
    async fn prepare_level(&self, num: u64) -> Result<()> {
        let _ = num;
        Err(DetectorError::unsupported("prepare_level"))
    }

    /// Program the hardware to roll `exposures` exposures into each
    /// collection. Only called when the request asks for more than one and
    /// the [`exposures_per_collection`](TriggerCapabilities) flag is set.
    async fn prepare_exposures_per_collection(&self, exposures: u32) -> Result<()> {
        let _ = exposures;
        Err(DetectorError::unsupported("prepare_exposures_per_collection"))
    }
}

/// Starts and stops acquisition.
///
/// All three operations are mandatory; a detector that cannot be armed has
/// no arm logic at all.
#[async_trait]
pub trait DetectorArmLogic: Send + Sync {
    /// Start acquiring. Returns once the hardware confirms it is armed.
    async fn arm(&self) -> Result<()>;

    /// Wait until the hardware reports acquisition finished.
    async fn wait_for_idle(&self) -> Result<()>;

    /// Stop acquiring. Idempotent; disarming an idle detector succeeds.
    async fn disarm(&self) -> Result<()>;
}

/// Sets up data production and describes what will be produced.
///
/// `name` is the detector name; providers key their data by it. A logic
/// must support at least one of the two `prepare_*` shapes, declared in its
/// [`DataCapabilities`].
#[async_trait]
pub trait DetectorDataLogic: Send + Sync {
    /// Which provider shapes this logic can produce.
    fn capabilities(&self) -> DataCapabilities;

    /// Set up for a single in-band reading per acquisition.
    async fn prepare_single(&self, name: &str) -> Result<Box<dyn ReadableDataProvider>> {
        let _ = name;
        Err(DetectorError::unsupported("prepare_single"))
    }

    /// Set up streamed writing of an unbounded number of collections to an
    /// external resource.
    async fn prepare_unbounded(&self, name: &str) -> Result<StreamableDataProvider> {
        let _ = name;
        Err(DetectorError::unsupported("prepare_unbounded"))
    }

    /// Field names downstream plotting should prefer.
    fn hinted_fields(&self, name: &str) -> Vec<String> {
        let _ = name;
        Vec::new()
    }

    /// Tear down data production. Idempotent; default is a no-op.
    async fn stop(&self) -> Result<()> {
        Ok(())
    }
}
