//! In-memory capability objects for tests and scan dry-runs.
//!
//! These implement the capability contracts without hardware:
//! [`MockTriggerLogic`] and [`MockArmLogic`] record what they were asked to
//! do, [`MockReadableDataLogic`] serves a soft scalar, and
//! [`SimStreamDataLogic`] plays the part of an external HDF5 writer whose
//! progress the test drives by hand.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::capabilities::{
    DataCapabilities, DetectorArmLogic, DetectorDataLogic, DetectorTriggerLogic,
    TriggerCapabilities,
};
use crate::error::Result;
use crate::providers::{
    ReadableDataProvider, SignalDataProvider, StreamResourceInfo, StreamableDataProvider,
};
use crate::signal::{Signal, SignalValues};
use crate::trigger_info::DetectorTrigger;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// The timing a [`MockTriggerLogic`] was last programmed with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreparedTiming {
    /// Trigger kind the dispatched hook corresponds to.
    pub trigger: DetectorTrigger,
    /// Total physical exposures requested.
    pub num: u64,
    /// Livetime passed in, zero for hooks that take none.
    pub livetime: f64,
    /// Deadtime passed in, zero for hooks that take none.
    pub deadtime: f64,
}

/// Trigger logic that records its prepare calls instead of programming
/// hardware.
///
/// Carries a soft `deadtime` configuration signal so deadtime derivation
/// and planning overrides can be exercised.
pub struct MockTriggerLogic {
    capabilities: TriggerCapabilities,
    deadtime_signal: Signal<f64>,
    prepared: Mutex<Option<PreparedTiming>>,
    prepared_exposures: Mutex<Option<u32>>,
}

impl MockTriggerLogic {
    /// A mock reporting the given capabilities, with a 1 ms default
    /// deadtime on its configuration signal.
    pub fn new(capabilities: TriggerCapabilities) -> Self {
        MockTriggerLogic {
            capabilities,
            deadtime_signal: Signal::soft("deadtime", 0.001),
            prepared: Mutex::new(None),
            prepared_exposures: Mutex::new(None),
        }
    }

    /// A mock supporting every trigger kind and exposure averaging.
    pub fn all_capabilities() -> Self {
        MockTriggerLogic::new(
            TriggerCapabilities::with_triggers([
                DetectorTrigger::Internal,
                DetectorTrigger::ExternalEdge,
                DetectorTrigger::ExternalLevel,
            ])
            .and_exposures_per_collection(),
        )
    }

    /// The soft signal feeding deadtime derivation.
    pub fn deadtime_signal(&self) -> Signal<f64> {
        self.deadtime_signal.clone()
    }

    /// What the last dispatched `prepare_*` hook was asked for.
    pub fn prepared(&self) -> Option<PreparedTiming> {
        *lock(&self.prepared)
    }

    /// The last requested exposures-per-collection, if the hook ran.
    pub fn prepared_exposures(&self) -> Option<u32> {
        *lock(&self.prepared_exposures)
    }
}

#[async_trait]
impl DetectorTriggerLogic for MockTriggerLogic {
    fn capabilities(&self) -> TriggerCapabilities {
        self.capabilities.clone()
    }

    fn config_signals(&self) -> Vec<Signal<f64>> {
        vec![self.deadtime_signal.clone()]
    }

    fn get_deadtime(&self, values: &SignalValues) -> Option<f64> {
        values.get("deadtime")
    }

    async fn prepare_internal(&self, num: u64, livetime: f64, deadtime: f64) -> Result<()> {
        *lock(&self.prepared) = Some(PreparedTiming {
            trigger: DetectorTrigger::Internal,
            num,
            livetime,
            deadtime,
        });
        Ok(())
    }

    async fn prepare_edge(&self, num: u64, livetime: f64) -> Result<()> {
        *lock(&self.prepared) = Some(PreparedTiming {
            trigger: DetectorTrigger::ExternalEdge,
            num,
            livetime,
            deadtime: 0.0,
        });
        Ok(())
    }

    async fn prepare_level(&self, num: u64) -> Result<()> {
        *lock(&self.prepared) = Some(PreparedTiming {
            trigger: DetectorTrigger::ExternalLevel,
            num,
            livetime: 0.0,
            deadtime: 0.0,
        });
        Ok(())
    }

    async fn prepare_exposures_per_collection(&self, exposures: u32) -> Result<()> {
        *lock(&self.prepared_exposures) = Some(exposures);
        Ok(())
    }
}

/// Arm logic with an instantaneous mock of hardware state.
///
/// `wait_for_idle` sleeps for a short configurable delay and then reports
/// idle, so step-scan timing paths are exercised without blocking tests.
pub struct MockArmLogic {
    armed: AtomicBool,
    arm_count: AtomicUsize,
    disarm_count: AtomicUsize,
    idle_delay: Duration,
}

impl Default for MockArmLogic {
    fn default() -> Self {
        MockArmLogic::new()
    }
}

impl MockArmLogic {
    /// A mock that goes idle 1 ms after a wait begins.
    pub fn new() -> Self {
        MockArmLogic {
            armed: AtomicBool::new(false),
            arm_count: AtomicUsize::new(0),
            disarm_count: AtomicUsize::new(0),
            idle_delay: Duration::from_millis(1),
        }
    }

    /// Change how long `wait_for_idle` takes.
    pub fn with_idle_delay(mut self, idle_delay: Duration) -> Self {
        self.idle_delay = idle_delay;
        self
    }

    /// Whether the mock hardware is currently armed.
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// How many times `arm` has run.
    pub fn arm_count(&self) -> usize {
        self.arm_count.load(Ordering::SeqCst)
    }

    /// How many times `disarm` has run.
    pub fn disarm_count(&self) -> usize {
        self.disarm_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DetectorArmLogic for MockArmLogic {
    async fn arm(&self) -> Result<()> {
        self.armed.store(true, Ordering::SeqCst);
        self.arm_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn wait_for_idle(&self) -> Result<()> {
        tokio::time::sleep(self.idle_delay).await;
        self.armed.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn disarm(&self) -> Result<()> {
        self.armed.store(false, Ordering::SeqCst);
        self.disarm_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Data logic serving one in-band scalar per acquisition.
pub struct MockReadableDataLogic {
    value: i64,
}

impl MockReadableDataLogic {
    /// A logic whose provider always reads `value` under the key
    /// `{name}-value`.
    pub fn new(value: i64) -> Self {
        MockReadableDataLogic { value }
    }
}

#[async_trait]
impl DetectorDataLogic for MockReadableDataLogic {
    fn capabilities(&self) -> DataCapabilities {
        DataCapabilities {
            single: true,
            unbounded: false,
        }
    }

    async fn prepare_single(&self, name: &str) -> Result<Box<dyn ReadableDataProvider>> {
        let key = format!("{}-value", name);
        Ok(Box::new(SignalDataProvider::new(
            key.clone(),
            Signal::soft(key, self.value),
        )))
    }

    fn hinted_fields(&self, name: &str) -> Vec<String> {
        vec![format!("{}-value", name)]
    }
}

/// Data logic playing the part of an external HDF5 writer.
///
/// Produces a streamable provider describing one `(10, 15)` frame dataset
/// in a file under `directory`. The test drives writer progress with
/// [`write_collections`](Self::write_collections); two instances with
/// independently driven counters exercise cross-provider reconciliation.
pub struct SimStreamDataLogic {
    directory: PathBuf,
    collections_written: Signal<u64>,
    stop_count: AtomicUsize,
}

impl SimStreamDataLogic {
    /// A writer simulation storing its file under `directory`.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        SimStreamDataLogic {
            directory: directory.into(),
            collections_written: Signal::soft("sim-collections-written", 0_u64),
            stop_count: AtomicUsize::new(0),
        }
    }

    /// Pretend the writer durably appended `count` more collections.
    pub fn write_collections(&self, count: u64) {
        let current = self.collections_written.get();
        self.collections_written.set(current + count);
    }

    /// The writer progress signal.
    pub fn collections_signal(&self) -> Signal<u64> {
        self.collections_written.clone()
    }

    /// How many times `stop` has run.
    pub fn stop_count(&self) -> usize {
        self.stop_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DetectorDataLogic for SimStreamDataLogic {
    fn capabilities(&self) -> DataCapabilities {
        DataCapabilities {
            single: false,
            unbounded: true,
        }
    }

    async fn prepare_unbounded(&self, name: &str) -> Result<StreamableDataProvider> {
        let uri = format!(
            "file://localhost{}/{}.h5",
            self.directory.display(),
            name
        );
        let resource = StreamResourceInfo::new(name, vec![10, 15], vec![1, 10, 15], "|u1")
            .with_parameter("dataset", "/data");
        Ok(StreamableDataProvider::new(
            uri,
            "application/x-hdf5",
            vec![resource],
            self.collections_written.clone(),
        ))
    }

    fn hinted_fields(&self, name: &str) -> Vec<String> {
        vec![name.to_string()]
    }

    async fn stop(&self) -> Result<()> {
        self.stop_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
