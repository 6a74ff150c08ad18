//! The detector orchestrator.
//!
//! [`StandardDetector`] composes the capability objects from
//! [`capabilities`](crate::capabilities) into one device with a uniform
//! acquisition life cycle:
//!
//! ```text
//! stage -> prepare -> { kickoff* -> complete | trigger } -> collect -> unstage
//! ```
//!
//! The orchestrator owns all cross-capability policy: when to arm relative
//! to `prepare`, which data-provider shape to create, how long to wait for
//! the writer, and how to reconcile progress across multiple data logics.
//! The capability objects stay policy-free.
//!
//! A single logical caller drives each detector; methods take `&mut self`
//! and every hardware wait is an awaited, timeout-bounded suspension point.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{select_all, try_join, try_join_all, BoxFuture};
use tokio::sync::watch;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info};

use crate::capabilities::{
    DetectorArmLogic, DetectorDataLogic, DetectorTriggerLogic, TriggerCapabilities,
};
use crate::documents::{new_uid, DataKey, Reading, StreamAsset};
use crate::error::{DetectorError, Result};
use crate::providers::{ReadableDataProvider, StreamableDataProvider};
use crate::settings::Settings;
use crate::signal::{DescribableSignal, SignalValues};
use crate::trigger_info::{DetectorTrigger, TriggerInfo};

/// Fallback bound for hardware waits when the request names no timeout.
///
/// Waits that scale with exposure length add the requested livetime and
/// deadtime on top.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// One progress observation published while [`StandardDetector::complete`]
/// waits for the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Detector name.
    pub name: String,
    /// Collections durably written so far.
    pub current: u64,
    /// Collections already written when the acquisition was prepared.
    pub initial: u64,
    /// Collection count at which the acquisition is complete.
    pub target: u64,
    /// Time since the first kickoff (or since `complete` began, for an
    /// acquisition that was never kicked off).
    pub time_elapsed: Duration,
}

/// Per-prepare state, dropped by `stage`/`unstage`.
struct PrepareState {
    info: TriggerInfo,
    initial_collections: u64,
    events_kicked_off: u64,
    descriptor: String,
    fly_start: Option<Instant>,
}

/// Which provider shape each data logic was prepared with. Providers are
/// recreated only when this changes between prepares.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ProviderLayout {
    collections_per_event: u32,
    streaming: Vec<bool>,
}

enum PreparedProvider {
    Readable(Box<dyn ReadableDataProvider>),
    Streamable(StreamableDataProvider),
}

/// A detector assembled from capability objects.
///
/// # Example
///
/// ```no_run
/// # async fn demo() -> daq_detector::Result<()> {
/// use std::sync::Arc;
/// use daq_detector::mock::SimStreamDataLogic;
/// use daq_detector::{StandardDetector, TriggerInfo};
///
/// let mut det = StandardDetector::new("det");
/// det.add_data_logic(Arc::new(SimStreamDataLogic::new("/data")));
/// det.stage().await?;
/// det.prepare(TriggerInfo::builder().number_of_events(5).build()?).await?;
/// det.kickoff(5).await?;
/// det.complete().await?;
/// let docs = det.collect_asset_docs(None).await?;
/// det.unstage().await?;
/// # let _ = docs;
/// # Ok(())
/// # }
/// ```
pub struct StandardDetector {
    name: String,
    trigger_logic: Option<Arc<dyn DetectorTriggerLogic>>,
    arm_logic: Option<Arc<dyn DetectorArmLogic>>,
    data_logics: Vec<Arc<dyn DetectorDataLogic>>,
    config_signals: Vec<Arc<dyn DescribableSignal>>,
    readables: Vec<Box<dyn ReadableDataProvider>>,
    streamables: Vec<StreamableDataProvider>,
    layout: Option<ProviderLayout>,
    ctx: Option<PrepareState>,
    armed: bool,
    progress_tx: watch::Sender<Option<ProgressUpdate>>,
}

impl StandardDetector {
    /// An empty detector; attach capability objects before use.
    pub fn new(name: impl Into<String>) -> Self {
        let (progress_tx, _) = watch::channel(None);
        StandardDetector {
            name: name.into(),
            trigger_logic: None,
            arm_logic: None,
            data_logics: Vec::new(),
            config_signals: Vec::new(),
            readables: Vec::new(),
            streamables: Vec::new(),
            layout: None,
            ctx: None,
            armed: false,
            progress_tx,
        }
    }

    /// The detector name. Data providers key their output by it.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the detector believes the hardware is currently armed.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Attach the trigger logic. At most one per detector.
    pub fn add_trigger_logic(&mut self, logic: Arc<dyn DetectorTriggerLogic>) -> Result<()> {
        if self.trigger_logic.is_some() {
            return Err(DetectorError::Configuration(format!(
                "Detector {} already has trigger logic",
                self.name
            )));
        }
        self.trigger_logic = Some(logic);
        Ok(())
    }

    /// Attach the arm logic. At most one per detector.
    pub fn add_arm_logic(&mut self, logic: Arc<dyn DetectorArmLogic>) -> Result<()> {
        if self.arm_logic.is_some() {
            return Err(DetectorError::Configuration(format!(
                "Detector {} already has arm logic",
                self.name
            )));
        }
        self.arm_logic = Some(logic);
        Ok(())
    }

    /// Attach a data logic. A detector may carry several.
    pub fn add_data_logic(&mut self, logic: Arc<dyn DetectorDataLogic>) {
        self.data_logics.push(logic);
    }

    /// Register a configuration signal reported by
    /// [`describe_configuration`](Self::describe_configuration).
    pub fn add_config_signal(&mut self, signal: Arc<dyn DescribableSignal>) {
        self.config_signals.push(signal);
    }

    /// Subscribe to progress updates published while [`complete`](Self::complete)
    /// waits for the writer. `None` until the first update of an acquisition.
    pub fn subscribe_progress(&self) -> watch::Receiver<Option<ProgressUpdate>> {
        self.progress_tx.subscribe()
    }

    /// The supported trigger kinds and the current deadtime, without side
    /// effects.
    ///
    /// `settings` substitutes values into the deadtime derivation by signal
    /// name so a planner can ask about a configuration it has not applied.
    /// A detector with no trigger logic supports exactly `Internal` and
    /// imposes no deadtime.
    pub fn get_trigger_deadtime(
        &self,
        settings: Option<&Settings>,
    ) -> (BTreeSet<DetectorTrigger>, Option<f64>) {
        match &self.trigger_logic {
            None => (BTreeSet::from([DetectorTrigger::Internal]), None),
            Some(logic) => {
                let mut values = SignalValues::from_signals(&logic.config_signals());
                if let Some(settings) = settings {
                    for (name, value) in settings.iter() {
                        values.insert(name, value);
                    }
                }
                (logic.capabilities().triggers, logic.get_deadtime(&values))
            }
        }
    }

    /// Program the hardware for one acquisition described by `info`.
    ///
    /// Validates the request against the attached capabilities, programs
    /// trigger timing and data production concurrently, arms eagerly for
    /// external trigger kinds, and snapshots the writer's current collection
    /// count as the acquisition baseline.
    ///
    /// Providers survive across prepares; they are stopped and recreated
    /// only when the provider shape or `collections_per_event` changes.
    pub async fn prepare(&mut self, info: TriggerInfo) -> Result<()> {
        if self.trigger_logic.is_none()
            && (info.livetime().is_some() || info.deadtime().is_some())
        {
            return Err(DetectorError::Configuration(format!(
                "Detector {} has no trigger logic, so cannot set livetime or deadtime",
                self.name
            )));
        }
        let caps = self
            .trigger_logic
            .as_ref()
            .map(|logic| logic.capabilities())
            .unwrap_or_else(TriggerCapabilities::internal_only);
        if !caps.supports(info.trigger()) {
            return Err(DetectorError::UnsupportedTrigger {
                requested: info.trigger(),
                supported: caps.triggers,
            });
        }
        if info.exposures_per_collection() > 1 && !caps.exposures_per_collection {
            return Err(DetectorError::Configuration(
                "Multiple exposures per collection not supported".to_string(),
            ));
        }
        let layout = self.plan_layout(&info)?;
        let recreate = self.layout.as_ref() != Some(&layout);

        let trigger_logic = self.trigger_logic.clone();
        let derived_deadtime = trigger_logic.as_ref().and_then(|logic| {
            let values = SignalValues::from_signals(&logic.config_signals());
            logic.get_deadtime(&values)
        });
        let livetime = info.livetime().unwrap_or(0.0);
        let deadtime = info.deadtime().or(derived_deadtime).unwrap_or(0.0);
        let num = info.number_of_exposures();
        let exposures = info.exposures_per_collection();
        let trigger_kind = info.trigger();

        let trigger_fut = async {
            if let Some(logic) = &trigger_logic {
                if exposures > 1 {
                    logic.prepare_exposures_per_collection(exposures).await?;
                }
                match trigger_kind {
                    DetectorTrigger::Internal => {
                        logic.prepare_internal(num, livetime, deadtime).await?;
                    }
                    DetectorTrigger::ExternalEdge => logic.prepare_edge(num, livetime).await?,
                    DetectorTrigger::ExternalLevel => logic.prepare_level(num).await?,
                }
            }
            Ok::<(), DetectorError>(())
        };

        if recreate {
            if self.layout.is_some() {
                debug!(detector = %self.name, "provider shape changed, stopping data logics");
                for logic in &self.data_logics {
                    logic.stop().await?;
                }
            }
            self.readables.clear();
            self.streamables.clear();
            // The old layout is gone from this point; if recreation fails,
            // the next prepare with any shape must rebuild the providers.
            self.layout = None;
            let creations = self
                .data_logics
                .iter()
                .zip(&layout.streaming)
                .map(|(logic, streaming)| {
                    let logic = logic.clone();
                    let name = self.name.clone();
                    let streaming = *streaming;
                    async move {
                        if streaming {
                            Ok::<_, DetectorError>(PreparedProvider::Streamable(
                                logic.prepare_unbounded(&name).await?,
                            ))
                        } else {
                            Ok(PreparedProvider::Readable(logic.prepare_single(&name).await?))
                        }
                    }
                });
            let ((), providers) = try_join(trigger_fut, try_join_all(creations)).await?;
            for provider in providers {
                match provider {
                    PreparedProvider::Readable(p) => self.readables.push(p),
                    PreparedProvider::Streamable(p) => self.streamables.push(p),
                }
            }
            self.layout = Some(layout);
        } else {
            trigger_fut.await?;
        }

        if trigger_kind != DetectorTrigger::Internal {
            if let Some(arm) = &self.arm_logic {
                arm.arm().await?;
                self.armed = true;
            }
        }
        let initial_collections = agreed_collections(&self.streamables)?;
        info!(
            detector = %self.name,
            trigger = %trigger_kind,
            events = info.number_of_events(),
            "prepared"
        );
        self.ctx = Some(PrepareState {
            info,
            initial_collections,
            events_kicked_off: 0,
            descriptor: new_uid(),
            fly_start: None,
        });
        Ok(())
    }

    /// Start acquiring `events_to_add` more events of the prepared
    /// acquisition.
    ///
    /// For internal triggering this arms the hardware (once); for external
    /// kinds the hardware is already armed and this only accounts for the
    /// triggers about to arrive.
    pub async fn kickoff(&mut self, events_to_add: u64) -> Result<()> {
        if self.ctx.is_none() {
            return Err(DetectorError::State("Prepare not run".to_string()));
        }
        if self.streamables.is_empty() {
            return Err(DetectorError::Configuration(format!(
                "Detector {} is not streamable, so cannot kickoff",
                self.name
            )));
        }
        agreed_collections(&self.streamables)?;
        let trigger_kind = {
            let ctx = self
                .ctx
                .as_mut()
                .ok_or_else(|| DetectorError::State("Prepare not run".to_string()))?;
            let start = ctx.events_kicked_off;
            let stop = start + events_to_add;
            let prepared = u64::from(ctx.info.number_of_events());
            if prepared != 0 && stop > prepared {
                return Err(DetectorError::KickoffBeyondPrepared {
                    start,
                    stop,
                    prepared,
                });
            }
            ctx.events_kicked_off = stop;
            if ctx.fly_start.is_none() {
                ctx.fly_start = Some(Instant::now());
            }
            debug!(detector = %self.name, start, stop, "kickoff");
            ctx.info.trigger()
        };
        if trigger_kind == DetectorTrigger::Internal && !self.armed {
            if let Some(arm) = &self.arm_logic {
                arm.arm().await?;
                self.armed = true;
            }
        }
        Ok(())
    }

    /// Take one step-scan acquisition: arm, wait for idle, and wait for the
    /// writer to durably absorb one event's worth of collections.
    ///
    /// Auto-prepares a default one-event internal acquisition if `prepare`
    /// has not run. Rejected after a multi-event prepare.
    pub async fn trigger(&mut self) -> Result<()> {
        if self.ctx.is_none() {
            self.prepare(TriggerInfo::single_internal()).await?;
        }
        let (events, collections_per_event, bound) = {
            let ctx = self.require_prepared()?;
            (
                ctx.info.number_of_events(),
                u64::from(ctx.info.collections_per_event()),
                collection_timeout(&ctx.info),
            )
        };
        if events != 1 {
            return Err(DetectorError::State(
                "trigger() is not supported for multiple events".to_string(),
            ));
        }
        let initial = agreed_collections(&self.streamables)?;
        if let Some(arm) = &self.arm_logic {
            arm.arm().await?;
            arm.wait_for_idle().await?;
        }
        if !self.streamables.is_empty() {
            self.wait_for_collections(initial + collections_per_event, bound)
                .await?;
        }
        Ok(())
    }

    /// Wait until everything kicked off so far has been durably written.
    ///
    /// Publishes a [`ProgressUpdate`] on the progress channel at the start
    /// and at every writer advance. Each wait step is bounded by the
    /// request's exposure timeout (or a computed default), so a stalled
    /// writer fails rather than hanging; a writer whose progress readback
    /// disconnects fails with [`DetectorError::ReadbackLost`] instead.
    /// When the full prepared event count has been kicked off, also waits
    /// for the hardware to go idle and considers the detector disarmed.
    pub async fn complete(&mut self) -> Result<()> {
        let (info, initial, kicked, fly_start) = {
            let ctx = self.require_prepared()?;
            (
                ctx.info.clone(),
                ctx.initial_collections,
                ctx.events_kicked_off,
                ctx.fly_start,
            )
        };
        if !self.streamables.is_empty() {
            let target = initial + kicked * u64::from(info.collections_per_event());
            let step_bound = collection_timeout(&info);
            let started = fly_start.unwrap_or_else(Instant::now);
            let mut rxs: Vec<_> = self
                .streamables
                .iter()
                .map(|p| p.subscribe_collections())
                .collect();
            let mut alive: Vec<_> = self
                .streamables
                .iter()
                .map(|p| p.subscribe_connected())
                .collect();
            loop {
                if alive.iter_mut().any(|rx| !*rx.borrow_and_update()) {
                    return Err(DetectorError::ReadbackLost {
                        signal: format!("{} collections written", self.name),
                    });
                }
                let current = agreed_collections(&self.streamables)?;
                self.progress_tx.send_replace(Some(ProgressUpdate {
                    name: self.name.clone(),
                    current,
                    initial,
                    target,
                    time_elapsed: started.elapsed(),
                }));
                if current >= target {
                    break;
                }
                let deadline = Instant::now() + step_bound;
                let changed = select_all(
                    rxs.iter_mut()
                        .map(changed_boxed)
                        .chain(alive.iter_mut().map(changed_boxed)),
                );
                if timeout_at(deadline, changed).await.is_err() {
                    return Err(DetectorError::WaitTimeout {
                        signal: format!("{} collections written", self.name),
                        elapsed: step_bound,
                    });
                }
            }
        }
        let events = info.number_of_events();
        if events > 0 && kicked >= u64::from(events) {
            if let Some(arm) = &self.arm_logic {
                arm.wait_for_idle().await?;
            }
            self.armed = false;
            info!(detector = %self.name, "acquisition complete");
        }
        Ok(())
    }

    /// Report newly durable collections as stream documents.
    ///
    /// With `index = None`, collects up to the writers' agreed current
    /// count. An explicit index must not be lower than anything already
    /// emitted; repeating an index emits nothing.
    pub async fn collect_asset_docs(&mut self, index: Option<u64>) -> Result<Vec<StreamAsset>> {
        let (collections_per_event, descriptor) = {
            let ctx = self.require_prepared()?;
            (ctx.info.collections_per_event(), ctx.descriptor.clone())
        };
        let idx = match index {
            Some(idx) => {
                for provider in &self.streamables {
                    if idx < provider.last_emitted() {
                        return Err(DetectorError::State(format!(
                            "Received index {} but already emitted up to {}",
                            idx,
                            provider.last_emitted()
                        )));
                    }
                }
                idx
            }
            None => agreed_collections(&self.streamables)?,
        };
        let mut assets = Vec::new();
        for provider in &mut self.streamables {
            assets.extend(
                provider
                    .collect_stream_assets(idx, collections_per_event, &descriptor)
                    .await?,
            );
        }
        Ok(assets)
    }

    /// Schema of everything this acquisition will produce: in-band readable
    /// keys plus streamed keys (shape prefixed with `collections_per_event`,
    /// marked external).
    pub fn describe(&self) -> Result<HashMap<String, DataKey>> {
        let collections_per_event = self.require_prepared()?.info.collections_per_event();
        let mut keys = HashMap::new();
        for provider in &self.readables {
            keys.extend(provider.data_keys());
        }
        for provider in &self.streamables {
            keys.extend(provider.data_keys(collections_per_event));
        }
        Ok(keys)
    }

    /// Schema of the streamed keys only, as seen by fly-scan collection.
    pub fn describe_collect(&self) -> Result<HashMap<String, DataKey>> {
        let collections_per_event = self.require_prepared()?.info.collections_per_event();
        let mut keys = HashMap::new();
        for provider in &self.streamables {
            keys.extend(provider.data_keys(collections_per_event));
        }
        Ok(keys)
    }

    /// Read the current in-band values. Key set matches the non-external
    /// part of [`describe`](Self::describe).
    pub async fn read(&self) -> Result<HashMap<String, Reading>> {
        self.require_prepared()?;
        let readings = try_join_all(self.readables.iter().map(|p| p.read())).await?;
        Ok(readings.into_iter().flatten().collect())
    }

    /// Schema of the registered configuration signals.
    pub fn describe_configuration(&self) -> HashMap<String, DataKey> {
        self.config_signals
            .iter()
            .map(|s| (s.name().to_string(), s.data_key()))
            .collect()
    }

    /// Current values of the registered configuration signals.
    pub fn read_configuration(&self) -> HashMap<String, Reading> {
        self.config_signals
            .iter()
            .map(|s| (s.name().to_string(), s.reading()))
            .collect()
    }

    /// Fields downstream plotting should prefer: the union of every data
    /// logic's hinted fields, in registration order.
    pub fn hints(&self) -> Vec<String> {
        let mut fields = Vec::new();
        for logic in &self.data_logics {
            for field in logic.hinted_fields(&self.name) {
                if !fields.contains(&field) {
                    fields.push(field);
                }
            }
        }
        fields
    }

    /// Put the detector in a known state at the start of a run: disarmed,
    /// with any previous acquisition context dropped. Registered logics and
    /// live providers are kept.
    pub async fn stage(&mut self) -> Result<()> {
        if let Some(arm) = &self.arm_logic {
            arm.disarm().await?;
        }
        self.armed = false;
        self.ctx = None;
        self.progress_tx.send_replace(None);
        Ok(())
    }

    /// Release the detector at the end of a run: disarm, stop data
    /// production, and drop providers and acquisition context.
    pub async fn unstage(&mut self) -> Result<()> {
        if let Some(arm) = &self.arm_logic {
            arm.disarm().await?;
        }
        self.armed = false;
        for logic in &self.data_logics {
            logic.stop().await?;
        }
        self.readables.clear();
        self.streamables.clear();
        self.layout = None;
        self.ctx = None;
        Ok(())
    }

    fn require_prepared(&self) -> Result<&PrepareState> {
        self.ctx
            .as_ref()
            .ok_or_else(|| DetectorError::State("Prepare not run".to_string()))
    }

    /// Decide which provider shape each data logic gets for this request.
    fn plan_layout(&self, info: &TriggerInfo) -> Result<ProviderLayout> {
        let may_fly = self.arm_logic.is_some() || self.trigger_logic.is_some();
        let mut streaming = Vec::with_capacity(self.data_logics.len());
        for logic in &self.data_logics {
            let caps = logic.capabilities();
            if !caps.single && !caps.unbounded {
                return Err(DetectorError::Configuration(format!(
                    "Data logic of detector {} hasn't overridden any prepare_* methods",
                    self.name
                )));
            }
            let wants_stream = if info.number_of_collections() != 1 {
                if !caps.unbounded {
                    return Err(DetectorError::Configuration(
                        "Multiple collections not supported".to_string(),
                    ));
                }
                true
            } else {
                // A one-collection request still streams when the detector
                // could be flown, so step and fly scans see the same keys.
                caps.unbounded && (may_fly || !caps.single)
            };
            streaming.push(wants_stream);
        }
        Ok(ProviderLayout {
            collections_per_event: info.collections_per_event(),
            streaming,
        })
    }

    /// Wait until the writers agree on at least `target` collections.
    async fn wait_for_collections(&self, target: u64, bound: Duration) -> Result<u64> {
        let deadline = Instant::now() + bound;
        let mut rxs: Vec<_> = self
            .streamables
            .iter()
            .map(|p| p.subscribe_collections())
            .collect();
        let mut alive: Vec<_> = self
            .streamables
            .iter()
            .map(|p| p.subscribe_connected())
            .collect();
        loop {
            if alive.iter_mut().any(|rx| !*rx.borrow_and_update()) {
                return Err(DetectorError::ReadbackLost {
                    signal: format!("{} collections written", self.name),
                });
            }
            let current = agreed_collections(&self.streamables)?;
            if current >= target {
                return Ok(current);
            }
            let changed = select_all(
                rxs.iter_mut()
                    .map(changed_boxed)
                    .chain(alive.iter_mut().map(changed_boxed)),
            );
            if timeout_at(deadline, changed).await.is_err() {
                return Err(DetectorError::WaitTimeout {
                    signal: format!("{} collections written", self.name),
                    elapsed: bound,
                });
            }
        }
    }
}

/// Boxed `changed()` future, so progress and connection receivers of
/// different value types can share one `select_all`.
fn changed_boxed<T: Send + Sync>(
    rx: &mut watch::Receiver<T>,
) -> BoxFuture<'_, std::result::Result<(), watch::error::RecvError>> {
    Box::pin(rx.changed())
}

/// The collection count all streamable providers agree on.
///
/// No providers means zero. Disagreement is a consistency error naming the
/// full conflicting set; it is never resolved by picking one value.
fn agreed_collections(streamables: &[StreamableDataProvider]) -> Result<u64> {
    let counts: BTreeSet<u64> = streamables.iter().map(|p| p.collections_written()).collect();
    if counts.len() > 1 {
        return Err(DetectorError::InconsistentCollections { counts });
    }
    Ok(counts.first().copied().unwrap_or(0))
}

/// Bound for one collection's wait: the request's exposure timeout, or the
/// default padded with the requested exposure timing.
fn collection_timeout(info: &TriggerInfo) -> Duration {
    info.exposure_timeout().unwrap_or_else(|| {
        DEFAULT_TIMEOUT
            + Duration::from_secs_f64(
                info.livetime().unwrap_or(0.0) + info.deadtime().unwrap_or(0.0),
            )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Signal;

    #[test]
    fn no_trigger_logic_supports_internal_only() {
        let det = StandardDetector::new("det");
        let (triggers, deadtime) = det.get_trigger_deadtime(None);
        assert_eq!(triggers, BTreeSet::from([DetectorTrigger::Internal]));
        assert_eq!(deadtime, None);
    }

    #[test]
    fn describe_before_prepare_is_a_state_error() {
        let det = StandardDetector::new("det");
        let err = det.describe().unwrap_err();
        assert_eq!(err.to_string(), "Prepare not run");
    }

    #[test]
    fn configuration_signals_round_trip() {
        let mut det = StandardDetector::new("det");
        det.add_config_signal(Arc::new(Signal::soft("det-exposure", 0.1_f64)));
        let keys = det.describe_configuration();
        assert_eq!(keys["det-exposure"].dtype, "number");
        assert_eq!(keys["det-exposure"].source, "soft://det-exposure");
        let readings = det.read_configuration();
        assert_eq!(readings["det-exposure"].value, serde_json::json!(0.1));
    }

    #[test]
    fn collection_timeout_pads_default_with_timing() {
        let info = TriggerInfo::builder()
            .livetime(1.0)
            .deadtime(0.5)
            .build()
            .unwrap();
        assert_eq!(
            collection_timeout(&info),
            DEFAULT_TIMEOUT + Duration::from_secs_f64(1.5)
        );
        let info = TriggerInfo::builder()
            .livetime(1.0)
            .exposure_timeout(2.0)
            .build()
            .unwrap();
        assert_eq!(collection_timeout(&info), Duration::from_secs(2));
    }

    #[test]
    fn agreed_collections_reconciles() {
        assert_eq!(agreed_collections(&[]).unwrap(), 0);
    }
}
