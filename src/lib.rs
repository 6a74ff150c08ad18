//! Acquisition orchestration for triggered, streaming detectors.
//!
//! This crate coordinates detectors through a uniform acquisition life
//! cycle without touching pixel data or wire protocols. A detector is
//! assembled from small capability objects and driven by a
//! [`StandardDetector`]:
//!
//! - [`capabilities`]: the trigger, arm, and data contracts hardware
//!   integrations implement
//! - [`detector`]: the orchestrator owning all cross-capability policy
//! - [`trigger_info`]: the validated description of one acquisition
//! - [`providers`] and [`documents`]: how produced data is described and
//!   reported downstream
//! - [`signal`]: the named observable value seam to the transport layer
//! - [`mock`]: in-memory capability objects for tests and dry-runs
//!
//! # Example
//!
//! ```no_run
//! # async fn demo() -> daq_detector::Result<()> {
//! use std::sync::Arc;
//! use daq_detector::mock::{MockArmLogic, MockTriggerLogic, SimStreamDataLogic};
//! use daq_detector::{DetectorTrigger, StandardDetector, TriggerInfo};
//!
//! let mut det = StandardDetector::new("det");
//! det.add_trigger_logic(Arc::new(MockTriggerLogic::all_capabilities()))?;
//! det.add_arm_logic(Arc::new(MockArmLogic::new()))?;
//! det.add_data_logic(Arc::new(SimStreamDataLogic::new("/data/run1")));
//!
//! det.stage().await?;
//! let info = TriggerInfo::builder()
//!     .trigger(DetectorTrigger::ExternalEdge)
//!     .number_of_events(100)
//!     .livetime(0.01)
//!     .build()?;
//! det.prepare(info).await?;
//! det.kickoff(100).await?;
//! det.complete().await?;
//! let docs = det.collect_asset_docs(None).await?;
//! det.unstage().await?;
//! # let _ = docs;
//! # Ok(())
//! # }
//! ```

pub mod capabilities;
pub mod detector;
pub mod documents;
pub mod error;
pub mod mock;
pub mod providers;
pub mod settings;
pub mod signal;
pub mod trigger_info;

pub use capabilities::{
    DataCapabilities, DetectorArmLogic, DetectorDataLogic, DetectorTriggerLogic,
    TriggerCapabilities,
};
pub use detector::{ProgressUpdate, StandardDetector, DEFAULT_TIMEOUT};
pub use documents::{
    DataKey, Reading, StreamAsset, StreamDatumDoc, StreamRange, StreamResourceDoc,
};
pub use error::{DetectorError, Result};
pub use providers::{
    ReadableDataProvider, SignalDataProvider, StreamResourceInfo, StreamableDataProvider,
};
pub use settings::Settings;
pub use signal::{Signal, SignalValues};
pub use trigger_info::{DetectorTrigger, TriggerInfo, TriggerInfoBuilder};
