//! Metadata documents describing acquired data.
//!
//! Detectors never move pixel data through this crate. Instead they emit
//! small serializable documents that tell a downstream consumer where the
//! data lives and how to interpret it:
//!
//! - [`DataKey`]: schema entry for one named value (type, shape, source)
//! - [`Reading`]: one in-band scalar value with its timestamp
//! - [`StreamResourceDoc`]: pointer to an external resource (e.g. one
//!   dataset inside an HDF5 file), emitted once per resource lifetime
//! - [`StreamDatumDoc`]: a half-open index range newly appended to a
//!   previously described resource
//!
//! # Document Flow
//!
//! ```text
//! StreamResourceDoc (1 per resource, before any datum for it)
//!    │
//!    └── StreamDatumDoc (N, contiguous non-overlapping index ranges)
//! ```

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate a new unique document ID.
pub fn new_uid() -> String {
    Uuid::new_v4().to_string()
}

/// Current timestamp in nanoseconds since Unix epoch.
pub fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_nanos() as u64
}

/// Schema for one named value a detector produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataKey {
    /// Data type: "number", "integer", "boolean", "string", "array".
    pub dtype: String,
    /// Numpy-style dtype tag (e.g. `<f8`, `|u1`) for binary consumers.
    pub dtype_numpy: String,
    /// Shape for arrays (empty for scalars).
    pub shape: Vec<usize>,
    /// Where the value comes from (e.g. `soft://exposure`).
    pub source: String,
    /// Set to `"STREAM:"` when the value lives in an external resource
    /// rather than arriving in-band with a [`Reading`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external: Option<String>,
}

/// One in-band value with the time it was observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// The observed value.
    pub value: serde_json::Value,
    /// When it was observed, nanoseconds since Unix epoch.
    pub timestamp_ns: u64,
}

/// Half-open `[start, stop)` range of collection indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRange {
    /// First index in the range.
    pub start: u64,
    /// One past the last index in the range.
    pub stop: u64,
}

impl StreamRange {
    /// Whether the range covers no indices.
    pub fn is_empty(&self) -> bool {
        self.stop <= self.start
    }

    /// Number of indices covered.
    pub fn len(&self) -> u64 {
        self.stop.saturating_sub(self.start)
    }
}

/// Pointer to an externally written resource holding streamed data.
///
/// Emitted exactly once per resource lifetime, strictly before the first
/// [`StreamDatumDoc`] referencing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamResourceDoc {
    /// Unique resource ID; datum documents link back to it.
    pub uid: String,
    /// Name of the data key this resource backs.
    pub data_key: String,
    /// Media type of the resource (e.g. `application/x-hdf5`).
    pub mimetype: String,
    /// Where the resource lives (e.g. `file://localhost/data/run1.h5`).
    pub uri: String,
    /// Format-specific parameters (dataset path, chunk shape, multiplier).
    pub parameters: HashMap<String, serde_json::Value>,
}

/// A newly appended range of collections within a stream resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDatumDoc {
    /// Unique datum ID.
    pub uid: String,
    /// UID of the [`StreamResourceDoc`] this range belongs to.
    pub stream_resource: String,
    /// UID of the describe-time schema this datum was collected under.
    pub descriptor: String,
    /// Collection indices covered, contiguous with the previous datum.
    pub indices: StreamRange,
    /// Event sequence numbers; emitted as a zero range, the consumer
    /// renumbers when it assembles events.
    pub seq_nums: StreamRange,
}

/// Document emitted while collecting streamed data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamAsset {
    /// A resource pointer, first emission for a given resource.
    StreamResource(StreamResourceDoc),
    /// A newly durable index range.
    StreamDatum(StreamDatumDoc),
}

impl StreamAsset {
    /// Get the document UID.
    pub fn uid(&self) -> &str {
        match self {
            StreamAsset::StreamResource(d) => &d.uid,
            StreamAsset::StreamDatum(d) => &d.uid,
        }
    }

    /// The resource document, if this is one.
    pub fn as_resource(&self) -> Option<&StreamResourceDoc> {
        match self {
            StreamAsset::StreamResource(d) => Some(d),
            StreamAsset::StreamDatum(_) => None,
        }
    }

    /// The datum document, if this is one.
    pub fn as_datum(&self) -> Option<&StreamDatumDoc> {
        match self {
            StreamAsset::StreamDatum(d) => Some(d),
            StreamAsset::StreamResource(_) => None,
        }
    }
}
