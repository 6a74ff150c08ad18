//! Data providers created at prepare time.
//!
//! A [`DetectorDataLogic`](crate::capabilities::DetectorDataLogic) produces
//! one of two provider shapes when an acquisition is prepared:
//!
//! - [`ReadableDataProvider`]: one in-band reading per acquisition, for
//!   step scans on detectors without a streaming writer
//! - [`StreamableDataProvider`]: collections appended to an external
//!   resource by a writer outside this process, observed through a
//!   collections-written counter and reported as stream documents
//!
//! The streamable provider owns the exactly-once bookkeeping for resource
//! documents and the high-water mark for datum ranges, so repeated
//! collection calls at the same index emit nothing.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::debug;

use crate::documents::{
    new_uid, DataKey, Reading, StreamAsset, StreamDatumDoc, StreamRange, StreamResourceDoc,
};
use crate::error::Result;
use crate::signal::{Signal, SignalValue};

/// Provides one in-band reading per acquisition.
#[async_trait]
pub trait ReadableDataProvider: Send + Sync {
    /// Schema of the values [`read`](Self::read) will return.
    fn data_keys(&self) -> HashMap<String, DataKey>;

    /// Read the current values. Key set matches [`data_keys`](Self::data_keys).
    async fn read(&self) -> Result<HashMap<String, Reading>>;
}

/// A readable provider backed by a single signal.
#[derive(Debug, Clone)]
pub struct SignalDataProvider<T: SignalValue> {
    key: String,
    signal: Signal<T>,
}

impl<T: SignalValue> SignalDataProvider<T> {
    /// Expose `signal` under the data key `key`.
    pub fn new(key: impl Into<String>, signal: Signal<T>) -> Self {
        SignalDataProvider {
            key: key.into(),
            signal,
        }
    }
}

#[async_trait]
impl<T: SignalValue> ReadableDataProvider for SignalDataProvider<T> {
    fn data_keys(&self) -> HashMap<String, DataKey> {
        HashMap::from([(self.key.clone(), self.signal.data_key())])
    }

    async fn read(&self) -> Result<HashMap<String, Reading>> {
        Ok(HashMap::from([(self.key.clone(), self.signal.reading())]))
    }
}

/// Description of one dataset inside a streamed resource.
#[derive(Debug, Clone)]
pub struct StreamResourceInfo {
    data_key: String,
    shape: Vec<usize>,
    chunk_shape: Vec<usize>,
    dtype_numpy: String,
    parameters: HashMap<String, serde_json::Value>,
    source: Option<String>,
    uid: String,
}

impl StreamResourceInfo {
    /// Describe a dataset of per-collection `shape` written in `chunk_shape`
    /// chunks. The resource uid is fixed here so datum documents can link to
    /// it across collection calls.
    pub fn new(
        data_key: impl Into<String>,
        shape: Vec<usize>,
        chunk_shape: Vec<usize>,
        dtype_numpy: impl Into<String>,
    ) -> Self {
        StreamResourceInfo {
            data_key: data_key.into(),
            shape,
            chunk_shape,
            dtype_numpy: dtype_numpy.into(),
            parameters: HashMap::new(),
            source: None,
            uid: new_uid(),
        }
    }

    /// Attach a format-specific parameter (e.g. the dataset path).
    pub fn with_parameter(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Override the describe-time source address. Defaults to the provider
    /// URI; a live readback address can be named here instead.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// The data key this dataset backs.
    pub fn data_key(&self) -> &str {
        &self.data_key
    }
}

/// Observes collections being appended to an external resource and turns
/// them into stream documents.
///
/// The writer process advances the collections-written counter as data
/// becomes durable; this provider never sees the data itself.
#[derive(Debug)]
pub struct StreamableDataProvider {
    uri: String,
    mimetype: String,
    resources: Vec<StreamResourceInfo>,
    collections_written: Signal<u64>,
    flush: Option<Signal<bool>>,
    resources_emitted: bool,
    last_emitted: u64,
}

impl StreamableDataProvider {
    /// A provider for the resource at `uri`, with the writer's progress
    /// surfacing on `collections_written`.
    pub fn new(
        uri: impl Into<String>,
        mimetype: impl Into<String>,
        resources: Vec<StreamResourceInfo>,
        collections_written: Signal<u64>,
    ) -> Self {
        StreamableDataProvider {
            uri: uri.into(),
            mimetype: mimetype.into(),
            resources,
            collections_written,
            flush: None,
            resources_emitted: false,
            last_emitted: 0,
        }
    }

    /// Attach a flush nudge set before each counter read, for writers that
    /// only commit on request.
    pub fn with_flush_signal(mut self, flush: Signal<bool>) -> Self {
        self.flush = Some(flush);
        self
    }

    /// Where the resource lives.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Media type of the resource.
    pub fn mimetype(&self) -> &str {
        &self.mimetype
    }

    /// Collections durably written so far.
    pub fn collections_written(&self) -> u64 {
        self.collections_written.get()
    }

    /// Subscribe to writer progress.
    pub fn subscribe_collections(&self) -> watch::Receiver<u64> {
        self.collections_written.subscribe()
    }

    /// Whether the writer's progress readback is still connected.
    pub fn is_connected(&self) -> bool {
        self.collections_written.is_connected()
    }

    /// Subscribe to the progress readback's connection state.
    pub fn subscribe_connected(&self) -> watch::Receiver<bool> {
        self.collections_written.subscribe_connected()
    }

    /// High-water mark of indices already reported as datum documents.
    pub fn last_emitted(&self) -> u64 {
        self.last_emitted
    }

    /// Schema entries for the streamed datasets.
    ///
    /// Each key's shape is the per-collection resource shape prefixed with
    /// `collections_per_event`, since one event carries that many
    /// collections.
    pub fn data_keys(&self, collections_per_event: u32) -> HashMap<String, DataKey> {
        self.resources
            .iter()
            .map(|info| {
                let mut shape = Vec::with_capacity(info.shape.len() + 1);
                shape.push(collections_per_event as usize);
                shape.extend_from_slice(&info.shape);
                // A 1-D resource counts as scalar per collection.
                let dtype = if collections_per_event > 1 || info.shape.len() > 1 {
                    "array"
                } else {
                    "number"
                };
                let key = DataKey {
                    dtype: dtype.to_string(),
                    dtype_numpy: info.dtype_numpy.clone(),
                    shape,
                    source: info.source.clone().unwrap_or_else(|| self.uri.clone()),
                    external: Some("STREAM:".to_string()),
                };
                (info.data_key.clone(), key)
            })
            .collect()
    }

    /// Report everything newly durable up to `index` as stream documents.
    ///
    /// The first call with a non-empty range also emits one resource
    /// document per dataset, strictly before any datum referencing it.
    /// Calls that do not advance past [`last_emitted`](Self::last_emitted)
    /// emit nothing, so repeating an index is safe.
    pub async fn collect_stream_assets(
        &mut self,
        index: u64,
        collections_per_event: u32,
        descriptor: &str,
    ) -> Result<Vec<StreamAsset>> {
        if let Some(flush) = &self.flush {
            flush.set(true);
        }
        if index <= self.last_emitted {
            return Ok(Vec::new());
        }
        let mut assets = Vec::new();
        if !self.resources_emitted {
            for info in &self.resources {
                let mut parameters = info.parameters.clone();
                parameters.insert("chunk_shape".to_string(), info.chunk_shape.clone().into());
                parameters.insert(
                    "multiplier".to_string(),
                    u64::from(collections_per_event).into(),
                );
                assets.push(StreamAsset::StreamResource(StreamResourceDoc {
                    uid: info.uid.clone(),
                    data_key: info.data_key.clone(),
                    mimetype: self.mimetype.clone(),
                    uri: self.uri.clone(),
                    parameters,
                }));
            }
            self.resources_emitted = true;
        }
        let indices = StreamRange {
            start: self.last_emitted,
            stop: index,
        };
        for info in &self.resources {
            assets.push(StreamAsset::StreamDatum(StreamDatumDoc {
                uid: new_uid(),
                stream_resource: info.uid.clone(),
                descriptor: descriptor.to_string(),
                indices,
                seq_nums: StreamRange { start: 0, stop: 0 },
            }));
        }
        debug!(
            uri = %self.uri,
            start = indices.start,
            stop = indices.stop,
            "emitting stream documents"
        );
        self.last_emitted = index;
        Ok(assets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> StreamableDataProvider {
        let info = StreamResourceInfo::new("det-data", vec![10, 15], vec![1, 10, 15], "|u1")
            .with_parameter("dataset", "/data");
        StreamableDataProvider::new(
            "file://localhost/data/test.h5",
            "application/x-hdf5",
            vec![info],
            Signal::soft("det-collections-written", 0_u64),
        )
    }

    #[tokio::test]
    async fn resource_emitted_once_before_first_datum() {
        let mut provider = provider();
        let assets = provider.collect_stream_assets(2, 1, "desc").await.unwrap();
        assert_eq!(assets.len(), 2);
        let resource = assets[0].as_resource().unwrap();
        assert_eq!(resource.data_key, "det-data");
        assert_eq!(resource.mimetype, "application/x-hdf5");
        assert_eq!(
            resource.parameters.get("dataset"),
            Some(&serde_json::json!("/data"))
        );
        assert_eq!(
            resource.parameters.get("multiplier"),
            Some(&serde_json::json!(1))
        );
        let datum = assets[1].as_datum().unwrap();
        assert_eq!(datum.stream_resource, resource.uid);
        assert_eq!(datum.descriptor, "desc");
        assert_eq!(datum.indices, StreamRange { start: 0, stop: 2 });
        assert_eq!(datum.seq_nums, StreamRange { start: 0, stop: 0 });

        // Second call picks up where the first left off, no second resource.
        let assets = provider.collect_stream_assets(5, 1, "desc").await.unwrap();
        assert_eq!(assets.len(), 1);
        let datum = assets[0].as_datum().unwrap();
        assert_eq!(datum.indices, StreamRange { start: 2, stop: 5 });
    }

    #[tokio::test]
    async fn repeated_index_emits_nothing() {
        let mut provider = provider();
        let first = provider.collect_stream_assets(3, 1, "desc").await.unwrap();
        assert!(!first.is_empty());
        let again = provider.collect_stream_assets(3, 1, "desc").await.unwrap();
        assert!(again.is_empty());
        let zero = provider.collect_stream_assets(0, 1, "desc").await.unwrap();
        assert!(zero.is_empty());
        assert_eq!(provider.last_emitted(), 3);
    }

    #[tokio::test]
    async fn empty_range_defers_resource_emission() {
        let mut provider = provider();
        assert!(provider
            .collect_stream_assets(0, 1, "desc")
            .await
            .unwrap()
            .is_empty());
        // Resource doc still arrives with the first real range.
        let assets = provider.collect_stream_assets(1, 1, "desc").await.unwrap();
        assert!(assets[0].as_resource().is_some());
    }

    #[tokio::test]
    async fn flush_signal_nudged_on_collect() {
        let flush = Signal::soft("det-flush", false);
        let mut provider = provider().with_flush_signal(flush.clone());
        provider.collect_stream_assets(0, 1, "desc").await.unwrap();
        assert!(flush.get());
    }

    #[test]
    fn data_keys_prefix_shape_with_collections_per_event() {
        let provider = provider();
        let keys = provider.data_keys(2);
        let key = &keys["det-data"];
        assert_eq!(key.shape, vec![2, 10, 15]);
        assert_eq!(key.dtype, "array");
        assert_eq!(key.dtype_numpy, "|u1");
        assert_eq!(key.external.as_deref(), Some("STREAM:"));
        assert_eq!(key.source, "file://localhost/data/test.h5");
    }

    #[test]
    fn scalar_resource_is_number_until_multiplied() {
        let info = StreamResourceInfo::new("det-sum", vec![], vec![1], "<f8")
            .with_source("ca://DET:Sum");
        let provider = StreamableDataProvider::new(
            "file://localhost/data/test.h5",
            "application/x-hdf5",
            vec![info],
            Signal::soft("det-collections-written", 0_u64),
        );
        let scalar = provider.data_keys(1);
        assert_eq!(scalar["det-sum"].dtype, "number");
        assert_eq!(scalar["det-sum"].shape, vec![1]);
        assert_eq!(scalar["det-sum"].source, "ca://DET:Sum");
        let stacked = provider.data_keys(3);
        assert_eq!(stacked["det-sum"].dtype, "array");
        assert_eq!(stacked["det-sum"].shape, vec![3]);
    }

    #[test]
    fn one_dimensional_resource_is_number_until_multiplied() {
        let info = StreamResourceInfo::new("det-spectrum", vec![512], vec![1, 512], "<f8");
        let provider = StreamableDataProvider::new(
            "file://localhost/data/test.h5",
            "application/x-hdf5",
            vec![info],
            Signal::soft("det-collections-written", 0_u64),
        );
        let single = provider.data_keys(1);
        assert_eq!(single["det-spectrum"].dtype, "number");
        assert_eq!(single["det-spectrum"].shape, vec![1, 512]);
        let stacked = provider.data_keys(2);
        assert_eq!(stacked["det-spectrum"].dtype, "array");
        assert_eq!(stacked["det-spectrum"].shape, vec![2, 512]);
    }

    #[tokio::test]
    async fn signal_provider_reads_its_signal() {
        let signal = Signal::soft("det-value", 42_i64);
        let provider = SignalDataProvider::new("det-value", signal);
        let keys = provider.data_keys();
        assert_eq!(keys["det-value"].dtype, "integer");
        let readings = provider.read().await.unwrap();
        assert_eq!(readings["det-value"].value, serde_json::json!(42));
    }
}
