//! Named observable values.
//!
//! Reactive value system using `tokio::sync::watch` for multi-subscriber
//! notifications. A [`Signal`] is the crate's only seam to the transport
//! layer: hardware readbacks and demand values surface here as named,
//! typed, subscribable values, and everything above this module is
//! transport-agnostic.
//!
//! Soft signals (created with [`Signal::soft`]) live entirely in memory and
//! back simulation and tests.
//!
//! # Example
//!
//! ```
//! use daq_detector::signal::Signal;
//!
//! let exposure = Signal::soft("exposure", 0.1_f64);
//! let mut rx = exposure.subscribe();
//! exposure.set(0.5);
//! assert_eq!(exposure.get(), 0.5);
//! assert_eq!(*rx.borrow_and_update(), 0.5);
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;

use crate::documents::{now_ns, DataKey, Reading};
use crate::error::{DetectorError, Result};

/// A value type that can live in a [`Signal`] and describe itself.
///
/// The dtype tags follow the event-model convention: a human-readable
/// `dtype` plus a numpy-style `dtype_numpy` for binary consumers.
pub trait SignalValue: Clone + Send + Sync + Serialize + 'static {
    /// Human-readable data type of this value.
    fn dtype() -> &'static str;

    /// Numpy-style dtype tag of this value.
    fn dtype_numpy() -> &'static str;

    /// Shape of this value; empty for scalars.
    fn shape(&self) -> Vec<usize> {
        Vec::new()
    }

    /// The value as JSON for in-band readings.
    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl SignalValue for f64 {
    fn dtype() -> &'static str {
        "number"
    }
    fn dtype_numpy() -> &'static str {
        "<f8"
    }
}

impl SignalValue for i64 {
    fn dtype() -> &'static str {
        "integer"
    }
    fn dtype_numpy() -> &'static str {
        "<i8"
    }
}

impl SignalValue for u64 {
    fn dtype() -> &'static str {
        "integer"
    }
    fn dtype_numpy() -> &'static str {
        "<u8"
    }
}

impl SignalValue for bool {
    fn dtype() -> &'static str {
        "boolean"
    }
    fn dtype_numpy() -> &'static str {
        "|b1"
    }
}

impl SignalValue for String {
    fn dtype() -> &'static str {
        "string"
    }
    fn dtype_numpy() -> &'static str {
        "|S40"
    }
}

impl SignalValue for Vec<f64> {
    fn dtype() -> &'static str {
        "array"
    }
    fn dtype_numpy() -> &'static str {
        "<f8"
    }
    fn shape(&self) -> Vec<usize> {
        vec![self.len()]
    }
}

/// A thread-safe, named observable value with change notifications.
///
/// Backed by `tokio::sync::watch`; clones share the same channel, so a set
/// through any clone notifies every subscriber.
pub struct Signal<T: SignalValue> {
    name: Arc<str>,
    source: Arc<str>,
    sender: watch::Sender<T>,
    connected: watch::Sender<bool>,
}

impl<T: SignalValue> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Signal {
            name: self.name.clone(),
            source: self.source.clone(),
            sender: self.sender.clone(),
            connected: self.connected.clone(),
        }
    }
}

impl<T: SignalValue> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("name", &self.name)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl<T: SignalValue> Signal<T> {
    /// Create a signal with an explicit source address.
    pub fn new(name: impl Into<String>, source: impl Into<String>, initial: T) -> Self {
        let (sender, _) = watch::channel(initial);
        let (connected, _) = watch::channel(true);
        Signal {
            name: name.into().into(),
            source: source.into().into(),
            sender,
            connected,
        }
    }

    /// Create an in-memory signal whose source is `soft://{name}`.
    pub fn soft(name: impl Into<String>, initial: T) -> Self {
        let name = name.into();
        let source = format!("soft://{}", name);
        Signal::new(name, source, initial)
    }

    /// The signal name, unique within a detector.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The transport address this signal reflects.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Get the current value (clone).
    pub fn get(&self) -> T {
        self.sender.borrow().clone()
    }

    /// Set a new value, notifying all subscribers.
    pub fn set(&self, value: T) {
        self.sender.send_replace(value);
    }

    /// Subscribe to value changes.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.sender.subscribe()
    }

    /// Whether the transport still backs this signal.
    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Mark the signal as lost: pending and future waits fail with
    /// [`DetectorError::ReadbackLost`]. The last value stays readable.
    /// Shared by all clones of the signal.
    pub fn disconnect(&self) {
        self.connected.send_replace(false);
    }

    /// Subscribe to connection-state changes.
    pub fn subscribe_connected(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }

    /// Describe-time schema entry for this signal.
    pub fn data_key(&self) -> DataKey {
        DataKey {
            dtype: T::dtype().to_string(),
            dtype_numpy: T::dtype_numpy().to_string(),
            shape: self.get().shape(),
            source: self.source.to_string(),
            external: None,
        }
    }

    /// Current value as a timestamped in-band reading.
    pub fn reading(&self) -> Reading {
        Reading {
            value: self.get().to_json(),
            timestamp_ns: now_ns(),
        }
    }
}

/// Type-erased view of a signal for describe/read over mixed value types.
pub trait DescribableSignal: Send + Sync {
    /// The signal name.
    fn name(&self) -> &str;

    /// Describe-time schema entry.
    fn data_key(&self) -> DataKey;

    /// Current value as a timestamped reading.
    fn reading(&self) -> Reading;
}

impl<T: SignalValue> DescribableSignal for Signal<T> {
    fn name(&self) -> &str {
        Signal::name(self)
    }

    fn data_key(&self) -> DataKey {
        Signal::data_key(self)
    }

    fn reading(&self) -> Reading {
        Signal::reading(self)
    }
}

/// Wait until `predicate` holds for the signal's value, bounded by `bound`.
///
/// Checks the current value first, then suspends on change notifications.
///
/// # Errors
///
/// [`DetectorError::WaitTimeout`] if the bound elapses first, or
/// [`DetectorError::ReadbackLost`] if the signal is
/// [disconnected](Signal::disconnect) before or during the wait. The two are
/// reported distinctly so a stuck device can be told apart from a
/// disconnected one. A disconnected signal fails even if the current value
/// already matches; that value is stale.
pub async fn wait_for_value<T, F>(signal: &Signal<T>, mut predicate: F, bound: Duration) -> Result<T>
where
    T: SignalValue,
    F: FnMut(&T) -> bool + Send,
{
    let mut rx = signal.subscribe();
    let mut alive = signal.subscribe_connected();
    let deadline = tokio::time::Instant::now() + bound;
    loop {
        if !*alive.borrow_and_update() {
            return Err(DetectorError::ReadbackLost {
                signal: signal.source().to_string(),
            });
        }
        let current = rx.borrow_and_update().clone();
        if predicate(&current) {
            return Ok(current);
        }
        let woken = async {
            tokio::select! {
                _ = rx.changed() => {}
                _ = alive.changed() => {}
            }
        };
        if tokio::time::timeout_at(deadline, woken).await.is_err() {
            return Err(DetectorError::WaitTimeout {
                signal: signal.source().to_string(),
                elapsed: bound,
            });
        }
    }
}

/// Wait for a state readback to land in one of the `good_states`.
///
/// Any observed state on the `bad_states` list fails immediately with
/// [`DetectorError::BadTerminalState`] naming the state and the allow-list.
/// States on neither list are transitional and are waited through.
pub async fn wait_for_good_state(
    signal: &Signal<String>,
    good_states: &[&str],
    bad_states: &[&str],
    bound: Duration,
) -> Result<String> {
    let mut rx = signal.subscribe();
    let mut alive = signal.subscribe_connected();
    let deadline = tokio::time::Instant::now() + bound;
    loop {
        if !*alive.borrow_and_update() {
            return Err(DetectorError::ReadbackLost {
                signal: signal.source().to_string(),
            });
        }
        let state = rx.borrow_and_update().clone();
        if good_states.contains(&state.as_str()) {
            return Ok(state);
        }
        if bad_states.contains(&state.as_str()) {
            return Err(DetectorError::BadTerminalState {
                signal: signal.source().to_string(),
                state,
                allowed: good_states.iter().map(|s| (*s).to_string()).collect(),
            });
        }
        let woken = async {
            tokio::select! {
                _ = rx.changed() => {}
                _ = alive.changed() => {}
            }
        };
        if tokio::time::timeout_at(deadline, woken).await.is_err() {
            return Err(DetectorError::WaitTimeout {
                signal: signal.source().to_string(),
                elapsed: bound,
            });
        }
    }
}

/// Snapshot of named values feeding deadtime derivation.
///
/// Built by the orchestrator from a trigger logic's configuration signals,
/// with planning overrides substituted without touching live values.
#[derive(Debug, Clone, Default)]
pub struct SignalValues {
    values: HashMap<String, f64>,
}

impl SignalValues {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        SignalValues::default()
    }

    /// Snapshot the current value of each signal.
    pub fn from_signals(signals: &[Signal<f64>]) -> Self {
        let values = signals
            .iter()
            .map(|s| (s.name().to_string(), s.get()))
            .collect();
        SignalValues { values }
    }

    /// Insert or replace a value by signal name.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    /// Look up a value by signal name.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_signal_source_and_roundtrip() {
        let signal = Signal::soft("exposure", 0.1_f64);
        assert_eq!(signal.name(), "exposure");
        assert_eq!(signal.source(), "soft://exposure");
        signal.set(0.25);
        assert_eq!(signal.get(), 0.25);
    }

    #[test]
    fn clones_share_the_channel() {
        let a = Signal::soft("count", 0_u64);
        let b = a.clone();
        let mut rx = b.subscribe();
        a.set(7);
        assert_eq!(*rx.borrow_and_update(), 7);
    }

    #[test]
    fn data_key_reflects_value_type() {
        let scalar = Signal::soft("value", 1.5_f64);
        let key = scalar.data_key();
        assert_eq!(key.dtype, "number");
        assert_eq!(key.dtype_numpy, "<f8");
        assert!(key.shape.is_empty());
        assert_eq!(key.source, "soft://value");

        let array = Signal::soft("trace", vec![0.0_f64; 8]);
        let key = array.data_key();
        assert_eq!(key.dtype, "array");
        assert_eq!(key.shape, vec![8]);
    }

    #[tokio::test]
    async fn wait_for_value_sees_current_value() {
        let signal = Signal::soft("done", true);
        let value = wait_for_value(&signal, |v| *v, Duration::from_millis(10))
            .await
            .unwrap();
        assert!(value);
    }

    #[tokio::test]
    async fn wait_for_value_sees_later_update() {
        let signal = Signal::soft("count", 0_u64);
        let writer = signal.clone();
        let wait = wait_for_value(&signal, |v| *v >= 3, Duration::from_secs(1));
        let update = async move {
            for n in 1..=3 {
                tokio::time::sleep(Duration::from_millis(2)).await;
                writer.set(n);
            }
        };
        let (value, ()) = tokio::join!(wait, update);
        assert_eq!(value.unwrap(), 3);
    }

    #[tokio::test]
    async fn wait_for_value_times_out() {
        let signal = Signal::soft("count", 0_u64);
        let err = wait_for_value(&signal, |v| *v >= 3, Duration::from_millis(5))
            .await
            .unwrap_err();
        assert!(matches!(err, DetectorError::WaitTimeout { .. }));
        assert!(err.to_string().contains("soft://count"));
    }

    #[tokio::test]
    async fn disconnect_fails_a_pending_wait_as_lost() {
        let signal = Signal::soft("count", 0_u64);
        let writer = signal.clone();
        let wait = wait_for_value(&signal, |v| *v >= 3, Duration::from_secs(1));
        let cut = async move {
            tokio::time::sleep(Duration::from_millis(2)).await;
            writer.disconnect();
        };
        let (result, ()) = tokio::join!(wait, cut);
        let err = result.unwrap_err();
        assert!(matches!(err, DetectorError::ReadbackLost { .. }));
        assert_eq!(
            err.to_string(),
            "Readback soft://count lost while waiting for a value"
        );
    }

    #[tokio::test]
    async fn disconnected_signal_fails_waits_immediately() {
        let signal = Signal::soft("count", 5_u64);
        signal.disconnect();
        assert!(!signal.is_connected());
        // Even a satisfied predicate does not rescue a lost readback.
        let err = wait_for_value(&signal, |v| *v >= 3, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, DetectorError::ReadbackLost { .. }));

        let state = Signal::soft("state", "Idle".to_string());
        state.disconnect();
        let err = wait_for_good_state(&state, &["Idle"], &["Error"], Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, DetectorError::ReadbackLost { .. }));
    }

    #[tokio::test]
    async fn wait_for_good_state_accepts_good() {
        let state = Signal::soft("state", "Acquiring".to_string());
        let writer = state.clone();
        let wait = wait_for_good_state(
            &state,
            &["Idle", "Aborted"],
            &["Error"],
            Duration::from_secs(1),
        );
        let update = async move {
            tokio::time::sleep(Duration::from_millis(2)).await;
            writer.set("Idle".to_string());
        };
        let (result, ()) = tokio::join!(wait, update);
        assert_eq!(result.unwrap(), "Idle");
    }

    #[tokio::test]
    async fn wait_for_good_state_rejects_bad_immediately() {
        let state = Signal::soft("state", "Error".to_string());
        let err = wait_for_good_state(
            &state,
            &["Idle", "Aborted"],
            &["Error"],
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("soft://state not in a good state: Error"));
        assert!(msg.contains("Idle"));
    }

    #[test]
    fn signal_values_snapshot_and_override() {
        let a = Signal::soft("deadtime", 0.001_f64);
        let b = Signal::soft("period", 0.1_f64);
        let mut values = SignalValues::from_signals(&[a, b]);
        assert_eq!(values.get("deadtime"), Some(0.001));
        values.insert("deadtime", 0.005);
        assert_eq!(values.get("deadtime"), Some(0.005));
        assert_eq!(values.get("missing"), None);
    }
}
