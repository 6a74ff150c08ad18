//! Planning overrides for deadtime derivation.
//!
//! A scan planner sometimes needs to know what deadtime a detector would
//! have under a configuration it has not applied yet. [`Settings`] carries
//! the would-be values keyed by signal name; the orchestrator substitutes
//! them into the snapshot fed to
//! [`get_deadtime`](crate::capabilities::DetectorTriggerLogic::get_deadtime)
//! without touching the live signals.

use std::collections::HashMap;

/// Signal-name keyed value overrides for dry-run planning.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    overrides: HashMap<String, f64>,
}

impl Settings {
    /// Create an empty override set.
    pub fn new() -> Self {
        Settings::default()
    }

    /// Override the value of the named signal.
    pub fn set(mut self, name: impl Into<String>, value: f64) -> Self {
        self.overrides.insert(name.into(), value);
        self
    }

    /// Look up an override by signal name.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.overrides.get(name).copied()
    }

    /// Iterate over all overrides.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.overrides.iter().map(|(name, value)| (name.as_str(), *value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_by_name() {
        let settings = Settings::new().set("acquire_period", 0.105);
        assert_eq!(settings.get("acquire_period"), Some(0.105));
        assert_eq!(settings.get("acquire_time"), None);
    }
}
