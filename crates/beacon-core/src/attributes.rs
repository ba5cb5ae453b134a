//! Process-wide mutable attribute map shared by every scope.
//!
//! Readers snapshot-then-merge rather than lock-then-read: a scope copies the
//! map at the point of record emission, so attributes added after a scope was
//! constructed are still included in later records.

use beacon_domain::Attributes;
use parking_lot::RwLock;

/// Internally-synchronized key/value store passed by reference to every
/// scope constructor.
#[derive(Debug, Default)]
pub struct GlobalAttributes {
    map: RwLock<Attributes>,
}

impl GlobalAttributes {
    /// Create an empty attribute store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an attribute.
    pub fn add(&self, key: impl Into<String>, value: serde_json::Value) {
        self.map.write().insert(key.into(), value);
    }

    /// Remove an attribute, if present.
    pub fn remove(&self, key: &str) {
        self.map.write().remove(key);
    }

    /// Copy of the current map.
    pub fn snapshot(&self) -> Attributes {
        self.map.read().clone()
    }

    /// Snapshot merged with scope-local attributes; local keys win.
    pub fn merged_with(&self, local: &Attributes) -> Attributes {
        let mut merged = self.snapshot();
        merged.extend(local.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_attributes_win_over_globals() {
        let globals = GlobalAttributes::new();
        globals.add("env", serde_json::json!("prod"));
        globals.add("build", serde_json::json!(42));

        let mut local = Attributes::new();
        local.insert("env".to_string(), serde_json::json!("staging"));

        let merged = globals.merged_with(&local);
        assert_eq!(merged.get("env"), Some(&serde_json::json!("staging")));
        assert_eq!(merged.get("build"), Some(&serde_json::json!(42)));
    }

    #[test]
    fn snapshot_is_detached_from_later_mutation() {
        let globals = GlobalAttributes::new();
        globals.add("a", serde_json::json!(1));

        let snap = globals.snapshot();
        globals.add("b", serde_json::json!(2));

        assert_eq!(snap.len(), 1);
        assert_eq!(globals.snapshot().len(), 2);
    }
}
