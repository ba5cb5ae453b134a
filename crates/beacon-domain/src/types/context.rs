//! Identity context shared down the scope hierarchy

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Free-form attributes attached to events and records.
///
/// Keys are unique; values are user-supplied and treated as opaque.
pub type Attributes = HashMap<String, serde_json::Value>;

/// The identifying tuple visible to a scope and its descendants.
///
/// A context is a read-only snapshot requested from a parent scope and is
/// never mutated by a child. The ids referenced by an emitted record are
/// immutable for the record's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RumContext {
    pub application_id: String,
    pub session_id: String,
    pub view_id: Option<String>,
    pub action_id: Option<String>,
    /// Sampling decision taken once per session and stamped into every
    /// record emitted during that session's lifetime
    pub session_sampled: bool,
}

impl RumContext {
    /// Root context for an application before any session exists.
    pub fn new(application_id: impl Into<String>) -> Self {
        Self {
            application_id: application_id.into(),
            session_id: String::new(),
            view_id: None,
            action_id: None,
            session_sampled: false,
        }
    }
}
