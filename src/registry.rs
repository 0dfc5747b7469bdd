//! Synthesized-resource registry
//!
//! A per-run symbol table mapping (resource kind, natural key) to the handle
//! of an already-synthesized resource, so later constructors can refer back
//! to earlier ones. The table is owned by the synthesis context, filled during
//! the single ordered pass, and dropped with it; nothing survives a run.

use serde_json::Value;
use std::collections::HashMap;

/// Reference to a synthesized resource.
///
/// `reference` is the value a dependent resource splices into its own
/// properties: a `Ref`/`Fn::GetAtt` intrinsic, or a plain rewritten string.
/// Which intrinsic shape applies is decided once, by the synthesizer that
/// stores the handle.
#[derive(Debug, Clone, PartialEq)]
pub struct Handle {
    pub logical_id: String,
    pub reference: Value,
}

impl Handle {
    pub fn new(logical_id: impl Into<String>, reference: Value) -> Self {
        Self {
            logical_id: logical_id.into(),
            reference,
        }
    }
}

/// Registry of synthesized resources for one run.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    entries: HashMap<(String, String), Handle>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the handle for (kind, key). A later store for the
    /// same pair wins silently; the pass order makes that the fresher value.
    pub fn store(&mut self, kind: &str, key: &str, handle: Handle) {
        self.entries
            .insert((kind.to_string(), key.to_string()), handle);
    }

    /// Exact lookup. `None` means "not synthesized (yet, or at all)" and is a
    /// normal outcome, not an error; callers fall back or defer.
    pub fn get(&self, kind: &str, key: &str) -> Option<&Handle> {
        self.entries
            .get(&(kind.to_string(), key.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
