//! Snapshot loading
//!
//! Reads the captured inventory: a single JSON document, or a directory of
//! JSON documents merged into one. The top level is an object keyed by
//! resource category (`Roles`, `Tables`, `Queues`, ...) in the origin
//! platform's PascalCase convention; each section holds either an array of
//! resources or an object-of-objects.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::Path;

/// A loaded, merged inventory snapshot.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    sections: Map<String, Value>,
}

impl Snapshot {
    /// Load a snapshot from a `.json` file or a directory of them.
    ///
    /// Directory contents are merged in file-name order; a later file wins
    /// when two files carry the same section key.
    pub fn load(path: &Path) -> Result<Self> {
        if path.is_dir() {
            Self::load_dir(path)
        } else {
            Self::load_file(path)
        }
    }

    fn load_file(path: &Path) -> Result<Self> {
        tracing::debug!("Reading snapshot file `{}`", path.display());
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read snapshot file `{}`", path.display()))?;
        let value: Value = serde_json::from_str(&content)
            .with_context(|| format!("Could not parse snapshot file `{}`", path.display()))?;
        Self::from_value(value)
            .with_context(|| format!("Invalid snapshot structure in `{}`", path.display()))
    }

    fn load_dir(path: &Path) -> Result<Self> {
        let mut files: Vec<_> = std::fs::read_dir(path)
            .with_context(|| format!("Could not read snapshot directory `{}`", path.display()))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();

        if files.is_empty() {
            anyhow::bail!("No .json files in snapshot directory `{}`", path.display());
        }

        let mut merged = Map::new();
        for file in &files {
            let snapshot = Self::load_file(file)?;
            for (key, value) in snapshot.sections {
                if merged.contains_key(&key) {
                    tracing::debug!(
                        "Section `{}` redefined by `{}`, later file wins",
                        key,
                        file.display()
                    );
                }
                merged.insert(key, value);
            }
        }

        Ok(Self { sections: merged })
    }

    /// Build a snapshot from an already-parsed document. The top level must
    /// be an object keyed by resource category.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(sections) => Ok(Self { sections }),
            other => anyhow::bail!(
                "Snapshot top level must be an object keyed by resource category, got {}",
                json_kind(&other)
            ),
        }
    }

    /// Entries of one section, normalized from either an array or an
    /// object-of-objects. An absent section is empty, not an error: a capture
    /// simply may not contain that resource kind.
    pub fn section(&self, key: &str) -> Vec<Value> {
        match self.sections.get(key) {
            Some(Value::Array(entries)) => entries.clone(),
            Some(Value::Object(map)) => map.values().cloned().collect(),
            Some(other) => {
                tracing::debug!(
                    "Section `{}` is {}, expected array or object; ignoring",
                    key,
                    json_kind(other)
                );
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    /// Section keys present in the snapshot.
    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(|k| k.as_str())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn array_sections_pass_through() {
        let snapshot = Snapshot::from_value(json!({
            "Tables": [{"TableName": "Orders"}, {"TableName": "Invoices"}]
        }))
        .unwrap();
        assert_eq!(snapshot.section("Tables").len(), 2);
    }

    #[test]
    fn object_sections_yield_values() {
        let snapshot = Snapshot::from_value(json!({
            "Queues": {
                "orders": {"QueueName": "orders"},
                "retries": {"QueueName": "retries"}
            }
        }))
        .unwrap();
        let entries = snapshot.section("Queues");
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.get("QueueName").is_some()));
    }

    #[test]
    fn absent_section_is_empty() {
        let snapshot = Snapshot::from_value(json!({})).unwrap();
        assert!(snapshot.section("Functions").is_empty());
    }

    #[test]
    fn non_object_top_level_is_rejected() {
        assert!(Snapshot::from_value(json!([1, 2, 3])).is_err());
    }

    #[test]
    fn directory_merge_later_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.json"),
            r#"{"Tables": [{"TableName": "Old"}], "Queues": []}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("b.json"),
            r#"{"Tables": [{"TableName": "New"}]}"#,
        )
        .unwrap();

        let snapshot = Snapshot::load(dir.path()).unwrap();
        let tables = snapshot.section("Tables");
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0]["TableName"], "New");
        assert!(snapshot.section("Queues").is_empty());
    }
}
