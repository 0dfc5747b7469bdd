//! Tag-shape normalization
//!
//! Origin inventories are inconsistent about tags: some services export a
//! `[{"Key": ..., "Value": ...}]` list, others a plain `{key: value}` map, and
//! the field itself is spelled `Tags`, `TagSet`, or `tags` depending on the
//! exporter. Everything funnels through here into sorted pairs so template
//! output stays deterministic.

use serde_json::{json, Value};

/// Field spellings under which exporters place a resource's tags.
const TAG_FIELDS: &[&str] = &["Tags", "TagSet", "tags"];

/// Locate the tag collection on a resource entry, if any.
pub fn find_tags(entry: &Value) -> Option<&Value> {
    TAG_FIELDS.iter().find_map(|field| entry.get(*field))
}

/// Normalize either tag shape into key-sorted pairs.
///
/// Malformed entries (missing Key/Value, non-string contents) are skipped
/// with a debug log rather than failing the resource; inventory exports are
/// lossy about tags and a dropped tag is not worth aborting a migration.
pub fn normalize_tags(value: &Value) -> Vec<(String, String)> {
    let mut tags: Vec<(String, String)> = match value {
        Value::Array(entries) => entries
            .iter()
            .filter_map(|entry| {
                let key = entry.get("Key").or_else(|| entry.get("key"))?.as_str()?;
                let val = entry.get("Value").or_else(|| entry.get("value"))?.as_str()?;
                Some((key.to_string(), val.to_string()))
            })
            .collect(),
        Value::Object(map) => map
            .iter()
            .filter_map(|(key, val)| Some((key.clone(), val.as_str()?.to_string())))
            .collect(),
        _ => {
            tracing::debug!("Unrecognized tag shape, skipping: {}", value);
            Vec::new()
        }
    };

    if let Value::Array(entries) = value {
        if entries.len() != tags.len() {
            tracing::debug!(
                "Dropped {} malformed tag entries",
                entries.len() - tags.len()
            );
        }
    }

    tags.sort();
    tags
}

/// Render pairs in the CloudFormation `[{"Key":..,"Value":..}]` list form.
pub fn to_cfn_tags(tags: &[(String, String)]) -> Value {
    Value::Array(
        tags.iter()
            .map(|(key, value)| json!({ "Key": key, "Value": value }))
            .collect(),
    )
}
