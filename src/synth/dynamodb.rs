//! DynamoDB table synthesis
//!
//! Table descriptions from the origin inventory carry a lot of control-plane
//! state (item counts, index sizes, decrease counters) that has no place in a
//! template; mapping here is mostly about stripping that and re-nesting what
//! remains into the template's property shapes.

use super::{copy_fields, emit, Reference, SynthContext};
use crate::snapshot::Snapshot;
use crate::tags::{find_tags, normalize_tags, to_cfn_tags};
use crate::template::Template;
use anyhow::{Context, Result};
use serde_json::{json, Map, Value};

pub fn synthesize(
    snapshot: &Snapshot,
    ctx: &mut SynthContext,
    template: &mut Template,
) -> Result<usize> {
    let entries = snapshot.section("Tables");
    for entry in &entries {
        let name = entry
            .get("TableName")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("table entry without TableName"))?
            .to_string();
        synthesize_table(entry, &name, ctx, template)
            .with_context(|| format!("synthesizing table `{name}`"))?;
    }
    Ok(entries.len())
}

fn synthesize_table(
    entry: &Value,
    name: &str,
    ctx: &mut SynthContext,
    template: &mut Template,
) -> Result<()> {
    let mut props = copy_fields(entry, &["TableName", "AttributeDefinitions", "KeySchema"]);

    let billing_mode = entry
        .get("BillingModeSummary")
        .and_then(|summary| summary.get("BillingMode"))
        .or_else(|| entry.get("BillingMode"))
        .and_then(Value::as_str)
        .unwrap_or("PROVISIONED");
    let on_demand = billing_mode == "PAY_PER_REQUEST";
    if on_demand {
        props.insert("BillingMode".to_string(), json!(billing_mode));
    } else if let Some(throughput) = entry.get("ProvisionedThroughput") {
        props.insert(
            "ProvisionedThroughput".to_string(),
            clean_throughput(throughput),
        );
    }

    if let Some(indexes) = entry.get("GlobalSecondaryIndexes").and_then(Value::as_array) {
        let mapped: Vec<Value> = indexes
            .iter()
            .map(|index| {
                let mut out = copy_fields(index, &["IndexName", "KeySchema", "Projection"]);
                if !on_demand {
                    if let Some(throughput) = index.get("ProvisionedThroughput") {
                        out.insert(
                            "ProvisionedThroughput".to_string(),
                            clean_throughput(throughput),
                        );
                    }
                }
                Value::Object(out)
            })
            .collect();
        props.insert("GlobalSecondaryIndexes".to_string(), Value::Array(mapped));
    }

    if let Some(indexes) = entry.get("LocalSecondaryIndexes").and_then(Value::as_array) {
        let mapped: Vec<Value> = indexes
            .iter()
            .map(|index| Value::Object(copy_fields(index, &["IndexName", "KeySchema", "Projection"])))
            .collect();
        props.insert("LocalSecondaryIndexes".to_string(), Value::Array(mapped));
    }

    if let Some(stream) = entry.get("StreamSpecification") {
        let enabled = stream
            .get("StreamEnabled")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        if enabled {
            if let Some(view_type) = stream.get("StreamViewType") {
                props.insert(
                    "StreamSpecification".to_string(),
                    json!({ "StreamViewType": view_type }),
                );
            }
        }
    }

    if let Some(sse) = entry.get("SSEDescription") {
        let enabled = sse.get("Status").and_then(Value::as_str) == Some("ENABLED");
        if enabled {
            let mut spec = Map::new();
            spec.insert("SSEEnabled".to_string(), json!(true));
            if let Some(sse_type) = sse.get("SSEType") {
                spec.insert("SSEType".to_string(), sse_type.clone());
            }
            if let Some(key_arn) = sse.get("KMSMasterKeyArn").and_then(Value::as_str) {
                spec.insert("KMSMasterKeyId".to_string(), json!(ctx.rewrite(key_arn)));
            }
            props.insert("SSESpecification".to_string(), Value::Object(spec));
        }
    }

    if let Some(ttl) = entry.get("TimeToLiveDescription") {
        if ttl.get("TimeToLiveStatus").and_then(Value::as_str) == Some("ENABLED") {
            if let Some(attribute) = ttl.get("AttributeName") {
                props.insert(
                    "TimeToLiveSpecification".to_string(),
                    json!({ "AttributeName": attribute, "Enabled": true }),
                );
            }
        }
    }

    if let Some(tags) = find_tags(entry) {
        props.insert("Tags".to_string(), to_cfn_tags(&normalize_tags(tags)));
    }

    emit(
        ctx,
        template,
        "table",
        name,
        "AWS::DynamoDB::Table",
        Value::Object(props),
        Reference::Ref,
    )?;
    Ok(())
}

/// Keep only the capacity units; the rest of the exported throughput block is
/// runtime bookkeeping.
fn clean_throughput(throughput: &Value) -> Value {
    Value::Object(copy_fields(
        throughput,
        &["ReadCapacityUnits", "WriteCapacityUnits"],
    ))
}
