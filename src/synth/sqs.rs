//! SQS queue synthesis
//!
//! Queue inventories arrive as string-typed attribute maps (the control
//! plane's own convention); numeric and boolean attributes are coerced back
//! into typed JSON here. Dead-letter targets resolve through the registry so
//! a queue and its DLQ synthesized in the same run end up wired by intrinsic
//! instead of by copied ARN.

use super::{emit, rewrite_policy, Reference, SynthContext};
use crate::aws::arn::Arn;
use crate::snapshot::Snapshot;
use crate::tags::{find_tags, normalize_tags, to_cfn_tags};
use crate::template::Template;
use anyhow::{Context, Result};
use serde_json::{json, Map, Value};

/// Attributes whose values are stringified integers in the origin export.
const NUMERIC_ATTRIBUTES: &[&str] = &[
    "DelaySeconds",
    "MaximumMessageSize",
    "MessageRetentionPeriod",
    "ReceiveMessageWaitTimeSeconds",
    "VisibilityTimeout",
    "KmsDataKeyReusePeriodSeconds",
];

/// Attributes whose values are stringified booleans.
const BOOLEAN_ATTRIBUTES: &[&str] = &["FifoQueue", "ContentBasedDeduplication", "SqsManagedSseEnabled"];

pub fn synthesize(
    snapshot: &Snapshot,
    ctx: &mut SynthContext,
    template: &mut Template,
) -> Result<usize> {
    let entries = snapshot.section("Queues");
    for entry in &entries {
        let name = queue_name(entry)
            .ok_or_else(|| anyhow::anyhow!("queue entry without QueueName, QueueUrl, or QueueArn"))?;
        synthesize_queue(entry, &name, ctx, template)
            .with_context(|| format!("synthesizing queue `{name}`"))?;
    }
    Ok(entries.len())
}

/// The queue's own name, from whichever identifying field the export kept.
fn queue_name(entry: &Value) -> Option<String> {
    if let Some(name) = entry.get("QueueName").and_then(Value::as_str) {
        return Some(name.to_string());
    }
    if let Some(url) = entry.get("QueueUrl").and_then(Value::as_str) {
        return url.rsplit('/').next().map(str::to_string);
    }
    let arn = entry
        .get("QueueArn")
        .or_else(|| entry.get("Attributes").and_then(|a| a.get("QueueArn")))
        .and_then(Value::as_str)?;
    Arn::parse(arn).ok().map(|arn| arn.resource_name().to_string())
}

fn synthesize_queue(
    entry: &Value,
    name: &str,
    ctx: &mut SynthContext,
    template: &mut Template,
) -> Result<()> {
    // Attribute maps are either nested under `Attributes` or flattened.
    let attributes = entry.get("Attributes").unwrap_or(entry);

    let mut props = Map::new();
    props.insert("QueueName".to_string(), json!(name));

    for attribute in NUMERIC_ATTRIBUTES {
        if let Some(value) = attributes.get(*attribute) {
            if let Some(number) = coerce_integer(value) {
                props.insert((*attribute).to_string(), json!(number));
            }
        }
    }

    for attribute in BOOLEAN_ATTRIBUTES {
        if let Some(value) = attributes.get(*attribute) {
            if let Some(flag) = coerce_bool(value) {
                props.insert((*attribute).to_string(), json!(flag));
            }
        }
    }

    if let Some(key_id) = attributes.get("KmsMasterKeyId").and_then(Value::as_str) {
        props.insert("KmsMasterKeyId".to_string(), json!(ctx.rewrite(key_id)));
    }

    if let Some(redrive) = attributes.get("RedrivePolicy") {
        props.insert(
            "RedrivePolicy".to_string(),
            map_redrive_policy(redrive, ctx)?,
        );
    }

    if let Some(tags) = find_tags(entry) {
        props.insert("Tags".to_string(), to_cfn_tags(&normalize_tags(tags)));
    }

    let logical_id = emit(
        ctx,
        template,
        "queue",
        name,
        "AWS::SQS::Queue",
        Value::Object(props),
        Reference::GetAtt("Arn"),
    )?;

    // An access policy becomes its own resource pointing back at the queue.
    if let Some(policy) = attributes.get("Policy") {
        let document = decode_embedded_json(policy)?;
        let document = rewrite_policy(&document, ctx)?;
        let props = json!({
            "Queues": [{ "Ref": logical_id }],
            "PolicyDocument": document,
        });
        emit(
            ctx,
            template,
            "queue-policy",
            name,
            "AWS::SQS::QueuePolicy",
            props,
            Reference::Ref,
        )?;
    }

    Ok(())
}

/// Resolve the dead-letter target through the registry; when the DLQ is not
/// part of this run the rewritten origin ARN rides along instead.
fn map_redrive_policy(redrive: &Value, ctx: &SynthContext) -> Result<Value> {
    let redrive = decode_embedded_json(redrive)?;

    let mut mapped = Map::new();
    if let Some(target) = redrive.get("deadLetterTargetArn").and_then(Value::as_str) {
        let fallback = json!(ctx.rewrite(target));
        let resolved = match Arn::parse(target) {
            Ok(arn) => ctx.resolve("queue", arn.resource_name(), fallback)?,
            Err(_) => fallback,
        };
        mapped.insert("deadLetterTargetArn".to_string(), resolved);
    }
    if let Some(count) = redrive.get("maxReceiveCount") {
        if let Some(count) = coerce_integer(count) {
            mapped.insert("maxReceiveCount".to_string(), json!(count));
        }
    }

    Ok(Value::Object(mapped))
}

/// Some exported attributes are JSON documents encoded as strings.
fn decode_embedded_json(value: &Value) -> Result<Value> {
    match value {
        Value::String(encoded) => {
            serde_json::from_str(encoded).context("attribute is not valid embedded JSON")
        }
        other => Ok(other.clone()),
    }
}

fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
