//! SNS topic synthesis
//!
//! Topics re-emit with their subscriptions inline; subscription endpoints
//! that name queues or functions from the same capture resolve through the
//! registry, everything else (email, https, foreign ARNs) rides along with
//! at most an account rewrite.

use super::{emit, rewrite_policy, Reference, SynthContext};
use crate::aws::arn::Arn;
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
    let entries = snapshot.section("Topics");
    for entry in &entries {
        let name = topic_name(entry)
            .ok_or_else(|| anyhow::anyhow!("topic entry without Name or TopicArn"))?;
        synthesize_topic(entry, &name, ctx, template)
            .with_context(|| format!("synthesizing topic `{name}`"))?;
    }
    Ok(entries.len())
}

fn topic_name(entry: &Value) -> Option<String> {
    if let Some(name) = entry.get("Name").and_then(Value::as_str) {
        return Some(name.to_string());
    }
    let arn = entry
        .get("TopicArn")
        .or_else(|| entry.get("Attributes").and_then(|a| a.get("TopicArn")))
        .and_then(Value::as_str)?;
    Arn::parse(arn).ok().map(|arn| arn.resource_name().to_string())
}

fn synthesize_topic(
    entry: &Value,
    name: &str,
    ctx: &mut SynthContext,
    template: &mut Template,
) -> Result<()> {
    let attributes = entry.get("Attributes").unwrap_or(entry);

    let mut props = Map::new();
    props.insert("TopicName".to_string(), json!(name));

    if let Some(display) = attributes
        .get("DisplayName")
        .or_else(|| entry.get("DisplayName"))
        .and_then(Value::as_str)
    {
        if !display.is_empty() {
            props.insert("DisplayName".to_string(), json!(display));
        }
    }

    if attributes.get("FifoTopic").and_then(as_flag) == Some(true) {
        props.insert("FifoTopic".to_string(), json!(true));
        if let Some(dedup) = attributes.get("ContentBasedDeduplication").and_then(as_flag) {
            props.insert("ContentBasedDeduplication".to_string(), json!(dedup));
        }
    }

    if let Some(key_id) = attributes.get("KmsMasterKeyId").and_then(Value::as_str) {
        props.insert("KmsMasterKeyId".to_string(), json!(ctx.rewrite(key_id)));
    }

    if let Some(subscriptions) = entry.get("Subscriptions").and_then(Value::as_array) {
        let mut mapped = Vec::with_capacity(subscriptions.len());
        for subscription in subscriptions {
            let Some(protocol) = subscription.get("Protocol").and_then(Value::as_str) else {
                continue;
            };
            let Some(endpoint) = subscription.get("Endpoint").and_then(Value::as_str) else {
                continue;
            };
            mapped.push(json!({
                "Protocol": protocol,
                "Endpoint": resolve_endpoint(protocol, endpoint, ctx)?,
            }));
        }
        if !mapped.is_empty() {
            props.insert("Subscription".to_string(), Value::Array(mapped));
        }
    }

    if let Some(tags) = find_tags(entry) {
        props.insert("Tags".to_string(), to_cfn_tags(&normalize_tags(tags)));
    }

    let logical_id = emit(
        ctx,
        template,
        "topic",
        name,
        "AWS::SNS::Topic",
        Value::Object(props),
        Reference::Ref,
    )?;

    if let Some(policy) = attributes.get("Policy") {
        let document = match policy {
            Value::String(encoded) => serde_json::from_str(encoded)
                .context("topic policy is not valid embedded JSON")?,
            other => other.clone(),
        };
        let document = rewrite_policy(&document, ctx)?;
        emit(
            ctx,
            template,
            "topic-policy",
            name,
            "AWS::SNS::TopicPolicy",
            json!({
                "Topics": [{ "Ref": logical_id }],
                "PolicyDocument": document,
            }),
            Reference::Ref,
        )?;
    }

    Ok(())
}

/// Queue and function endpoints from the same capture become intrinsics;
/// anything else passes through the account rewrite untouched or not.
fn resolve_endpoint(protocol: &str, endpoint: &str, ctx: &SynthContext) -> Result<Value> {
    let fallback = json!(ctx.rewrite(endpoint));
    let kind = match protocol {
        "sqs" => "queue",
        "lambda" => "function",
        _ => return Ok(fallback),
    };
    match Arn::parse(endpoint) {
        Ok(arn) => ctx.resolve(kind, arn.resource_name(), fallback),
        Err(_) => Ok(fallback),
    }
}

fn as_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
