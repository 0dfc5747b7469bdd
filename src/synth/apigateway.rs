//! API Gateway REST API synthesis
//!
//! REST APIs re-emit from their exported OpenAPI definition (the template's
//! `Body` property). The interesting part is the integration URIs, which
//! embed a full lambda ARN inside a longer invocation path; the embedded ARN
//! is cut out, resolved or rewritten, and spliced back, as an `Fn::Join` when
//! the function synthesized in this run.

use super::{copy_fields, emit, rewrite_policy, Reference, SynthContext};
use crate::aws::arn::Arn;
use crate::snapshot::Snapshot;
use crate::tags::{find_tags, normalize_tags, to_cfn_tags};
use crate::template::Template;
use anyhow::{Context, Result};
use serde_json::{json, Map, Value};

const FUNCTIONS_SEGMENT: &str = "/functions/";
const INVOCATIONS_SEGMENT: &str = "/invocations";

pub fn synthesize(
    snapshot: &Snapshot,
    ctx: &mut SynthContext,
    template: &mut Template,
) -> Result<usize> {
    let entries = snapshot.section("RestApis");
    for entry in &entries {
        let name = entry
            .get("Name")
            .or_else(|| entry.get("name"))
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("REST API entry without Name"))?
            .to_string();
        synthesize_api(entry, &name, ctx, template)
            .with_context(|| format!("synthesizing REST API `{name}`"))?;
    }
    Ok(entries.len())
}

fn synthesize_api(
    entry: &Value,
    name: &str,
    ctx: &mut SynthContext,
    template: &mut Template,
) -> Result<()> {
    let mut props = copy_fields(
        entry,
        &[
            "Description",
            "ApiKeySourceType",
            "BinaryMediaTypes",
            "MinimumCompressionSize",
            "DisableExecuteApiEndpoint",
        ],
    );
    props.insert("Name".to_string(), Value::String(name.to_string()));

    if let Some(endpoint) = entry.get("EndpointConfiguration") {
        let mut out = Map::new();
        if let Some(types) = endpoint.get("Types") {
            out.insert("Types".to_string(), types.clone());
        }
        if !out.is_empty() {
            props.insert("EndpointConfiguration".to_string(), Value::Object(out));
        }
    }

    if let Some(body) = entry.get("Body").or_else(|| entry.get("Definition")) {
        props.insert("Body".to_string(), rewrite_definition(body, ctx)?);
    }

    if let Some(policy) = entry.get("Policy") {
        let document = match policy {
            Value::String(encoded) => serde_json::from_str(encoded)
                .context("REST API policy is not valid embedded JSON")?,
            other => other.clone(),
        };
        props.insert("Policy".to_string(), rewrite_policy(&document, ctx)?);
    }

    if let Some(tags) = find_tags(entry) {
        props.insert("Tags".to_string(), to_cfn_tags(&normalize_tags(tags)));
    }

    emit(
        ctx,
        template,
        "rest-api",
        name,
        "AWS::ApiGateway::RestApi",
        Value::Object(props),
        Reference::Ref,
    )?;
    Ok(())
}

/// Walk the OpenAPI definition, rewriting every string that is or embeds an
/// identifier. Integration URIs may turn into intrinsics, so the walk
/// rebuilds the tree instead of editing strings in place.
fn rewrite_definition(value: &Value, ctx: &SynthContext) -> Result<Value> {
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, entry) in map {
                out.insert(key.clone(), rewrite_definition(entry, ctx)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(rewrite_definition(item, ctx)?);
            }
            Ok(Value::Array(out))
        }
        Value::String(s) if is_integration_uri(s) => map_integration_uri(s, ctx),
        Value::String(s) => Ok(json!(ctx.rewrite(s))),
        other => Ok(other.clone()),
    }
}

fn is_integration_uri(value: &str) -> bool {
    value.contains(FUNCTIONS_SEGMENT) && value.contains(INVOCATIONS_SEGMENT)
}

/// Cut the embedded function ARN out of an invocation URI and splice the
/// resolved reference back in.
fn map_integration_uri(uri: &str, ctx: &SynthContext) -> Result<Value> {
    let Some(start) = uri.find(FUNCTIONS_SEGMENT) else {
        return Ok(json!(uri));
    };
    let inner_start = start + FUNCTIONS_SEGMENT.len();
    let Some(end) = uri[inner_start..]
        .find(INVOCATIONS_SEGMENT)
        .map(|offset| inner_start + offset)
    else {
        return Ok(json!(uri));
    };

    let prefix = &uri[..inner_start];
    let inner = &uri[inner_start..end];
    let suffix = &uri[end..];

    let Ok(arn) = Arn::parse(inner) else {
        return Ok(json!(uri));
    };
    let fallback = json!(ctx.rewrite(inner));
    let resolved = ctx.resolve("function", arn.resource_name(), fallback)?;

    match resolved.as_str() {
        Some(resolved) => Ok(json!(format!("{prefix}{resolved}{suffix}"))),
        None => Ok(json!({ "Fn::Join": ["", [prefix, resolved, suffix]] })),
    }
}
