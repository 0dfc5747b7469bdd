//! Lambda function and event source mapping synthesis
//!
//! Functions are the most reference-dense kind in a capture: the execution
//! role, the dead-letter target, environment variables, and event sources can
//! all point at resources synthesized earlier in the pass. Code artifacts are
//! not part of the inventory; when the capture names no bucket location the
//! function is emitted with a placeholder body for out-of-band staging.

use super::{copy_fields, emit, Reference, SynthContext};
use crate::aws::arn::Arn;
use crate::snapshot::Snapshot;
use crate::tags::{find_tags, normalize_tags, to_cfn_tags};
use crate::template::Template;
use anyhow::{Context, Result};
use serde_json::{json, Map, Value};

pub fn synthesize_functions(
    snapshot: &Snapshot,
    ctx: &mut SynthContext,
    template: &mut Template,
) -> Result<usize> {
    let entries = snapshot.section("Functions");
    for entry in &entries {
        let name = entry
            .get("FunctionName")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("function entry without FunctionName"))?
            .to_string();
        synthesize_function(entry, &name, ctx, template)
            .with_context(|| format!("synthesizing function `{name}`"))?;
    }
    Ok(entries.len())
}

fn synthesize_function(
    entry: &Value,
    name: &str,
    ctx: &mut SynthContext,
    template: &mut Template,
) -> Result<()> {
    let mut props = copy_fields(
        entry,
        &[
            "FunctionName",
            "Runtime",
            "Handler",
            "Description",
            "Timeout",
            "MemorySize",
            "Architectures",
        ],
    );

    if let Some(role) = entry.get("Role").and_then(Value::as_str) {
        let fallback = json!(ctx.rewrite(role));
        let resolved = match Arn::parse(role) {
            Ok(arn) => ctx.resolve("role", arn.resource_name(), fallback)?,
            Err(_) => fallback,
        };
        props.insert("Role".to_string(), resolved);
    }

    if let Some(variables) = entry
        .get("Environment")
        .and_then(|e| e.get("Variables"))
        .and_then(Value::as_object)
    {
        let mut rewritten = Map::new();
        for (key, value) in variables {
            let mapped = match value.as_str() {
                Some(value) => json!(ctx.rewrite(value)),
                None => value.clone(),
            };
            rewritten.insert(key.clone(), mapped);
        }
        props.insert(
            "Environment".to_string(),
            json!({ "Variables": Value::Object(rewritten) }),
        );
    }

    if let Some(target) = entry
        .get("DeadLetterConfig")
        .and_then(|c| c.get("TargetArn"))
        .and_then(Value::as_str)
    {
        let fallback = json!(ctx.rewrite(target));
        let resolved = match Arn::parse(target) {
            Ok(arn) => {
                let kind = match arn.service.as_str() {
                    "sqs" => "queue",
                    "sns" => "topic",
                    _ => "",
                };
                if kind.is_empty() {
                    fallback
                } else {
                    ctx.resolve(kind, arn.resource_name(), fallback)?
                }
            }
            Err(_) => fallback,
        };
        props.insert("DeadLetterConfig".to_string(), json!({ "TargetArn": resolved }));
    }

    if let Some(mode) = entry
        .get("TracingConfig")
        .and_then(|c| c.get("Mode"))
    {
        props.insert("TracingConfig".to_string(), json!({ "Mode": mode }));
    }

    if let Some(layers) = entry.get("Layers").and_then(Value::as_array) {
        // Exports list layers as {Arn, CodeSize}; the template wants ARNs.
        let arns: Vec<Value> = layers
            .iter()
            .filter_map(|layer| {
                layer
                    .get("Arn")
                    .or(Some(layer))
                    .and_then(Value::as_str)
            })
            .map(|arn| json!(ctx.rewrite(arn)))
            .collect();
        if !arns.is_empty() {
            props.insert("Layers".to_string(), Value::Array(arns));
        }
    }

    props.insert("Code".to_string(), map_code(entry));

    if let Some(tags) = find_tags(entry) {
        props.insert("Tags".to_string(), to_cfn_tags(&normalize_tags(tags)));
    }

    emit(
        ctx,
        template,
        "function",
        name,
        "AWS::Lambda::Function",
        Value::Object(props),
        Reference::GetAtt("Arn"),
    )?;
    Ok(())
}

/// Use the capture's artifact location when it has one; otherwise emit a
/// placeholder body, since function code cannot be carried inside an
/// inventory snapshot and is staged separately.
fn map_code(entry: &Value) -> Value {
    if let Some(code) = entry.get("Code") {
        let location = copy_fields(code, &["S3Bucket", "S3Key", "S3ObjectVersion", "ImageUri"]);
        if !location.is_empty() {
            return Value::Object(location);
        }
    }
    json!({ "ZipFile": "// function code is staged outside this template" })
}

pub fn synthesize_event_source_mappings(
    snapshot: &Snapshot,
    ctx: &mut SynthContext,
    template: &mut Template,
) -> Result<usize> {
    let entries = snapshot.section("EventSourceMappings");
    for entry in &entries {
        let key = mapping_key(entry)
            .ok_or_else(|| anyhow::anyhow!("event source mapping without UUID or ARNs"))?;
        synthesize_mapping(entry, &key, ctx, template)
            .with_context(|| format!("synthesizing event source mapping `{key}`"))?;
    }
    Ok(entries.len())
}

fn mapping_key(entry: &Value) -> Option<String> {
    if let Some(uuid) = entry.get("UUID").and_then(Value::as_str) {
        return Some(uuid.to_string());
    }
    let source = entry.get("EventSourceArn").and_then(Value::as_str)?;
    let function = entry
        .get("FunctionArn")
        .or_else(|| entry.get("FunctionName"))
        .and_then(Value::as_str)?;
    Some(format!("{source}->{function}"))
}

fn synthesize_mapping(
    entry: &Value,
    key: &str,
    ctx: &mut SynthContext,
    template: &mut Template,
) -> Result<()> {
    let mut props = copy_fields(
        entry,
        &[
            "BatchSize",
            "StartingPosition",
            "MaximumBatchingWindowInSeconds",
        ],
    );

    if let Some(source) = entry.get("EventSourceArn").and_then(Value::as_str) {
        let fallback = json!(ctx.rewrite(source));
        let resolved = match Arn::parse(source) {
            // Only whole-queue sources are registered by natural key; stream
            // sub-resources (dynamodb table streams) fall back to the
            // rewritten ARN.
            Ok(arn) if arn.service == "sqs" => {
                ctx.resolve("queue", arn.resource_name(), fallback)?
            }
            _ => fallback,
        };
        props.insert("EventSourceArn".to_string(), resolved);
    }

    let function = entry
        .get("FunctionName")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            entry
                .get("FunctionArn")
                .and_then(Value::as_str)
                .and_then(|arn| Arn::parse(arn).ok())
                .map(|arn| arn.resource_name().to_string())
        });
    if let Some(function) = function {
        let fallback = json!(function);
        let resolved = ctx.resolve("function", &function, fallback)?;
        props.insert("FunctionName".to_string(), resolved);
    }

    let enabled = match entry.get("State").and_then(Value::as_str) {
        Some(state) => state == "Enabled" || state == "Enabling",
        None => entry.get("Enabled").and_then(Value::as_bool).unwrap_or(true),
    };
    props.insert("Enabled".to_string(), json!(enabled));

    emit(
        ctx,
        template,
        "event-source-mapping",
        key,
        "AWS::Lambda::EventSourceMapping",
        Value::Object(props),
        Reference::Ref,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Handle;

    fn context() -> SynthContext {
        SynthContext::new("111111111111", "222222222222", "us-east-1", "eu-west-1", false)
    }

    fn first_resource(template: &Template) -> Value {
        let value = template.to_value();
        let (_, resource) = value["Resources"].as_object().unwrap().iter().next().unwrap();
        resource.clone()
    }

    #[test]
    fn role_resolves_through_registry() {
        let snap = Snapshot::from_value(json!({
            "Functions": [{
                "FunctionName": "Handler",
                "Runtime": "nodejs20.x",
                "Handler": "index.handler",
                "Role": "arn:aws:iam::111111111111:role/svc/fn-role"
            }]
        }))
        .unwrap();
        let mut ctx = context();
        ctx.registry.store(
            "role",
            "fn-role",
            Handle::new("ResRole", json!({"Fn::GetAtt": ["ResRole", "Arn"]})),
        );
        let mut template = Template::new("test");
        assert_eq!(synthesize_functions(&snap, &mut ctx, &mut template).unwrap(), 1);

        let resource = first_resource(&template);
        assert_eq!(resource["Type"], "AWS::Lambda::Function");
        assert_eq!(
            resource["Properties"]["Role"],
            json!({"Fn::GetAtt": ["ResRole", "Arn"]})
        );
    }

    #[test]
    fn unresolved_role_falls_back_to_rewritten_arn() {
        let snap = Snapshot::from_value(json!({
            "Functions": [{
                "FunctionName": "Handler",
                "Role": "arn:aws:iam::111111111111:role/fn-role"
            }]
        }))
        .unwrap();
        let mut ctx = context();
        let mut template = Template::new("test");
        synthesize_functions(&snap, &mut ctx, &mut template).unwrap();

        let resource = first_resource(&template);
        assert_eq!(
            resource["Properties"]["Role"],
            "arn:aws:iam::222222222222:role/fn-role"
        );
    }

    #[test]
    fn environment_values_are_rewritten() {
        let snap = Snapshot::from_value(json!({
            "Functions": [{
                "FunctionName": "Handler",
                "Environment": {
                    "Variables": {
                        "TABLE_ARN": "arn:aws:dynamodb:us-east-1:111111111111:table/Orders",
                        "ACCOUNT": "111111111111",
                        "STAGE": "prod"
                    }
                }
            }]
        }))
        .unwrap();
        let mut ctx = context();
        let mut template = Template::new("test");
        synthesize_functions(&snap, &mut ctx, &mut template).unwrap();

        let variables = &first_resource(&template)["Properties"]["Environment"]["Variables"];
        assert_eq!(
            variables["TABLE_ARN"],
            "arn:aws:dynamodb:us-east-1:222222222222:table/Orders"
        );
        assert_eq!(variables["ACCOUNT"], "222222222222");
        assert_eq!(variables["STAGE"], "prod");
    }

    #[test]
    fn missing_code_location_gets_placeholder() {
        let snap = Snapshot::from_value(json!({
            "Functions": [{"FunctionName": "Handler"}]
        }))
        .unwrap();
        let mut ctx = context();
        let mut template = Template::new("test");
        synthesize_functions(&snap, &mut ctx, &mut template).unwrap();

        let resource = first_resource(&template);
        assert!(resource["Properties"]["Code"].get("ZipFile").is_some());
    }

    #[test]
    fn event_source_mapping_wires_queue_and_function() {
        let snap = Snapshot::from_value(json!({
            "EventSourceMappings": [{
                "UUID": "esm-1",
                "EventSourceArn": "arn:aws:sqs:us-east-1:111111111111:work-queue",
                "FunctionArn": "arn:aws:lambda:us-east-1:111111111111:function:Handler",
                "BatchSize": 10,
                "State": "Enabled"
            }]
        }))
        .unwrap();
        let mut ctx = context();
        ctx.registry.store(
            "queue",
            "work-queue",
            Handle::new("ResQ", json!({"Fn::GetAtt": ["ResQ", "Arn"]})),
        );
        ctx.registry.store(
            "function",
            "Handler",
            Handle::new("ResFn", json!({"Fn::GetAtt": ["ResFn", "Arn"]})),
        );
        let mut template = Template::new("test");
        assert_eq!(
            synthesize_event_source_mappings(&snap, &mut ctx, &mut template).unwrap(),
            1
        );

        let resource = first_resource(&template);
        assert_eq!(resource["Type"], "AWS::Lambda::EventSourceMapping");
        assert_eq!(
            resource["Properties"]["EventSourceArn"],
            json!({"Fn::GetAtt": ["ResQ", "Arn"]})
        );
        assert_eq!(
            resource["Properties"]["FunctionName"],
            json!({"Fn::GetAtt": ["ResFn", "Arn"]})
        );
        assert_eq!(resource["Properties"]["Enabled"], json!(true));
    }

    #[test]
    fn stream_source_falls_back_to_rewritten_arn() {
        let snap = Snapshot::from_value(json!({
            "EventSourceMappings": [{
                "UUID": "esm-2",
                "EventSourceArn": "arn:aws:dynamodb:us-east-1:111111111111:table/Orders/stream/2024-01-01T00:00:00.000",
                "FunctionName": "Handler",
                "StartingPosition": "LATEST",
                "State": "Disabled"
            }]
        }))
        .unwrap();
        let mut ctx = context();
        let mut template = Template::new("test");
        synthesize_event_source_mappings(&snap, &mut ctx, &mut template).unwrap();

        let resource = first_resource(&template);
        assert_eq!(
            resource["Properties"]["EventSourceArn"],
            "arn:aws:dynamodb:us-east-1:222222222222:table/Orders/stream/2024-01-01T00:00:00.000"
        );
        assert_eq!(resource["Properties"]["Enabled"], json!(false));
    }
}
