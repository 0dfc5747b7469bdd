//! Cognito user pool synthesis
//!
//! Pool descriptions carry their configuration nearly template-shaped; the
//! work here is trimming export-only state and re-pointing the lambda
//! trigger configuration, which is the one place a pool embeds ARNs.

use super::{copy_fields, emit, Reference, SynthContext};
use crate::aws::arn::Arn;
use crate::snapshot::Snapshot;
use crate::template::Template;
use anyhow::{Context, Result};
use serde_json::{Map, Value};

pub fn synthesize(
    snapshot: &Snapshot,
    ctx: &mut SynthContext,
    template: &mut Template,
) -> Result<usize> {
    let entries = snapshot.section("UserPools");
    for entry in &entries {
        let name = entry
            .get("Name")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("user pool entry without Name"))?
            .to_string();
        synthesize_pool(entry, &name, ctx, template)
            .with_context(|| format!("synthesizing user pool `{name}`"))?;
    }
    Ok(entries.len())
}

fn synthesize_pool(
    entry: &Value,
    name: &str,
    ctx: &mut SynthContext,
    template: &mut Template,
) -> Result<()> {
    let mut props = copy_fields(
        entry,
        &[
            "Policies",
            "AutoVerifiedAttributes",
            "UsernameAttributes",
            "AliasAttributes",
            "MfaConfiguration",
            "DeletionProtection",
        ],
    );
    props.insert("UserPoolName".to_string(), Value::String(name.to_string()));

    if let Some(schema) = entry.get("SchemaAttributes").and_then(Value::as_array) {
        let mapped: Vec<Value> = schema
            .iter()
            .map(|attribute| {
                Value::Object(copy_fields(
                    attribute,
                    &[
                        "Name",
                        "AttributeDataType",
                        "DeveloperOnlyAttribute",
                        "Mutable",
                        "Required",
                        "StringAttributeConstraints",
                        "NumberAttributeConstraints",
                    ],
                ))
            })
            .collect();
        props.insert("Schema".to_string(), Value::Array(mapped));
    }

    if let Some(config) = entry.get("AdminCreateUserConfig") {
        props.insert(
            "AdminCreateUserConfig".to_string(),
            Value::Object(copy_fields(
                config,
                &["AllowAdminCreateUserOnly", "InviteMessageTemplate"],
            )),
        );
    }

    if let Some(lambda_config) = entry.get("LambdaConfig").and_then(Value::as_object) {
        let mut mapped = Map::new();
        for (trigger, target) in lambda_config {
            let Some(target) = target.as_str() else {
                continue;
            };
            let fallback = serde_json::json!(ctx.rewrite(target));
            let resolved = match Arn::parse(target) {
                Ok(arn) => ctx.resolve("function", arn.resource_name(), fallback)?,
                Err(_) => fallback,
            };
            mapped.insert(trigger.clone(), resolved);
        }
        if !mapped.is_empty() {
            props.insert("LambdaConfig".to_string(), Value::Object(mapped));
        }
    }

    // Pool tags already come as a plain map, which is the template shape too.
    if let Some(tags) = entry.get("UserPoolTags") {
        if tags.is_object() {
            props.insert("UserPoolTags".to_string(), tags.clone());
        }
    }

    emit(
        ctx,
        template,
        "userpool",
        name,
        "AWS::Cognito::UserPool",
        Value::Object(props),
        Reference::Ref,
    )?;
    Ok(())
}
