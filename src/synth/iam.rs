//! IAM role and managed policy synthesis
//!
//! Identity resources come first in the pass: almost everything downstream
//! (functions, event sources, topic policies) refers back to a role. Trust
//! policies have their principal blocks re-pointed at the target account;
//! policy ARNs and statement resources move only when they name the origin
//! account, so AWS-managed and third-party policies survive untouched.

use super::{copy_fields, emit, rewrite_policy, Reference, SynthContext};
use crate::snapshot::Snapshot;
use crate::tags::{find_tags, normalize_tags, to_cfn_tags};
use crate::template::Template;
use anyhow::{Context, Result};
use percent_encoding::percent_decode_str;
use serde_json::{Map, Value};

pub fn synthesize_roles(
    snapshot: &Snapshot,
    ctx: &mut SynthContext,
    template: &mut Template,
) -> Result<usize> {
    let entries = snapshot.section("Roles");
    for entry in &entries {
        let name = entry
            .get("RoleName")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("role entry without RoleName"))?
            .to_string();
        synthesize_role(entry, &name, ctx, template)
            .with_context(|| format!("synthesizing role `{name}`"))?;
    }
    Ok(entries.len())
}

fn synthesize_role(
    entry: &Value,
    name: &str,
    ctx: &mut SynthContext,
    template: &mut Template,
) -> Result<()> {
    let mut props = copy_fields(
        entry,
        &["RoleName", "Path", "Description", "MaxSessionDuration"],
    );

    if let Some(raw) = entry.get("AssumeRolePolicyDocument") {
        let document = decode_policy_document(raw)?;
        props.insert(
            "AssumeRolePolicyDocument".to_string(),
            rewrite_policy(&document, ctx)?,
        );
    }

    if let Some(arns) = entry.get("ManagedPolicyArns").and_then(Value::as_array) {
        let rewritten: Vec<Value> = arns
            .iter()
            .filter_map(Value::as_str)
            .map(|arn| Value::String(ctx.rewrite(arn)))
            .collect();
        props.insert("ManagedPolicyArns".to_string(), Value::Array(rewritten));
    }

    let inline = entry
        .get("Policies")
        .or_else(|| entry.get("InlinePolicies"))
        .and_then(Value::as_array);
    if let Some(policies) = inline {
        let mut out = Vec::with_capacity(policies.len());
        for policy in policies {
            let mut mapped = Map::new();
            if let Some(policy_name) = policy.get("PolicyName") {
                mapped.insert("PolicyName".to_string(), policy_name.clone());
            }
            if let Some(raw) = policy.get("PolicyDocument") {
                let document = decode_policy_document(raw)?;
                mapped.insert(
                    "PolicyDocument".to_string(),
                    rewrite_policy(&document, ctx)?,
                );
            }
            out.push(Value::Object(mapped));
        }
        props.insert("Policies".to_string(), Value::Array(out));
    }

    if let Some(tags) = find_tags(entry) {
        props.insert("Tags".to_string(), to_cfn_tags(&normalize_tags(tags)));
    }

    emit(
        ctx,
        template,
        "role",
        name,
        "AWS::IAM::Role",
        Value::Object(props),
        Reference::GetAtt("Arn"),
    )?;
    Ok(())
}

pub fn synthesize_policies(
    snapshot: &Snapshot,
    ctx: &mut SynthContext,
    template: &mut Template,
) -> Result<usize> {
    let entries = snapshot.section("Policies");
    for entry in &entries {
        let name = entry
            .get("PolicyName")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("policy entry without PolicyName"))?
            .to_string();
        synthesize_policy(entry, &name, ctx, template)
            .with_context(|| format!("synthesizing policy `{name}`"))?;
    }
    Ok(entries.len())
}

fn synthesize_policy(
    entry: &Value,
    name: &str,
    ctx: &mut SynthContext,
    template: &mut Template,
) -> Result<()> {
    let mut props = copy_fields(entry, &["Path", "Description"]);
    props.insert("ManagedPolicyName".to_string(), Value::String(name.to_string()));

    let raw = entry
        .get("PolicyDocument")
        .or_else(|| entry.get("Document"))
        .ok_or_else(|| anyhow::anyhow!("policy entry without a document"))?;
    let document = decode_policy_document(raw)?;
    props.insert(
        "PolicyDocument".to_string(),
        rewrite_policy(&document, ctx)?,
    );

    emit(
        ctx,
        template,
        "policy",
        name,
        "AWS::IAM::ManagedPolicy",
        Value::Object(props),
        Reference::Ref,
    )?;
    Ok(())
}

/// IAM exports carry policy documents either as parsed objects or as
/// URL-encoded JSON strings (the control plane's own wire form).
fn decode_policy_document(raw: &Value) -> Result<Value> {
    match raw {
        Value::String(encoded) => {
            let decoded = percent_decode_str(encoded)
                .decode_utf8()
                .context("policy document is not valid UTF-8 after decoding")?;
            serde_json::from_str(&decoded).context("policy document is not valid JSON")
        }
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> SynthContext {
        SynthContext::new("111111111111", "222222222222", "us-east-1", "eu-west-1", false)
    }

    fn snapshot(value: Value) -> Snapshot {
        Snapshot::from_value(value).unwrap()
    }

    #[test]
    fn role_trust_policy_is_repointed() {
        let snap = snapshot(json!({
            "Roles": [{
                "RoleName": "deploy-role",
                "Path": "/svc/",
                "AssumeRolePolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Principal": { "AWS": "arn:aws:iam::111111111111:root" },
                        "Action": "sts:AssumeRole"
                    }]
                }
            }]
        }));
        let mut ctx = context();
        let mut template = Template::new("test");
        assert_eq!(synthesize_roles(&snap, &mut ctx, &mut template).unwrap(), 1);

        let value = template.to_value();
        let (_, resource) = value["Resources"].as_object().unwrap().iter().next().unwrap();
        assert_eq!(resource["Type"], "AWS::IAM::Role");
        assert_eq!(
            resource["Properties"]["AssumeRolePolicyDocument"]["Statement"][0]["Principal"]["AWS"],
            "arn:aws:iam::222222222222:root"
        );

        let handle = ctx.registry.get("role", "deploy-role").unwrap();
        assert_eq!(
            handle.reference,
            json!({"Fn::GetAtt": [handle.logical_id, "Arn"]})
        );
    }

    #[test]
    fn managed_policy_arns_rewrite_only_owned() {
        let snap = snapshot(json!({
            "Roles": [{
                "RoleName": "app-role",
                "ManagedPolicyArns": [
                    "arn:aws:iam::111111111111:policy/app-access",
                    "arn:aws:iam::aws:policy/ReadOnlyAccess"
                ]
            }]
        }));
        let mut ctx = context();
        let mut template = Template::new("test");
        synthesize_roles(&snap, &mut ctx, &mut template).unwrap();

        let value = template.to_value();
        let (_, resource) = value["Resources"].as_object().unwrap().iter().next().unwrap();
        assert_eq!(
            resource["Properties"]["ManagedPolicyArns"],
            json!([
                "arn:aws:iam::222222222222:policy/app-access",
                "arn:aws:iam::aws:policy/ReadOnlyAccess"
            ])
        );
    }

    #[test]
    fn url_encoded_trust_policy_is_decoded() {
        let encoded = "%7B%22Version%22%3A%222012-10-17%22%2C%22Statement%22%3A%5B%7B%22Effect%22%3A%22Allow%22%2C%22Principal%22%3A%7B%22Service%22%3A%22lambda.amazonaws.com%22%7D%2C%22Action%22%3A%22sts%3AAssumeRole%22%7D%5D%7D";
        let snap = snapshot(json!({
            "Roles": [{
                "RoleName": "fn-role",
                "AssumeRolePolicyDocument": encoded
            }]
        }));
        let mut ctx = context();
        let mut template = Template::new("test");
        synthesize_roles(&snap, &mut ctx, &mut template).unwrap();

        let value = template.to_value();
        let (_, resource) = value["Resources"].as_object().unwrap().iter().next().unwrap();
        assert_eq!(
            resource["Properties"]["AssumeRolePolicyDocument"]["Statement"][0]["Principal"]["Service"],
            "lambda.amazonaws.com"
        );
    }

    #[test]
    fn managed_policy_statement_resources_move_with_account() {
        let snap = snapshot(json!({
            "Policies": [{
                "PolicyName": "table-access",
                "PolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Action": "dynamodb:GetItem",
                        "Resource": [
                            "arn:aws:dynamodb:us-east-1:111111111111:table/Orders",
                            "arn:aws:dynamodb:us-east-1:999999999999:table/Partner"
                        ]
                    }]
                }
            }]
        }));
        let mut ctx = context();
        let mut template = Template::new("test");
        assert_eq!(synthesize_policies(&snap, &mut ctx, &mut template).unwrap(), 1);

        let value = template.to_value();
        let (_, resource) = value["Resources"].as_object().unwrap().iter().next().unwrap();
        assert_eq!(resource["Type"], "AWS::IAM::ManagedPolicy");
        assert_eq!(
            resource["Properties"]["PolicyDocument"]["Statement"][0]["Resource"],
            json!([
                "arn:aws:dynamodb:us-east-1:222222222222:table/Orders",
                "arn:aws:dynamodb:us-east-1:999999999999:table/Partner"
            ])
        );
        assert!(ctx.registry.get("policy", "table-access").is_some());
    }

    #[test]
    fn role_without_name_is_an_error() {
        let snap = snapshot(json!({ "Roles": [{"Path": "/"}] }));
        let mut ctx = context();
        let mut template = Template::new("test");
        assert!(synthesize_roles(&snap, &mut ctx, &mut template).is_err());
    }
}
