//! CloudFront distribution synthesis
//!
//! The origin inventory wraps every list in a `{Quantity, Items}` envelope
//! (the distribution API's wire shape); the template wants plain lists.
//! Unwrapping those envelopes, dropping caller references, and re-pointing
//! edge lambda associations is the whole job.

use super::{copy_fields, emit, Reference, SynthContext};
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
    let entries = snapshot.section("Distributions");
    for entry in &entries {
        let key = distribution_key(entry)
            .ok_or_else(|| anyhow::anyhow!("distribution entry without aliases or Id"))?;
        synthesize_distribution(entry, &key, ctx, template)
            .with_context(|| format!("synthesizing distribution `{key}`"))?;
    }
    Ok(entries.len())
}

/// A distribution's platform-assigned Id will differ in the target account,
/// so the natural key prefers the first alias, which the operator owns.
fn distribution_key(entry: &Value) -> Option<String> {
    let config = entry.get("DistributionConfig").unwrap_or(entry);
    if let Some(aliases) = config.get("Aliases").map(unwrap_items) {
        if let Some(first) = aliases.first().and_then(Value::as_str) {
            return Some(first.to_string());
        }
    }
    entry
        .get("Id")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn synthesize_distribution(
    entry: &Value,
    key: &str,
    ctx: &mut SynthContext,
    template: &mut Template,
) -> Result<()> {
    let config = entry.get("DistributionConfig").unwrap_or(entry);

    let mut mapped = copy_fields(
        config,
        &[
            "Comment",
            "Enabled",
            "PriceClass",
            "DefaultRootObject",
            "HttpVersion",
            "IsIPV6Enabled",
        ],
    );

    let aliases = config.get("Aliases").map(unwrap_items).unwrap_or_default();
    if !aliases.is_empty() {
        mapped.insert("Aliases".to_string(), Value::Array(aliases));
    }

    if let Some(origins) = config.get("Origins") {
        let mapped_origins: Vec<Value> = unwrap_items(origins)
            .iter()
            .map(map_origin)
            .collect();
        mapped.insert("Origins".to_string(), Value::Array(mapped_origins));
    }

    if let Some(behavior) = config.get("DefaultCacheBehavior") {
        mapped.insert(
            "DefaultCacheBehavior".to_string(),
            map_cache_behavior(behavior, ctx)?,
        );
    }

    if let Some(behaviors) = config.get("CacheBehaviors") {
        let items = unwrap_items(behaviors);
        if !items.is_empty() {
            let mut out = Vec::with_capacity(items.len());
            for behavior in &items {
                out.push(map_cache_behavior(behavior, ctx)?);
            }
            mapped.insert("CacheBehaviors".to_string(), Value::Array(out));
        }
    }

    if let Some(certificate) = config.get("ViewerCertificate") {
        let mut out = copy_fields(
            certificate,
            &[
                "CloudFrontDefaultCertificate",
                "SslSupportMethod",
                "MinimumProtocolVersion",
            ],
        );
        if let Some(arn) = certificate.get("ACMCertificateArn").and_then(Value::as_str) {
            out.insert("AcmCertificateArn".to_string(), json!(ctx.rewrite(arn)));
        }
        mapped.insert("ViewerCertificate".to_string(), Value::Object(out));
    }

    if let Some(acl) = config.get("WebACLId").and_then(Value::as_str) {
        if !acl.is_empty() {
            mapped.insert("WebACLId".to_string(), json!(ctx.rewrite(acl)));
        }
    }

    let mut props = Map::new();
    props.insert("DistributionConfig".to_string(), Value::Object(mapped));
    if let Some(tags) = find_tags(entry) {
        props.insert("Tags".to_string(), to_cfn_tags(&normalize_tags(tags)));
    }

    emit(
        ctx,
        template,
        "distribution",
        key,
        "AWS::CloudFront::Distribution",
        Value::Object(props),
        Reference::Ref,
    )?;
    Ok(())
}

fn map_origin(origin: &Value) -> Value {
    let mut out = copy_fields(origin, &["Id", "DomainName", "OriginPath"]);

    // Origin access identities carry no account field; verbatim is correct.
    if let Some(s3) = origin.get("S3OriginConfig") {
        out.insert(
            "S3OriginConfig".to_string(),
            Value::Object(copy_fields(s3, &["OriginAccessIdentity"])),
        );
    }

    if let Some(custom) = origin.get("CustomOriginConfig") {
        let mut mapped = copy_fields(
            custom,
            &["HTTPPort", "HTTPSPort", "OriginProtocolPolicy"],
        );
        if let Some(protocols) = custom.get("OriginSslProtocols") {
            mapped.insert(
                "OriginSSLProtocols".to_string(),
                Value::Array(unwrap_items(protocols)),
            );
        }
        out.insert("CustomOriginConfig".to_string(), Value::Object(mapped));
    }

    Value::Object(out)
}

fn map_cache_behavior(behavior: &Value, ctx: &SynthContext) -> Result<Value> {
    let mut out = copy_fields(
        behavior,
        &[
            "PathPattern",
            "TargetOriginId",
            "ViewerProtocolPolicy",
            "Compress",
            "CachePolicyId",
            "OriginRequestPolicyId",
        ],
    );

    if let Some(methods) = behavior.get("AllowedMethods") {
        out.insert(
            "AllowedMethods".to_string(),
            Value::Array(unwrap_items(methods)),
        );
        if let Some(cached) = methods.get("CachedMethods") {
            out.insert(
                "CachedMethods".to_string(),
                Value::Array(unwrap_items(cached)),
            );
        }
    }

    if let Some(associations) = behavior.get("LambdaFunctionAssociations") {
        let items = unwrap_items(associations);
        if !items.is_empty() {
            let mut mapped = Vec::with_capacity(items.len());
            for association in &items {
                let mut entry = copy_fields(association, &["EventType", "IncludeBody"]);
                if let Some(arn) = association
                    .get("LambdaFunctionARN")
                    .and_then(Value::as_str)
                {
                    let fallback = json!(ctx.rewrite(arn));
                    let resolved = match Arn::parse(arn) {
                        Ok(parsed) => {
                            ctx.resolve("function", parsed.resource_name(), fallback)?
                        }
                        Err(_) => fallback,
                    };
                    entry.insert("LambdaFunctionARN".to_string(), resolved);
                }
                mapped.push(Value::Object(entry));
            }
            out.insert("LambdaFunctionAssociations".to_string(), Value::Array(mapped));
        }
    }

    Ok(Value::Object(out))
}

/// The inventory's `{Quantity, Items}` envelope, or an already-plain list.
fn unwrap_items(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::Object(map) => map
            .get("Items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        _ => Vec::new(),
    }
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
    fn quantity_items_envelopes_unwrap() {
        let snap = Snapshot::from_value(json!({
            "Distributions": [{
                "Id": "E123",
                "DistributionConfig": {
                    "Enabled": true,
                    "Comment": "site",
                    "Aliases": {"Quantity": 1, "Items": ["www.example.com"]},
                    "Origins": {"Quantity": 1, "Items": [{
                        "Id": "site-bucket",
                        "DomainName": "site-bucket.s3.amazonaws.com",
                        "S3OriginConfig": {"OriginAccessIdentity": "origin-access-identity/cloudfront/E2ABC"}
                    }]},
                    "DefaultCacheBehavior": {
                        "TargetOriginId": "site-bucket",
                        "ViewerProtocolPolicy": "redirect-to-https",
                        "AllowedMethods": {
                            "Quantity": 2,
                            "Items": ["GET", "HEAD"],
                            "CachedMethods": {"Quantity": 2, "Items": ["GET", "HEAD"]}
                        }
                    }
                }
            }]
        }))
        .unwrap();
        let mut ctx = context();
        let mut template = Template::new("test");
        assert_eq!(synthesize(&snap, &mut ctx, &mut template).unwrap(), 1);

        let config = &first_resource(&template)["Properties"]["DistributionConfig"];
        assert_eq!(config["Aliases"], json!(["www.example.com"]));
        assert_eq!(config["Origins"][0]["Id"], "site-bucket");
        assert_eq!(
            config["Origins"][0]["S3OriginConfig"]["OriginAccessIdentity"],
            "origin-access-identity/cloudfront/E2ABC"
        );
        assert_eq!(
            config["DefaultCacheBehavior"]["AllowedMethods"],
            json!(["GET", "HEAD"])
        );

        assert!(ctx.registry.get("distribution", "www.example.com").is_some());
    }

    #[test]
    fn edge_lambda_association_resolves() {
        let snap = Snapshot::from_value(json!({
            "Distributions": [{
                "Id": "E456",
                "DistributionConfig": {
                    "Enabled": true,
                    "DefaultCacheBehavior": {
                        "TargetOriginId": "origin",
                        "ViewerProtocolPolicy": "allow-all",
                        "LambdaFunctionAssociations": {"Quantity": 1, "Items": [{
                            "EventType": "viewer-request",
                            "LambdaFunctionARN": "arn:aws:lambda:us-east-1:111111111111:function:Rewriter:2"
                        }]}
                    }
                }
            }]
        }))
        .unwrap();
        let mut ctx = context();
        ctx.registry.store(
            "function",
            "Rewriter",
            Handle::new("ResFn", json!({"Fn::GetAtt": ["ResFn", "Arn"]})),
        );
        let mut template = Template::new("test");
        synthesize(&snap, &mut ctx, &mut template).unwrap();

        let config = &first_resource(&template)["Properties"]["DistributionConfig"];
        assert_eq!(
            config["DefaultCacheBehavior"]["LambdaFunctionAssociations"][0]["LambdaFunctionARN"],
            json!({"Fn::GetAtt": ["ResFn", "Arn"]})
        );
    }

    #[test]
    fn keyless_distribution_falls_back_to_id() {
        let snap = Snapshot::from_value(json!({
            "Distributions": [{
                "Id": "E789",
                "DistributionConfig": {"Enabled": false}
            }]
        }))
        .unwrap();
        let mut ctx = context();
        let mut template = Template::new("test");
        synthesize(&snap, &mut ctx, &mut template).unwrap();
        assert!(ctx.registry.get("distribution", "E789").is_some());
    }
}
