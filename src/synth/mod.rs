//! Resource synthesizers
//!
//! One module per resource kind, dispatched in a fixed order by the driver.
//! Each synthesizer maps origin properties to target template properties,
//! rewrites embedded account references, derives a content-based logical ID,
//! and registers a handle for resources synthesized after it.
//!
//! - [`iam`] - roles and customer managed policies
//! - [`dynamodb`] - tables
//! - [`sqs`] - queues
//! - [`sns`] - topics, subscriptions, topic policies
//! - [`cognito`] - user pools
//! - [`lambda`] - functions and event source mappings
//! - [`cloudfront`] - distributions
//! - [`apigateway`] - REST APIs

pub mod apigateway;
pub mod cloudfront;
pub mod cognito;
pub mod dynamodb;
pub mod iam;
pub mod lambda;
pub mod sns;
pub mod sqs;

use crate::aws::identity::{rewrite_account, rewrite_policy_document};
use crate::naming;
use crate::registry::{Handle, ResourceRegistry};
use crate::template::Template;
use anyhow::Result;
use serde_json::{json, Value};

/// Shared state for one synthesis run, threaded through every synthesizer.
#[derive(Debug)]
pub struct SynthContext {
    pub origin_account: String,
    pub target_account: String,
    pub origin_region: String,
    pub target_region: String,
    /// Turn unresolved registry lookups into errors instead of falling back
    /// to the origin snapshot's raw value.
    pub strict_refs: bool,
    pub registry: ResourceRegistry,
}

impl SynthContext {
    pub fn new(
        origin_account: impl Into<String>,
        target_account: impl Into<String>,
        origin_region: impl Into<String>,
        target_region: impl Into<String>,
        strict_refs: bool,
    ) -> Self {
        Self {
            origin_account: origin_account.into(),
            target_account: target_account.into(),
            origin_region: origin_region.into(),
            target_region: target_region.into(),
            strict_refs,
            registry: ResourceRegistry::new(),
        }
    }

    /// Account rewrite with this run's origin/target pair.
    pub fn rewrite(&self, value: &str) -> String {
        rewrite_account(value, &self.origin_account, &self.target_account)
    }

    /// Look up an already-synthesized dependency, falling back to the given
    /// value when it was never synthesized (filtered out, or simply absent
    /// from the capture).
    ///
    /// The fallback path is deliberate lenient linking: a partial graph still
    /// synthesizes. A fallback that still embeds the origin account is logged
    /// as a warning so the operator can judge it, but it is not rewritten
    /// here; the caller already chose what the fallback should be.
    pub fn resolve(&self, kind: &str, key: &str, fallback: Value) -> Result<Value> {
        if let Some(handle) = self.registry.get(kind, key) {
            return Ok(handle.reference.clone());
        }

        if self.strict_refs {
            anyhow::bail!("unresolved reference to {} `{}`", kind, key);
        }

        if embeds_account(&fallback, &self.origin_account) {
            tracing::warn!(
                "Reference to {} `{}` not found in this run; falling back to a value that still names account {}",
                kind,
                key,
                self.origin_account
            );
        } else {
            tracing::debug!("Reference to {} `{}` not found, using fallback", kind, key);
        }

        Ok(fallback)
    }
}

/// Whether a value (or any nested string in it) still names the account.
fn embeds_account(value: &Value, account: &str) -> bool {
    match value {
        Value::String(s) => s.contains(account),
        Value::Array(items) => items.iter().any(|v| embeds_account(v, account)),
        Value::Object(map) => map.values().any(|v| embeds_account(v, account)),
        _ => false,
    }
}

/// Intrinsic shape a synthesized resource is referred to by.
#[derive(Debug, Clone, Copy)]
pub enum Reference {
    /// `{"Ref": <logical>}` - types whose Ref returns the useful value
    /// (queue URL, topic ARN, table name).
    Ref,
    /// `{"Fn::GetAtt": [<logical>, <attr>]}` - usually `"Arn"`.
    GetAtt(&'static str),
}

/// Insert a synthesized resource into the template and register its handle.
///
/// The logical ID is derived from the serialized properties; serde_json's
/// key-ordered maps make that serialization canonical.
pub fn emit(
    ctx: &mut SynthContext,
    template: &mut Template,
    kind: &str,
    natural_key: &str,
    resource_type: &str,
    properties: Value,
    reference: Reference,
) -> Result<String> {
    let canonical = serde_json::to_string(&properties)?;
    let logical_id = naming::logical_id(&canonical);

    let reference = match reference {
        Reference::Ref => json!({ "Ref": logical_id }),
        Reference::GetAtt(attr) => json!({ "Fn::GetAtt": [logical_id, attr] }),
    };

    template.insert(&logical_id, resource_type, properties);
    ctx.registry
        .store(kind, natural_key, Handle::new(&logical_id, reference));

    tracing::debug!(
        "Synthesized {} `{}` as {}",
        resource_type,
        natural_key,
        logical_id
    );
    Ok(logical_id)
}

/// Rewrite a full policy document: principal blocks via the identity
/// rewriter, then statement Resource/NotResource strings via the plain
/// account rewrite. Owned ARNs move with the account, foreign ones stay.
pub(crate) fn rewrite_policy(document: &Value, ctx: &SynthContext) -> Result<Value> {
    let mut document =
        rewrite_policy_document(document, &ctx.origin_account, &ctx.target_account)?;

    if let Some(statement) = document.get_mut("Statement") {
        match statement {
            Value::Array(statements) => {
                for entry in statements {
                    rewrite_statement_resources(entry, ctx);
                }
            }
            Value::Object(_) => rewrite_statement_resources(statement, ctx),
            _ => {}
        }
    }

    Ok(document)
}

fn rewrite_statement_resources(statement: &mut Value, ctx: &SynthContext) {
    for key in ["Resource", "NotResource"] {
        let Some(resource) = statement.get_mut(key) else {
            continue;
        };
        match resource {
            Value::String(value) => *value = ctx.rewrite(value),
            Value::Array(values) => {
                for value in values {
                    if let Value::String(value) = value {
                        *value = ctx.rewrite(value);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Copy the listed fields from an origin entry into a property object,
/// skipping absent ones. The bread and butter of property mapping: most
/// fields carry over verbatim and only the identifier-bearing ones need
/// per-synthesizer attention.
pub(crate) fn copy_fields(entry: &Value, fields: &[&str]) -> serde_json::Map<String, Value> {
    let mut out = serde_json::Map::new();
    for field in fields {
        if let Some(value) = entry.get(*field) {
            if !value.is_null() {
                out.insert((*field).to_string(), value.clone());
            }
        }
    }
    out
}
