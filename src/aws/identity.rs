//! Account identity rewriting
//!
//! Substitutes the origin account for the target account wherever an embedded
//! identifier provably refers to the origin account. References to any other
//! account survive untouched: a snapshot may legitimately point at resources
//! owned by a third party (an AWS-managed IAM policy, a partner's topic), and
//! those must carry over as-is.

use super::arn::{looks_like_arn, Arn};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Bare 12-digit account number.
fn bare_account() -> &'static Regex {
    static ACCOUNT: OnceLock<Regex> = OnceLock::new();
    ACCOUNT.get_or_init(|| Regex::new(r"^\d{12}$").expect("account pattern is valid"))
}

/// Whether a string is a well-formed account ID.
pub fn is_account_id(value: &str) -> bool {
    bare_account().is_match(value)
}

/// Replace the origin account with the target account inside a single value.
///
/// An ARN-shaped value is rewritten only when its account field equals
/// `origin`; a bare 12-digit string is rewritten only when it equals `origin`
/// wholesale. Everything else passes through unchanged. Applying this twice
/// with the same accounts is a no-op, since the output's account is `target`,
/// which never equals `origin` in a valid run.
pub fn rewrite_account(value: &str, origin: &str, target: &str) -> String {
    if looks_like_arn(value) {
        if let Ok(arn) = Arn::parse(value) {
            if arn.account == origin {
                return arn.with_account(target).to_string();
            }
        }
        return value.to_string();
    }

    if bare_account().is_match(value) && value == origin {
        return target.to_string();
    }

    value.to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum PrincipalError {
    #[error("unsupported principal shape under `{tag}`: expected a string or a list of strings")]
    Unsupported { tag: String },
}

/// Rewrite the account references inside a policy principal block.
///
/// Only `AWS` and `Federated` entries can carry account identifiers; their
/// values (a scalar string or a list of strings, shape preserved) go through
/// [`rewrite_account`]. `Service`, `CanonicalUser`, and any other tag are
/// copied through untouched. A bare-string principal (`"Principal": "*"`)
/// also passes through unchanged.
pub fn rewrite_principal(
    block: &Value,
    origin: &str,
    target: &str,
) -> Result<Value, PrincipalError> {
    let Some(entries) = block.as_object() else {
        return Ok(block.clone());
    };

    let mut rewritten = Map::new();
    for (tag, entry) in entries {
        let value = match tag.as_str() {
            "AWS" | "Federated" => rewrite_principal_entry(tag, entry, origin, target)?,
            _ => entry.clone(),
        };
        rewritten.insert(tag.clone(), value);
    }

    Ok(Value::Object(rewritten))
}

fn rewrite_principal_entry(
    tag: &str,
    entry: &Value,
    origin: &str,
    target: &str,
) -> Result<Value, PrincipalError> {
    match entry {
        Value::String(value) => Ok(Value::String(rewrite_account(value, origin, target))),
        Value::Array(values) => {
            let mut out = Vec::with_capacity(values.len());
            for value in values {
                let Value::String(value) = value else {
                    return Err(PrincipalError::Unsupported {
                        tag: tag.to_string(),
                    });
                };
                out.push(Value::String(rewrite_account(value, origin, target)));
            }
            Ok(Value::Array(out))
        }
        _ => Err(PrincipalError::Unsupported {
            tag: tag.to_string(),
        }),
    }
}

/// Rewrite every principal block inside a policy document.
///
/// Walks `Statement` (a single object or an array) and applies
/// [`rewrite_principal`] to `Principal` and `NotPrincipal`. Action, Resource,
/// and Condition are left alone; whether a Resource field should move with
/// the account is a per-resource decision made by the caller.
pub fn rewrite_policy_document(
    document: &Value,
    origin: &str,
    target: &str,
) -> Result<Value, PrincipalError> {
    let mut document = document.clone();

    if let Some(statement) = document.get_mut("Statement") {
        match statement {
            Value::Array(statements) => {
                for entry in statements {
                    rewrite_statement(entry, origin, target)?;
                }
            }
            Value::Object(_) => rewrite_statement(statement, origin, target)?,
            _ => {}
        }
    }

    Ok(document)
}

fn rewrite_statement(statement: &mut Value, origin: &str, target: &str) -> Result<(), PrincipalError> {
    for key in ["Principal", "NotPrincipal"] {
        if let Some(block) = statement.get(key) {
            let rewritten = rewrite_principal(block, origin, target)?;
            statement[key] = rewritten;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ORIGIN: &str = "111111111111";
    const TARGET: &str = "222222222222";

    #[test]
    fn rewrites_owned_arn_account_only() {
        let rewritten = rewrite_account(
            "arn:aws:iam::111111111111:role/svc/deploy-role",
            ORIGIN,
            TARGET,
        );
        assert_eq!(rewritten, "arn:aws:iam::222222222222:role/svc/deploy-role");
    }

    #[test]
    fn leaves_foreign_arn_untouched() {
        let foreign = "arn:aws:iam::999999999999:policy/ReadOnlyAccess";
        assert_eq!(rewrite_account(foreign, ORIGIN, TARGET), foreign);
    }

    #[test]
    fn rewrites_bare_account_number() {
        assert_eq!(rewrite_account(ORIGIN, ORIGIN, TARGET), TARGET);
        assert_eq!(rewrite_account("333333333333", ORIGIN, TARGET), "333333333333");
    }

    #[test]
    fn leaves_non_identifier_values_untouched() {
        for value in ["deploy-role", "us-east-1", "12345", "", "arn:aws:iam"] {
            assert_eq!(rewrite_account(value, ORIGIN, TARGET), value);
        }
    }

    #[test]
    fn rewrite_is_idempotent() {
        let once = rewrite_account(
            "arn:aws:dynamodb:us-east-1:111111111111:table/Orders",
            ORIGIN,
            TARGET,
        );
        let twice = rewrite_account(&once, ORIGIN, TARGET);
        assert_eq!(once, twice);
    }

    #[test]
    fn principal_rewrites_aws_entries_and_spares_foreign() {
        let block = json!({
            "AWS": ["111111111111", "arn:aws:iam::999999999999:root"]
        });
        let rewritten = rewrite_principal(&block, ORIGIN, TARGET).unwrap();
        assert_eq!(
            rewritten,
            json!({
                "AWS": ["222222222222", "arn:aws:iam::999999999999:root"]
            })
        );
    }

    #[test]
    fn principal_preserves_scalar_shape() {
        let block = json!({ "AWS": "arn:aws:iam::111111111111:root" });
        let rewritten = rewrite_principal(&block, ORIGIN, TARGET).unwrap();
        assert_eq!(rewritten, json!({ "AWS": "arn:aws:iam::222222222222:root" }));
    }

    #[test]
    fn principal_passes_service_and_canonical_user_through() {
        let block = json!({
            "Service": "lambda.amazonaws.com",
            "CanonicalUser": "79a59df900b949e55d96a1e698fbacedfd6e09d98eacf8f8d5218e7cd47ef2be"
        });
        let rewritten = rewrite_principal(&block, ORIGIN, TARGET).unwrap();
        assert_eq!(rewritten, block);
    }

    #[test]
    fn wildcard_principal_passes_through() {
        let block = json!("*");
        assert_eq!(rewrite_principal(&block, ORIGIN, TARGET).unwrap(), block);
    }

    #[test]
    fn principal_rejects_nested_objects_under_aws() {
        let block = json!({ "AWS": { "nested": true } });
        let err = rewrite_principal(&block, ORIGIN, TARGET).unwrap_err();
        assert!(err.to_string().contains("AWS"));

        let block = json!({ "Federated": [42] });
        assert!(rewrite_principal(&block, ORIGIN, TARGET).is_err());
    }

    #[test]
    fn policy_document_rewrites_each_statement() {
        let document = json!({
            "Version": "2012-10-17",
            "Statement": [
                {
                    "Effect": "Allow",
                    "Principal": { "AWS": "111111111111" },
                    "Action": "sts:AssumeRole"
                },
                {
                    "Effect": "Allow",
                    "Principal": { "Service": "events.amazonaws.com" },
                    "Action": "sts:AssumeRole"
                }
            ]
        });
        let rewritten = rewrite_policy_document(&document, ORIGIN, TARGET).unwrap();
        assert_eq!(
            rewritten["Statement"][0]["Principal"],
            json!({ "AWS": "222222222222" })
        );
        assert_eq!(
            rewritten["Statement"][1]["Principal"],
            json!({ "Service": "events.amazonaws.com" })
        );
        assert_eq!(rewritten["Version"], "2012-10-17");
    }

    #[test]
    fn policy_document_accepts_single_statement_object() {
        let document = json!({
            "Statement": {
                "Effect": "Allow",
                "NotPrincipal": { "AWS": "arn:aws:iam::111111111111:root" },
                "Action": "s3:GetObject"
            }
        });
        let rewritten = rewrite_policy_document(&document, ORIGIN, TARGET).unwrap();
        assert_eq!(
            rewritten["Statement"]["NotPrincipal"],
            json!({ "AWS": "arn:aws:iam::222222222222:root" })
        );
    }
}
