//! ARN parsing and recomposition
//!
//! Decomposes AWS resource identifiers into their colon-delimited fields and
//! recomposes them byte-for-byte. Service-specific conventions for extracting
//! a resource's own name live in one place here, so supporting a new service's
//! resource-part layout means adding one match arm.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Structural ARN shape: `arn` scheme, partition/service/region fields,
/// an account that is empty or exactly 12 digits, and a non-empty remainder.
fn arn_shape() -> &'static Regex {
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    SHAPE.get_or_init(|| {
        Regex::new(r"^arn:[^:]*:[^:]*:[^:]*:(\d{12})?:.+$").expect("ARN shape pattern is valid")
    })
}

/// Check whether a string is structurally an ARN, without attempting to
/// interpret it. Never panics, regardless of input.
pub fn looks_like_arn(value: &str) -> bool {
    arn_shape().is_match(value)
}

#[derive(Debug, thiserror::Error)]
pub enum ArnError {
    #[error("malformed identifier `{identifier}`: expected arn:partition:service:region:account:resource")]
    Malformed { identifier: String },
}

/// A parsed ARN.
///
/// The five header fields are stored individually; `resource` keeps the raw
/// remainder after the fifth colon untouched so that [`Arn::to_string`]
/// reproduces the input exactly. [`Arn::resource_name`] and [`Arn::qualifier`]
/// interpret the resource part per service and are lossy for some services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arn {
    pub partition: String,
    pub service: String,
    pub region: String,
    /// 12-digit account ID, or empty for global resources (e.g. S3 buckets).
    pub account: String,
    /// Raw resource part, exactly as it appeared after the fifth colon.
    pub resource: String,
}

impl Arn {
    /// Parse an ARN string into its fields.
    ///
    /// Splits on `:` into at most six segments. Fewer than six segments, or a
    /// scheme other than `arn`, means the snapshot carried something that is
    /// not an identifier, which is surfaced rather than defaulted.
    pub fn parse(input: &str) -> Result<Arn, ArnError> {
        let fields: Vec<&str> = input.splitn(6, ':').collect();
        if fields.len() < 6 || fields[0] != "arn" {
            return Err(ArnError::Malformed {
                identifier: input.to_string(),
            });
        }

        Ok(Arn {
            partition: fields[1].to_string(),
            service: fields[2].to_string(),
            region: fields[3].to_string(),
            account: fields[4].to_string(),
            resource: fields[5].to_string(),
        })
    }

    /// The resource's own name, per the owning service's convention.
    ///
    /// - `dynamodb`, `cognito-idp`, `cognito-identity`: the path segment after
    ///   the literal type marker (`table/Orders` -> `Orders`)
    /// - `iam`: the last path segment, tolerating arbitrarily deep prefixes
    ///   (`role/svc/deploy-role` -> `deploy-role`)
    /// - `lambda`: the resource part is itself colon-delimited
    ///   (`function:Handler[:qualifier]` -> `Handler`)
    /// - everything else: the raw resource part
    pub fn resource_name(&self) -> &str {
        match self.service.as_str() {
            "dynamodb" | "cognito-idp" | "cognito-identity" => {
                self.resource.split('/').nth(1).unwrap_or(&self.resource)
            }
            "iam" => self
                .resource
                .rsplit('/')
                .next()
                .unwrap_or(&self.resource),
            "lambda" => self.resource.split(':').nth(1).unwrap_or(&self.resource),
            _ => &self.resource,
        }
    }

    /// Version or alias qualifier, for services that carry one.
    ///
    /// Only `lambda` identifiers have a qualifier segment
    /// (`function:Handler:3` -> `3`); its absence yields an empty string.
    pub fn qualifier(&self) -> &str {
        match self.service.as_str() {
            "lambda" => self.resource.split(':').nth(2).unwrap_or(""),
            _ => "",
        }
    }

    /// Copy of this ARN with only the account field replaced.
    pub fn with_account(&self, account: &str) -> Arn {
        Arn {
            account: account.to_string(),
            ..self.clone()
        }
    }
}

impl fmt::Display for Arn {
    /// Strict inverse of the colon split in [`Arn::parse`].
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:{}",
            self.partition, self.service, self.region, self.account, self.resource
        )
    }
}
