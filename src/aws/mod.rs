//! AWS identifier handling
//!
//! This module provides the identifier-level building blocks for re-targeting
//! a captured inventory at another account:
//!
//! - [`arn`] - Parses and recomposes ARN strings, with per-service resource
//!   naming rules
//! - [`identity`] - Substitutes the origin account for the target account in
//!   identifiers, principal blocks, and policy documents

pub mod arn;
pub mod identity;

pub use arn::{looks_like_arn, Arn, ArnError};
pub use identity::{
    rewrite_account, rewrite_policy_document, rewrite_principal, PrincipalError,
};
