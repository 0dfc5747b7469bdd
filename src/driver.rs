//! Synthesis driver
//!
//! One single-threaded pass over the snapshot in a fixed kind order: identity
//! first, then storage and messaging, then compute, then the composition
//! layers that reference everything before them. The order is what makes
//! registry lookups work; there is no second pass and no deferred resolution.

use crate::snapshot::Snapshot;
use crate::synth::{apigateway, cloudfront, cognito, dynamodb, iam, lambda, sns, sqs, SynthContext};
use crate::template::Template;
use anyhow::Result;
use clap::ValueEnum;

/// Resource kinds, named after their snapshot sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Kind {
    Roles,
    Policies,
    Tables,
    Queues,
    Topics,
    UserPools,
    Functions,
    EventSourceMappings,
    Distributions,
    RestApis,
}

impl Kind {
    /// Processing order. Everything that can be referred to comes before its
    /// possible referrers.
    pub const ORDER: [Kind; 10] = [
        Kind::Roles,
        Kind::Policies,
        Kind::Tables,
        Kind::Queues,
        Kind::Topics,
        Kind::UserPools,
        Kind::Functions,
        Kind::EventSourceMappings,
        Kind::Distributions,
        Kind::RestApis,
    ];

    /// Snapshot section this kind reads.
    pub fn section(self) -> &'static str {
        match self {
            Kind::Roles => "Roles",
            Kind::Policies => "Policies",
            Kind::Tables => "Tables",
            Kind::Queues => "Queues",
            Kind::Topics => "Topics",
            Kind::UserPools => "UserPools",
            Kind::Functions => "Functions",
            Kind::EventSourceMappings => "EventSourceMappings",
            Kind::Distributions => "Distributions",
            Kind::RestApis => "RestApis",
        }
    }
}

/// What one run produced, per kind and in total.
#[derive(Debug)]
pub struct RunSummary {
    pub counts: Vec<(Kind, usize)>,
    pub total_entries: usize,
    pub template_resources: usize,
}

/// Run the full synthesis pass.
///
/// `only` restricts the pass to a subset of kinds; the fixed order still
/// applies to whatever remains. Restricting the pass is the expected way to
/// migrate a partial graph, and is why missing registry lookups fall back
/// instead of failing.
pub fn run(
    snapshot: &Snapshot,
    ctx: &mut SynthContext,
    template: &mut Template,
    only: &[Kind],
) -> Result<RunSummary> {
    let mut counts = Vec::new();
    let mut total_entries = 0;

    for kind in Kind::ORDER {
        if !only.is_empty() && !only.contains(&kind) {
            tracing::debug!("Skipping {} (not selected)", kind.section());
            continue;
        }

        let count = synthesize_kind(kind, snapshot, ctx, template)?;
        if count > 0 {
            tracing::info!("Synthesized {} {} entries", count, kind.section());
        }
        total_entries += count;
        counts.push((kind, count));
    }

    for name in snapshot.section_names() {
        if !Kind::ORDER.iter().any(|kind| kind.section() == name) {
            tracing::debug!("Ignoring unsupported snapshot section `{}`", name);
        }
    }

    Ok(RunSummary {
        counts,
        total_entries,
        template_resources: template.len(),
    })
}

fn synthesize_kind(
    kind: Kind,
    snapshot: &Snapshot,
    ctx: &mut SynthContext,
    template: &mut Template,
) -> Result<usize> {
    match kind {
        Kind::Roles => iam::synthesize_roles(snapshot, ctx, template),
        Kind::Policies => iam::synthesize_policies(snapshot, ctx, template),
        Kind::Tables => dynamodb::synthesize(snapshot, ctx, template),
        Kind::Queues => sqs::synthesize(snapshot, ctx, template),
        Kind::Topics => sns::synthesize(snapshot, ctx, template),
        Kind::UserPools => cognito::synthesize(snapshot, ctx, template),
        Kind::Functions => lambda::synthesize_functions(snapshot, ctx, template),
        Kind::EventSourceMappings => {
            lambda::synthesize_event_source_mappings(snapshot, ctx, template)
        }
        Kind::Distributions => cloudfront::synthesize(snapshot, ctx, template),
        Kind::RestApis => apigateway::synthesize(snapshot, ctx, template),
    }
}
