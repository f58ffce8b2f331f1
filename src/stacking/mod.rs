//! The nine-phase PR stacking pipeline: turns one large diff (`base_sha..head_sha`) into a DAG of
//! dependency-ordered commits that reproduce `head_sha`'s tree exactly.
//!
//! Phases run strictly in order; C1-C3 and C8 are where the pipeline actually suspends (network
//! fetch, blob reads, object writes) — C4 through C7 are pure in-memory computation over the
//! artifacts the earlier phases produced.

pub mod context;
pub mod delta_extraction;
pub mod errors;
pub mod executor;
pub mod feasibility;
pub mod group;
pub mod model;
pub mod partition;
pub mod plan;
pub mod rebalance;
pub mod symbol_flow;
mod treewalk;
pub mod verifier;
pub mod warnings;

use crate::config::EngineConfig;
use crate::repository::{ObjectStore, RemoteFetcher};
use errors::StackingError;
use model::{DagPlan, ExecutedStack, HintGroup, RunRequest};
use warnings::WarningsBag;

/// Everything a completed run produced: the materialized stack, the plan it executed, and every
/// recoverable warning accumulated along the way.
pub struct RunOutcome {
    pub plan: DagPlan,
    pub executed: ExecutedStack,
    pub warnings: WarningsBag,
}

/// Runs all nine phases in sequence against `store`, using `fetcher` for C1's network suspension
/// point. Fails fast on the first fatal error; recoverable conditions accumulate in the returned
/// [`WarningsBag`] instead.
pub async fn run(
    request: RunRequest,
    store: &dyn ObjectStore,
    fetcher: &dyn RemoteFetcher,
    config: &EngineConfig,
) -> Result<RunOutcome, StackingError> {
    let mut warnings = WarningsBag::new();

    let ctx = context::capture(
        store,
        fetcher,
        request.repo_path.clone(),
        request.base_sha,
        request.head_sha,
    )
    .await?;

    let deltas = delta_extraction::extract_deltas(store, &ctx).await?;
    tracing::debug!("extracted {} deltas from {}..{}", deltas.len(), ctx.base_sha, ctx.head_sha);

    let symbol_index = symbol_flow::analyze_symbols(store, &deltas, &mut warnings).await?;

    let cochange = group::cochange_counts(&deltas);

    let hints: Vec<HintGroup> = request.hint_groups;
    let partitioned = partition::partition(&deltas, &hints, &symbol_index, &cochange, config)?;
    for (path, from, to, confidence) in &partitioned.reassignments {
        warnings.push_reassignment(path.display().to_string(), from.clone(), to.clone(), *confidence);
    }
    tracing::debug!("partitioned into {} groups", partitioned.groups.len());

    let (groups, ownership) = rebalance::rebalance(
        partitioned.groups,
        partitioned.ownership,
        &symbol_index,
        &cochange,
        deltas.len(),
        config,
        &mut warnings,
    );

    tracing::debug!("rebalanced to {} groups", groups.len());

    let feasibility = feasibility::resolve(
        &groups,
        &deltas,
        &ownership,
        request.declared_deps.as_ref(),
        &mut warnings,
    )?;
    tracing::debug!("feasibility order: {:?}", feasibility.order);

    let base_commit = store.read_commit(&request.base_sha).await?;
    let plan = plan::build_plan(
        store,
        base_commit.tree_id,
        &groups,
        &deltas,
        &feasibility.edges,
        &feasibility.order,
    )
    .await?;

    let executed = executor::execute(
        store,
        &ctx,
        &plan,
        request.pr_number,
        request.pr_title.as_deref(),
        &request.author,
    )
    .await?;

    verifier::verify(store, &ctx, &plan, &executed).await?;
    tracing::info!(
        "stacked pr into {} commits, final tree {}",
        executed.group_commits.len(),
        executed.final_tree_sha
    );

    Ok(RunOutcome {
        plan,
        executed,
        warnings,
    })
}
