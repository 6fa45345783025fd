//! Rule/source execution
//!
//! The executor normalizes the dual calling convention: a transformation
//! may return a tree directly (synchronous) or a stream of trees (for rules
//! that must await I/O, such as invoking another schematic). Either way the
//! caller gets back exactly one tree.
//!
//! The stream contract is last-value-wins: intermediate emissions are
//! progress signals, not candidates for the final result. A stream that
//! completes with zero emissions is a fatal [`Error::EmptyResult`]. Errors
//! raised by the transformation, synchronously or through the stream,
//! propagate unchanged; the executor performs no retry and no swallowing.

use crate::engine::SchematicContext;
use crate::error::{Error, Result};
use crate::host::EngineHost;
use crate::rule::{Rule, RuleOutcome, Source};
use crate::tree::Tree;
use futures::StreamExt;
use log::debug;

/// Run a rule against an input tree, resolving to exactly one final tree.
pub async fn call_rule<H: EngineHost>(
    rule: &Rule<H>,
    tree: Tree,
    context: &SchematicContext<H>,
) -> Result<Tree> {
    let outcome = rule(tree, context.clone())?;
    resolve_outcome(outcome, context).await
}

/// Run a source, resolving to exactly one initial tree.
pub async fn call_source<H: EngineHost>(
    source: &Source<H>,
    context: &SchematicContext<H>,
) -> Result<Tree> {
    let outcome = source(context.clone())?;
    resolve_outcome(outcome, context).await
}

/// Collapse a rule outcome to a single tree: immediate trees pass through,
/// deferred streams are driven to completion and only the last emission is
/// kept.
async fn resolve_outcome<H: EngineHost>(
    outcome: RuleOutcome,
    context: &SchematicContext<H>,
) -> Result<Tree> {
    match outcome {
        RuleOutcome::Tree(tree) => Ok(tree),
        RuleOutcome::Stream(mut stream) => {
            let mut last = None;
            let mut emissions = 0usize;
            while let Some(item) = stream.next().await {
                emissions += 1;
                last = Some(item?);
            }
            debug!(
                "schematic '{}': stream terminated after {} emission(s)",
                context.schematic.name, emissions
            );
            last.ok_or_else(|| Error::EmptyResult {
                schematic: context.schematic.name.clone(),
            })
        }
    }
}
