//! Rules and sources: the transformation functions of the engine
//!
//! A [`Rule`] maps an input [`Tree`] (plus its [`SchematicContext`]) to a
//! new tree; a [`Source`] manufactures an initial tree with no prior input.
//! Both may complete synchronously or hand back an asynchronous stream of
//! trees, normalized into the single [`RuleOutcome`] type so the executor
//! has one code path.
//!
//! This module also provides the combinator library schematic authors build
//! pipelines from: [`chain`], [`apply`], [`merge_with`], [`run_schematic`]
//! and friends. Per-file helpers (glob filtering, regex renaming, file
//! operators) live in [`crate::operators`].

use crate::engine::SchematicContext;
use crate::error::Result;
use crate::executor;
use crate::host::EngineHost;
use crate::merge::{self, MergeStrategy};
use crate::tree::Tree;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;

/// An asynchronous stream of tree results. Only the last emission becomes
/// the final tree; intermediate emissions are progress signals.
pub type TreeStream = BoxStream<'static, Result<Tree>>;

/// The normalized result of invoking a rule or source: either a tree that
/// was produced synchronously, or a deferred stream of trees.
pub enum RuleOutcome {
    /// The transformation completed synchronously
    Tree(Tree),
    /// The transformation suspended; the executor drives the stream and
    /// keeps only its last emission
    Stream(TreeStream),
}

impl From<Tree> for RuleOutcome {
    fn from(tree: Tree) -> Self {
        RuleOutcome::Tree(tree)
    }
}

/// A transformation from one staged tree to another
pub type Rule<H> = Arc<dyn Fn(Tree, SchematicContext<H>) -> Result<RuleOutcome> + Send + Sync>;

/// A manufacturer of an initial staged tree
pub type Source<H> = Arc<dyn Fn(SchematicContext<H>) -> Result<RuleOutcome> + Send + Sync>;

/// Maps caller-supplied options to a rule. This is the extension point
/// through which all schematic authors plug in; the options shape is chosen
/// by the engine host and opaque to the engine.
pub type RuleFactory<H> = Arc<dyn Fn(<H as EngineHost>::Options) -> Rule<H> + Send + Sync>;

/// Wrap a closure into a [`Rule`]
pub fn rule<H, F>(f: F) -> Rule<H>
where
    H: EngineHost,
    F: Fn(Tree, SchematicContext<H>) -> Result<RuleOutcome> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap a closure into a [`Source`]
pub fn source_fn<H, F>(f: F) -> Source<H>
where
    H: EngineHost,
    F: Fn(SchematicContext<H>) -> Result<RuleOutcome> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A rule that returns its input unchanged
pub fn noop<H: EngineHost>() -> Rule<H> {
    Arc::new(|tree, _context| Ok(tree.into()))
}

/// A source that always yields a clone of the given tree
pub fn source<H: EngineHost>(tree: Tree) -> Source<H> {
    Arc::new(move |_context| Ok(tree.clone().into()))
}

/// A source that yields an empty tree
pub fn empty_source<H: EngineHost>() -> Source<H> {
    Arc::new(|_context| Ok(Tree::empty().into()))
}

/// Compose rules into a sequential pipeline.
///
/// Rule *i + 1* receives the tree produced by rule *i*, under the same
/// context, and never starts before rule *i*'s stream has terminated.
pub fn chain<H: EngineHost>(rules: Vec<Rule<H>>) -> Rule<H> {
    Arc::new(move |tree, context| {
        let rules = rules.clone();
        Ok(RuleOutcome::Stream(
            futures::stream::once(async move {
                let mut current = tree;
                for rule in &rules {
                    current = executor::call_rule(rule, current, &context).await?;
                }
                Ok(current)
            })
            .boxed(),
        ))
    })
}

/// Run a pipeline of rules against the tree a source produces, yielding a
/// new source.
pub fn apply<H: EngineHost>(source: Source<H>, rules: Vec<Rule<H>>) -> Source<H> {
    let pipeline = chain(rules);
    Arc::new(move |context| {
        let source = Arc::clone(&source);
        let pipeline = Arc::clone(&pipeline);
        Ok(RuleOutcome::Stream(
            futures::stream::once(async move {
                let initial = executor::call_source(&source, &context).await?;
                executor::call_rule(&pipeline, initial, &context).await
            })
            .boxed(),
        ))
    })
}

/// A rule that runs a source and merges the resulting tree into its input.
///
/// `MergeStrategy::Default` defers to the invoking context's strategy; any
/// other value overrides it for this merge only.
pub fn merge_with<H: EngineHost>(other: Source<H>, strategy: MergeStrategy) -> Rule<H> {
    Arc::new(move |tree, context| {
        let other = Arc::clone(&other);
        Ok(RuleOutcome::Stream(
            futures::stream::once(async move {
                let produced = executor::call_source(&other, &context).await?;
                let strategy = match strategy {
                    MergeStrategy::Default => context.strategy,
                    chosen => chosen,
                };
                merge::merge(&tree, &produced, context.engine.resolve_strategy(strategy))
            })
            .boxed(),
        ))
    })
}

/// A rule that invokes another schematic as a nested step and merges its
/// output tree into the input under the given strategy
/// (`MergeStrategy::Default` defers to the invoking context's strategy).
///
/// This is the mechanism by which composite, multi-step scaffolds are built
/// from primitive ones: the context's engine back-reference resolves the
/// sibling schematic, runs it against a clone of the current tree, and the
/// merge resolver reconciles the result.
pub fn run_schematic<H>(collection: &str, name: &str, options: H::Options) -> Rule<H>
where
    H: EngineHost,
    H::Options: Clone + Sync,
{
    let collection = collection.to_string();
    let name = name.to_string();
    Arc::new(move |tree, context| {
        let collection = collection.clone();
        let name = name.clone();
        let options = options.clone();
        Ok(RuleOutcome::Stream(
            futures::stream::once(async move {
                let resolved = context.engine.create_collection(&collection)?;
                let schematic = resolved.create_schematic(&name)?;
                let nested = schematic
                    .call_with_strategy(options, tree.clone(), context.strategy)
                    .await?;
                merge::merge(
                    &tree,
                    &nested,
                    context.engine.resolve_strategy(context.strategy),
                )
            })
            .boxed(),
        ))
    })
}
