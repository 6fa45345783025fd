//! Engine façade
//!
//! The [`Engine`] wires an [`EngineHost`] to the rule executor. It resolves
//! collection and schematic names through the host, wraps the descriptions
//! into callable [`Collection`] and [`Schematic`] values, and builds the
//! [`SchematicContext`] every rule receives.
//!
//! The context carries a back-reference to the engine itself. That is a
//! shared, non-owning handle (the engine is `Arc`-backed and read-only
//! after construction), and it is what makes recursive invocation work: a
//! rule can resolve and call a sibling schematic through
//! `context.engine`, then merge the nested result into its own tree.

use crate::error::{Error, Result};
use crate::executor;
use crate::host::{EngineHost, HostCollection, HostSchematic};
use crate::merge::MergeStrategy;
use crate::rule::{RuleFactory, Source};
use crate::tree::Tree;
use log::debug;
use std::sync::Arc;
use url::Url;

/// Top-level façade over an engine host.
///
/// Cheap to clone (the host lives behind an `Arc`) and read-only after
/// construction, so one engine can be shared by any number of concurrently
/// executing schematic invocations.
pub struct Engine<H: EngineHost> {
    host: Arc<H>,
}

impl<H: EngineHost> Clone for Engine<H> {
    fn clone(&self) -> Self {
        Self {
            host: Arc::clone(&self.host),
        }
    }
}

impl<H: EngineHost> Engine<H> {
    /// Create an engine over the given host
    pub fn new(host: H) -> Self {
        Self {
            host: Arc::new(host),
        }
    }

    /// Access the underlying host
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Resolve a collection name through the host.
    ///
    /// A host answering "not found" surfaces as `UnknownCollection`, never
    /// as a null-reference fault.
    pub fn create_collection(&self, name: &str) -> Result<Collection<H>> {
        let description =
            self.host
                .create_collection_description(name)
                .ok_or_else(|| Error::UnknownCollection {
                    name: name.to_string(),
                })?;
        debug!("resolved collection '{}'", description.name);
        Ok(Collection {
            engine: self.clone(),
            description: Arc::new(description),
        })
    }

    /// Resolve a schematic name within a collection, pairing its
    /// description with the host's rule factory.
    pub fn create_schematic(&self, name: &str, collection: &Collection<H>) -> Result<Schematic<H>> {
        let description = self
            .host
            .create_schematic_description(name, &collection.description)
            .ok_or_else(|| Error::UnknownSchematic {
                name: name.to_string(),
                collection: collection.description.name.clone(),
            })?;
        debug!(
            "resolved schematic '{}' in collection '{}'",
            description.name, description.collection.name
        );
        let factory = self.host.get_schematic_rule_factory(&description);
        Ok(Schematic {
            engine: self.clone(),
            description: Arc::new(description),
            factory,
        })
    }

    /// Materialize a source from a URL through the host
    pub fn create_source_from_url(&self, url: &Url) -> Result<Source<H>> {
        self.host
            .create_source_from_url(url)
            .ok_or_else(|| Error::UnknownUrlSource {
                url: url.to_string(),
            })
    }

    /// Resolve `MergeStrategy::Default` to a concrete strategy: first the
    /// host's configured default, then `Error` as the safe fallback.
    pub fn resolve_strategy(&self, strategy: MergeStrategy) -> MergeStrategy {
        match strategy {
            MergeStrategy::Default => match self.host.default_merge_strategy() {
                MergeStrategy::Default => MergeStrategy::Error,
                configured => configured,
            },
            chosen => chosen,
        }
    }

    /// The concrete strategy used when a caller does not specify one
    pub fn default_merge_strategy(&self) -> MergeStrategy {
        self.resolve_strategy(MergeStrategy::Default)
    }
}

/// A resolved collection, bound to the engine that resolved it
pub struct Collection<H: EngineHost> {
    engine: Engine<H>,
    description: Arc<HostCollection<H>>,
}

impl<H: EngineHost> std::fmt::Debug for Collection<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.description.name)
            .finish_non_exhaustive()
    }
}

impl<H: EngineHost> Collection<H> {
    /// The host-produced description record
    pub fn description(&self) -> &HostCollection<H> {
        &self.description
    }

    /// Resolve a schematic from this collection
    pub fn create_schematic(&self, name: &str) -> Result<Schematic<H>> {
        self.engine.create_schematic(name, self)
    }
}

/// A resolved schematic: description plus rule factory, ready to call
pub struct Schematic<H: EngineHost> {
    engine: Engine<H>,
    description: Arc<HostSchematic<H>>,
    factory: RuleFactory<H>,
}

impl<H: EngineHost> std::fmt::Debug for Schematic<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schematic")
            .field("name", &self.description.name)
            .finish_non_exhaustive()
    }
}

impl<H: EngineHost> Schematic<H> {
    /// The host-produced description record
    pub fn description(&self) -> &HostSchematic<H> {
        &self.description
    }

    /// Run this schematic against an input tree under the engine's default
    /// merge strategy.
    pub async fn call(&self, options: H::Options, tree: Tree) -> Result<Tree> {
        self.call_with_strategy(options, tree, MergeStrategy::Default)
            .await
    }

    /// Run this schematic with a per-invocation merge strategy override.
    ///
    /// Builds the execution context (engine back-reference, description,
    /// the input tree, the resolved strategy), applies the rule factory to
    /// the options and threads everything through the executor.
    pub async fn call_with_strategy(
        &self,
        options: H::Options,
        tree: Tree,
        strategy: MergeStrategy,
    ) -> Result<Tree> {
        let context = SchematicContext {
            engine: self.engine.clone(),
            schematic: Arc::clone(&self.description),
            host: tree.clone(),
            strategy: self.engine.resolve_strategy(strategy),
        };
        let rule = (self.factory)(options);
        executor::call_rule(&rule, tree, &context).await
    }
}

/// Execution environment passed to every rule
pub struct SchematicContext<H: EngineHost> {
    /// Shared back-reference to the engine, enabling recursive invocation
    /// of sibling schematics
    pub engine: Engine<H>,
    /// Description of the schematic being executed
    pub schematic: Arc<HostSchematic<H>>,
    /// The tree this schematic was invoked with, before any rule ran
    pub host: Tree,
    /// Effective merge strategy for this invocation
    pub strategy: MergeStrategy,
}

impl<H: EngineHost> Clone for SchematicContext<H> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            schematic: Arc::clone(&self.schematic),
            host: self.host.clone(),
            strategy: self.strategy,
        }
    }
}
