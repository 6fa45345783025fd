//! Engine host boundary
//!
//! The engine itself never knows where collections and schematics come from
//! or what their metadata means. An [`EngineHost`] resolves names to
//! description records and rule factories; the metadata and options shapes
//! are associated types, opaque to the engine and never inspected by it.
//! Returning `None` from a resolution method means "not found" and is
//! translated by the engine into a descriptive error, never a panic.
//!
//! [`RegistryHost`] is the in-memory host shipped with the crate: embedders
//! and tests register collections, schematics and URL sources
//! programmatically, with `serde_json::Value` metadata and options.

use crate::error::Error;
use crate::merge::MergeStrategy;
use crate::rule::{Rule, RuleFactory, Source};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

/// Identity plus host-supplied metadata for a collection of schematics.
///
/// The engine only requires the `name`; the metadata is whatever the host
/// chooses (manifest contents, version, package origin) and flows through
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionDescription<CM> {
    /// Collection name, unique within a host
    pub name: String,
    /// Host-supplied metadata, opaque to the engine
    pub metadata: CM,
}

/// Identity plus a back-reference to the owning collection plus
/// host-supplied metadata for a single schematic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchematicDescription<CM, SM> {
    /// Schematic name, unique within its collection
    pub name: String,
    /// The collection this schematic belongs to
    pub collection: Arc<CollectionDescription<CM>>,
    /// Host-supplied metadata, opaque to the engine
    pub metadata: SM,
}

/// Collection description shape for a given host
pub type HostCollection<H> = CollectionDescription<<H as EngineHost>::CollectionMetadata>;

/// Schematic description shape for a given host
pub type HostSchematic<H> =
    SchematicDescription<<H as EngineHost>::CollectionMetadata, <H as EngineHost>::SchematicMetadata>;

/// Resolution boundary consumed by the engine.
///
/// Implementations are expected to be idempotent and side-effect-free:
/// the engine may resolve the same name any number of times, possibly from
/// concurrently executing schematic invocations that share the engine.
pub trait EngineHost: Send + Sync + Sized + 'static {
    /// Metadata attached to collection descriptions
    type CollectionMetadata: Send + Sync + 'static;
    /// Metadata attached to schematic descriptions
    type SchematicMetadata: Send + Sync + 'static;
    /// Options shape accepted by rule factories
    type Options: Send + 'static;

    /// Resolve a collection name to its description, or `None` if the host
    /// does not know it.
    fn create_collection_description(&self, name: &str) -> Option<HostCollection<Self>>;

    /// Resolve a schematic name within a collection, or `None` if the host
    /// does not know it.
    fn create_schematic_description(
        &self,
        name: &str,
        collection: &Arc<HostCollection<Self>>,
    ) -> Option<HostSchematic<Self>>;

    /// Produce the rule factory for a resolved schematic.
    fn get_schematic_rule_factory(&self, schematic: &HostSchematic<Self>) -> RuleFactory<Self>;

    /// Materialize a source from an external URL reference, or `None` if
    /// the host cannot handle it. Fetching is the host's responsibility.
    fn create_source_from_url(&self, url: &Url) -> Option<Source<Self>> {
        let _ = url;
        None
    }

    /// The merge strategy applied when a caller does not specify one.
    /// `MergeStrategy::Default` means "no opinion" and resolves to `Error`.
    fn default_merge_strategy(&self) -> MergeStrategy {
        MergeStrategy::Default
    }
}

/// A URL source factory registered for a scheme
type UrlSourceFactory = Arc<dyn Fn(&Url) -> Source<RegistryHost> + Send + Sync>;

struct RegisteredSchematic {
    metadata: Value,
    factory: RuleFactory<RegistryHost>,
}

/// In-memory engine host with programmatic registration.
///
/// Collections and schematics are registered before the host is handed to
/// an engine; resolution then only reads. Metadata and options are
/// `serde_json::Value`, which keeps the host generic without another layer
/// of type parameters.
#[derive(Default)]
pub struct RegistryHost {
    collections: HashMap<String, Value>,
    schematics: HashMap<(String, String), RegisteredSchematic>,
    url_sources: HashMap<String, UrlSourceFactory>,
    default_strategy: MergeStrategy,
}

impl RegistryHost {
    /// Create an empty host with no registered collections
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the host's default merge strategy
    pub fn with_default_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.default_strategy = strategy;
        self
    }

    /// Register a collection with its metadata
    pub fn register_collection(&mut self, name: impl Into<String>, metadata: Value) {
        self.collections.insert(name.into(), metadata);
    }

    /// Register a schematic inside a previously registered collection
    pub fn register_schematic(
        &mut self,
        collection: impl Into<String>,
        name: impl Into<String>,
        metadata: Value,
        factory: RuleFactory<Self>,
    ) {
        self.schematics.insert(
            (collection.into(), name.into()),
            RegisteredSchematic { metadata, factory },
        );
    }

    /// Register a source factory for a URL scheme (e.g. `"memory"`)
    pub fn register_url_scheme<F>(&mut self, scheme: impl Into<String>, factory: F)
    where
        F: Fn(&Url) -> Source<Self> + Send + Sync + 'static,
    {
        self.url_sources.insert(scheme.into(), Arc::new(factory));
    }
}

impl EngineHost for RegistryHost {
    type CollectionMetadata = Value;
    type SchematicMetadata = Value;
    type Options = Value;

    fn create_collection_description(&self, name: &str) -> Option<HostCollection<Self>> {
        self.collections
            .get(name)
            .map(|metadata| CollectionDescription {
                name: name.to_string(),
                metadata: metadata.clone(),
            })
    }

    fn create_schematic_description(
        &self,
        name: &str,
        collection: &Arc<HostCollection<Self>>,
    ) -> Option<HostSchematic<Self>> {
        self.schematics
            .get(&(collection.name.clone(), name.to_string()))
            .map(|registered| SchematicDescription {
                name: name.to_string(),
                collection: Arc::clone(collection),
                metadata: registered.metadata.clone(),
            })
    }

    fn get_schematic_rule_factory(&self, schematic: &HostSchematic<Self>) -> RuleFactory<Self> {
        let key = (schematic.collection.name.clone(), schematic.name.clone());
        match self.schematics.get(&key) {
            Some(registered) => Arc::clone(&registered.factory),
            // A description that resolved without a registered factory can
            // only happen if the host was mutated between calls; surface it
            // as an unknown schematic when the rule runs.
            None => {
                let (collection, name) = key;
                Arc::new(move |_options| {
                    let collection = collection.clone();
                    let name = name.clone();
                    unknown_schematic_rule(name, collection)
                })
            }
        }
    }

    fn create_source_from_url(&self, url: &Url) -> Option<Source<Self>> {
        self.url_sources
            .get(url.scheme())
            .map(|factory| factory(url))
    }

    fn default_merge_strategy(&self) -> MergeStrategy {
        self.default_strategy
    }
}

fn unknown_schematic_rule(name: String, collection: String) -> Rule<RegistryHost> {
    Arc::new(move |_tree, _context| {
        Err(Error::UnknownSchematic {
            name: name.clone(),
            collection: collection.clone(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::noop;
    use serde_json::json;

    fn sample_host() -> RegistryHost {
        let mut host = RegistryHost::new();
        host.register_collection("ui", json!({ "version": "1.2.0" }));
        host.register_schematic(
            "ui",
            "widget",
            json!({ "description": "Generates a widget" }),
            Arc::new(|_options| noop()),
        );
        host
    }

    #[test]
    fn test_collection_resolution_carries_metadata() {
        let host = sample_host();
        let description = host.create_collection_description("ui").unwrap();
        assert_eq!(description.name, "ui");
        assert_eq!(description.metadata["version"], "1.2.0");
    }

    #[test]
    fn test_unknown_collection_resolves_to_none() {
        assert!(sample_host()
            .create_collection_description("missing")
            .is_none());
    }

    #[test]
    fn test_schematic_resolution_links_collection() {
        let host = sample_host();
        let collection = Arc::new(host.create_collection_description("ui").unwrap());
        let schematic = host
            .create_schematic_description("widget", &collection)
            .unwrap();
        assert_eq!(schematic.name, "widget");
        assert_eq!(schematic.collection.name, "ui");
        assert_eq!(schematic.metadata["description"], "Generates a widget");
    }

    #[test]
    fn test_unknown_schematic_resolves_to_none() {
        let host = sample_host();
        let collection = Arc::new(host.create_collection_description("ui").unwrap());
        assert!(host
            .create_schematic_description("missing", &collection)
            .is_none());
    }

    #[test]
    fn test_url_scheme_lookup() {
        let mut host = sample_host();
        host.register_url_scheme("memory", |_url| crate::rule::empty_source());

        let known = Url::parse("memory://templates/basic").unwrap();
        assert!(host.create_source_from_url(&known).is_some());

        let unknown = Url::parse("https://example.com/template").unwrap();
        assert!(host.create_source_from_url(&unknown).is_none());
    }

    #[test]
    fn test_default_strategy_configuration() {
        let host = RegistryHost::new().with_default_strategy(MergeStrategy::Overwrite);
        assert_eq!(host.default_merge_strategy(), MergeStrategy::Overwrite);
        assert_eq!(
            RegistryHost::new().default_merge_strategy(),
            MergeStrategy::Default
        );
    }
}
