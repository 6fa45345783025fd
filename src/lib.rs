//! # Schematic Engine Library
//!
//! This library provides the core of a rule-based code-transformation
//! engine: named, versioned sets of transformation procedures (schematics,
//! grouped into collections) are applied to an in-memory representation of
//! a file tree, producing a new file tree without touching real storage
//! until the caller commits it.
//!
//! ## Quick Example
//!
//! ```
//! use schematic_engine::{Engine, RegistryHost, Tree};
//! use schematic_engine::rule::rule;
//! use serde_json::Value;
//! use std::sync::Arc;
//!
//! // Register a collection with one schematic.
//! let mut host = RegistryHost::new();
//! host.register_collection("starter", Value::Null);
//! host.register_schematic(
//!     "starter",
//!     "readme",
//!     Value::Null,
//!     Arc::new(|_options| {
//!         rule(|tree: Tree, _context| {
//!             Ok(tree.create("README.md", "# Hello".as_bytes())?.into())
//!         })
//!     }),
//! );
//!
//! // Resolve and run it against an empty tree.
//! let engine = Engine::new(host);
//! let schematic = engine
//!     .create_collection("starter")
//!     .unwrap()
//!     .create_schematic("readme")
//!     .unwrap();
//! let tree =
//!     futures::executor::block_on(schematic.call(Value::Null, Tree::empty())).unwrap();
//! assert!(tree.exists("README.md"));
//! ```
//!
//! ## Core Concepts
//!
//! - **Staged Tree (`tree`)**: an immutable-per-value file hierarchy plus an
//!   ordered list of pending actions (create, overwrite, delete, rename).
//!   Every transformation yields a new tree value, so any intermediate state
//!   can be branched or retried.
//! - **Merge Resolution (`merge`)**: reconciles two trees' pending actions
//!   under a selectable strategy. Divergence is adjudicated by policy, never
//!   by timing.
//! - **Rules and Sources (`rule`, `operators`)**: first-class transformation
//!   functions, synchronous or asynchronous, plus the combinators pipelines
//!   are built from.
//! - **Execution (`executor`)**: one code path for both calling conventions;
//!   an asynchronous rule's stream is driven to completion and only its last
//!   emission counts.
//! - **Resolution (`host`, `engine`)**: an `EngineHost` maps names to
//!   description records and rule factories; the `Engine` façade wraps the
//!   results into callable schematics and threads the execution context,
//!   including the back-reference that lets rules invoke sibling schematics
//!   recursively.
//!
//! ## Execution Flow
//!
//! 1. `Engine::create_collection(name)` resolves a collection description
//!    through the host.
//! 2. `Collection::create_schematic(name)` resolves the schematic
//!    description and its rule factory.
//! 3. The caller supplies options; the factory produces a rule.
//! 4. The executor runs the rule against the input tree under a
//!    `SchematicContext`.
//! 5. Nested schematic invocations produce trees that the merge resolver
//!    reconciles with the caller's tree under the effective strategy.
//! 6. Exactly one final tree is returned; committing it to real storage is
//!    the responsibility of an external adapter.

pub mod engine;
pub mod error;
pub mod executor;
pub mod host;
pub mod merge;
pub mod operators;
pub mod rule;
pub mod tree;

pub use engine::{Collection, Engine, Schematic, SchematicContext};
pub use error::{Error, Result};
pub use host::{CollectionDescription, EngineHost, RegistryHost, SchematicDescription};
pub use merge::{merge, MergeStrategy};
pub use rule::{Rule, RuleFactory, RuleOutcome, Source, TreeStream};
pub use tree::{Action, FileEntry, Tree};

#[cfg(test)]
mod merge_proptest;
