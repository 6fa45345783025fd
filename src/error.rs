//! # Error Handling
//!
//! This module defines the centralized error handling mechanism for the
//! `schematic-engine` crate. It uses the `thiserror` library to create a
//! comprehensive `Error` enum that covers all anticipated failure modes,
//! providing clear and descriptive error messages.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum that represents all possible errors that can
//!   occur within the engine. Each variant carries contextual information
//!   (the originating path, the schematic or collection name) so a top-level
//!   tool can report exactly which file or schematic failed.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`, used
//!   throughout the crate to simplify function signatures.
//!
//! The propagation policy is strict: the engine performs no automatic retry
//! and no silent recovery. Every error surfaces to the immediate caller of
//! the operation that raised it.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for schematic-engine operations
#[derive(Error, Debug)]
pub enum Error {
    /// A path was read from a tree but does not exist after resolving the
    /// pending actions over the base.
    #[error("Path not found in tree: {}", path.display())]
    NotFound { path: PathBuf },

    /// A path was created (or renamed onto) but is already visible in the
    /// tree.
    #[error("Path already exists in tree: {}", path.display())]
    AlreadyExists { path: PathBuf },

    /// The merge policy rejected a divergence between two trees' pending
    /// actions at the given path.
    #[error("Merge conflict at path: {}", path.display())]
    Conflict { path: PathBuf },

    /// A rule or source stream completed without producing a tree.
    #[error("Schematic '{schematic}' produced no tree")]
    EmptyResult { schematic: String },

    /// The engine host does not know the requested collection.
    #[error("Unknown collection: {name}")]
    UnknownCollection { name: String },

    /// The engine host does not know the requested schematic within the
    /// given collection.
    #[error("Unknown schematic: {name} (collection: {collection})")]
    UnknownSchematic { name: String, collection: String },

    /// The engine host cannot produce a source for the given URL.
    #[error("No source registered for URL: {url}")]
    UnknownUrlSource { url: String },

    /// A file operator returned a value the engine cannot apply, e.g. an
    /// entry whose path collides with a different existing file.
    #[error("Invalid operator result for {}: {message}", path.display())]
    InvalidOperatorResult { path: PathBuf, message: String },

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
