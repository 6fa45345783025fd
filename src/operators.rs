//! Per-file transformation helpers
//!
//! A [`FileOperator`] maps one [`FileEntry`] to another (or to `None`,
//! meaning "delete this entry"). [`for_each`] lifts an operator over every
//! visible file of a tree and stages the corresponding actions: changed
//! content becomes an overwrite, a changed path becomes a rename, `None`
//! becomes a delete. [`for_each_async`] is the stream variant for operators
//! that need I/O per file.
//!
//! The module also carries the path-level rules built from the same
//! ingredients: [`filter_glob`] (keep only matching paths) and
//! [`rename_match`] (regex path rewriting).

use crate::error::{Error, Result};
use crate::host::EngineHost;
use crate::rule::{Rule, RuleOutcome};
use crate::tree::{FileEntry, Tree};
use futures::stream::BoxStream;
use futures::StreamExt;
use glob::Pattern;
use regex::Regex;
use std::path::PathBuf;
use std::sync::Arc;

/// Synchronous per-file transform. `None` means "delete this entry".
pub type FileOperator = Arc<dyn Fn(FileEntry) -> Result<Option<FileEntry>> + Send + Sync>;

/// Asynchronous per-file transform: a stream of candidate results, of which
/// only the last is applied. An empty stream is an invalid result.
pub type AsyncFileOperator =
    Arc<dyn Fn(FileEntry) -> BoxStream<'static, Result<Option<FileEntry>>> + Send + Sync>;

/// Wrap a closure into a [`FileOperator`]
pub fn file_operator<F>(f: F) -> FileOperator
where
    F: Fn(FileEntry) -> Result<Option<FileEntry>> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Stage the actions implied by one operator result.
///
/// The original entry is the reference point: same path and bytes is a
/// no-op, changed bytes stage an overwrite, a changed path stages a rename
/// (plus an overwrite when the bytes changed too).
fn apply_operator_result(
    tree: Tree,
    original: &FileEntry,
    result: Option<FileEntry>,
) -> Result<Tree> {
    let Some(updated) = result else {
        return stale_to_invalid(tree.delete(&original.path), &original.path);
    };

    if updated.path == original.path {
        if updated.content == original.content {
            return Ok(tree);
        }
        return stale_to_invalid(tree.overwrite(&original.path, updated.content), &original.path);
    }

    if tree.exists(&updated.path) {
        return Err(Error::InvalidOperatorResult {
            path: updated.path,
            message: "destination already exists".to_string(),
        });
    }
    let renamed = stale_to_invalid(tree.rename(&original.path, &updated.path), &original.path)?;
    if updated.content == original.content {
        Ok(renamed)
    } else {
        Ok(renamed.overwrite(&updated.path, updated.content)?)
    }
}

/// An operator that refers to a path no longer visible handed the engine a
/// stale reference; report that instead of a bare `NotFound`.
fn stale_to_invalid(result: Result<Tree>, path: &PathBuf) -> Result<Tree> {
    result.map_err(|err| match err {
        Error::NotFound { .. } => Error::InvalidOperatorResult {
            path: path.clone(),
            message: "stale path reference".to_string(),
        },
        other => other,
    })
}

/// Lift a synchronous file operator over every visible file of the tree
pub fn for_each<H: EngineHost>(operator: FileOperator) -> Rule<H> {
    Arc::new(move |tree, _context| {
        let mut current = tree.clone();
        for entry in tree.list() {
            let original = entry.clone();
            let result = operator(entry)?;
            current = apply_operator_result(current, &original, result)?;
        }
        Ok(current.into())
    })
}

/// Lift an asynchronous file operator over every visible file of the tree.
/// Each per-file stream is driven to completion and only its last emission
/// is applied; a stream with zero emissions is an invalid operator result.
pub fn for_each_async<H: EngineHost>(operator: AsyncFileOperator) -> Rule<H> {
    Arc::new(move |tree, _context| {
        let operator = Arc::clone(&operator);
        Ok(RuleOutcome::Stream(
            futures::stream::once(async move {
                let mut current = tree.clone();
                for entry in tree.list() {
                    let original = entry.clone();
                    let mut stream = operator(entry);
                    let mut last = None;
                    while let Some(item) = stream.next().await {
                        last = Some(item?);
                    }
                    let result = last.ok_or_else(|| Error::InvalidOperatorResult {
                        path: original.path.clone(),
                        message: "operator stream produced no result".to_string(),
                    })?;
                    current = apply_operator_result(current, &original, result)?;
                }
                Ok(current)
            })
            .boxed(),
        ))
    })
}

/// A rule that keeps only the files matching at least one glob pattern,
/// staging deletes for everything else.
pub fn filter_glob<H: EngineHost>(patterns: Vec<String>) -> Rule<H> {
    Arc::new(move |tree, _context| {
        let compiled = patterns
            .iter()
            .map(|pattern| Pattern::new(pattern).map_err(Error::Glob))
            .collect::<Result<Vec<_>>>()?;

        let mut current = tree.clone();
        for entry in tree.list() {
            let retained = entry
                .path
                .to_str()
                .is_some_and(|path| compiled.iter().any(|pattern| pattern.matches(path)));
            if !retained {
                current = current.delete(&entry.path)?;
            }
        }
        Ok(current.into())
    })
}

/// A rule that rewrites file paths through a regex.
///
/// The replacement may reference capture groups (`$1`, `$2`, ...). Files
/// whose paths do not match the pattern are left alone; a rewrite landing
/// on an already visible path fails with `AlreadyExists`.
pub fn rename_match<H: EngineHost>(pattern: &str, replacement: &str) -> Rule<H> {
    let pattern = pattern.to_string();
    let replacement = replacement.to_string();
    Arc::new(move |tree, _context| {
        let regex = Regex::new(&pattern).map_err(Error::Regex)?;

        let mut current = tree.clone();
        for entry in tree.list() {
            let Some(path) = entry.path.to_str() else {
                continue;
            };
            if !regex.is_match(path) {
                continue;
            }
            let rewritten = regex.replace(path, replacement.as_str()).into_owned();
            if rewritten != path {
                current = current.rename(&entry.path, PathBuf::from(rewritten))?;
            }
        }
        Ok(current.into())
    })
}
