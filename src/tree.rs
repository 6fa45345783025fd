//! Staged virtual file tree
//!
//! A [`Tree`] is an immutable-per-value snapshot of a file hierarchy: a
//! shared base set of [`FileEntry`] records plus an ordered list of pending
//! [`Action`]s (create, overwrite, delete, rename). Applying the pending
//! actions to the base, in order, yields the tree's externally visible file
//! listing.
//!
//! Trees are never mutated in place. Staging an action returns a new `Tree`
//! value, so a caller can retry or branch from any intermediate state. The
//! base map and file contents are behind `Arc`, which keeps those clones
//! cheap.
//!
//! Nothing here touches real storage; committing a final tree to disk is the
//! responsibility of an external adapter.

use crate::error::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A path plus content at a point in the staged tree.
///
/// Identity is the path. Content is opaque bytes and immutable once
/// observed; changing content means staging a new entry at the same path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path of the entry, relative to the tree root
    pub path: PathBuf,
    /// File content as shared bytes
    pub content: Arc<[u8]>,
}

impl FileEntry {
    /// Create a new entry from a path and content bytes
    pub fn new(path: impl Into<PathBuf>, content: impl Into<Arc<[u8]>>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    /// Get content size in bytes
    pub fn size(&self) -> usize {
        self.content.len()
    }
}

/// A pending file action staged on a tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Add a file that does not exist yet
    Create { path: PathBuf, content: Arc<[u8]> },
    /// Replace the content of an existing file
    Overwrite { path: PathBuf, content: Arc<[u8]> },
    /// Remove an existing file
    Delete { path: PathBuf },
    /// Move an existing file to a new path
    Rename { from: PathBuf, to: PathBuf },
}

impl Action {
    /// The paths this action touches. Rename touches both ends.
    pub fn touches(&self) -> Vec<&Path> {
        match self {
            Action::Create { path, .. }
            | Action::Overwrite { path, .. }
            | Action::Delete { path } => vec![path.as_path()],
            Action::Rename { from, to } => vec![from.as_path(), to.as_path()],
        }
    }

    /// The content this action stages, if any
    pub fn content(&self) -> Option<&Arc<[u8]>> {
        match self {
            Action::Create { content, .. } | Action::Overwrite { content, .. } => Some(content),
            Action::Delete { .. } | Action::Rename { .. } => None,
        }
    }
}

/// Staged virtual file tree: a shared base plus pending actions
#[derive(Debug, Clone, Default)]
pub struct Tree {
    /// Base entries, shared between values branched from the same snapshot
    base: Arc<HashMap<PathBuf, Arc<[u8]>>>,
    /// Ordered pending actions, applied over the base
    actions: Vec<Action>,
}

impl Tree {
    /// Create an empty tree with no base entries and no pending actions
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a tree whose base holds the given entries
    pub fn from_entries(entries: impl IntoIterator<Item = FileEntry>) -> Self {
        let base = entries
            .into_iter()
            .map(|entry| (entry.path, entry.content))
            .collect();
        Self {
            base: Arc::new(base),
            actions: Vec::new(),
        }
    }

    /// The ordered pending actions staged on this tree
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Build a tree sharing this tree's base but carrying different pending
    /// actions. Used by the merge resolver.
    pub(crate) fn with_actions(&self, actions: Vec<Action>) -> Self {
        Self {
            base: Arc::clone(&self.base),
            actions,
        }
    }

    /// Append an action to the pending list, returning a new tree.
    ///
    /// No validation is performed; the merge resolver uses this to replay
    /// already-adjudicated actions. Callers staging fresh changes should
    /// prefer [`Tree::create`], [`Tree::overwrite`], [`Tree::delete`] and
    /// [`Tree::rename`], which validate against the visible listing.
    pub fn stage(&self, action: Action) -> Self {
        let mut tree = self.clone();
        tree.actions.push(action);
        tree
    }

    /// Stage a file creation. Fails with `AlreadyExists` if the path is
    /// already visible.
    pub fn create(&self, path: impl Into<PathBuf>, content: impl Into<Arc<[u8]>>) -> Result<Self> {
        let path = path.into();
        if self.exists(&path) {
            return Err(Error::AlreadyExists { path });
        }
        Ok(self.stage(Action::Create {
            path,
            content: content.into(),
        }))
    }

    /// Stage a content replacement. Fails with `NotFound` if the path is not
    /// visible.
    pub fn overwrite(
        &self,
        path: impl Into<PathBuf>,
        content: impl Into<Arc<[u8]>>,
    ) -> Result<Self> {
        let path = path.into();
        if !self.exists(&path) {
            return Err(Error::NotFound { path });
        }
        Ok(self.stage(Action::Overwrite {
            path,
            content: content.into(),
        }))
    }

    /// Stage a deletion. Fails with `NotFound` if the path is not visible.
    pub fn delete(&self, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !self.exists(&path) {
            return Err(Error::NotFound { path });
        }
        Ok(self.stage(Action::Delete { path }))
    }

    /// Stage a rename. Fails with `NotFound` if the source is not visible
    /// and `AlreadyExists` if the destination is.
    pub fn rename(&self, from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Result<Self> {
        let from = from.into();
        let to = to.into();
        if !self.exists(&from) {
            return Err(Error::NotFound { path: from });
        }
        if self.exists(&to) {
            return Err(Error::AlreadyExists { path: to });
        }
        Ok(self.stage(Action::Rename { from, to }))
    }

    /// Resolve the visible content at a path, most-recent-wins over the
    /// pending actions, falling back to the base.
    ///
    /// A rename keeps history linkage: reading the new path follows the
    /// rename back through earlier actions to the base entry, so the new
    /// path is readable before the tree is ever committed.
    pub(crate) fn resolve(&self, path: &Path) -> Option<Arc<[u8]>> {
        let mut target = path.to_path_buf();
        for action in self.actions.iter().rev() {
            match action {
                Action::Create { path, content } | Action::Overwrite { path, content } => {
                    if *path == target {
                        return Some(Arc::clone(content));
                    }
                }
                Action::Delete { path } => {
                    if *path == target {
                        return None;
                    }
                }
                Action::Rename { from, to } => {
                    if *to == target {
                        // Follow the linkage back to where the content lived
                        // before the rename.
                        target = from.clone();
                    } else if *from == target {
                        // The file moved away; the old path is gone.
                        return None;
                    }
                }
            }
        }
        self.base.get(&target).map(Arc::clone)
    }

    /// Read the content at a path, failing with `NotFound` if the path does
    /// not exist after resolution.
    pub fn read(&self, path: impl AsRef<Path>) -> Result<Arc<[u8]>> {
        let path = path.as_ref();
        self.resolve(path).ok_or_else(|| Error::NotFound {
            path: path.to_path_buf(),
        })
    }

    /// Check whether a path is visible in the resolved listing
    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.resolve(path.as_ref()).is_some()
    }

    /// Compute the resolved listing: base entries with the pending actions
    /// applied in order.
    fn visible(&self) -> BTreeMap<PathBuf, Arc<[u8]>> {
        let mut listing: BTreeMap<PathBuf, Arc<[u8]>> = self
            .base
            .iter()
            .map(|(path, content)| (path.clone(), Arc::clone(content)))
            .collect();

        for action in &self.actions {
            match action {
                Action::Create { path, content } | Action::Overwrite { path, content } => {
                    listing.insert(path.clone(), Arc::clone(content));
                }
                Action::Delete { path } => {
                    listing.remove(path);
                }
                Action::Rename { from, to } => {
                    if let Some(content) = listing.remove(from) {
                        listing.insert(to.clone(), content);
                    }
                }
            }
        }

        listing
    }

    /// Produce the resolved file listing in deterministic (path-sorted)
    /// order. The iterator owns a snapshot, so staging further actions on
    /// the originating tree does not affect it.
    pub fn list(&self) -> impl Iterator<Item = FileEntry> {
        self.visible()
            .into_iter()
            .map(|(path, content)| FileEntry { path, content })
    }

    /// Number of visible files
    pub fn len(&self) -> usize {
        self.visible().len()
    }

    /// Check whether the resolved listing is empty
    pub fn is_empty(&self) -> bool {
        self.visible().is_empty()
    }
}
