//! Merge resolution for staged trees
//!
//! When a rule produces a tree derived from, but diverging from, its input
//! (most often the output of a nested schematic invocation), the two trees'
//! pending-action lists must be reconciled into one. [`merge`] replays the
//! `from` tree's actions on top of the authoritative `into` tree under a
//! selectable [`MergeStrategy`].
//!
//! A conflict is two actions targeting the same path where at least one is a
//! delete/rename or the staged contents differ. Conflicts are adjudicated by
//! policy, never by timing: the same pair of trees and strategy always
//! produces the same result, and an unordered divergence surfaces as
//! [`Error::Conflict`] instead of being silently resolved.

use crate::error::{Error, Result};
use crate::tree::{Action, Tree};
use log::{debug, warn};
use std::path::Path;

/// Policy for reconciling two trees' pending actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Defer to the engine's configured default (which itself falls back to
    /// `Error` when unconfigured)
    Default,
    /// Fail with a conflict on the first divergence. The safe default.
    Error,
    /// The incoming tree's action always wins
    Overwrite,
    /// Divergence is allowed only when the resulting content is
    /// byte-identical
    ContentOnly,
}

impl Default for MergeStrategy {
    fn default() -> Self {
        MergeStrategy::Default
    }
}

/// Replay `from`'s pending actions on top of `into` under the given
/// strategy, producing a new tree.
///
/// `into` is authoritative: its base and pending actions are kept as-is, and
/// `from`'s actions are appended one at a time after conflict adjudication.
/// Actions staged identically in both trees are deduplicated under every
/// strategy, which makes the merge idempotent: `merge(t, t, s)` is
/// observably equal to `t`.
///
/// A `MergeStrategy::Default` passed directly here behaves as `Error`; the
/// engine resolves its configured default before invoking the resolver.
pub fn merge(into: &Tree, from: &Tree, strategy: MergeStrategy) -> Result<Tree> {
    let strategy = match strategy {
        MergeStrategy::Default => MergeStrategy::Error,
        other => other,
    };

    let mut merged = into.actions().to_vec();

    for action in from.actions() {
        // Identical actions staged on both sides are a shared history
        // prefix, not a divergence.
        if merged.contains(action) {
            debug!("merge: skipping identical action for {:?}", action.touches());
            continue;
        }

        let overlapping: Vec<usize> = merged
            .iter()
            .enumerate()
            .filter(|(_, staged)| {
                staged
                    .touches()
                    .iter()
                    .any(|path| action.touches().contains(path))
            })
            .map(|(index, _)| index)
            .collect();

        if overlapping.is_empty() {
            // A rename may still collide with a file visible in `into` that
            // no pending action touches.
            if let Action::Rename { to, .. } = action {
                if into.exists(to) {
                    match strategy {
                        MergeStrategy::Overwrite => {
                            warn!(
                                "merge: rename destination {} shadows an existing file",
                                to.display()
                            );
                        }
                        _ => {
                            return Err(Error::Conflict { path: to.clone() });
                        }
                    }
                }
            }
            merged.push(action.clone());
            continue;
        }

        let conflict_path = conflict_path(action).to_path_buf();

        match strategy {
            MergeStrategy::Overwrite => {
                // The incoming action wins: drop the staged actions it
                // collides with, then replay it.
                warn!(
                    "merge: overwriting {} staged action(s) at {}",
                    overlapping.len(),
                    conflict_path.display()
                );
                for index in overlapping.into_iter().rev() {
                    merged.remove(index);
                }
                merged.push(action.clone());
            }
            MergeStrategy::ContentOnly => {
                if content_matches(into, action) {
                    debug!(
                        "merge: content-identical divergence at {} allowed",
                        conflict_path.display()
                    );
                } else {
                    return Err(Error::Conflict {
                        path: conflict_path,
                    });
                }
            }
            MergeStrategy::Error | MergeStrategy::Default => {
                return Err(Error::Conflict {
                    path: conflict_path,
                });
            }
        }
    }

    Ok(into.with_actions(merged))
}

/// The path reported when an action conflicts. For renames the destination
/// is the interesting end.
fn conflict_path(action: &Action) -> &Path {
    match action {
        Action::Create { path, .. }
        | Action::Overwrite { path, .. }
        | Action::Delete { path } => path,
        Action::Rename { to, .. } => to,
    }
}

/// Check whether an incoming content-bearing action stages exactly the
/// bytes already visible at its path in the authoritative tree.
fn content_matches(into: &Tree, action: &Action) -> bool {
    match (action.content(), action.touches().first()) {
        (Some(content), Some(path)) => {
            matches!(into.read(path), Ok(existing) if existing == *content)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::FileEntry;
    use std::path::PathBuf;

    fn base() -> Tree {
        Tree::from_entries([FileEntry::new("base.txt", "base".as_bytes())])
    }

    mod disjoint {
        use super::*;

        #[test]
        fn test_merge_disjoint_paths() {
            let root = base();
            let a = root.create("a.txt", "a".as_bytes()).unwrap();
            let b = root.create("b.txt", "b".as_bytes()).unwrap();

            let merged = merge(&a, &b, MergeStrategy::Error).unwrap();
            assert_eq!(merged.read("a.txt").unwrap().as_ref(), b"a");
            assert_eq!(merged.read("b.txt").unwrap().as_ref(), b"b");
            assert_eq!(merged.read("base.txt").unwrap().as_ref(), b"base");
        }

        #[test]
        fn test_merge_empty_from_is_identity() {
            let a = base().create("a.txt", "a".as_bytes()).unwrap();
            let merged = merge(&a, &base(), MergeStrategy::Error).unwrap();
            assert_eq!(merged.actions(), a.actions());
        }
    }

    mod idempotence {
        use super::*;

        fn staged() -> Tree {
            base()
                .create("new.txt", "new".as_bytes())
                .unwrap()
                .overwrite("new.txt", "newer".as_bytes())
                .unwrap()
                .delete("base.txt")
                .unwrap()
        }

        #[test]
        fn test_merge_self_is_identity_for_every_strategy() {
            for strategy in [
                MergeStrategy::Default,
                MergeStrategy::Error,
                MergeStrategy::Overwrite,
                MergeStrategy::ContentOnly,
            ] {
                let tree = staged();
                let merged = merge(&tree, &tree, strategy).unwrap();
                assert_eq!(merged.actions(), tree.actions(), "{:?}", strategy);
                let before: Vec<_> = tree.list().collect();
                let after: Vec<_> = merged.list().collect();
                assert_eq!(before, after, "{:?}", strategy);
            }
        }
    }

    mod conflicts {
        use super::*;

        fn diverging() -> (Tree, Tree) {
            let root = base();
            let a = root.create("shared.txt", "from a".as_bytes()).unwrap();
            let b = root.create("shared.txt", "from b".as_bytes()).unwrap();
            (a, b)
        }

        #[test]
        fn test_error_strategy_rejects_divergent_content() {
            let (a, b) = diverging();
            let err = merge(&a, &b, MergeStrategy::Error).unwrap_err();
            assert!(
                matches!(err, Error::Conflict { ref path } if path == &PathBuf::from("shared.txt"))
            );
        }

        #[test]
        fn test_default_strategy_behaves_like_error() {
            let (a, b) = diverging();
            assert!(matches!(
                merge(&a, &b, MergeStrategy::Default).unwrap_err(),
                Error::Conflict { .. }
            ));
        }

        #[test]
        fn test_overwrite_strategy_takes_incoming_content() {
            let (a, b) = diverging();
            let merged = merge(&a, &b, MergeStrategy::Overwrite).unwrap();
            assert_eq!(merged.read("shared.txt").unwrap().as_ref(), b"from b");
        }

        #[test]
        fn test_delete_vs_overwrite_is_a_conflict() {
            let root = base();
            let a = root.delete("base.txt").unwrap();
            let b = root.overwrite("base.txt", "changed".as_bytes()).unwrap();
            assert!(matches!(
                merge(&a, &b, MergeStrategy::Error).unwrap_err(),
                Error::Conflict { .. }
            ));
        }

        #[test]
        fn test_delete_vs_overwrite_under_overwrite_strategy() {
            let root = base();
            let a = root.delete("base.txt").unwrap();
            let b = root.overwrite("base.txt", "changed".as_bytes()).unwrap();
            let merged = merge(&a, &b, MergeStrategy::Overwrite).unwrap();
            assert_eq!(merged.read("base.txt").unwrap().as_ref(), b"changed");
        }
    }

    mod content_only {
        use super::*;

        #[test]
        fn test_content_only_allows_identical_bytes() {
            let root = base();
            // Same visible bytes staged through different action kinds.
            let a = root.overwrite("base.txt", "same".as_bytes()).unwrap();
            let b = root
                .delete("base.txt")
                .unwrap()
                .create("base.txt", "same".as_bytes())
                .unwrap();
            // The delete overlaps and is not content-bearing, so it still
            // conflicts; only the content action is forgiven.
            assert!(merge(&a, &b, MergeStrategy::ContentOnly).is_err());

            let c = root.overwrite("base.txt", "same".as_bytes()).unwrap();
            let d = base().overwrite("base.txt", "same".as_bytes()).unwrap();
            // Identical actions deduplicate.
            let merged = merge(&c, &d, MergeStrategy::ContentOnly).unwrap();
            assert_eq!(merged.read("base.txt").unwrap().as_ref(), b"same");
        }

        #[test]
        fn test_content_only_rejects_different_bytes() {
            let root = base();
            let a = root.overwrite("base.txt", "one".as_bytes()).unwrap();
            let b = root.overwrite("base.txt", "two".as_bytes()).unwrap();
            assert!(matches!(
                merge(&a, &b, MergeStrategy::ContentOnly).unwrap_err(),
                Error::Conflict { .. }
            ));
        }
    }

    mod rename_destination {
        use super::*;

        #[test]
        fn test_rename_onto_existing_file_conflicts() {
            let root = Tree::from_entries([
                FileEntry::new("keep.txt", "keep".as_bytes()),
                FileEntry::new("move.txt", "move".as_bytes()),
            ]);
            let a = root.clone();
            let b = root.stage(Action::Rename {
                from: "move.txt".into(),
                to: "keep.txt".into(),
            });
            let err = merge(&a, &b, MergeStrategy::Error).unwrap_err();
            assert!(
                matches!(err, Error::Conflict { ref path } if path == &PathBuf::from("keep.txt"))
            );
        }

        #[test]
        fn test_rename_onto_existing_file_wins_under_overwrite() {
            let root = Tree::from_entries([
                FileEntry::new("keep.txt", "keep".as_bytes()),
                FileEntry::new("move.txt", "move".as_bytes()),
            ]);
            let b = root.stage(Action::Rename {
                from: "move.txt".into(),
                to: "keep.txt".into(),
            });
            let merged = merge(&root, &b, MergeStrategy::Overwrite).unwrap();
            assert_eq!(merged.read("keep.txt").unwrap().as_ref(), b"move");
            assert!(!merged.exists("move.txt"));
        }

        #[test]
        fn test_rename_onto_existing_file_conflicts_under_content_only() {
            // A rename stages no bytes, so ContentOnly has nothing to
            // compare and adjudicates like Error.
            let root = Tree::from_entries([
                FileEntry::new("keep.txt", "keep".as_bytes()),
                FileEntry::new("move.txt", "move".as_bytes()),
            ]);
            let b = root.stage(Action::Rename {
                from: "move.txt".into(),
                to: "keep.txt".into(),
            });
            let err = merge(&root, &b, MergeStrategy::ContentOnly).unwrap_err();
            assert!(
                matches!(err, Error::Conflict { ref path } if path == &PathBuf::from("keep.txt"))
            );
        }
    }

    mod determinism {
        use super::*;

        #[test]
        fn test_repeated_merges_are_byte_identical() {
            let root = base();
            let a = root.create("a.txt", "a".as_bytes()).unwrap();
            let b = root
                .create("b.txt", "b".as_bytes())
                .unwrap()
                .delete("base.txt")
                .unwrap();

            let first = merge(&a, &b, MergeStrategy::Error).unwrap();
            let second = merge(&a, &b, MergeStrategy::Error).unwrap();
            assert_eq!(first.actions(), second.actions());
            let first_listing: Vec<_> = first.list().collect();
            let second_listing: Vec<_> = second.list().collect();
            assert_eq!(first_listing, second_listing);
        }
    }
}
