//! Property-based tests for the merge resolver.
//!
//! These tests use proptest to generate random staged trees and verify that
//! the merge invariants hold for all possible inputs.

#[cfg(test)]
mod proptest_tests {
    use crate::merge::{merge, MergeStrategy};
    use crate::tree::{FileEntry, Tree};
    use proptest::prelude::*;

    /// A staged operation as generated data; applied leniently so every
    /// generated sequence yields a valid tree.
    #[derive(Debug, Clone)]
    enum Op {
        Create(String, Vec<u8>),
        Overwrite(String, Vec<u8>),
        Delete(String),
        Rename(String, String),
    }

    fn name_strategy() -> impl Strategy<Value = String> {
        // A small namespace so generated trees actually collide.
        prop::sample::select(vec![
            "a.txt".to_string(),
            "b.txt".to_string(),
            "c.txt".to_string(),
            "d/e.txt".to_string(),
        ])
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (name_strategy(), prop::collection::vec(any::<u8>(), 0..4))
                .prop_map(|(name, content)| Op::Create(name, content)),
            (name_strategy(), prop::collection::vec(any::<u8>(), 0..4))
                .prop_map(|(name, content)| Op::Overwrite(name, content)),
            name_strategy().prop_map(Op::Delete),
            (name_strategy(), name_strategy()).prop_map(|(from, to)| Op::Rename(from, to)),
        ]
    }

    /// Apply generated ops through the validated API, skipping the ones the
    /// current tree state makes invalid. Deterministic in the input data.
    fn build_tree(base: Vec<(String, Vec<u8>)>, ops: Vec<Op>) -> Tree {
        let mut tree = Tree::from_entries(
            base.into_iter()
                .map(|(name, content)| FileEntry::new(name, content)),
        );
        for op in ops {
            tree = match op {
                Op::Create(name, content) => {
                    tree.create(&name, content).unwrap_or_else(|_| tree.clone())
                }
                Op::Overwrite(name, content) => tree
                    .overwrite(&name, content)
                    .unwrap_or_else(|_| tree.clone()),
                Op::Delete(name) => tree.delete(&name).unwrap_or_else(|_| tree.clone()),
                Op::Rename(from, to) => {
                    tree.rename(&from, &to).unwrap_or_else(|_| tree.clone())
                }
            };
        }
        tree
    }

    fn tree_strategy() -> impl Strategy<Value = Tree> {
        (
            prop::collection::vec(
                (name_strategy(), prop::collection::vec(any::<u8>(), 0..4)),
                0..3,
            ),
            prop::collection::vec(op_strategy(), 0..6),
        )
            .prop_map(|(base, ops)| build_tree(base, ops))
    }

    fn listing(tree: &Tree) -> Vec<FileEntry> {
        tree.list().collect()
    }

    proptest! {
        /// Property: merging a tree with itself is the identity, for every
        /// strategy.
        #[test]
        fn merge_self_is_identity(tree in tree_strategy()) {
            for strategy in [
                MergeStrategy::Default,
                MergeStrategy::Error,
                MergeStrategy::Overwrite,
                MergeStrategy::ContentOnly,
            ] {
                let merged = merge(&tree, &tree, strategy).unwrap();
                prop_assert_eq!(merged.actions(), tree.actions());
                prop_assert_eq!(listing(&merged), listing(&tree));
            }
        }

        /// Property: for a fixed pair of trees and strategy, repeated merges
        /// yield identical results (success and failure alike).
        #[test]
        fn merge_is_deterministic(a in tree_strategy(), b in tree_strategy()) {
            for strategy in [
                MergeStrategy::Error,
                MergeStrategy::Overwrite,
                MergeStrategy::ContentOnly,
            ] {
                let first = merge(&a, &b, strategy);
                let second = merge(&a, &b, strategy);
                match (first, second) {
                    (Ok(x), Ok(y)) => {
                        prop_assert_eq!(x.actions(), y.actions());
                        prop_assert_eq!(listing(&x), listing(&y));
                    }
                    (Err(x), Err(y)) => {
                        prop_assert_eq!(x.to_string(), y.to_string());
                    }
                    (first, second) => {
                        prop_assert!(
                            false,
                            "merge not deterministic: {:?} vs {:?}",
                            first.is_ok(),
                            second.is_ok()
                        );
                    }
                }
            }
        }

        /// Property: the Overwrite strategy never fails; the incoming tree
        /// always has a way to win.
        #[test]
        fn overwrite_strategy_never_errors(a in tree_strategy(), b in tree_strategy()) {
            prop_assert!(merge(&a, &b, MergeStrategy::Overwrite).is_ok());
        }

        /// Property: merging a tree with no pending actions into any tree is
        /// the identity.
        #[test]
        fn merge_with_unstaged_tree_is_identity(tree in tree_strategy()) {
            let unstaged = Tree::empty();
            let merged = merge(&tree, &unstaged, MergeStrategy::Error).unwrap();
            prop_assert_eq!(merged.actions(), tree.actions());
        }
    }
}
