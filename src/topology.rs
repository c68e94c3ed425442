// src/topology.rs

//! Interconnect root resolution
//!
//! Clients that want a channel close to a particular device pass the
//! device's interconnect root as the `node_filter` of
//! [`Broker::allocate`](crate::Broker::allocate). This module finds that
//! root by walking up the platform device tree.

use crate::types::NodeId;

/// Upper bound on ancestor walks; guards against a malformed (cyclic) tree
pub const MAX_TREE_DEPTH: usize = 256;

/// Read-only view of the platform device tree
pub trait NodeTree {
    /// Parent of `node`, `None` at the top of the tree
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Whether `node`'s compatible list contains `compatible`
    ///
    /// A node without a compatible property is not compatible with anything.
    fn is_compatible(&self, node: NodeId, compatible: &str) -> bool;
}

/// Nearest proper ancestor of `node` whose compatible list contains
/// `compatible`
pub fn root_complex<T: NodeTree + ?Sized>(
    tree: &T,
    node: NodeId,
    compatible: &str,
) -> Option<NodeId> {
    let mut cursor = tree.parent(node);
    for _ in 0..MAX_TREE_DEPTH {
        let current = cursor?;
        if tree.is_compatible(current, compatible) {
            return Some(current);
        }
        cursor = tree.parent(current);
    }
    log::warn!("device tree deeper than {} levels above {:?}", MAX_TREE_DEPTH, node);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::collections::BTreeMap;
    use alloc::vec::Vec;

    struct Tree {
        parents: BTreeMap<u64, u64>,
        compatible: BTreeMap<u64, Vec<&'static str>>,
    }

    impl NodeTree for Tree {
        fn parent(&self, node: NodeId) -> Option<NodeId> {
            self.parents.get(&node.0).copied().map(NodeId)
        }

        fn is_compatible(&self, node: NodeId, compatible: &str) -> bool {
            self.compatible
                .get(&node.0)
                .is_some_and(|list| list.iter().any(|c| *c == compatible))
        }
    }

    // 0 (root) ─ 1 (pciex_root_complex) ─ 2 (bridge) ─ 3 (dma engine)
    fn tree() -> Tree {
        let mut parents = BTreeMap::new();
        parents.insert(1, 0);
        parents.insert(2, 1);
        parents.insert(3, 2);
        let mut compatible = BTreeMap::new();
        compatible.insert(1, alloc::vec!["pciex", "pciex_root_complex"]);
        compatible.insert(2, alloc::vec!["pciex_bridge"]);
        Tree { parents, compatible }
    }

    #[test]
    fn finds_nearest_root_complex() {
        let t = tree();
        assert_eq!(root_complex(&t, NodeId(3), "pciex_root_complex"), Some(NodeId(1)));
        assert_eq!(root_complex(&t, NodeId(2), "pciex_root_complex"), Some(NodeId(1)));
    }

    #[test]
    fn node_itself_is_not_considered() {
        let t = tree();
        assert_eq!(root_complex(&t, NodeId(1), "pciex_root_complex"), None);
    }

    #[test]
    fn cyclic_tree_terminates() {
        let mut t = tree();
        t.parents.insert(0, 3);
        assert_eq!(root_complex(&t, NodeId(3), "missing"), None);
    }
}
