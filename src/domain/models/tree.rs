//! Decomposition tree: all components indexed by id.
//!
//! The tree is created once by decomposition, persisted, and then reloaded
//! and mutated in place across every phase burst. Structure is tree-shaped
//! by construction (one parent per node); the mechanical validator is what
//! actually proves acyclicity before the pipeline advances.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::component::Component;

/// Full decomposition tree.
///
/// Nodes are kept in a `BTreeMap` so every traversal that falls back to map
/// order (leaf grouping, depth buckets) is deterministic across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecompositionTree {
    pub root_id: String,
    #[serde(default)]
    pub nodes: BTreeMap<String, Component>,
}

impl DecompositionTree {
    /// Empty tree with a declared root id.
    pub fn new(root_id: impl Into<String>) -> Self {
        Self {
            root_id: root_id.into(),
            nodes: BTreeMap::new(),
        }
    }

    /// Insert a node, replacing any previous node with the same id.
    pub fn insert(&mut self, component: Component) {
        self.nodes.insert(component.component_id.clone(), component);
    }

    pub fn get(&self, node_id: &str) -> Option<&Component> {
        self.nodes.get(node_id)
    }

    pub fn get_mut(&mut self, node_id: &str) -> Option<&mut Component> {
        self.nodes.get_mut(node_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Leaf nodes (no children), in id order.
    pub fn leaves(&self) -> Vec<&Component> {
        self.nodes.values().filter(|n| n.is_leaf()).collect()
    }

    /// Child nodes of `node_id`; ids missing from the map are skipped.
    pub fn children_of(&self, node_id: &str) -> Vec<&Component> {
        self.nodes.get(node_id).map_or_else(Vec::new, |node| {
            node.children
                .iter()
                .filter_map(|c| self.nodes.get(c))
                .collect()
        })
    }

    /// Parent node, or `None` for the root and for unknown ids.
    pub fn parent_of(&self, node_id: &str) -> Option<&Component> {
        let node = self.nodes.get(node_id)?;
        if node.parent_id.is_empty() {
            return None;
        }
        self.nodes.get(&node.parent_id)
    }

    /// Component ids in dependency order: every node appears exactly once,
    /// strictly after all of its tree children (post-order DFS from root).
    ///
    /// Nodes not reachable from `root_id` are silently omitted; callers that
    /// care about orphans must run the validation gate first.
    pub fn topological_order(&self) -> Vec<String> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        self.visit_post_order(&self.root_id, &mut visited, &mut order);
        order
    }

    fn visit_post_order(
        &self,
        node_id: &str,
        visited: &mut HashSet<String>,
        order: &mut Vec<String>,
    ) {
        if !visited.insert(node_id.to_string()) {
            return;
        }
        let Some(node) = self.nodes.get(node_id) else {
            return;
        };
        for child_id in &node.children {
            self.visit_post_order(child_id, visited, order);
        }
        order.push(node_id.to_string());
    }

    /// All leaves can run simultaneously; they are independent in a tree.
    /// Returns a single group of all leaf ids, or no groups at all.
    pub fn leaf_parallel_groups(&self) -> Vec<Vec<String>> {
        let leaf_ids: Vec<String> = self
            .leaves()
            .iter()
            .map(|n| n.component_id.clone())
            .collect();
        if leaf_ids.is_empty() {
            vec![]
        } else {
            vec![leaf_ids]
        }
    }

    /// Non-leaves at the same depth integrate in parallel, deepest first,
    /// so children always finish before their parents.
    pub fn non_leaf_parallel_groups(&self) -> Vec<Vec<String>> {
        let mut depth_map: BTreeMap<u32, Vec<String>> = BTreeMap::new();
        for node in self.nodes.values() {
            if !node.is_leaf() {
                depth_map
                    .entry(node.depth)
                    .or_default()
                    .push(node.component_id.clone());
            }
        }
        depth_map.into_values().rev().collect()
    }

    /// All node ids in the subtree rooted at `node_id`, inclusive, pre-order.
    pub fn subtree(&self, node_id: &str) -> Vec<String> {
        let mut visited = HashSet::new();
        let mut result = Vec::new();
        self.collect_subtree(node_id, &mut visited, &mut result);
        result
    }

    fn collect_subtree(
        &self,
        node_id: &str,
        visited: &mut HashSet<String>,
        result: &mut Vec<String>,
    ) {
        if !visited.insert(node_id.to_string()) {
            return;
        }
        result.push(node_id.to_string());
        if let Some(node) = self.nodes.get(node_id) {
            for child_id in &node.children {
                self.collect_subtree(child_id, visited, result);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// root -> (a -> (a1, a2), b)
    fn sample_tree() -> DecompositionTree {
        let mut tree = DecompositionTree::new("root");
        tree.insert(
            Component::new("root", "Root", "")
                .with_child("a")
                .with_child("b"),
        );
        tree.insert(
            Component::new("a", "A", "")
                .with_depth(1)
                .with_parent("root")
                .with_child("a1")
                .with_child("a2"),
        );
        tree.insert(Component::new("a1", "A1", "").with_depth(2).with_parent("a"));
        tree.insert(Component::new("a2", "A2", "").with_depth(2).with_parent("a"));
        tree.insert(Component::new("b", "B", "").with_depth(1).with_parent("root"));
        tree
    }

    #[test]
    fn test_leaves() {
        let tree = sample_tree();
        let leaf_ids: Vec<&str> = tree
            .leaves()
            .iter()
            .map(|n| n.component_id.as_str())
            .collect();
        assert_eq!(leaf_ids, vec!["a1", "a2", "b"]);
    }

    #[test]
    fn test_children_and_parent() {
        let tree = sample_tree();
        let child_ids: Vec<&str> = tree
            .children_of("a")
            .iter()
            .map(|n| n.component_id.as_str())
            .collect();
        assert_eq!(child_ids, vec!["a1", "a2"]);
        assert_eq!(tree.parent_of("a1").unwrap().component_id, "a");
        assert!(tree.parent_of("root").is_none());
        assert!(tree.parent_of("nope").is_none());
    }

    #[test]
    fn test_topological_order_children_before_parents() {
        let tree = sample_tree();
        let order = tree.topological_order();
        assert_eq!(order.len(), 5);
        let pos = |id: &str| order.iter().position(|x| x == id).unwrap();
        assert!(pos("a1") < pos("a"));
        assert!(pos("a2") < pos("a"));
        assert!(pos("a") < pos("root"));
        assert!(pos("b") < pos("root"));
    }

    #[test]
    fn test_topological_order_omits_orphans() {
        let mut tree = sample_tree();
        tree.insert(Component::new("orphan", "Orphan", "").with_depth(3));
        let order = tree.topological_order();
        assert_eq!(order.len(), 5);
        assert!(!order.contains(&"orphan".to_string()));
    }

    #[test]
    fn test_leaf_parallel_groups() {
        let tree = sample_tree();
        let groups = tree.leaf_parallel_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0], vec!["a1", "a2", "b"]);

        let empty = DecompositionTree::new("root");
        assert!(empty.leaf_parallel_groups().is_empty());
    }

    #[test]
    fn test_non_leaf_groups_deepest_first() {
        let tree = sample_tree();
        let groups = tree.non_leaf_parallel_groups();
        assert_eq!(groups, vec![vec!["a".to_string()], vec!["root".to_string()]]);
    }

    #[test]
    fn test_subtree_preorder() {
        let tree = sample_tree();
        assert_eq!(tree.subtree("a"), vec!["a", "a1", "a2"]);
        assert_eq!(tree.subtree("b"), vec!["b"]);
        assert_eq!(tree.subtree("root").len(), 5);
    }
}
