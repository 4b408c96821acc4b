//! Property-based tests for tree traversal and wavefront scheduling.
//!
//! A random well-formed decomposition tree is grown by attaching each new
//! node under a previously created one, so every generated case is a single
//! tree rooted at `n0`. Contract dependencies for the wavefront point only
//! at lower-numbered nodes, which keeps the dependency graph acyclic the
//! same way real contracts reference already-planned components.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use covenant::domain::models::{Component, DecompositionTree};
use covenant::services::wavefront::{ComponentPhase, WavefrontScheduler};
use proptest::prelude::*;
use proptest::sample::Index;

/// Grow a tree of `parent_picks.len() + 1` nodes: node `i` hangs under one
/// of the nodes created before it.
fn build_tree(parent_picks: &[Index]) -> DecompositionTree {
    let n = parent_picks.len() + 1;
    let ids: Vec<String> = (0..n).map(|i| format!("n{i}")).collect();

    let mut parents = vec![0usize; n];
    let mut depths = vec![0u32; n];
    let mut children: Vec<Vec<String>> = vec![Vec::new(); n];
    for (i, pick) in parent_picks.iter().enumerate() {
        let node = i + 1;
        let parent = pick.index(node);
        parents[node] = parent;
        depths[node] = depths[parent] + 1;
        children[parent].push(ids[node].clone());
    }

    let mut tree = DecompositionTree::new(ids[0].clone());
    for i in 0..n {
        let mut comp =
            Component::new(ids[i].clone(), format!("Node {i}"), "").with_depth(depths[i]);
        if i > 0 {
            comp = comp.with_parent(ids[parents[i]].clone());
        }
        for child in &children[i] {
            comp = comp.with_child(child.clone());
        }
        tree.insert(comp);
    }
    tree
}

/// Walk parent links from `from` until `target` or the root.
fn reaches_by_parents(tree: &DecompositionTree, from: &str, target: &str) -> bool {
    let mut current = from.to_string();
    for _ in 0..=tree.len() {
        if current == target {
            return true;
        }
        match tree.get(&current) {
            Some(node) if !node.parent_id.is_empty() => current = node.parent_id.clone(),
            _ => return false,
        }
    }
    false
}

proptest! {
    /// Property: topological order lists every node exactly once, and every
    /// child strictly before its parent.
    #[test]
    fn prop_topological_order_children_first(
        parent_picks in prop::collection::vec(any::<Index>(), 0..24)
    ) {
        let tree = build_tree(&parent_picks);
        let order = tree.topological_order();

        prop_assert_eq!(order.len(), tree.len(), "order must cover the tree");
        let pos: HashMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        prop_assert_eq!(pos.len(), order.len(), "order must not repeat nodes");

        for (id, node) in &tree.nodes {
            for child in &node.children {
                prop_assert!(
                    pos[child.as_str()] < pos[id.as_str()],
                    "child {} must precede parent {}",
                    child,
                    id
                );
            }
        }
    }

    /// Property: the leaf wave is a single group holding exactly the leaves.
    #[test]
    fn prop_leaves_form_single_group(
        parent_picks in prop::collection::vec(any::<Index>(), 0..24)
    ) {
        let tree = build_tree(&parent_picks);
        let groups = tree.leaf_parallel_groups();

        // A non-empty tree always has at least one leaf.
        prop_assert_eq!(groups.len(), 1);
        let got: BTreeSet<&str> = groups[0].iter().map(String::as_str).collect();
        let expected: BTreeSet<&str> = tree
            .nodes
            .values()
            .filter(|n| n.is_leaf())
            .map(|n| n.component_id.as_str())
            .collect();
        prop_assert_eq!(got, expected);
    }

    /// Property: integration waves hold non-leaves only, one depth per wave,
    /// deepest first, covering every non-leaf exactly once.
    #[test]
    fn prop_non_leaf_groups_deepest_first(
        parent_picks in prop::collection::vec(any::<Index>(), 0..24)
    ) {
        let tree = build_tree(&parent_picks);
        let groups = tree.non_leaf_parallel_groups();

        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut previous_depth: Option<u32> = None;
        for group in &groups {
            prop_assert!(!group.is_empty(), "waves are never empty");
            let depth = tree.get(&group[0]).unwrap().depth;
            for id in group {
                let node = tree.get(id).unwrap();
                prop_assert!(!node.is_leaf(), "{} is a leaf in an integration wave", id);
                prop_assert_eq!(node.depth, depth, "mixed depths in one wave");
                prop_assert!(seen.insert(id.clone()), "{} appears twice", id);
            }
            if let Some(prev) = previous_depth {
                prop_assert!(depth < prev, "waves must go shallower monotonically");
            }
            previous_depth = Some(depth);
        }

        let all_non_leaves: BTreeSet<String> = tree
            .nodes
            .values()
            .filter(|n| !n.is_leaf())
            .map(|n| n.component_id.clone())
            .collect();
        prop_assert_eq!(seen, all_non_leaves);
    }

    /// Property: a subtree is exactly the set of nodes whose parent chain
    /// passes through the subtree root, listed once, root first.
    #[test]
    fn prop_subtree_covers_descendants(
        parent_picks in prop::collection::vec(any::<Index>(), 0..24),
        start_pick in any::<Index>(),
    ) {
        let tree = build_tree(&parent_picks);
        let ids: Vec<String> = tree.nodes.keys().cloned().collect();
        let start = ids[start_pick.index(ids.len())].clone();

        let subtree = tree.subtree(&start);
        prop_assert_eq!(subtree.first(), Some(&start));
        let unique: BTreeSet<&String> = subtree.iter().collect();
        prop_assert_eq!(unique.len(), subtree.len(), "subtree must not repeat nodes");

        for id in tree.nodes.keys() {
            let in_subtree = subtree.contains(id);
            let descends = reaches_by_parents(&tree, id, &start);
            prop_assert_eq!(
                in_subtree, descends,
                "membership mismatch for {} under {}",
                id, &start
            );
        }
    }

    /// Property: for any tree, any acyclic contract dependencies, and any
    /// concurrency cap, repeatedly executing the ready set drains the whole
    /// wavefront. No wave exceeds the cap, and no component implements
    /// before its known dependencies have.
    #[test]
    fn prop_wavefront_drains_any_tree(
        parent_picks in prop::collection::vec(any::<Index>(), 0..24),
        dep_picks in prop::collection::vec((any::<Index>(), any::<Index>()), 0..12),
        max_concurrent in 1usize..6,
    ) {
        let tree = build_tree(&parent_picks);
        let n = tree.len();
        let ids: Vec<String> = tree.nodes.keys().cloned().collect();

        let mut scheduler = WavefrontScheduler::from_tree(&tree, max_concurrent);
        // Dependencies only point at lower-numbered nodes: acyclic by
        // construction.
        let mut deps: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for (node_pick, dep_pick) in &dep_picks {
            let node = node_pick.index(n);
            if node == 0 {
                continue;
            }
            let dep = dep_pick.index(node);
            deps.entry(node).or_default().push(ids[dep].clone());
        }
        for (node, dep_ids) in deps {
            scheduler.set_dependencies(&ids[node], dep_ids);
        }

        let mut rounds = 0usize;
        loop {
            let ready = scheduler.compute_ready_set();
            if ready.is_empty() {
                break;
            }
            prop_assert!(
                ready.len() <= max_concurrent,
                "wave of {} exceeds cap {}",
                ready.len(),
                max_concurrent
            );
            for (cid, phase) in &ready {
                if *phase == ComponentPhase::Implement {
                    let blockers = scheduler.state(cid).unwrap().dependencies.clone();
                    for dep in blockers {
                        if let Some(dep_state) = scheduler.state(&dep) {
                            prop_assert!(
                                dep_state.current_phase >= ComponentPhase::Implement,
                                "{} implements before its dependency {}",
                                cid,
                                dep
                            );
                        }
                    }
                }
            }
            for (cid, phase) in &ready {
                scheduler.advance(cid, *phase);
            }
            rounds += 1;
            prop_assert!(rounds <= 5 * n + 5, "wavefront stopped making progress");
        }

        prop_assert!(scheduler.is_complete(), "wavefront drained without completing");
    }
}
