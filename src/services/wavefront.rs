//! Wavefront scheduling: dependency-driven execution.
//!
//! Instead of phase-locked execution (all contracts, then all tests, then all
//! implementations), wavefront scheduling advances each component through its
//! own phase pipeline as soon as its prerequisites are satisfied.
//!
//! For a tree with components A(root), B(leaf), C(leaf), D(leaf, depends on B):
//!
//! ```text
//! Wave 1: contract B, contract C, contract D
//! Wave 2: test B, test C, test D
//! Wave 3: implement B, implement C        (D waits on B's implementation)
//! Wave 4: implement D
//! Wave 5: integrate A                     (all children complete)
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::models::DecompositionTree;

/// Phases a component progresses through under the wavefront.
///
/// Declaration order is progression order; `Ord` gives the phase index.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ComponentPhase {
    #[default]
    Pending,
    Contract,
    Test,
    Implement,
    Integrate,
    Complete,
}

impl ComponentPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Contract => "contract",
            Self::Test => "test",
            Self::Implement => "implement",
            Self::Integrate => "integrate",
            Self::Complete => "complete",
        }
    }

    /// Position in the progression, for ordering ready work.
    const fn order_index(self) -> usize {
        match self {
            Self::Pending => 0,
            Self::Contract => 1,
            Self::Test => 2,
            Self::Implement => 3,
            Self::Integrate => 4,
            Self::Complete => 5,
        }
    }
}

/// Tracks a single component's phase progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentState {
    pub component_id: String,
    #[serde(default)]
    pub current_phase: ComponentPhase,
    #[serde(default)]
    pub is_leaf: bool,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub children: Vec<String>,
}

/// Dependency-driven execution scheduler.
///
/// Fan out independent work, serialize dependencies.
#[derive(Debug, Clone)]
pub struct WavefrontScheduler {
    max_concurrent: usize,
    states: BTreeMap<String, ComponentState>,
}

impl WavefrontScheduler {
    /// Build states from the tree. Tree edges give `is_leaf` and `children`;
    /// contract-level dependencies arrive later via [`set_dependencies`](Self::set_dependencies).
    pub fn from_tree(tree: &DecompositionTree, max_concurrent: usize) -> Self {
        let states = tree
            .nodes
            .iter()
            .map(|(node_id, node)| {
                (
                    node_id.clone(),
                    ComponentState {
                        component_id: node_id.clone(),
                        current_phase: ComponentPhase::Pending,
                        is_leaf: node.children.is_empty(),
                        dependencies: Vec::new(),
                        children: node.children.clone(),
                    },
                )
            })
            .collect();
        Self {
            max_concurrent,
            states,
        }
    }

    /// Set contract-level dependencies for a component.
    pub fn set_dependencies(&mut self, component_id: &str, deps: Vec<String>) {
        if let Some(state) = self.states.get_mut(component_id) {
            state.dependencies = deps;
        }
    }

    /// Return (component_id, phase) pairs ready to execute now.
    ///
    /// A component is ready for its next phase when:
    ///   - `Contract`: component is `Pending`
    ///   - `Test`: contract phase is done
    ///   - `Implement`: test phase is done and every known dependency has
    ///     reached `Implement` or beyond
    ///   - `Integrate`: implementation is done and every known child is
    ///     `Complete`
    ///   - `Complete`: after `Implement` for leaves, after `Integrate` for
    ///     parents
    ///
    /// The result is sorted leaves first, then by phase progression, then by
    /// id, and truncated to the concurrency cap.
    pub fn compute_ready_set(&self) -> Vec<(String, ComponentPhase)> {
        let mut ready: Vec<(String, ComponentPhase)> = self
            .states
            .values()
            .filter(|state| state.current_phase != ComponentPhase::Complete)
            .filter_map(|state| {
                let next = self.next_phase(state)?;
                self.can_advance(state, next)
                    .then(|| (state.component_id.clone(), next))
            })
            .collect();

        ready.sort_by_key(|(cid, phase)| {
            let is_leaf = self.states.get(cid).is_some_and(|s| s.is_leaf);
            (usize::from(!is_leaf), phase.order_index(), cid.clone())
        });
        ready.truncate(self.max_concurrent);
        ready
    }

    /// Record phase completion for a component. Leaves jump straight to
    /// `Complete` when their implementation finishes; they never integrate.
    pub fn advance(&mut self, component_id: &str, completed_phase: ComponentPhase) {
        let Some(state) = self.states.get_mut(component_id) else {
            return;
        };
        state.current_phase = completed_phase;
        if completed_phase == ComponentPhase::Implement && state.is_leaf && state.children.is_empty()
        {
            state.current_phase = ComponentPhase::Complete;
        }
    }

    /// True once every component has completed.
    pub fn is_complete(&self) -> bool {
        self.states
            .values()
            .all(|s| s.current_phase == ComponentPhase::Complete)
    }

    /// Current phase state for one component.
    pub fn state(&self, component_id: &str) -> Option<&ComponentState> {
        self.states.get(component_id)
    }

    /// Number of tracked components.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    fn next_phase(&self, state: &ComponentState) -> Option<ComponentPhase> {
        let next = match state.current_phase {
            ComponentPhase::Pending => ComponentPhase::Contract,
            ComponentPhase::Contract => ComponentPhase::Test,
            ComponentPhase::Test => ComponentPhase::Implement,
            ComponentPhase::Implement => ComponentPhase::Integrate,
            ComponentPhase::Integrate => ComponentPhase::Complete,
            ComponentPhase::Complete => return None,
        };
        // Leaves skip integrate and go straight to complete.
        if next == ComponentPhase::Integrate && state.is_leaf && state.children.is_empty() {
            return Some(ComponentPhase::Complete);
        }
        Some(next)
    }

    fn can_advance(&self, state: &ComponentState, target: ComponentPhase) -> bool {
        match target {
            ComponentPhase::Pending => false,
            ComponentPhase::Contract => state.current_phase == ComponentPhase::Pending,
            ComponentPhase::Test => state.current_phase == ComponentPhase::Contract,
            ComponentPhase::Implement => {
                if state.current_phase != ComponentPhase::Test {
                    return false;
                }
                // Unknown dependency ids (outside this wavefront) never block.
                state.dependencies.iter().all(|dep_id| {
                    self.states
                        .get(dep_id)
                        .is_none_or(|dep| dep.current_phase >= ComponentPhase::Implement)
                })
            }
            ComponentPhase::Integrate => {
                if state.current_phase != ComponentPhase::Implement {
                    return false;
                }
                state.children.iter().all(|child_id| {
                    self.states
                        .get(child_id)
                        .is_none_or(|child| child.current_phase == ComponentPhase::Complete)
                })
            }
            ComponentPhase::Complete => {
                if state.is_leaf && state.children.is_empty() {
                    state.current_phase == ComponentPhase::Implement
                } else {
                    state.current_phase == ComponentPhase::Integrate
                }
            }
        }
    }
}
