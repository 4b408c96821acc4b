//! Component domain model.
//!
//! A component is one node of the decomposition tree: the unit that gets a
//! contract, a test suite, and an implementation.

use serde::{Deserialize, Serialize};

use super::contract::ComponentContract;
use super::test_results::TestResults;

/// How far a component has progressed through being built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    /// Decomposed but nothing authored yet
    #[default]
    Pending,
    /// Contract authored
    Contracted,
    /// Source written, tests not yet green
    Implemented,
    /// Implementation passed its contract tests
    Tested,
    /// Last attempt did not pass
    Failed,
}

impl BuildStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Contracted => "contracted",
            Self::Implemented => "implemented",
            Self::Tested => "tested",
            Self::Failed => "failed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "contracted" => Some(Self::Contracted),
            "implemented" => Some(Self::Implemented),
            "tested" => Some(Self::Tested),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether this component still needs build work.
    pub fn needs_work(&self) -> bool {
        !matches!(self, Self::Tested)
    }
}

/// A node in the decomposition tree.
///
/// Tree edges (`parent_id` / `children`) describe structure: a parent's
/// behavior is composed from its children. Contract dependencies (carried on
/// the embedded contract) describe logic: which other components this one
/// calls. The two relations are deliberately distinct and both survive
/// persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Unique identifier within the tree
    pub component_id: String,
    /// Human-readable name
    pub name: String,
    /// What this component does
    pub description: String,
    /// Distance from the root (root is 0)
    #[serde(default)]
    pub depth: u32,
    /// Parent component id; empty for the root
    #[serde(default)]
    pub parent_id: String,
    /// Ordered child component ids
    #[serde(default)]
    pub children: Vec<String>,
    /// The authored interface contract, once one exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<ComponentContract>,
    /// Build progress
    #[serde(default)]
    pub implementation_status: BuildStatus,
    /// Most recent test run, replaced wholesale on re-attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_results: Option<TestResults>,
}

impl Component {
    /// Create a pending component with no tree position yet.
    pub fn new(
        component_id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            component_id: component_id.into(),
            name: name.into(),
            description: description.into(),
            depth: 0,
            parent_id: String::new(),
            children: Vec::new(),
            contract: None,
            implementation_status: BuildStatus::default(),
            test_results: None,
        }
    }

    /// Set tree depth.
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    /// Set parent id.
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = parent_id.into();
        self
    }

    /// Append a child id, ignoring duplicates and self-references.
    pub fn with_child(mut self, child_id: impl Into<String>) -> Self {
        let child_id = child_id.into();
        if child_id != self.component_id && !self.children.contains(&child_id) {
            self.children.push(child_id);
        }
        self
    }

    /// Whether this component has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Dependency ids declared by this component's contract. Empty when no
    /// contract has been authored yet.
    pub fn dependencies(&self) -> &[String] {
        self.contract
            .as_ref()
            .map_or(&[], |c| c.dependencies.as_slice())
    }
}
