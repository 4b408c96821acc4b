//! Interface contracts and the test suites generated from them.
//!
//! Contracts are authored by an external agent and treated as opaque payload
//! by the pipeline core, except for the mechanical checks in
//! `services::validator`: type references, completeness, and the declared
//! dependency list that drives wavefront ordering.

use serde::{Deserialize, Serialize};

/// A typed field within a struct or a function signature.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    /// Name of the type this field holds; must resolve against the
    /// contract's declared types or the primitive set.
    pub type_ref: String,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default)]
    pub default: String,
    #[serde(default)]
    pub description: String,
}

const fn default_true() -> bool {
    true
}

/// What shape a declared type has.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Primitive,
    #[default]
    Struct,
    Enum,
    List,
    Optional,
    Union,
}

/// A type definition within a contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSpec {
    pub name: String,
    #[serde(default)]
    pub kind: TypeKind,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    /// Element type for `kind == List`
    #[serde(default)]
    pub item_type: String,
    /// Variant names for `kind == Enum`
    #[serde(default)]
    pub variants: Vec<String>,
    #[serde(default)]
    pub description: String,
}

/// An error condition a function can produce.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCase {
    pub name: String,
    pub condition: String,
    pub error_type: String,
}

/// Contract for a single function: inputs, output, errors, invariants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionContract {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub inputs: Vec<FieldSpec>,
    pub output_type: String,
    #[serde(default)]
    pub error_cases: Vec<ErrorCase>,
    #[serde(default)]
    pub preconditions: Vec<String>,
    #[serde(default)]
    pub postconditions: Vec<String>,
    #[serde(default)]
    pub idempotent: bool,
}

/// The interface contract for a single component.
///
/// `dependencies` lists component ids this one calls. They are logical
/// edges, distinct from tree parent/child structure; ids outside the tree
/// denote external libraries and are accepted without validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentContract {
    pub component_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub types: Vec<TypeSpec>,
    #[serde(default)]
    pub functions: Vec<FunctionContract>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub invariants: Vec<String>,
}

const fn default_version() -> u32 {
    1
}

impl ComponentContract {
    /// Minimal contract with no declarations yet.
    pub fn new(component_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            component_id: component_id.into(),
            name: name.into(),
            version: default_version(),
            ..Self::default()
        }
    }

    /// Add a declared function.
    pub fn with_function(mut self, function: FunctionContract) -> Self {
        self.functions.push(function);
        self
    }

    /// Add a declared dependency id.
    pub fn with_dependency(mut self, dep_id: impl Into<String>) -> Self {
        self.dependencies.push(dep_id.into());
        self
    }
}

/// What a generated test case is probing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestCategory {
    #[default]
    HappyPath,
    EdgeCase,
    ErrorCase,
    Invariant,
}

impl TestCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HappyPath => "happy_path",
            Self::EdgeCase => "edge_case",
            Self::ErrorCase => "error_case",
            Self::Invariant => "invariant",
        }
    }
}

/// A single test case derived from a contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    #[serde(default)]
    pub description: String,
    /// Which contract function this exercises
    pub function: String,
    #[serde(default)]
    pub category: TestCategory,
    #[serde(default)]
    pub input_description: String,
    #[serde(default)]
    pub expected_output_description: String,
    #[serde(default)]
    pub expected_error: String,
    #[serde(default)]
    pub assertions: Vec<String>,
}

/// Executable test suite generated from a contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractTestSuite {
    pub component_id: String,
    #[serde(default = "default_version")]
    pub contract_version: u32,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
    #[serde(default = "default_test_language")]
    pub test_language: String,
    /// Full test source, persisted as its own file beside the suite
    #[serde(default)]
    pub generated_code: String,
}

fn default_test_language() -> String {
    "rust".to_string()
}

impl ContractTestSuite {
    /// Empty suite for a component, at contract version 1.
    pub fn new(component_id: impl Into<String>) -> Self {
        Self {
            component_id: component_id.into(),
            contract_version: default_version(),
            test_language: default_test_language(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_builder() {
        let contract = ComponentContract::new("auth", "Auth")
            .with_function(FunctionContract {
                name: "login".to_string(),
                output_type: "Session".to_string(),
                ..FunctionContract::default()
            })
            .with_dependency("store");
        assert_eq!(contract.version, 1);
        assert_eq!(contract.functions.len(), 1);
        assert_eq!(contract.dependencies, vec!["store"]);
    }

    #[test]
    fn test_field_required_defaults_true() {
        let json = r#"{"name": "user", "type_ref": "str"}"#;
        let field: FieldSpec = serde_json::from_str(json).unwrap();
        assert!(field.required);
    }

    #[test]
    fn test_type_kind_serializes_snake_case() {
        let kind = TypeKind::List;
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"list\"");
    }
}
