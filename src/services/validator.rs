//! Contract validation: mechanical gates, no model in the loop.
//!
//! Every check here is a pure function over a tree, a contract map, and a
//! test-suite map. Findings are collected as strings and returned in a
//! [`GateResult`]; the gate reports, it never raises. Callers decide whether
//! a failed gate is fatal.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::domain::models::{
    ComponentContract, ContractTestSuite, DecompositionTree, GateResult, TypeKind,
};

/// Type names accepted without a declaration in the contract.
const PRIMITIVES: [&str; 9] = [
    "str", "int", "float", "bool", "None", "bytes", "dict", "list", "any",
];

/// Kinship distance a dependency may span before the locality advisory flags
/// it. Parent/child is 1 hop, sibling 2, uncle/niece 3; cousins and anything
/// farther warn.
const DEFAULT_LOCALITY_RADIUS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Mechanical validator for contracts, test suites, and tree structure.
#[derive(Debug, Clone)]
pub struct ContractValidator {
    locality_radius: usize,
}

impl Default for ContractValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ContractValidator {
    pub fn new() -> Self {
        Self {
            locality_radius: DEFAULT_LOCALITY_RADIUS,
        }
    }

    /// Override the advisory kinship radius. The default tolerates
    /// uncle/niece edges and flags anything more distant.
    pub fn with_locality_radius(mut self, radius: usize) -> Self {
        self.locality_radius = radius;
        self
    }

    /// Check that every type reference in a contract resolves to one of the
    /// contract's declared types or a primitive.
    pub fn validate_type_references(&self, contract: &ComponentContract) -> Vec<String> {
        let defined: HashSet<&str> = contract
            .types
            .iter()
            .map(|t| t.name.as_str())
            .chain(PRIMITIVES)
            .collect();
        let cid = &contract.component_id;
        let mut errors = Vec::new();

        for func in &contract.functions {
            if !func.output_type.is_empty() && !defined.contains(func.output_type.as_str()) {
                errors.push(format!(
                    "Function '{}' output_type '{}' not defined in component '{}'",
                    func.name, func.output_type, cid
                ));
            }
            for field in &func.inputs {
                if !defined.contains(field.type_ref.as_str()) {
                    errors.push(format!(
                        "Function '{}' input '{}' type_ref '{}' not defined in component '{}'",
                        func.name, field.name, field.type_ref, cid
                    ));
                }
            }
        }

        for type_spec in &contract.types {
            for field in &type_spec.fields {
                if !defined.contains(field.type_ref.as_str()) {
                    errors.push(format!(
                        "Type '{}' field '{}' type_ref '{}' not defined in component '{}'",
                        type_spec.name, field.name, field.type_ref, cid
                    ));
                }
            }
            if type_spec.kind == TypeKind::List
                && !type_spec.item_type.is_empty()
                && !defined.contains(type_spec.item_type.as_str())
            {
                errors.push(format!(
                    "Type '{}' item_type '{}' not defined in component '{}'",
                    type_spec.name, type_spec.item_type, cid
                ));
            }
        }

        errors
    }

    /// Check that the tree's child edges are acyclic. Three-color DFS from
    /// every unvisited node; a back-edge to a gray node is a cycle. A child
    /// id absent from the node map is reported but does not stop the walk.
    pub fn validate_dependency_graph(&self, tree: &DecompositionTree) -> Vec<String> {
        let mut errors = Vec::new();
        let mut color: HashMap<String, Color> = tree
            .nodes
            .keys()
            .map(|nid| (nid.clone(), Color::White))
            .collect();

        fn dfs(
            tree: &DecompositionTree,
            node_id: &str,
            path: &mut Vec<String>,
            color: &mut HashMap<String, Color>,
            errors: &mut Vec<String>,
        ) {
            color.insert(node_id.to_string(), Color::Gray);
            let Some(node) = tree.nodes.get(node_id) else {
                return;
            };
            for child_id in &node.children {
                match color.get(child_id) {
                    None => {
                        errors.push(format!(
                            "Child '{child_id}' of '{node_id}' not found in tree"
                        ));
                    }
                    Some(Color::Gray) => {
                        let mut cycle: Vec<&str> = path.iter().map(String::as_str).collect();
                        cycle.push(child_id);
                        errors.push(format!("Dependency cycle detected: {}", cycle.join(" -> ")));
                    }
                    Some(Color::White) => {
                        path.push(child_id.clone());
                        dfs(tree, child_id, path, color, errors);
                        path.pop();
                    }
                    Some(Color::Black) => {}
                }
            }
            color.insert(node_id.to_string(), Color::Black);
        }

        let node_ids: Vec<String> = tree.nodes.keys().cloned().collect();
        for node_id in node_ids {
            if color.get(&node_id) == Some(&Color::White) {
                let mut path = vec![node_id.clone()];
                dfs(tree, &node_id, &mut path, &mut color, &mut errors);
            }
        }

        errors
    }

    /// Check that a contract is minimally complete.
    pub fn validate_contract_completeness(&self, contract: &ComponentContract) -> Vec<String> {
        let mut errors = Vec::new();
        if contract.component_id.is_empty() {
            errors.push("Contract missing component_id".to_string());
        }
        if contract.name.is_empty() {
            errors.push("Contract missing name".to_string());
        }
        if contract.functions.is_empty() {
            errors.push(format!(
                "Contract '{}' has no functions defined",
                contract.component_id
            ));
        }
        for func in &contract.functions {
            if func.name.is_empty() {
                errors.push(format!(
                    "Function in '{}' missing name",
                    contract.component_id
                ));
            }
            if func.output_type.is_empty() {
                errors.push(format!(
                    "Function '{}' in '{}' missing output_type",
                    func.name, contract.component_id
                ));
            }
        }
        errors
    }

    /// Check that a test suite has cases and that any generated code holds
    /// together structurally.
    pub fn validate_test_suite(&self, suite: &ContractTestSuite) -> Vec<String> {
        let mut errors = Vec::new();
        if suite.component_id.is_empty() {
            errors.push("Test suite missing component_id".to_string());
        }
        if suite.test_cases.is_empty() {
            errors.push(format!(
                "Test suite for '{}' has no test cases",
                suite.component_id
            ));
        }
        if !suite.generated_code.is_empty() {
            if let Err(e) = scan_generated_code(&suite.generated_code) {
                errors.push(format!(
                    "Test suite for '{}' has syntax error in generated code: {e}",
                    suite.component_id
                ));
            }
        }
        errors
    }

    /// Full mechanical validation gate. No model, no persuasion.
    ///
    /// Checks, in order:
    /// 1. Tree child edges are acyclic.
    /// 2. Every tree node has a contract, and each contract is complete with
    ///    resolved type references.
    /// 3. Every tree node has a valid test suite.
    /// 4. Every internal dependency (an id that is a tree node) has its own
    ///    contract. Ids outside the tree are external libraries and pass
    ///    through unvalidated.
    ///
    /// All errors are collected; the gate never short-circuits.
    pub fn validate_all_contracts(
        &self,
        tree: &DecompositionTree,
        contracts: &BTreeMap<String, ComponentContract>,
        test_suites: &BTreeMap<String, ContractTestSuite>,
    ) -> GateResult {
        let mut all_errors = self.validate_dependency_graph(tree);

        for node_id in tree.nodes.keys() {
            let Some(contract) = contracts.get(node_id) else {
                all_errors.push(format!("Component '{node_id}' missing contract"));
                continue;
            };

            all_errors.extend(self.validate_contract_completeness(contract));
            all_errors.extend(self.validate_type_references(contract));

            match test_suites.get(node_id) {
                None => all_errors.push(format!("Component '{node_id}' missing test suite")),
                Some(suite) => all_errors.extend(self.validate_test_suite(suite)),
            }
        }

        for (cid, contract) in contracts {
            for dep_id in &contract.dependencies {
                if tree.nodes.contains_key(dep_id) && !contracts.contains_key(dep_id) {
                    all_errors.push(format!(
                        "Contract '{cid}' depends on '{dep_id}' which has no contract"
                    ));
                }
            }
        }

        if all_errors.is_empty() {
            GateResult::pass("All contracts validated successfully")
        } else {
            GateResult::fail(
                format!(
                    "Contract validation failed with {} error(s)",
                    all_errors.len()
                ),
                all_errors,
            )
        }
    }

    /// Advisory check that declared dependencies stay architecturally local.
    ///
    /// For every dependency edge between two tree nodes, measure the kinship
    /// distance: hops from each endpoint up to their nearest common ancestor,
    /// summed. Parent/child (1), sibling (2), and uncle/niece (3) edges are
    /// acceptable; longer edges produce a warning, never an error. External
    /// dependency ids are ignored.
    pub fn validate_hierarchy_locality(
        &self,
        tree: &DecompositionTree,
        contracts: &BTreeMap<String, ComponentContract>,
    ) -> Vec<String> {
        let mut warnings = Vec::new();
        for (cid, contract) in contracts {
            if !tree.nodes.contains_key(cid.as_str()) {
                continue;
            }
            for dep_id in &contract.dependencies {
                if !tree.nodes.contains_key(dep_id) {
                    continue;
                }
                match kinship(tree, cid, dep_id) {
                    Some((distance, ancestor)) if distance > self.locality_radius => {
                        warnings.push(format!(
                            "Distant dependency: '{cid}' -> '{dep_id}' \
                             ({distance} hops through nearest common ancestor '{ancestor}')"
                        ));
                    }
                    Some(_) => {}
                    None => warnings.push(format!(
                        "Distant dependency: '{cid}' -> '{dep_id}' (no common ancestor in tree)"
                    )),
                }
            }
        }
        warnings
    }
}

/// Kinship distance between two nodes: (hops from `a` + hops from `b` to
/// their nearest common ancestor, ancestor id). `None` if the nodes share no
/// ancestor, which only happens in a malformed forest.
fn kinship<'t>(tree: &'t DecompositionTree, a: &'t str, b: &'t str) -> Option<(usize, String)> {
    let mut hops_from_a: HashMap<&str, usize> = HashMap::new();
    let mut cur = a;
    let mut hops = 0;
    loop {
        if hops_from_a.contains_key(cur) {
            break;
        }
        hops_from_a.insert(cur, hops);
        match tree.nodes.get(cur) {
            Some(node) if !node.parent_id.is_empty() => {
                cur = &node.parent_id;
                hops += 1;
            }
            _ => break,
        }
    }

    let mut cur = b;
    let mut hops_b = 0;
    let mut seen: HashSet<&str> = HashSet::new();
    loop {
        if let Some(&hops_a) = hops_from_a.get(cur) {
            return Some((hops_a + hops_b, cur.to_string()));
        }
        if !seen.insert(cur) {
            return None;
        }
        match tree.nodes.get(cur) {
            Some(node) if !node.parent_id.is_empty() => {
                cur = &node.parent_id;
                hops_b += 1;
            }
            _ => return None,
        }
    }
}

/// Structural sanity scan over generated test code: brackets must balance
/// and strings and comments must terminate. Not a parser; it exists to catch
/// truncated or mangled generation output before anything tries to build it.
fn scan_generated_code(code: &str) -> Result<(), String> {
    let bytes = code.as_bytes();
    let mut stack: Vec<(u8, usize)> = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let start = i;
                let mut depth = 1;
                i += 2;
                while i < bytes.len() && depth > 0 {
                    if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'*') {
                        depth += 1;
                        i += 2;
                    } else if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
                        depth -= 1;
                        i += 2;
                    } else {
                        i += 1;
                    }
                }
                if depth > 0 {
                    return Err(format!("unterminated block comment at byte {start}"));
                }
            }
            b'r' if is_raw_string_start(bytes, i) => {
                let start = i;
                i += 1;
                let mut hashes = 0;
                while bytes.get(i) == Some(&b'#') {
                    hashes += 1;
                    i += 1;
                }
                i += 1; // opening quote
                let closer: Vec<u8> = std::iter::once(b'"')
                    .chain(std::iter::repeat_n(b'#', hashes))
                    .collect();
                match find_subslice(&bytes[i.min(bytes.len())..], &closer) {
                    Some(offset) => i += offset + closer.len(),
                    None => return Err(format!("unterminated raw string at byte {start}")),
                }
            }
            b'"' => {
                let start = i;
                i += 1;
                loop {
                    match bytes.get(i) {
                        None => return Err(format!("unterminated string at byte {start}")),
                        Some(b'\\') => i += 2,
                        Some(b'"') => {
                            i += 1;
                            break;
                        }
                        Some(_) => i += 1,
                    }
                }
            }
            b'\'' => {
                // Distinguish char literals from lifetimes: 'x' or '\n' is a
                // literal; 'a followed by anything but a quote is a lifetime.
                if bytes.get(i + 1) == Some(&b'\\') {
                    i += 2;
                    while i < bytes.len() && bytes[i] != b'\'' {
                        i += 1;
                    }
                    i += 1;
                } else if bytes.get(i + 2) == Some(&b'\'') {
                    i += 3;
                } else {
                    i += 1;
                }
            }
            open @ (b'(' | b'[' | b'{') => {
                stack.push((open, i));
                i += 1;
            }
            close @ (b')' | b']' | b'}') => {
                let expected = match close {
                    b')' => b'(',
                    b']' => b'[',
                    _ => b'{',
                };
                match stack.pop() {
                    Some((open, _)) if open == expected => {}
                    _ => {
                        return Err(format!(
                            "unbalanced '{}' at byte {i}",
                            char::from(close)
                        ))
                    }
                }
                i += 1;
            }
            _ => i += 1,
        }
    }

    if let Some((open, at)) = stack.pop() {
        return Err(format!(
            "unclosed '{}' opened at byte {at}",
            char::from(open)
        ));
    }
    Ok(())
}

/// A leading `r` opens a raw string only when it starts a token.
fn is_raw_string_start(bytes: &[u8], i: usize) -> bool {
    let token_start = i == 0 || (!bytes[i - 1].is_ascii_alphanumeric() && bytes[i - 1] != b'_');
    if !token_start {
        return false;
    }
    let mut j = i + 1;
    while bytes.get(j) == Some(&b'#') {
        j += 1;
    }
    bytes.get(j) == Some(&b'"')
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
