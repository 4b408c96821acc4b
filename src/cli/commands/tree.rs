//! Implementation of the `covenant tree` command.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::cli::output::{output, status_icon, CommandOutput};
use crate::infrastructure::ProjectStore;

#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Project directory
    #[arg(default_value = ".")]
    pub project_dir: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct TreeTestSummary {
    pub passed: u32,
    pub total: u32,
}

#[derive(Debug, serde::Serialize)]
pub struct TreeNodeEntry {
    pub id: String,
    pub name: String,
    pub status: String,
    pub depth: u32,
    pub parent_id: String,
    pub children: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_results: Option<TreeTestSummary>,
}

#[derive(Debug, serde::Serialize)]
pub struct TreeOutput {
    pub success: bool,
    pub tree_found: bool,
    pub root_id: String,
    pub nodes: Vec<TreeNodeEntry>,
}

impl TreeOutput {
    fn render(
        &self,
        by_id: &BTreeMap<&str, &TreeNodeEntry>,
        node_id: &str,
        prefix: &str,
        is_last: bool,
        is_root: bool,
        lines: &mut Vec<String>,
    ) {
        let Some(node) = by_id.get(node_id) else {
            return;
        };

        let connector = if is_root {
            ""
        } else if is_last {
            "\u{2514}\u{2500}\u{2500} "
        } else {
            "\u{251c}\u{2500}\u{2500} "
        };
        lines.push(format!(
            "{prefix}{connector}{} {} ({})",
            status_icon(&node.status),
            node.name,
            node.id
        ));

        // The root contributes no trunk column; its children start at the
        // margin.
        let child_prefix = if is_root {
            String::new()
        } else if is_last {
            format!("{prefix}    ")
        } else {
            format!("{prefix}\u{2502}   ")
        };

        if let Some(results) = &node.test_results {
            if results.total > 0 {
                let results_prefix = if is_root { "    " } else { child_prefix.as_str() };
                lines.push(format!(
                    "{results_prefix}{}/{} tests passed",
                    results.passed, results.total
                ));
            }
        }

        for (index, child_id) in node.children.iter().enumerate() {
            let child_is_last = index == node.children.len() - 1;
            self.render(by_id, child_id, &child_prefix, child_is_last, false, lines);
        }
    }
}

impl CommandOutput for TreeOutput {
    fn to_human(&self) -> String {
        if !self.tree_found {
            return "No decomposition tree found. Run decomposition first.".to_string();
        }
        let by_id: BTreeMap<&str, &TreeNodeEntry> =
            self.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
        let mut lines = Vec::new();
        self.render(&by_id, &self.root_id, "", true, true, &mut lines);
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: TreeArgs, json_mode: bool) -> Result<()> {
    let store = ProjectStore::new(&args.project_dir);

    let Some(tree) = store.load_tree()? else {
        let output_data = TreeOutput {
            success: false,
            tree_found: false,
            root_id: String::new(),
            nodes: Vec::new(),
        };
        output(&output_data, json_mode);
        return Ok(());
    };

    let nodes = tree
        .nodes
        .values()
        .map(|node| TreeNodeEntry {
            id: node.component_id.clone(),
            name: node.name.clone(),
            status: node.implementation_status.as_str().to_string(),
            depth: node.depth,
            parent_id: node.parent_id.clone(),
            children: node.children.clone(),
            test_results: node.test_results.as_ref().map(|r| TreeTestSummary {
                passed: r.passed,
                total: r.total,
            }),
        })
        .collect();

    let output_data = TreeOutput {
        success: true,
        tree_found: true,
        root_id: tree.root_id,
        nodes,
    };
    output(&output_data, json_mode);
    Ok(())
}
