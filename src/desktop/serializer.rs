use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::types::{display_value, ElementIndex, ElementNode, UiTree, SALIENT_ATTRIBUTES};

/// Format interactive elements for LLM consumption
///
/// One line per indexed node, in pre-order:
/// ```text
/// 0[:]<AXButton title="OK">
/// 1[:]<AXTextField value="42" description="Amount">
/// ```
pub fn clickable_elements_string(tree: &UiTree) -> String {
    tree.iter()
        .filter_map(|node| {
            node.index
                .map(|index| format!("{}[:]<{}{}>", index, node.role, node.salient_attributes()))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Full tree dump for diagnostics, indented by depth, with every attribute
pub fn verbose_tree_string(tree: &UiTree) -> String {
    let mut lines = Vec::with_capacity(tree.len());

    for node in tree.iter() {
        let indent = "  ".repeat(tree.depth(node));
        let mut line = format!("{}{}", indent, node);

        let extra: Vec<String> = node
            .attributes
            .iter()
            .filter(|(key, _)| !SALIENT_ATTRIBUTES.contains(&key.as_str()))
            .map(|(key, value)| format!("{}={}", key, truncate_str(&display_value(value), 60)))
            .collect();
        if !extra.is_empty() {
            line.push_str(&format!(" {{{}}}", extra.join(", ")));
        }

        if !node.is_enabled() {
            line.push_str(" (disabled)");
        }

        if !node.actions.is_empty() {
            line.push_str(&format!(" actions=[{}]", node.actions.join(", ")));
        }

        lines.push(line);
    }

    lines.join("\n")
}

/// JSON view of one interactive element
#[derive(Debug, Clone, Serialize)]
pub struct ElementSummary {
    pub index: ElementIndex,
    pub role: String,
    pub path: String,
    pub enabled: bool,
    pub attributes: BTreeMap<String, Value>,
    pub actions: Vec<String>,
}

impl ElementSummary {
    pub fn from_node(node: &ElementNode) -> Option<Self> {
        Some(Self {
            index: node.index?,
            role: node.role.clone(),
            path: node.accessibility_path().to_string(),
            enabled: node.is_enabled(),
            attributes: node.attributes.clone(),
            actions: node.actions.clone(),
        })
    }
}

pub fn summarize(tree: &UiTree) -> Vec<ElementSummary> {
    tree.interactive_nodes().filter_map(ElementSummary::from_node).collect()
}

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
