use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::ops::Index;

use super::platform::ElementHandle;

/// 0-based index for LLM interaction, assigned in pre-order to interactive elements
pub type ElementIndex = usize;

/// Attributes promoted for display, in render order
pub const SALIENT_ATTRIBUTES: [&str; 3] = ["title", "value", "description"];

/// Role of the synthetic tree root
pub const APPLICATION_ROLE: &str = "application";

/// Position of a node inside its owning [`UiTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

/// One accessibility element captured during a build
#[derive(Debug, Clone)]
pub struct ElementNode {
    /// Platform role tag: AXButton, AXTextField, AXGroup, ...
    pub role: String,
    /// Sparse attribute bag; only non-empty values are kept
    pub attributes: BTreeMap<String, Value>,
    /// Derived from the platform's enabled signal, true when absent
    pub is_visible: bool,
    pub is_interactive: bool,
    /// Present iff the node is interactive
    pub index: Option<ElementIndex>,
    pub app_pid: i32,
    /// Platform action names the element advertised at build time
    pub actions: Vec<String>,
    id: NodeId,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    path: String,
    handle: ElementHandle,
}

impl ElementNode {
    pub fn new(role: impl Into<String>, handle: ElementHandle, app_pid: i32) -> Self {
        Self {
            role: role.into(),
            attributes: BTreeMap::new(),
            is_visible: true,
            is_interactive: false,
            index: None,
            app_pid,
            actions: Vec::new(),
            id: NodeId(0),
            parent: None,
            children: Vec::new(),
            path: String::new(),
            handle,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent_id(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn child_ids(&self) -> &[NodeId] {
        &self.children
    }

    /// Live platform reference, needed for action dispatch
    pub fn handle(&self) -> &ElementHandle {
        &self.handle
    }

    /// Whether the element reported itself enabled
    pub fn is_enabled(&self) -> bool {
        self.is_visible
    }

    pub fn supports_action(&self, action: &str) -> bool {
        self.actions.iter().any(|a| a == action)
    }

    /// Structural path from the root, e.g. `/AXWindow/AXGroup[2]/AXButton`
    pub fn accessibility_path(&self) -> &str {
        &self.path
    }

    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }

    /// ` title="…" value="…"` for whichever salient attributes are present
    pub fn salient_attributes(&self) -> String {
        let mut out = String::new();
        for key in SALIENT_ATTRIBUTES {
            if let Some(value) = self.attributes.get(key) {
                out.push_str(&format!(" {}=\"{}\"", key, display_value(value)));
            }
        }
        out
    }
}

impl fmt::Display for ElementNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}{}>", self.role, self.salient_attributes())?;

        let mut extras = Vec::new();
        if self.is_interactive {
            extras.push("interactive".to_string());
        }
        if let Some(index) = self.index {
            extras.push(format!("highlight:{}", index));
        }
        if !extras.is_empty() {
            write!(f, " [{}]", extras.join(", "))?;
        }
        Ok(())
    }
}

/// Strings render bare, everything else as JSON
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Map from index to node for one build
#[derive(Debug, Clone, Default)]
pub struct ElementRegistry {
    entries: BTreeMap<ElementIndex, NodeId>,
}

impl ElementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: ElementIndex) -> Option<NodeId> {
        self.entries.get(&index).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn indices(&self) -> impl Iterator<Item = ElementIndex> + '_ {
        self.entries.keys().copied()
    }

    /// Human-readable range of valid indices, used in error messages
    pub fn describe_range(&self) -> String {
        match self.entries.keys().next_back() {
            Some(last) => format!("0..={}", last),
            None => "none".to_string(),
        }
    }

    fn insert(&mut self, node: NodeId) -> ElementIndex {
        let index = self.entries.len();
        self.entries.insert(index, node);
        index
    }
}

/// Accessibility tree of one application window
///
/// Nodes live in an arena ordered by insertion. The builder inserts in
/// pre-order, so arena order is traversal order and registry indices are
/// dense from 0.
#[derive(Debug, Clone)]
pub struct UiTree {
    nodes: Vec<ElementNode>,
    registry: ElementRegistry,
    pid: i32,
}

impl UiTree {
    /// Start a tree with the synthetic application root
    pub fn new(pid: i32, app_handle: ElementHandle) -> Self {
        let mut root = ElementNode::new(APPLICATION_ROLE, app_handle, pid);
        root.path = "/".to_string();
        Self {
            nodes: vec![root],
            registry: ElementRegistry::new(),
            pid,
        }
    }

    /// Attach `node` as the last child of `parent`, assigning the next
    /// index when it is interactive.
    pub(crate) fn push_child(&mut self, parent: NodeId, mut node: ElementNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.id = id;
        node.parent = Some(parent);
        node.children.clear();
        node.index = None;

        if node.is_interactive {
            node.index = Some(self.registry.insert(id));
        }

        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Compute accessibility paths once the structure is final
    pub(crate) fn finish(mut self) -> Self {
        for i in 1..self.nodes.len() {
            let Some(parent) = self.nodes[i].parent else {
                continue;
            };
            let role = self.nodes[i].role.clone();
            let same_role: Vec<NodeId> = self.nodes[parent.0]
                .children
                .iter()
                .copied()
                .filter(|c| self.nodes[c.0].role == role)
                .collect();

            let component = if same_role.len() > 1 {
                let position = same_role.iter().position(|c| c.0 == i).unwrap_or(0) + 1;
                format!("{}[{}]", role, position)
            } else {
                role
            };

            let parent_path = &self.nodes[parent.0].path;
            let path = if parent_path == "/" {
                format!("/{}", component)
            } else {
                format!("{}/{}", parent_path, component)
            };
            self.nodes[i].path = path;
        }
        self
    }

    pub fn pid(&self) -> i32 {
        self.pid
    }

    pub fn root(&self) -> &ElementNode {
        &self.nodes[0]
    }

    pub fn get(&self, id: NodeId) -> Option<&ElementNode> {
        self.nodes.get(id.0)
    }

    pub fn parent(&self, node: &ElementNode) -> Option<&ElementNode> {
        node.parent.and_then(|p| self.get(p))
    }

    pub fn children<'a>(&'a self, node: &'a ElementNode) -> impl Iterator<Item = &'a ElementNode> + 'a {
        node.children.iter().filter_map(move |c| self.get(*c))
    }

    /// Number of ancestors between the node and the root
    pub fn depth(&self, node: &ElementNode) -> usize {
        let mut depth = 0;
        let mut current = node.parent;
        while let Some(p) = current {
            depth += 1;
            current = self.nodes[p.0].parent;
        }
        depth
    }

    /// All nodes in pre-order
    pub fn iter(&self) -> impl Iterator<Item = &ElementNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn registry(&self) -> &ElementRegistry {
        &self.registry
    }

    pub fn interactive_count(&self) -> usize {
        self.registry.len()
    }

    pub fn node_for_index(&self, index: ElementIndex) -> Option<&ElementNode> {
        self.registry.get(index).and_then(|id| self.get(id))
    }

    /// Interactive nodes in index order
    pub fn interactive_nodes(&self) -> impl Iterator<Item = &ElementNode> {
        self.registry.indices().filter_map(|i| self.node_for_index(i))
    }

    /// Path identities of every interactive node, used for drift checks
    pub fn interactive_paths(&self) -> HashSet<String> {
        self.interactive_nodes()
            .map(|n| n.accessibility_path().to_string())
            .collect()
    }

    pub fn find_by_path(&self, path: &str) -> Option<&ElementNode> {
        self.nodes.iter().find(|n| n.path == path)
    }
}

impl Index<NodeId> for UiTree {
    type Output = ElementNode;

    fn index(&self, id: NodeId) -> &ElementNode {
        &self.nodes[id.0]
    }
}
