use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use super::attributes::AttributeAccessor;
use super::platform::{AccessibilityProvider, AxError, ElementHandle};
use super::types::{ElementNode, NodeId, UiTree};

/// Roles that are always interactive regardless of advertised actions
pub const INTERACTIVE_ROLES: &[&str] = &[
    "AXButton",
    "AXTextField",
    "AXCheckBox",
    "AXRadioButton",
    "AXComboBox",
    "AXMenuButton",
    "AXTextArea",
    "AXPopUpButton",
];

/// Extra attributes merged into nodes when extended attributes are enabled
pub const AX_EXTENDED_ATTRIBUTES: &[&str] = &[
    "AXARIALive",
    "AXDOMIdentifier",
    "AXDOMClassList",
    "AXEdited",
    "AXElementBusy",
    "AXFocused",
    "AXFullScreen",
    "AXHasPopup",
    "AXHelp",
    "AXIdentifier",
    "AXInvalid",
    "AXLanguage",
    "AXLoaded",
    "AXMain",
    "AXMaxValue",
    "AXMinValue",
    "AXMinimized",
    "AXModal",
    "AXNumberOfCharacters",
    "AXOrientation",
    "AXPlaceholderValue",
    "AXRequired",
    "AXRoleDescription",
    "AXSelected",
    "AXStandardWindow",
    "AXSubrole",
    "AXURL",
    "AXValueAutofillAvailable",
    "AXVisited",
];

const ROLE: &str = "AXRole";
const TITLE: &str = "AXTitle";
const VALUE: &str = "AXValue";
const DESCRIPTION: &str = "AXDescription";
const ENABLED: &str = "AXEnabled";
const CHILDREN: &str = "AXChildren";
const MAIN_WINDOW: &str = "AXMainWindow";
const WINDOWS: &str = "AXWindows";

#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Deepest level whose children are still visited
    pub max_depth: usize,
    /// Children visited per node; the rest are dropped
    pub max_children: usize,
    pub extended_attributes: bool,
    /// Deadline for [`TreeBuilder::build_with_timeout`]
    pub timeout: Duration,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_children: 50,
            extended_attributes: false,
            timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("No app is currently open")]
    NoProcess,

    #[error(
        "Accessibility access denied for pid {pid}. Enable it for this program in \
         System Settings > Privacy & Security > Accessibility"
    )]
    PermissionDenied { pid: i32 },

    #[error("Process {pid} not found: {source}")]
    ProcessNotFound {
        pid: i32,
        #[source]
        source: AxError,
    },

    #[error("Could not determine a main window for pid {pid}")]
    NoMainWindow { pid: i32 },

    #[error("Building the tree for pid {pid} timed out after {elapsed:?}")]
    Timeout { pid: i32, elapsed: Duration },

    #[error("Build task failed: {0}")]
    Join(String),
}

impl BuildError {
    pub fn is_permission(&self) -> bool {
        matches!(self, BuildError::PermissionDenied { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BuildError::NoProcess | BuildError::ProcessNotFound { .. } | BuildError::NoMainWindow { .. }
        )
    }
}

/// Walks an application's accessibility graph into a [`UiTree`]
///
/// Each build owns its own visited set and registry, so builders can be
/// cloned freely and run against different processes at the same time.
#[derive(Clone)]
pub struct TreeBuilder {
    provider: Arc<dyn AccessibilityProvider>,
    accessor: AttributeAccessor,
    config: BuilderConfig,
}

/// State of a single traversal pass
struct Pass {
    tree: UiTree,
    visited: HashSet<u64>,
    pid: i32,
}

impl TreeBuilder {
    pub fn new(provider: Arc<dyn AccessibilityProvider>, config: BuilderConfig) -> Self {
        Self {
            accessor: AttributeAccessor::new(provider.clone()),
            provider,
            config,
        }
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub fn provider(&self) -> &Arc<dyn AccessibilityProvider> {
        &self.provider
    }

    /// Build the tree for `pid`, or `None` when it cannot be built
    pub fn build(&self, pid: Option<i32>) -> Option<UiTree> {
        match self.try_build(pid) {
            Ok(tree) => Some(tree),
            Err(BuildError::NoProcess) => {
                debug!("No app is currently open - waiting for app to be launched");
                None
            }
            Err(e) => {
                error!("Error building tree: {}", e);
                None
            }
        }
    }

    /// Build the tree for `pid`, reporting why it failed
    #[instrument(skip(self))]
    pub fn try_build(&self, pid: Option<i32>) -> Result<UiTree, BuildError> {
        let pid = pid.ok_or(BuildError::NoProcess)?;
        let started = Instant::now();

        if !self.provider.is_trusted() {
            return Err(BuildError::PermissionDenied { pid });
        }

        debug!("Creating AX element for pid {}", pid);
        let app = self
            .provider
            .application(pid)
            .map_err(|source| BuildError::ProcessNotFound { pid, source })?;

        debug!("Testing accessibility permissions (Role)...");
        match self.provider.copy_attribute(&app, ROLE) {
            Ok(_) => {}
            Err(AxError::ApiDisabled) => return Err(BuildError::PermissionDenied { pid }),
            Err(source) => return Err(BuildError::ProcessNotFound { pid, source }),
        }

        let window = self.main_window(&app).ok_or(BuildError::NoMainWindow { pid })?;

        let mut pass = Pass {
            tree: UiTree::new(pid, app.clone()),
            visited: HashSet::new(),
            pid,
        };
        pass.visited.insert(app.identity());

        let root = pass.tree.root().id();
        self.process_element(&mut pass, &window, root, None, 0);

        let tree = pass.tree.finish();
        info!(
            "Built tree for pid {}: {} nodes, {} interactive in {:?}",
            pid,
            tree.len(),
            tree.interactive_count(),
            started.elapsed()
        );
        Ok(tree)
    }

    /// Build on a blocking thread, racing a deadline
    ///
    /// A traversal that misses the deadline keeps running in the background
    /// and its result is dropped; no partial tree is ever returned.
    pub async fn build_with_timeout(&self, pid: i32) -> Result<UiTree, BuildError> {
        let builder = self.clone();
        let started = Instant::now();
        let task = tokio::task::spawn_blocking(move || builder.try_build(Some(pid)));

        match tokio::time::timeout(self.config.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(BuildError::Join(join.to_string())),
            Err(_) => {
                warn!("Tree build for pid {} exceeded {:?}, discarding", pid, self.config.timeout);
                Err(BuildError::Timeout {
                    pid,
                    elapsed: started.elapsed(),
                })
            }
        }
    }

    /// Main window, falling back to the first entry of the window list
    fn main_window(&self, app: &ElementHandle) -> Option<ElementHandle> {
        if let Some(window) = self.accessor.get_element(app, MAIN_WINDOW) {
            return Some(window);
        }

        warn!("Could not get main window, trying fallback attribute {}", WINDOWS);
        let window = self.accessor.get_elements(app, WINDOWS).into_iter().next();
        if window.is_none() {
            error!("Could not determine a main window for the application.");
        }
        window
    }

    fn process_element(
        &self,
        pass: &mut Pass,
        element: &ElementHandle,
        parent: NodeId,
        parent_role: Option<&str>,
        depth: usize,
    ) {
        let identity = element.identity();
        if !pass.visited.insert(identity) {
            debug!("Skipping already processed element {:#x}", identity);
            return;
        }

        let Some(role) = self.accessor.get_string(element, ROLE) else {
            debug!("No role found, skipping element");
            return;
        };

        let mut node = ElementNode::new(role.clone(), element.clone(), pass.pid);
        self.collect_attributes(element, &mut node);
        node.actions = self.accessor.actions(element);
        node.is_interactive = is_interactive(&role, parent_role, &node.actions);

        let id = pass.tree.push_child(parent, node);
        debug!("Processed {} at depth {} (index {:?})", role, depth, pass.tree.get(id).and_then(|n| n.index));

        if depth >= self.config.max_depth {
            debug!("Maximum recursion depth ({}) reached, skipping children", self.config.max_depth);
            return;
        }

        let mut children = self.accessor.get_elements(element, CHILDREN);
        if children.len() > self.config.max_children {
            debug!(
                "Limiting processing of children from {} to {}",
                children.len(),
                self.config.max_children
            );
            children.truncate(self.config.max_children);
        }

        for child in &children {
            self.process_element(pass, child, id, Some(role.as_str()), depth + 1);
        }
    }

    fn collect_attributes(&self, element: &ElementHandle, node: &mut ElementNode) {
        for (key, attribute) in [("title", TITLE), ("value", VALUE), ("description", DESCRIPTION)] {
            if let Some(value) = self.accessor.get(element, attribute).and_then(|v| v.to_json()) {
                node.attributes.insert(key.to_string(), value);
            }
        }

        if let Some(enabled) = self.accessor.get_bool(element, ENABLED) {
            node.is_visible = enabled;
        }

        if self.config.extended_attributes {
            for attribute in AX_EXTENDED_ATTRIBUTES {
                if let Some(value) = self.accessor.get(element, attribute).and_then(|v| v.to_json()) {
                    node.attributes.insert((*attribute).to_string(), value);
                }
            }
        }
    }
}

/// Interactive iff the role is allow-listed or the element advertises an
/// action, except table cells directly inside a row.
pub fn is_interactive(role: &str, parent_role: Option<&str>, actions: &[String]) -> bool {
    if role == "AXCell" && parent_role == Some("AXRow") {
        return false;
    }
    INTERACTIVE_ROLES.contains(&role) || !actions.is_empty()
}
