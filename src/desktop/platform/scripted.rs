//! In-memory accessibility graph
//!
//! Stands in for a live application when no desktop is available: tests and
//! dry runs script an element graph, then drive it through the same
//! [`AccessibilityProvider`] interface the platform backend implements.
//! Every performed action and attribute write is recorded so callers can
//! assert on what actually reached the "platform".

use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{AccessibilityProvider, AttributeValue, AxError, ElementHandle, PlatformElement};

pub type ElementId = u64;

const ERROR_FAILURE: i32 = -25200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptedElement {
    id: ElementId,
}

impl ScriptedElement {
    pub fn id(&self) -> ElementId {
        self.id
    }
}

impl PlatformElement for ScriptedElement {
    fn identity(&self) -> u64 {
        self.id
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Something that reached the scripted platform
#[derive(Debug, Clone, PartialEq)]
pub enum Interaction {
    Action { element: ElementId, action: String },
    SetAttribute { element: ElementId, attribute: String, value: String },
}

#[derive(Debug, Default)]
struct ElementData {
    role: Option<String>,
    attributes: BTreeMap<String, AttributeValue>,
    actions: Vec<String>,
    failing_actions: HashSet<String>,
    children: Vec<ElementId>,
    windows: Vec<ElementId>,
    main_window: Option<ElementId>,
}

#[derive(Debug, Default)]
struct Graph {
    elements: HashMap<ElementId, ElementData>,
    apps: HashMap<i32, ElementId>,
    next_id: ElementId,
    log: Vec<Interaction>,
}

impl Graph {
    fn element(&self, id: ElementId) -> Result<&ElementData, AxError> {
        self.elements.get(&id).ok_or(AxError::InvalidElement)
    }

    fn element_mut(&mut self, id: ElementId) -> Result<&mut ElementData, AxError> {
        self.elements.get_mut(&id).ok_or(AxError::InvalidElement)
    }
}

/// Scripted accessibility provider
#[derive(Debug)]
pub struct ScriptedAccessibility {
    graph: Mutex<Graph>,
    trusted: AtomicBool,
}

impl Default for ScriptedAccessibility {
    fn default() -> Self {
        Self::new()
    }
}

fn handle(id: ElementId) -> ElementHandle {
    Arc::new(ScriptedElement { id })
}

fn id_of(element: &ElementHandle) -> Result<ElementId, AxError> {
    element
        .as_any()
        .downcast_ref::<ScriptedElement>()
        .map(|e| e.id)
        .ok_or(AxError::InvalidElement)
}

fn element_list(ids: &[ElementId]) -> AttributeValue {
    AttributeValue::List(ids.iter().map(|id| AttributeValue::Element(handle(*id))).collect())
}

impl ScriptedAccessibility {
    pub fn new() -> Self {
        Self {
            graph: Mutex::new(Graph::default()),
            trusted: AtomicBool::new(true),
        }
    }

    fn graph(&self) -> MutexGuard<'_, Graph> {
        // A poisoned lock only means a test panicked mid-update; the graph
        // itself is still usable.
        self.graph.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Simulate the user granting or revoking accessibility access.
    pub fn set_trusted(&self, trusted: bool) {
        self.trusted.store(trusted, Ordering::SeqCst);
    }

    /// Create an element with a role and no parent.
    pub fn add_element(&self, role: &str) -> ElementId {
        let mut graph = self.graph();
        graph.next_id += 1;
        let id = graph.next_id;
        graph.elements.insert(
            id,
            ElementData {
                role: Some(role.to_string()),
                ..Default::default()
            },
        );
        id
    }

    /// Create an element whose role query fails.
    pub fn add_roleless_element(&self) -> ElementId {
        let id = self.add_element("");
        if let Ok(data) = self.graph().element_mut(id) {
            data.role = None;
        }
        id
    }

    /// Register a running application and return its application element.
    pub fn add_application(&self, pid: i32) -> ElementId {
        let id = self.add_element("AXApplication");
        self.graph().apps.insert(pid, id);
        id
    }

    /// Append `child` to `parent`'s children. The same child may be appended
    /// under several parents to model shared references.
    pub fn add_child(&self, parent: ElementId, child: ElementId) {
        if let Ok(data) = self.graph().element_mut(parent) {
            data.children.push(child);
        }
    }

    pub fn add_window(&self, app: ElementId, window: ElementId) {
        if let Ok(data) = self.graph().element_mut(app) {
            data.windows.push(window);
        }
    }

    pub fn set_main_window(&self, app: ElementId, window: ElementId) {
        if let Ok(data) = self.graph().element_mut(app) {
            data.main_window = Some(window);
        }
    }

    pub fn set_attribute_value(&self, element: ElementId, attribute: &str, value: impl Into<AttributeValue>) {
        if let Ok(data) = self.graph().element_mut(element) {
            data.attributes.insert(attribute.to_string(), value.into());
        }
    }

    pub fn set_actions(&self, element: ElementId, actions: &[&str]) {
        if let Ok(data) = self.graph().element_mut(element) {
            data.actions = actions.iter().map(|a| a.to_string()).collect();
        }
    }

    /// Make an advertised action fail when performed.
    pub fn fail_action(&self, element: ElementId, action: &str) {
        if let Ok(data) = self.graph().element_mut(element) {
            data.failing_actions.insert(action.to_string());
        }
    }

    /// Drop an element as if the application released it.
    pub fn remove_element(&self, element: ElementId) {
        self.graph().elements.remove(&element);
    }

    /// Everything performed against the graph so far, in order.
    pub fn interactions(&self) -> Vec<Interaction> {
        self.graph().log.clone()
    }

    /// Actions performed against a single element, in order.
    pub fn actions_on(&self, element: ElementId) -> Vec<String> {
        self.graph()
            .log
            .iter()
            .filter_map(|i| match i {
                Interaction::Action { element: e, action } if *e == element => Some(action.clone()),
                _ => None,
            })
            .collect()
    }

    fn ensure_trusted(&self) -> Result<(), AxError> {
        if self.trusted.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AxError::ApiDisabled)
        }
    }
}

impl AccessibilityProvider for ScriptedAccessibility {
    fn is_trusted(&self) -> bool {
        self.trusted.load(Ordering::SeqCst)
    }

    fn application(&self, pid: i32) -> Result<ElementHandle, AxError> {
        let graph = self.graph();
        graph.apps.get(&pid).map(|id| handle(*id)).ok_or(AxError::InvalidElement)
    }

    fn copy_attribute(&self, element: &ElementHandle, attribute: &str) -> Result<AttributeValue, AxError> {
        self.ensure_trusted()?;
        let id = id_of(element)?;
        let graph = self.graph();
        let data = graph.element(id)?;

        match attribute {
            "AXRole" => data.role.clone().map(AttributeValue::Text).ok_or(AxError::Unsupported),
            "AXChildren" => Ok(element_list(&data.children)),
            "AXWindows" => Ok(element_list(&data.windows)),
            "AXMainWindow" => data
                .main_window
                .map(|w| AttributeValue::Element(handle(w)))
                .ok_or(AxError::NoValue),
            other => data.attributes.get(other).cloned().ok_or(AxError::Unsupported),
        }
    }

    fn action_names(&self, element: &ElementHandle) -> Result<Vec<String>, AxError> {
        self.ensure_trusted()?;
        let id = id_of(element)?;
        Ok(self.graph().element(id)?.actions.clone())
    }

    fn perform_action(&self, element: &ElementHandle, action: &str) -> Result<(), AxError> {
        self.ensure_trusted()?;
        let id = id_of(element)?;
        let mut graph = self.graph();
        let data = graph.element(id)?;

        if !data.actions.iter().any(|a| a == action) {
            return Err(AxError::Unsupported);
        }
        if data.failing_actions.contains(action) {
            return Err(AxError::Failure(ERROR_FAILURE));
        }

        graph.log.push(Interaction::Action {
            element: id,
            action: action.to_string(),
        });
        Ok(())
    }

    fn set_attribute(&self, element: &ElementHandle, attribute: &str, value: &AttributeValue) -> Result<(), AxError> {
        self.ensure_trusted()?;
        let id = id_of(element)?;
        let mut graph = self.graph();
        let data = graph.element_mut(id)?;

        if data.failing_actions.contains(attribute) {
            return Err(AxError::Failure(ERROR_FAILURE));
        }
        data.attributes.insert(attribute.to_string(), value.clone());

        let rendered = match value {
            AttributeValue::Text(s) => s.clone(),
            other => format!("{:?}", other),
        };
        graph.log.push(Interaction::SetAttribute {
            element: id,
            attribute: attribute.to_string(),
            value: rendered,
        });
        Ok(())
    }
}
