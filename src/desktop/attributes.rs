use std::sync::Arc;

use super::platform::{AccessibilityProvider, AttributeValue, AxError, ElementHandle};

/// Outcome of a single platform query after classification
#[derive(Debug, Clone)]
pub enum Query<T> {
    Success(T),
    Unsupported,
    TransientFailure(AxError),
}

impl<T> Query<T> {
    pub fn classify(result: Result<T, AxError>) -> Self {
        match result {
            Ok(value) => Query::Success(value),
            Err(e) if e.is_unsupported() => Query::Unsupported,
            Err(e) => Query::TransientFailure(e),
        }
    }
}

/// Safe attribute reads
///
/// Never fails: unsupported attributes and failing queries read as absent
/// and are only logged at debug level.
#[derive(Clone)]
pub struct AttributeAccessor {
    provider: Arc<dyn AccessibilityProvider>,
}

impl AttributeAccessor {
    pub fn new(provider: Arc<dyn AccessibilityProvider>) -> Self {
        Self { provider }
    }

    pub fn get(&self, element: &ElementHandle, attribute: &str) -> Option<AttributeValue> {
        match Query::classify(self.provider.copy_attribute(element, attribute)) {
            Query::Success(value) => Some(value),
            Query::Unsupported => {
                tracing::debug!("Attribute '{}' is not supported for {:?}", attribute, element);
                None
            }
            Query::TransientFailure(e) => {
                tracing::debug!("Error getting attribute '{}' for {:?}: {}", attribute, element, e);
                None
            }
        }
    }

    /// Non-empty string attribute
    pub fn get_string(&self, element: &ElementHandle, attribute: &str) -> Option<String> {
        self.get(element, attribute)
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|s| !s.is_empty())
    }

    pub fn get_bool(&self, element: &ElementHandle, attribute: &str) -> Option<bool> {
        self.get(element, attribute).and_then(|v| v.as_bool())
    }

    pub fn get_element(&self, element: &ElementHandle, attribute: &str) -> Option<ElementHandle> {
        self.get(element, attribute).and_then(|v| v.as_element().cloned())
    }

    /// Element list attribute (children, windows); empty when absent.
    pub fn get_elements(&self, element: &ElementHandle, attribute: &str) -> Vec<ElementHandle> {
        self.get(element, attribute)
            .map(|v| v.elements())
            .unwrap_or_default()
    }

    /// Supported action names; empty when the query fails.
    pub fn actions(&self, element: &ElementHandle) -> Vec<String> {
        match Query::classify(self.provider.action_names(element)) {
            Query::Success(actions) => actions,
            Query::Unsupported => Vec::new(),
            Query::TransientFailure(e) => {
                tracing::debug!("Error getting actions for {:?}: {}", element, e);
                Vec::new()
            }
        }
    }
}
