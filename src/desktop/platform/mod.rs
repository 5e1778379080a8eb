use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

#[cfg(target_os = "macos")]
pub mod macos;

pub mod scripted;

/// Failure reported by a platform accessibility call.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxError {
    #[error("not supported by this element")]
    Unsupported,
    #[error("element has no value for this attribute")]
    NoValue,
    #[error("accessibility API is disabled for this process")]
    ApiDisabled,
    #[error("element reference is no longer valid")]
    InvalidElement,
    #[error("platform call failed (code {0})")]
    Failure(i32),
}

impl AxError {
    /// Whether the element simply does not offer the attribute or action.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, AxError::Unsupported | AxError::NoValue)
    }
}

/// Opaque reference to a live element owned by the platform.
pub trait PlatformElement: Send + Sync + fmt::Debug {
    /// Identity of the underlying element. Two handles to the same live
    /// element report the same identity within one process.
    fn identity(&self) -> u64;

    fn as_any(&self) -> &dyn Any;
}

pub type ElementHandle = Arc<dyn PlatformElement>;

/// Value of an accessibility attribute as returned by the platform
#[derive(Debug, Clone)]
pub enum AttributeValue {
    Text(String),
    Bool(bool),
    Number(f64),
    Element(ElementHandle),
    List(Vec<AttributeValue>),
    /// A platform value with no structured mapping (points, ranges, ...)
    Opaque(String),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            AttributeValue::Number(n) => Some(*n != 0.0),
            _ => None,
        }
    }

    pub fn as_element(&self) -> Option<&ElementHandle> {
        match self {
            AttributeValue::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Element references contained in a list value, in order.
    pub fn elements(&self) -> Vec<ElementHandle> {
        match self {
            AttributeValue::List(items) => items
                .iter()
                .filter_map(|item| item.as_element().cloned())
                .collect(),
            AttributeValue::Element(e) => vec![Arc::clone(e)],
            _ => Vec::new(),
        }
    }

    /// JSON form kept on tree nodes. Element references and empty values
    /// have no JSON form.
    pub fn to_json(&self) -> Option<Value> {
        match self {
            AttributeValue::Text(s) if s.is_empty() => None,
            AttributeValue::Text(s) => Some(Value::String(s.clone())),
            AttributeValue::Bool(b) => Some(Value::Bool(*b)),
            AttributeValue::Number(n) => serde_json::Number::from_f64(*n).map(Value::Number),
            AttributeValue::Element(_) => None,
            AttributeValue::List(items) => {
                let values: Vec<Value> = items.iter().filter_map(|v| v.to_json()).collect();
                if values.is_empty() {
                    None
                } else {
                    Some(Value::Array(values))
                }
            }
            AttributeValue::Opaque(s) if s.is_empty() => None,
            AttributeValue::Opaque(s) => Some(Value::String(s.clone())),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::Text(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::Text(s)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        AttributeValue::Bool(b)
    }
}

/// Platform-specific accessibility provider trait
///
/// Thin, synchronous wrapper over the OS accessibility primitives. Calls
/// against one process are not assumed safe to run concurrently, so callers
/// drive a provider from a single flow of control per build or action run.
pub trait AccessibilityProvider: Send + Sync {
    /// Whether this process is trusted to use the accessibility API
    fn is_trusted(&self) -> bool;

    /// Application element for a process id
    fn application(&self, pid: i32) -> Result<ElementHandle, AxError>;

    fn copy_attribute(&self, element: &ElementHandle, attribute: &str) -> Result<AttributeValue, AxError>;

    fn action_names(&self, element: &ElementHandle) -> Result<Vec<String>, AxError>;

    fn perform_action(&self, element: &ElementHandle, action: &str) -> Result<(), AxError>;

    fn set_attribute(&self, element: &ElementHandle, attribute: &str, value: &AttributeValue) -> Result<(), AxError>;
}

/// Create the platform-specific accessibility provider
pub fn create_provider() -> anyhow::Result<Arc<dyn AccessibilityProvider>> {
    #[cfg(target_os = "macos")]
    {
        Ok(Arc::new(macos::MacAccessibility::new()))
    }

    #[cfg(not(target_os = "macos"))]
    {
        Err(anyhow::anyhow!("Unsupported platform for accessibility"))
    }
}

/// Check if accessibility features are available and enabled
pub fn check_accessibility_permissions() -> bool {
    #[cfg(target_os = "macos")]
    {
        macos::check_accessibility_permissions()
    }

    #[cfg(not(target_os = "macos"))]
    {
        false
    }
}
