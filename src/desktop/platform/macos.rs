#![cfg(target_os = "macos")]

use std::any::Any;
use std::fmt;
use std::ptr;
use std::sync::Arc;

use accessibility_sys::{
    kAXErrorAPIDisabled, kAXErrorActionUnsupported, kAXErrorAttributeUnsupported,
    kAXErrorInvalidUIElement, kAXErrorNoValue, kAXErrorParameterizedAttributeUnsupported,
    kAXErrorSuccess, AXError as RawAXError, AXIsProcessTrusted, AXUIElementCopyActionNames,
    AXUIElementCopyAttributeValue, AXUIElementCreateApplication, AXUIElementGetTypeID,
    AXUIElementPerformAction, AXUIElementRef, AXUIElementSetAttributeValue,
};
use core_foundation::array::{CFArray, CFArrayRef};
use core_foundation::base::{CFHash, CFRelease, CFRetain, CFType, CFTypeRef, TCFType};
use core_foundation::boolean::CFBoolean;
use core_foundation::number::CFNumber;
use core_foundation::string::CFString;

use super::{AccessibilityProvider, AttributeValue, AxError, ElementHandle, PlatformElement};

/// Retained `AXUIElementRef`
pub struct MacElement {
    raw: AXUIElementRef,
}

// AXUIElement references are CF objects; retain/release and AX queries are
// safe from any thread.
unsafe impl Send for MacElement {}
unsafe impl Sync for MacElement {}

impl MacElement {
    /// Takes ownership of a reference obtained under the create rule.
    fn from_create_rule(raw: AXUIElementRef) -> Self {
        Self { raw }
    }

    /// Retains a borrowed reference.
    fn from_get_rule(raw: AXUIElementRef) -> Self {
        unsafe { CFRetain(raw as CFTypeRef) };
        Self { raw }
    }
}

impl Drop for MacElement {
    fn drop(&mut self) {
        unsafe { CFRelease(self.raw as CFTypeRef) }
    }
}

impl fmt::Debug for MacElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AXUIElement({:#x})", self.identity())
    }
}

impl PlatformElement for MacElement {
    fn identity(&self) -> u64 {
        unsafe { CFHash(self.raw as CFTypeRef) as u64 }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// macOS Accessibility API provider
///
/// Uses the macOS Accessibility API (AX) to enumerate and interact with UI elements.
/// Requires accessibility permissions to be granted to the application.
#[derive(Debug, Default)]
pub struct MacAccessibility;

impl MacAccessibility {
    pub fn new() -> Self {
        if !check_accessibility_permissions() {
            tracing::warn!("Accessibility permissions not granted. Tree builds will be denied.");
        }
        Self
    }
}

fn check(code: RawAXError) -> Result<(), AxError> {
    match code {
        kAXErrorSuccess => Ok(()),
        kAXErrorAttributeUnsupported
        | kAXErrorActionUnsupported
        | kAXErrorParameterizedAttributeUnsupported => Err(AxError::Unsupported),
        kAXErrorNoValue => Err(AxError::NoValue),
        kAXErrorAPIDisabled => Err(AxError::ApiDisabled),
        kAXErrorInvalidUIElement => Err(AxError::InvalidElement),
        other => Err(AxError::Failure(other)),
    }
}

fn raw_element(element: &ElementHandle) -> Result<AXUIElementRef, AxError> {
    element
        .as_any()
        .downcast_ref::<MacElement>()
        .map(|e| e.raw)
        .ok_or(AxError::InvalidElement)
}

/// Convert a borrowed CF value into an attribute value.
unsafe fn convert(value: CFTypeRef) -> AttributeValue {
    let cf = CFType::wrap_under_get_rule(value);
    let type_id = cf.type_of();

    if type_id == CFString::type_id() {
        AttributeValue::Text(CFString::wrap_under_get_rule(value as _).to_string())
    } else if type_id == CFBoolean::type_id() {
        AttributeValue::Bool(CFBoolean::wrap_under_get_rule(value as _).into())
    } else if type_id == CFNumber::type_id() {
        let number = CFNumber::wrap_under_get_rule(value as _);
        AttributeValue::Number(number.to_f64().unwrap_or_default())
    } else if type_id == AXUIElementGetTypeID() {
        AttributeValue::Element(Arc::new(MacElement::from_get_rule(value as AXUIElementRef)))
    } else if type_id == CFArray::<CFType>::type_id() {
        let array = CFArray::<CFType>::wrap_under_get_rule(value as CFArrayRef);
        AttributeValue::List(array.iter().map(|item| convert(item.as_CFTypeRef())).collect())
    } else {
        AttributeValue::Opaque(format!("{:?}", cf))
    }
}

impl AccessibilityProvider for MacAccessibility {
    fn is_trusted(&self) -> bool {
        check_accessibility_permissions()
    }

    fn application(&self, pid: i32) -> Result<ElementHandle, AxError> {
        let raw = unsafe { AXUIElementCreateApplication(pid) };
        if raw.is_null() {
            return Err(AxError::InvalidElement);
        }
        Ok(Arc::new(MacElement::from_create_rule(raw)))
    }

    fn copy_attribute(&self, element: &ElementHandle, attribute: &str) -> Result<AttributeValue, AxError> {
        let raw = raw_element(element)?;
        let name = CFString::new(attribute);
        let mut value: CFTypeRef = ptr::null();

        check(unsafe { AXUIElementCopyAttributeValue(raw, name.as_concrete_TypeRef(), &mut value) })?;
        if value.is_null() {
            return Err(AxError::NoValue);
        }

        // Copy follows the create rule; the wrapper releases it on drop.
        let owned = unsafe { CFType::wrap_under_create_rule(value) };
        Ok(unsafe { convert(owned.as_CFTypeRef()) })
    }

    fn action_names(&self, element: &ElementHandle) -> Result<Vec<String>, AxError> {
        let raw = raw_element(element)?;
        let mut names: CFArrayRef = ptr::null();

        check(unsafe { AXUIElementCopyActionNames(raw, &mut names) })?;
        if names.is_null() {
            return Ok(Vec::new());
        }

        let names = unsafe { CFArray::<CFString>::wrap_under_create_rule(names) };
        Ok(names.iter().map(|name| name.to_string()).collect())
    }

    fn perform_action(&self, element: &ElementHandle, action: &str) -> Result<(), AxError> {
        let raw = raw_element(element)?;
        let action = CFString::new(action);
        check(unsafe { AXUIElementPerformAction(raw, action.as_concrete_TypeRef()) })
    }

    fn set_attribute(&self, element: &ElementHandle, attribute: &str, value: &AttributeValue) -> Result<(), AxError> {
        let raw = raw_element(element)?;
        let name = CFString::new(attribute);

        let value: CFType = match value {
            AttributeValue::Text(s) => CFString::new(s).as_CFType(),
            AttributeValue::Bool(b) => {
                if *b {
                    CFBoolean::true_value().as_CFType()
                } else {
                    CFBoolean::false_value().as_CFType()
                }
            }
            AttributeValue::Number(n) => CFNumber::from(*n).as_CFType(),
            _ => return Err(AxError::Unsupported),
        };

        check(unsafe {
            AXUIElementSetAttributeValue(raw, name.as_concrete_TypeRef(), value.as_CFTypeRef())
        })
    }
}

/// Check if accessibility permissions are granted
///
/// On macOS, applications need explicit user permission to use accessibility APIs.
pub fn check_accessibility_permissions() -> bool {
    unsafe { AXIsProcessTrusted() }
}
