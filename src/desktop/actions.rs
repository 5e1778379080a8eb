//! Action primitives against a single tree node
//!
//! Every primitive checks the node's enabled gate before touching the
//! platform, and converts platform failures into [`PrimitiveError`] values.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use super::platform::{AccessibilityProvider, AttributeValue, AxError};
use super::types::ElementNode;

pub const AX_PRESS: &str = "AXPress";
pub const AX_CONFIRM: &str = "AXConfirm";
pub const AX_SHOW_MENU: &str = "AXShowMenu";
pub const AX_VALUE: &str = "AXValue";

/// How a primitive reached the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Performed {
    /// The requested action ran as-is
    Direct,
    /// The requested action was unavailable and `AXPress` ran instead
    Fallback,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrimitiveError {
    #[error("Element disabled: {element}")]
    Disabled { element: String },

    #[error("Element is not interactive: {element}")]
    NotInteractive { element: String },

    #[error("Failed to perform {action} on {element}: {source}")]
    Platform {
        action: String,
        element: String,
        #[source]
        source: AxError,
    },

    #[error("Failed to set value on {element}: {source}")]
    SetValue {
        element: String,
        #[source]
        source: AxError,
    },

    #[error("Value written but submit failed on {element} (confirm: {confirm}, press: {press})")]
    Submit {
        element: String,
        confirm: AxError,
        press: AxError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl ScrollDirection {
    pub fn action(self) -> &'static str {
        match self {
            ScrollDirection::Up => "AXScrollUpByPage",
            ScrollDirection::Down => "AXScrollDownByPage",
            ScrollDirection::Left => "AXScrollLeftByPage",
            ScrollDirection::Right => "AXScrollRightByPage",
        }
    }
}

fn gate(node: &ElementNode) -> Result<(), PrimitiveError> {
    if !node.is_enabled() {
        return Err(PrimitiveError::Disabled {
            element: node.to_string(),
        });
    }
    if !node.is_interactive {
        return Err(PrimitiveError::NotInteractive {
            element: node.to_string(),
        });
    }
    Ok(())
}

fn perform(ax: &dyn AccessibilityProvider, node: &ElementNode, action: &str) -> Result<(), PrimitiveError> {
    ax.perform_action(node.handle(), action).map_err(|source| {
        error!("Failed to perform {} on {}: {}", action, node, source);
        PrimitiveError::Platform {
            action: action.to_string(),
            element: node.to_string(),
            source,
        }
    })
}

/// Invoke the primary activation action
pub fn press(ax: &dyn AccessibilityProvider, node: &ElementNode) -> Result<(), PrimitiveError> {
    gate(node)?;
    perform(ax, node, AX_PRESS)?;
    info!("Successfully clicked element: {}", node);
    Ok(())
}

/// Write `text` into the value attribute, then optionally submit
///
/// Submitting tries `AXConfirm` and falls back to `AXPress` when confirm
/// is unsupported or fails.
pub fn set_value_and_optionally_submit(
    ax: &dyn AccessibilityProvider,
    node: &ElementNode,
    text: &str,
    submit: bool,
) -> Result<Performed, PrimitiveError> {
    gate(node)?;

    ax.set_attribute(node.handle(), AX_VALUE, &AttributeValue::from(text))
        .map_err(|source| {
            error!("Failed to set value on {}: {}", node, source);
            PrimitiveError::SetValue {
                element: node.to_string(),
                source,
            }
        })?;
    info!("Typed \"{}\" into {}", text, node);

    if !submit {
        return Ok(Performed::Direct);
    }

    let confirm = match ax.perform_action(node.handle(), AX_CONFIRM) {
        Ok(()) => return Ok(Performed::Direct),
        Err(e) => e,
    };

    warn!("Confirm action failed on {} ({}), falling back to {}", node, confirm, AX_PRESS);
    match ax.perform_action(node.handle(), AX_PRESS) {
        Ok(()) => Ok(Performed::Fallback),
        Err(press) => {
            error!("Submit failed on {}: confirm {}, press {}", node, confirm, press);
            Err(PrimitiveError::Submit {
                element: node.to_string(),
                confirm,
                press,
            })
        }
    }
}

/// Show the element's context menu, pressing it when no menu action is advertised
pub fn show_context_menu(ax: &dyn AccessibilityProvider, node: &ElementNode) -> Result<Performed, PrimitiveError> {
    gate(node)?;

    if node.supports_action(AX_SHOW_MENU) {
        perform(ax, node, AX_SHOW_MENU)?;
        info!("Opened context menu on {}", node);
        return Ok(Performed::Direct);
    }

    warn!("{} does not advertise {}, pressing instead", node, AX_SHOW_MENU);
    perform(ax, node, AX_PRESS)?;
    Ok(Performed::Fallback)
}

pub fn scroll(ax: &dyn AccessibilityProvider, node: &ElementNode, direction: ScrollDirection) -> Result<(), PrimitiveError> {
    gate(node)?;
    perform(ax, node, direction.action())?;
    info!("Scrolled {:?} on {}", direction, node);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::builder::{BuilderConfig, TreeBuilder};
    use crate::desktop::platform::scripted::{Interaction, ScriptedAccessibility};
    use crate::desktop::types::UiTree;
    use std::sync::Arc;

    /// One window with a single element of `role` advertising `actions`
    fn single(role: &str, actions: &[&str]) -> (Arc<ScriptedAccessibility>, u64, UiTree) {
        let ax = Arc::new(ScriptedAccessibility::new());
        let app = ax.add_application(3);
        let window = ax.add_element("AXWindow");
        ax.set_main_window(app, window);
        let element = ax.add_element(role);
        ax.set_actions(element, actions);
        ax.add_child(window, element);
        let tree = TreeBuilder::new(ax.clone(), BuilderConfig::default())
            .try_build(Some(3))
            .unwrap();
        (ax, element, tree)
    }

    #[test]
    fn test_press() {
        let (ax, button, tree) = single("AXButton", &["AXPress"]);
        let node = tree.node_for_index(0).unwrap();
        assert!(press(ax.as_ref(), node).is_ok());
        assert_eq!(ax.actions_on(button), vec!["AXPress"]);
    }

    #[test]
    fn test_press_platform_failure() {
        let (ax, button, tree) = single("AXButton", &["AXPress"]);
        ax.fail_action(button, "AXPress");
        let err = press(ax.as_ref(), tree.node_for_index(0).unwrap()).unwrap_err();
        assert!(matches!(err, PrimitiveError::Platform { source: AxError::Failure(_), .. }));
    }

    #[test]
    fn test_disabled_is_rejected_before_platform_call() {
        let ax = Arc::new(ScriptedAccessibility::new());
        let app = ax.add_application(3);
        let window = ax.add_element("AXWindow");
        ax.set_main_window(app, window);
        let field = ax.add_element("AXTextField");
        ax.set_actions(field, &["AXConfirm"]);
        ax.set_attribute_value(field, "AXEnabled", false);
        ax.add_child(window, field);
        let tree = TreeBuilder::new(ax.clone(), BuilderConfig::default())
            .try_build(Some(3))
            .unwrap();

        let err = set_value_and_optionally_submit(ax.as_ref(), tree.node_for_index(0).unwrap(), "x", true)
            .unwrap_err();
        assert!(matches!(err, PrimitiveError::Disabled { .. }));
        assert!(err.to_string().starts_with("Element disabled"));
        assert!(ax.interactions().is_empty());
    }

    #[test]
    fn test_submit_falls_back_to_press() {
        let (ax, field, tree) = single("AXTextField", &["AXPress"]);
        let performed =
            set_value_and_optionally_submit(ax.as_ref(), tree.node_for_index(0).unwrap(), "5", true).unwrap();

        assert_eq!(performed, Performed::Fallback);
        assert_eq!(
            ax.interactions(),
            vec![
                Interaction::SetAttribute {
                    element: field,
                    attribute: "AXValue".to_string(),
                    value: "5".to_string(),
                },
                Interaction::Action {
                    element: field,
                    action: "AXPress".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_submit_with_confirm() {
        let (ax, field, tree) = single("AXTextField", &["AXConfirm", "AXPress"]);
        let performed =
            set_value_and_optionally_submit(ax.as_ref(), tree.node_for_index(0).unwrap(), "5", true).unwrap();
        assert_eq!(performed, Performed::Direct);
        assert_eq!(ax.actions_on(field), vec!["AXConfirm"]);
    }

    #[test]
    fn test_submit_failure_keeps_value() {
        let (ax, field, tree) = single("AXTextField", &[]);
        let err = set_value_and_optionally_submit(ax.as_ref(), tree.node_for_index(0).unwrap(), "5", true)
            .unwrap_err();
        assert!(matches!(err, PrimitiveError::Submit { .. }));
        assert_eq!(ax.interactions().len(), 1);
        assert!(ax.actions_on(field).is_empty());
    }

    #[test]
    fn test_context_menu() {
        let (ax, cell, tree) = single("AXStaticText", &["AXShowMenu", "AXPress"]);
        let performed = show_context_menu(ax.as_ref(), tree.node_for_index(0).unwrap()).unwrap();
        assert_eq!(performed, Performed::Direct);
        assert_eq!(ax.actions_on(cell), vec!["AXShowMenu"]);

        let (ax, button, tree) = single("AXButton", &["AXPress"]);
        let performed = show_context_menu(ax.as_ref(), tree.node_for_index(0).unwrap()).unwrap();
        assert_eq!(performed, Performed::Fallback);
        assert_eq!(ax.actions_on(button), vec!["AXPress"]);
    }

    #[test]
    fn test_scroll() {
        let (ax, area, tree) = single("AXScrollArea", &["AXScrollDownByPage"]);
        scroll(ax.as_ref(), tree.node_for_index(0).unwrap(), ScrollDirection::Down).unwrap();
        assert_eq!(ax.actions_on(area), vec!["AXScrollDownByPage"]);

        let err = scroll(ax.as_ref(), tree.node_for_index(0).unwrap(), ScrollDirection::Up).unwrap_err();
        assert!(matches!(err, PrimitiveError::Platform { source: AxError::Unsupported, .. }));
    }

    #[test]
    fn test_scroll_direction_serde() {
        let d: ScrollDirection = serde_json::from_str("\"left\"").unwrap();
        assert_eq!(d, ScrollDirection::Left);
        assert!(serde_json::from_str::<ScrollDirection>("\"sideways\"").is_err());
    }
}
