//! Desktop accessibility module
//!
//! Walks a running application's accessibility graph into an indexed tree
//! and performs actions against its nodes.
//!
//! ## Architecture
//!
//! - `AccessibilityProvider` - Platform abstraction over the OS accessibility API
//! - `AttributeAccessor` - Attribute reads that never fail
//! - `TreeBuilder` - Bounded traversal into a `UiTree` with an `ElementRegistry`
//! - `actions` - Press / set value / context menu / scroll primitives
//! - `HostSystem` - Launching apps, listing running apps, running scripts
//!
//! ## Example
//!
//! ```rust,ignore
//! use axpilot::desktop::{create_provider, BuilderConfig, TreeBuilder};
//!
//! let builder = TreeBuilder::new(create_provider()?, BuilderConfig::default());
//! let tree = builder.build_with_timeout(pid).await?;
//! println!("{}", axpilot::desktop::serializer::clickable_elements_string(&tree));
//!
//! // Click the element at index 3
//! let node = tree.node_for_index(3).unwrap();
//! axpilot::desktop::actions::press(builder.provider().as_ref(), node)?;
//! ```

pub mod actions;
pub mod attributes;
pub mod builder;
pub mod host;
pub mod platform;
pub mod serializer;
pub mod types;

// Re-export main types
pub use attributes::AttributeAccessor;
pub use builder::{BuildError, BuilderConfig, TreeBuilder};
pub use host::{HostError, HostSystem, MacHost, RunningApp, ScriptedHost};
pub use platform::scripted::ScriptedAccessibility;
pub use platform::{
    check_accessibility_permissions, create_provider, AccessibilityProvider, AttributeValue, AxError,
    ElementHandle,
};
pub use types::{ElementIndex, ElementNode, ElementRegistry, NodeId, UiTree};
