// Tools module - action registry, action context and the default desktop actions

pub mod context;
pub mod desktop_tools;
pub mod registry;

pub use context::{ActionContext, DesktopSession, ResolvedElement, SessionError};
pub use desktop_tools::{default_registry, register_desktop_actions};
pub use registry::*;
