use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::desktop::{AccessibilityProvider, HostSystem, TreeBuilder};
use crate::runs::MultiActExecutor;
use crate::tools::{default_registry, ActionContext, DesktopSession};

/// Shared application state
pub struct AppState {
    pub config: Config,

    pub provider: Arc<dyn AccessibilityProvider>,

    pub host: Arc<dyn HostSystem>,

    /// Target process and its latest tree
    pub session: Arc<DesktopSession>,

    pub executor: MultiActExecutor,

    /// Serializes builds and action runs so the registry is never replaced
    /// while actions resolve against it
    pub desktop_lock: Mutex<()>,
}

impl AppState {
    pub fn new(
        config: Config,
        provider: Arc<dyn AccessibilityProvider>,
        host: Arc<dyn HostSystem>,
    ) -> anyhow::Result<Self> {
        let builder = TreeBuilder::new(provider.clone(), config.builder_config());
        let session = DesktopSession::new(builder).with_app_launch_wait(config.app_launch_wait());
        let registry = default_registry()?;
        tracing::info!("Registered {} actions", registry.len());

        Ok(Self {
            executor: MultiActExecutor::new(Arc::new(registry), config.executor_config()),
            session: Arc::new(session),
            provider,
            host,
            config,
            desktop_lock: Mutex::new(()),
        })
    }

    /// Context for one action run
    pub fn action_context(&self) -> ActionContext {
        ActionContext::new(self.host.clone(), Some(self.session.clone()))
    }
}
