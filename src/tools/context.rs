use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::desktop::{
    AccessibilityProvider, BuildError, ElementIndex, ElementNode, HostSystem, NodeId, TreeBuilder, UiTree,
};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No UI tree available - build the tree before acting on an index")]
    NoTree,

    #[error("Invalid index {index}: valid indices are {valid}")]
    InvalidIndex { index: ElementIndex, valid: String },
}

/// Element resolved from the current registry
#[derive(Debug, Clone)]
pub struct ResolvedElement {
    pub tree: Arc<UiTree>,
    pub id: NodeId,
}

impl ResolvedElement {
    pub fn node(&self) -> &ElementNode {
        &self.tree[self.id]
    }
}

#[derive(Default)]
struct SessionState {
    pid: Option<i32>,
    tree: Option<Arc<UiTree>>,
}

/// Live desktop state actions run against: the target process and the
/// tree (with its element registry) from its latest build
///
/// A new build replaces the tree wholesale; readers holding the previous
/// `Arc<UiTree>` keep a consistent, if stale, view.
pub struct DesktopSession {
    builder: TreeBuilder,
    app_launch_wait: Duration,
    state: RwLock<SessionState>,
}

impl DesktopSession {
    pub fn new(builder: TreeBuilder) -> Self {
        Self {
            builder,
            app_launch_wait: Duration::from_secs(1),
            state: RwLock::new(SessionState::default()),
        }
    }

    /// Time to let a freshly launched application come up
    pub fn with_app_launch_wait(mut self, wait: Duration) -> Self {
        self.app_launch_wait = wait;
        self
    }

    pub fn app_launch_wait(&self) -> Duration {
        self.app_launch_wait
    }

    pub fn builder(&self) -> &TreeBuilder {
        &self.builder
    }

    pub fn provider(&self) -> &Arc<dyn AccessibilityProvider> {
        self.builder.provider()
    }

    pub async fn target_pid(&self) -> Option<i32> {
        self.state.read().await.pid
    }

    /// Point the session at a process; the current tree is dropped only
    /// when the target actually changes
    pub async fn set_target(&self, pid: i32) {
        let mut state = self.state.write().await;
        if state.pid == Some(pid) {
            return;
        }
        debug!("Retargeting session from {:?} to pid {}", state.pid, pid);
        state.pid = Some(pid);
        state.tree = None;
    }

    pub async fn current_tree(&self) -> Option<Arc<UiTree>> {
        self.state.read().await.tree.clone()
    }

    /// Replace the current tree (and target) with `tree`
    pub async fn install_tree(&self, tree: UiTree) -> Arc<UiTree> {
        let tree = Arc::new(tree);
        let mut state = self.state.write().await;
        state.pid = Some(tree.pid());
        state.tree = Some(tree.clone());
        tree
    }

    /// Rebuild the tree for the target process and install it
    pub async fn refresh(&self) -> Result<Arc<UiTree>, BuildError> {
        let pid = self.target_pid().await.ok_or(BuildError::NoProcess)?;
        let tree = self.builder.build_with_timeout(pid).await?;
        info!("Refreshed tree for pid {} ({} interactive)", pid, tree.interactive_count());
        Ok(self.install_tree(tree).await)
    }

    /// Look up an index in the current registry
    pub async fn resolve(&self, index: ElementIndex) -> Result<ResolvedElement, SessionError> {
        let tree = self.current_tree().await.ok_or(SessionError::NoTree)?;
        let id = tree.registry().get(index).ok_or_else(|| SessionError::InvalidIndex {
            index,
            valid: tree.registry().describe_range(),
        })?;
        Ok(ResolvedElement { tree, id })
    }
}

/// Context passed to action handlers during execution
pub struct ActionContext {
    pub run_id: String,
    pub host: Arc<dyn HostSystem>,
    /// Live desktop session; actions declaring `requires_registry` only run
    /// when it is present
    pub session: Option<Arc<DesktopSession>>,
}

impl ActionContext {
    pub fn new(host: Arc<dyn HostSystem>, session: Option<Arc<DesktopSession>>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            host,
            session,
        }
    }

    pub fn session(&self) -> anyhow::Result<&Arc<DesktopSession>> {
        self.session
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("No desktop session available"))
    }
}
