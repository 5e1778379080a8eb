use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::desktop::{ElementIndex, ElementNode, UiTree};
use crate::tools::{ActionContext, ActionRegistry, ActionResult, MAX_ERROR_LENGTH};

/// One planned action: a registered name plus its parameter object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCall {
    pub name: String,
    #[serde(default)]
    pub params: Value,
}

impl ActionCall {
    pub fn new(name: impl Into<String>, params: Value) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// Element index the action targets, if any
    pub fn index(&self) -> Option<ElementIndex> {
        self.params
            .get("index")
            .and_then(|i| i.as_u64())
            .and_then(|i| ElementIndex::try_from(i).ok())
    }
}

/// Configuration for a multi-action run
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Pause between consecutive actions to let the UI settle
    pub wait_between_actions: Duration,
    /// Stop when elements appear that were not in the planning snapshot
    pub check_for_new_elements: bool,
    /// Bound on error text handed back to the planner
    pub max_error_length: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            wait_between_actions: Duration::from_millis(1000),
            check_for_new_elements: true,
            max_error_length: MAX_ERROR_LENGTH,
        }
    }
}

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopReason {
    /// Every action ran
    Completed,
    /// An action reported the task done
    Done,
    /// An action failed
    Error,
    /// The UI changed shape before the action at position `at`
    Drift { at: usize },
}

/// Outcomes of a run, in order, and why it stopped
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiActReport {
    pub results: Vec<ActionResult>,
    pub stop: StopReason,
}

impl MultiActReport {
    pub fn is_done(&self) -> bool {
        self.stop == StopReason::Done
    }

    pub fn drifted(&self) -> bool {
        matches!(self.stop, StopReason::Drift { .. })
    }

    /// Copy with error strings cut to `max` characters
    pub fn for_planner(&self, max: usize) -> Self {
        let results = self
            .results
            .iter()
            .map(|r| ActionResult {
                error: r.truncated_error(max),
                ..r.clone()
            })
            .collect();
        Self {
            results,
            stop: self.stop,
        }
    }
}

/// What an index pointed at when the run was planned
#[derive(Debug, Clone, PartialEq, Eq)]
struct PlannedTarget {
    path: String,
    role: String,
    salient: String,
}

impl PlannedTarget {
    fn of(node: &ElementNode) -> Self {
        Self {
            path: node.accessibility_path().to_string(),
            role: node.role.clone(),
            salient: node.salient_attributes(),
        }
    }
}

/// Planning snapshot: interactive paths plus the element behind each index
#[derive(Debug, Default)]
struct Plan {
    paths: HashSet<String>,
    targets: HashMap<ElementIndex, PlannedTarget>,
}

impl Plan {
    fn capture(tree: &UiTree) -> Self {
        let targets = tree
            .interactive_nodes()
            .filter_map(|n| n.index.map(|i| (i, PlannedTarget::of(n))))
            .collect();
        Self {
            paths: tree.interactive_paths(),
            targets,
        }
    }

    /// True when `index` now names a different element than at planning time
    fn retargeted(&self, tree: &UiTree, index: ElementIndex) -> bool {
        match (self.targets.get(&index), tree.node_for_index(index)) {
            (Some(planned), Some(live)) => *planned != PlannedTarget::of(live),
            _ => false,
        }
    }
}

/// Runs ordered action lists against the current element registry
pub struct MultiActExecutor {
    registry: Arc<ActionRegistry>,
    config: ExecutorConfig,
}

impl MultiActExecutor {
    pub fn new(registry: Arc<ActionRegistry>, config: ExecutorConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute a single action
    pub async fn act(&self, call: &ActionCall, ctx: &ActionContext) -> ActionResult {
        let started = Instant::now();
        let result = self.registry.execute(&call.name, call.params.clone(), ctx).await;
        debug!("Action '{}' took {:?}", call.name, started.elapsed());
        result
    }

    /// Execute `actions` in order
    ///
    /// Stops at the first done or failed outcome. Before every index action
    /// after the first, the tree is rebuilt and its interactive paths must be
    /// a subset of those present when the run started, and the targeted index
    /// must still name the planned element; otherwise the run stops with
    /// [`StopReason::Drift`] and the remaining actions are skipped.
    #[instrument(skip(self, actions, ctx), fields(run_id = %ctx.run_id, actions = actions.len()))]
    pub async fn run(&self, actions: &[ActionCall], ctx: &ActionContext) -> MultiActReport {
        let plan = match &ctx.session {
            Some(session) => session
                .current_tree()
                .await
                .map(|tree| Plan::capture(&tree))
                .unwrap_or_default(),
            None => Plan::default(),
        };

        let mut results = Vec::with_capacity(actions.len());

        for (i, call) in actions.iter().enumerate() {
            let refresh_for = match (call.index(), &ctx.session) {
                (Some(index), Some(session)) if i != 0 => Some((index, session)),
                _ => None,
            };
            if let Some((index, session)) = refresh_for {
                match session.refresh().await {
                    Ok(tree) => {
                        let appeared = !tree.interactive_paths().is_subset(&plan.paths);
                        if self.config.check_for_new_elements && appeared {
                            warn!("Something new appeared after action {} / {}", i, actions.len());
                            return MultiActReport {
                                results,
                                stop: StopReason::Drift { at: i },
                            };
                        }
                        if plan.retargeted(&tree, index) {
                            warn!("Index {} now names a different element than planned", index);
                            return MultiActReport {
                                results,
                                stop: StopReason::Drift { at: i },
                            };
                        }
                    }
                    Err(e) => {
                        warn!("Could not refresh the UI tree before '{}': {}", call.name, e);
                        results.push(ActionResult::error(format!(
                            "Failed to refresh UI tree before '{}': {}",
                            call.name, e
                        )));
                        return MultiActReport {
                            results,
                            stop: StopReason::Error,
                        };
                    }
                }
            }

            let result = self.act(call, ctx).await;
            debug!("Executed action {} / {}", i + 1, actions.len());

            let stop = if result.is_done {
                Some(StopReason::Done)
            } else if result.is_error() {
                Some(StopReason::Error)
            } else if i == actions.len() - 1 {
                Some(StopReason::Completed)
            } else {
                None
            };
            results.push(result);

            if let Some(stop) = stop {
                info!("Run stopped after {} action(s): {:?}", results.len(), stop);
                return MultiActReport { results, stop };
            }

            tokio::time::sleep(self.config.wait_between_actions).await;
        }

        MultiActReport {
            results,
            stop: StopReason::Completed,
        }
    }
}
