//! Default desktop actions
//!
//! Index-based actions resolve their target through the session's current
//! element registry and act through the accessibility primitives.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

use super::context::ActionContext;
use super::registry::{ActionHandler, ActionRegistry, ActionResult, ActionReturn, ActionDefinition, RegistryError};
use crate::desktop::actions::{self, Performed, ScrollDirection};
use crate::desktop::host::find_app;
use crate::desktop::ElementIndex;

// ============================================================================
// Parameters
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DoneParams {
    /// Final answer or summary for the user
    pub text: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct IndexParams {
    /// Index of the element from the element list
    pub index: ElementIndex,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct InputTextParams {
    pub index: ElementIndex,
    pub text: String,
    /// Confirm the input (like pressing Enter) after typing
    #[serde(default)]
    pub submit: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ScrollParams {
    pub index: ElementIndex,
    pub direction: ScrollDirection,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct OpenAppParams {
    /// Application name, e.g. "Calculator"
    pub app_name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AppleScriptParams {
    pub script: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NoParams {}

// ============================================================================
// Handlers
// ============================================================================

pub struct DoneAction;

#[async_trait]
impl ActionHandler for DoneAction {
    type Params = DoneParams;

    async fn call(&self, params: DoneParams, _ctx: &ActionContext) -> anyhow::Result<ActionReturn> {
        Ok(ActionResult::done(params.text).into())
    }
}

pub struct ClickElementAction;

#[async_trait]
impl ActionHandler for ClickElementAction {
    type Params = IndexParams;

    async fn call(&self, params: IndexParams, ctx: &ActionContext) -> anyhow::Result<ActionReturn> {
        let session = ctx.session()?;
        let target = session.resolve(params.index).await?;
        let node = target.node();

        actions::press(session.provider().as_ref(), node)?;
        Ok(format!("Clicked element {}: {}", params.index, node).into())
    }
}

pub struct InputTextAction;

#[async_trait]
impl ActionHandler for InputTextAction {
    type Params = InputTextParams;

    async fn call(&self, params: InputTextParams, ctx: &ActionContext) -> anyhow::Result<ActionReturn> {
        let session = ctx.session()?;
        let target = session.resolve(params.index).await?;
        let node = target.node();

        let performed =
            actions::set_value_and_optionally_submit(session.provider().as_ref(), node, &params.text, params.submit)?;

        let mut message = format!("Input \"{}\" into element {}", params.text, params.index);
        match (params.submit, performed) {
            (true, Performed::Direct) => message.push_str(" and confirmed"),
            (true, Performed::Fallback) => message.push_str(" and submitted by pressing (confirm unsupported)"),
            (false, _) => {}
        }
        Ok(message.into())
    }
}

pub struct RightClickElementAction;

#[async_trait]
impl ActionHandler for RightClickElementAction {
    type Params = IndexParams;

    async fn call(&self, params: IndexParams, ctx: &ActionContext) -> anyhow::Result<ActionReturn> {
        let session = ctx.session()?;
        let target = session.resolve(params.index).await?;
        let node = target.node();

        let message = match actions::show_context_menu(session.provider().as_ref(), node)? {
            Performed::Direct => format!("Opened context menu on element {}", params.index),
            Performed::Fallback => format!(
                "Element {} has no context menu action; clicked it instead",
                params.index
            ),
        };
        Ok(message.into())
    }
}

pub struct ScrollElementAction;

#[async_trait]
impl ActionHandler for ScrollElementAction {
    type Params = ScrollParams;

    async fn call(&self, params: ScrollParams, ctx: &ActionContext) -> anyhow::Result<ActionReturn> {
        let session = ctx.session()?;
        let target = session.resolve(params.index).await?;

        actions::scroll(session.provider().as_ref(), target.node(), params.direction)?;
        Ok(format!("Scrolled {:?} in element {}", params.direction, params.index).into())
    }
}

pub struct OpenAppAction;

#[async_trait]
impl ActionHandler for OpenAppAction {
    type Params = OpenAppParams;

    async fn call(&self, params: OpenAppParams, ctx: &ActionContext) -> anyhow::Result<ActionReturn> {
        let session = ctx.session()?;
        let name = params.app_name.trim();

        tracing::info!("Launching {} app...", name);
        ctx.host.launch_app(name).await?;

        // Give it a moment to appear in running apps
        tokio::time::sleep(session.app_launch_wait()).await;

        let apps = ctx.host.running_apps().await?;
        let Some(app) = find_app(&apps, name) else {
            return Ok(ActionResult::error(format!(
                "Launched {} but could not find its process among running apps",
                name
            ))
            .into());
        };

        tracing::info!("Opened {} (bundle {}, pid {})", app.name, app.bundle_id, app.pid);
        session.set_target(app.pid).await;

        Ok(ActionResult::with_data(
            format!("We opened the app {}", name),
            json!({ "pid": app.pid, "bundle_id": app.bundle_id }),
        )
        .into())
    }
}

pub struct RunAppleScriptAction;

#[async_trait]
impl ActionHandler for RunAppleScriptAction {
    type Params = AppleScriptParams;

    async fn call(&self, params: AppleScriptParams, ctx: &ActionContext) -> anyhow::Result<ActionReturn> {
        let output = ctx.host.run_script(&params.script).await?;
        if output.is_empty() {
            Ok("AppleScript executed successfully".into())
        } else {
            Ok(format!("AppleScript output: {}", output).into())
        }
    }
}

pub struct ListRunningAppsAction;

#[async_trait]
impl ActionHandler for ListRunningAppsAction {
    type Params = NoParams;

    async fn call(&self, _params: NoParams, ctx: &ActionContext) -> anyhow::Result<ActionReturn> {
        let apps = ctx.host.running_apps().await?;
        if apps.is_empty() {
            return Ok("No running applications found".into());
        }

        let lines: Vec<String> = apps
            .iter()
            .map(|a| format!("{} ({}) pid={} path={}", a.name, a.bundle_id, a.pid, a.path))
            .collect();
        Ok(lines.join("\n").into())
    }
}

/// Register the default desktop action set
pub fn register_desktop_actions(registry: &mut ActionRegistry) -> Result<(), RegistryError> {
    registry.register(
        ActionDefinition::new("done", "Complete the task and report the final result"),
        DoneAction,
    )?;
    registry.register(
        ActionDefinition::new("click_element", "Click the element with the given index").requires_registry(),
        ClickElementAction,
    )?;
    registry.register(
        ActionDefinition::new(
            "input_text",
            "Type text into the element with the given index, optionally submitting it",
        )
        .requires_registry(),
        InputTextAction,
    )?;
    registry.register(
        ActionDefinition::new(
            "right_click_element",
            "Open the context menu of the element with the given index",
        )
        .requires_registry(),
        RightClickElementAction,
    )?;
    registry.register(
        ActionDefinition::new(
            "scroll_element",
            "Scroll inside the element with the given index (up, down, left, right)",
        )
        .requires_registry(),
        ScrollElementAction,
    )?;
    registry.register(
        ActionDefinition::new("open_app", "Open a mac app").requires_registry(),
        OpenAppAction,
    )?;
    registry.register(
        ActionDefinition::new(
            "run_apple_script",
            "Run an AppleScript for anything the other actions cannot do",
        ),
        RunAppleScriptAction,
    )?;
    registry.register(
        ActionDefinition::new("list_running_apps", "List running applications with their bundle ids and pids"),
        ListRunningAppsAction,
    )?;
    Ok(())
}

/// A registry holding the default desktop action set
pub fn default_registry() -> Result<ActionRegistry, RegistryError> {
    let mut registry = ActionRegistry::new();
    register_desktop_actions(&mut registry)?;
    Ok(registry)
}
