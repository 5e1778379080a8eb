use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use thiserror::Error;

use super::context::ActionContext;

/// Default bound for errors surfaced to the planner
pub const MAX_ERROR_LENGTH: usize = 400;

/// Action definition for LLM function calling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value, // JSON Schema
    /// Whether the handler needs the live desktop session
    pub requires_registry: bool,
}

/// Registration-time description of an action
#[derive(Debug, Clone)]
pub struct ActionDefinition {
    name: String,
    description: String,
    requires_registry: bool,
}

impl ActionDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            requires_registry: false,
        }
    }

    pub fn requires_registry(mut self) -> Self {
        self.requires_registry = true;
        self
    }
}

/// Uniform outcome of one action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// If true, the task is complete
    #[serde(default)]
    pub is_done: bool,
    /// Side-channel data, e.g. `{"pid": 123}` after opening an app
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ActionResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn success(content: impl Into<String>) -> Self {
        Self {
            extracted_content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn with_data(content: impl Into<String>, data: Value) -> Self {
        Self {
            extracted_content: Some(content.into()),
            data: Some(data),
            ..Default::default()
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn done(content: impl Into<String>) -> Self {
        Self {
            extracted_content: Some(content.into()),
            is_done: true,
            ..Default::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Last `max` characters of the error text, where the root cause of a
    /// chained error ends up
    pub fn truncated_error(&self, max: usize) -> Option<String> {
        self.error.as_ref().map(|e| {
            let len = e.chars().count();
            if len <= max {
                e.clone()
            } else {
                e.chars().skip(len - max).collect()
            }
        })
    }

    /// Process id reported through side-data
    pub fn discovered_pid(&self) -> Option<i32> {
        self.data
            .as_ref()
            .and_then(|d| d.get("pid"))
            .and_then(|p| p.as_i64())
            .and_then(|p| i32::try_from(p).ok())
    }
}

/// What a handler may hand back
#[derive(Debug, Clone, PartialEq)]
pub enum ActionReturn {
    /// Plain text for model context
    Text(String),
    /// Fully-formed outcome
    Outcome(ActionResult),
    /// Success with nothing to report
    Empty,
}

impl From<String> for ActionReturn {
    fn from(s: String) -> Self {
        ActionReturn::Text(s)
    }
}

impl From<&str> for ActionReturn {
    fn from(s: &str) -> Self {
        ActionReturn::Text(s.to_string())
    }
}

impl From<ActionResult> for ActionReturn {
    fn from(r: ActionResult) -> Self {
        ActionReturn::Outcome(r)
    }
}

impl From<()> for ActionReturn {
    fn from(_: ()) -> Self {
        ActionReturn::Empty
    }
}

impl From<ActionReturn> for ActionResult {
    fn from(ret: ActionReturn) -> Self {
        match ret {
            ActionReturn::Text(text) => ActionResult::success(text),
            ActionReturn::Outcome(result) => result,
            ActionReturn::Empty => ActionResult::empty(),
        }
    }
}

/// Trait for implementing actions
///
/// Parameters are deserialized from the caller's JSON; their JSON Schema
/// is published in the action's descriptor.
#[async_trait]
pub trait ActionHandler: Send + Sync + 'static {
    type Params: DeserializeOwned + JsonSchema + Send + 'static;

    async fn call(&self, params: Self::Params, ctx: &ActionContext) -> anyhow::Result<ActionReturn>;
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Action '{0}' is already registered")]
    Duplicate(String),
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Schema validation error for '{action}': {message}")]
    Schema { action: String, message: String },

    #[error("Missing capability: '{action}' requires the live element registry")]
    MissingCapability { action: String },

    #[error("Error executing action '{action}': {source:#}")]
    Handler {
        action: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Returned by [`ActionRegistry::register`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationHandle {
    name: String,
    position: usize,
}

impl RegistrationHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registration order
    pub fn position(&self) -> usize {
        self.position
    }
}

#[async_trait]
trait ErasedHandler: Send + Sync {
    async fn dispatch(
        &self,
        descriptor: &ActionDescriptor,
        params: Value,
        ctx: &ActionContext,
    ) -> Result<ActionReturn, DispatchError>;
}

struct Typed<H>(H);

#[async_trait]
impl<H: ActionHandler> ErasedHandler for Typed<H> {
    async fn dispatch(
        &self,
        descriptor: &ActionDescriptor,
        params: Value,
        ctx: &ActionContext,
    ) -> Result<ActionReturn, DispatchError> {
        let params = if params.is_null() { json!({}) } else { params };
        let params: H::Params = serde_json::from_value(params).map_err(|e| DispatchError::Schema {
            action: descriptor.name.clone(),
            message: e.to_string(),
        })?;

        if descriptor.requires_registry && ctx.session.is_none() {
            return Err(DispatchError::MissingCapability {
                action: descriptor.name.clone(),
            });
        }

        self.0
            .call(params, ctx)
            .await
            .map_err(|source| DispatchError::Handler {
                action: descriptor.name.clone(),
                source,
            })
    }
}

struct Entry {
    descriptor: ActionDescriptor,
    handler: Box<dyn ErasedHandler>,
}

/// Registry of all available actions
///
/// Built once at setup and shared read-only afterwards.
#[derive(Default)]
pub struct ActionRegistry {
    entries: Vec<Entry>,
    by_name: HashMap<String, usize>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action
    pub fn register<H: ActionHandler>(
        &mut self,
        definition: ActionDefinition,
        handler: H,
    ) -> Result<RegistrationHandle, RegistryError> {
        if self.by_name.contains_key(&definition.name) {
            return Err(RegistryError::Duplicate(definition.name));
        }

        let schema = schemars::schema_for!(H::Params);
        let descriptor = ActionDescriptor {
            name: definition.name.clone(),
            description: definition.description,
            parameters: serde_json::to_value(&schema).unwrap_or_default(),
            requires_registry: definition.requires_registry,
        };

        let position = self.entries.len();
        self.entries.push(Entry {
            descriptor,
            handler: Box::new(Typed(handler)),
        });
        self.by_name.insert(definition.name.clone(), position);

        tracing::debug!("Registered action '{}'", definition.name);
        Ok(RegistrationHandle {
            name: definition.name,
            position,
        })
    }

    /// Get an action definition by name
    pub fn get(&self, name: &str) -> Option<&ActionDescriptor> {
        self.by_name.get(name).map(|i| &self.entries[*i].descriptor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All action definitions, in registration order
    pub fn descriptors(&self) -> Vec<ActionDescriptor> {
        self.entries.iter().map(|e| e.descriptor.clone()).collect()
    }

    /// Resolve and run one action, reporting dispatch failures as errors
    pub async fn try_execute(
        &self,
        name: &str,
        params: Value,
        ctx: &ActionContext,
    ) -> Result<ActionReturn, DispatchError> {
        let entry = self
            .by_name
            .get(name)
            .map(|i| &self.entries[*i])
            .ok_or_else(|| DispatchError::UnknownAction(name.to_string()))?;

        entry.handler.dispatch(&entry.descriptor, params, ctx).await
    }

    /// Run one action and normalize whatever happened into an outcome
    pub async fn execute(&self, name: &str, params: Value, ctx: &ActionContext) -> ActionResult {
        match self.try_execute(name, params, ctx).await {
            Ok(ret) => ret.into(),
            Err(e) => {
                tracing::error!("{}", e);
                ActionResult::error(e.to_string())
            }
        }
    }
}
