//! Host process control: launching applications, listing running ones and
//! running OS scripts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use thiserror::Error;
use tokio::process::Command;

/// A running GUI application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningApp {
    pub name: String,
    pub bundle_id: String,
    pub path: String,
    pub pid: i32,
}

#[derive(Error, Debug)]
pub enum HostError {
    #[error("Failed to launch '{app}': {reason}")]
    Launch { app: String, reason: String },

    #[error("Script failed: {0}")]
    ScriptFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse application list: {0}")]
    Parse(#[from] serde_json::Error),
}

/// OS-level process control used by action handlers
#[async_trait]
pub trait HostSystem: Send + Sync {
    /// Launch (or activate) an application by name
    async fn launch_app(&self, name: &str) -> Result<(), HostError>;

    /// Regular GUI applications currently running
    async fn running_apps(&self) -> Result<Vec<RunningApp>, HostError>;

    /// Run a user-supplied AppleScript and return its output
    async fn run_script(&self, source: &str) -> Result<String, HostError>;
}

/// Find a running app by name
///
/// Exact name match first, then a bundle identifier containing the name
/// (lowercased, spaces removed), then a name containing it.
pub fn find_app<'a>(apps: &'a [RunningApp], name: &str) -> Option<&'a RunningApp> {
    let wanted = name.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    let compact: String = wanted.chars().filter(|c| !c.is_whitespace()).collect();

    apps.iter()
        .find(|a| a.name.to_lowercase() == wanted)
        .or_else(|| apps.iter().find(|a| a.bundle_id.to_lowercase().contains(&compact)))
        .or_else(|| apps.iter().find(|a| a.name.to_lowercase().contains(&wanted)))
}

const RUNNING_APPS_JXA: &str = r#"
ObjC.import('AppKit');
var apps = $.NSWorkspace.sharedWorkspace.runningApplications;
var out = [];
for (var i = 0; i < apps.count; i++) {
    var app = apps.objectAtIndex(i);
    if (app.activationPolicy != 0) { continue; }
    out.push({
        name: ObjC.unwrap(app.localizedName) || '',
        bundle_id: ObjC.unwrap(app.bundleIdentifier) || '',
        path: ObjC.unwrap(app.bundleURL.path) || '',
        pid: app.processIdentifier
    });
}
JSON.stringify(out);
"#;

/// macOS host backed by `open` and `osascript`
#[derive(Debug, Default, Clone)]
pub struct MacHost;

impl MacHost {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl HostSystem for MacHost {
    async fn launch_app(&self, name: &str) -> Result<(), HostError> {
        let output = Command::new("open").arg("-a").arg(name).output().await?;

        if !output.status.success() {
            return Err(HostError::Launch {
                app: name.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        tracing::info!("Launched application '{}'", name);
        Ok(())
    }

    async fn running_apps(&self) -> Result<Vec<RunningApp>, HostError> {
        let output = Command::new("osascript")
            .arg("-l")
            .arg("JavaScript")
            .arg("-e")
            .arg(RUNNING_APPS_JXA)
            .output()
            .await?;

        if !output.status.success() {
            return Err(HostError::ScriptFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let apps: Vec<RunningApp> = serde_json::from_slice(&output.stdout)?;
        Ok(apps)
    }

    async fn run_script(&self, source: &str) -> Result<String, HostError> {
        let output = Command::new("osascript").arg("-e").arg(source).output().await?;

        if !output.status.success() {
            return Err(HostError::ScriptFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

type LaunchHook = Box<dyn Fn(&str) -> Option<RunningApp> + Send + Sync>;

#[derive(Default)]
struct HostState {
    apps: Vec<RunningApp>,
    launched: Vec<String>,
    scripts: Vec<String>,
}

/// In-memory host for tests and dry runs
///
/// Launching consults the launch hook, which may mutate a scripted
/// accessibility graph and report the app that came up. Launching an app
/// that is neither running nor produced by the hook fails.
#[derive(Default)]
pub struct ScriptedHost {
    state: Mutex<HostState>,
    on_launch: Option<LaunchHook>,
    script_output: Option<String>,
}

impl ScriptedHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_app(self, app: RunningApp) -> Self {
        self.lock().apps.push(app);
        self
    }

    pub fn on_launch<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) -> Option<RunningApp> + Send + Sync + 'static,
    {
        self.on_launch = Some(Box::new(hook));
        self
    }

    /// Output returned by every script run; scripts fail when unset
    pub fn with_script_output(mut self, output: impl Into<String>) -> Self {
        self.script_output = Some(output.into());
        self
    }

    pub fn launched(&self) -> Vec<String> {
        self.lock().launched.clone()
    }

    pub fn scripts(&self) -> Vec<String> {
        self.lock().scripts.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl HostSystem for ScriptedHost {
    async fn launch_app(&self, name: &str) -> Result<(), HostError> {
        let launched = self.on_launch.as_ref().and_then(|hook| hook(name));

        let mut state = self.lock();
        state.launched.push(name.to_string());
        match launched {
            Some(app) => {
                state.apps.retain(|a| a.pid != app.pid);
                state.apps.push(app);
                Ok(())
            }
            None if find_app(&state.apps, name).is_some() => Ok(()),
            None => Err(HostError::Launch {
                app: name.to_string(),
                reason: "Unable to find application".to_string(),
            }),
        }
    }

    async fn running_apps(&self) -> Result<Vec<RunningApp>, HostError> {
        Ok(self.lock().apps.clone())
    }

    async fn run_script(&self, source: &str) -> Result<String, HostError> {
        self.lock().scripts.push(source.to_string());
        self.script_output
            .clone()
            .ok_or_else(|| HostError::ScriptFailed("execution error".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(name: &str, bundle_id: &str, pid: i32) -> RunningApp {
        RunningApp {
            name: name.to_string(),
            bundle_id: bundle_id.to_string(),
            path: format!("/Applications/{}.app", name),
            pid,
        }
    }

    #[test]
    fn test_find_app_prefers_exact_name() {
        let apps = vec![
            app("Calculator", "com.apple.calculator", 10),
            app("Calendar", "com.apple.iCal", 11),
        ];
        assert_eq!(find_app(&apps, "calculator").map(|a| a.pid), Some(10));
        assert_eq!(find_app(&apps, "calc").map(|a| a.pid), Some(10));
        assert_eq!(find_app(&apps, "ical").map(|a| a.pid), Some(11));
        assert!(find_app(&apps, "notes").is_none());
        assert!(find_app(&apps, "  ").is_none());
    }

    #[test]
    fn test_find_app_matches_compacted_bundle_id() {
        let apps = vec![app("System Settings", "com.apple.systemsettings", 3)];
        assert_eq!(find_app(&apps, "System Settings").map(|a| a.pid), Some(3));
        assert_eq!(find_app(&apps, "systemsettings").map(|a| a.pid), Some(3));
    }

    #[tokio::test]
    async fn test_scripted_launch() {
        let host = ScriptedHost::new().on_launch(|name| {
            (name == "Calculator").then(|| app("Calculator", "com.apple.calculator", 42))
        });

        host.launch_app("Calculator").await.unwrap();
        assert!(matches!(
            host.launch_app("Nope").await,
            Err(HostError::Launch { .. })
        ));
        assert_eq!(host.launched(), vec!["Calculator", "Nope"]);
        assert_eq!(host.running_apps().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_scripted_scripts() {
        let host = ScriptedHost::new();
        assert!(host.run_script("beep").await.is_err());

        let host = ScriptedHost::new().with_script_output("ok");
        assert_eq!(host.run_script("beep").await.unwrap(), "ok");
        assert_eq!(host.scripts(), vec!["beep"]);
    }

    #[test]
    fn test_running_app_json_shape() {
        let parsed: Vec<RunningApp> = serde_json::from_str(
            r#"[{"name":"Finder","bundle_id":"com.apple.finder","path":"/System/Library/CoreServices/Finder.app","pid":301}]"#,
        )
        .unwrap();
        assert_eq!(parsed[0].pid, 301);
    }
}
