use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::desktop::BuilderConfig;
use crate::runs::ExecutorConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub max_depth: usize,
    pub max_children: usize,
    pub extended_attributes: bool,
    pub wait_between_actions_ms: u64,
    pub build_timeout_ms: u64,
    pub check_new_elements: bool,
    pub app_launch_wait_ms: u64,
}

/// Parse an env var, falling back to `default` when unset or invalid
fn var_or<T: FromStr>(name: &str, default: T) -> T {
    parse_or(name, env::var(name).ok().as_deref(), default)
}

fn parse_or<T: FromStr>(name: &str, raw: Option<&str>, default: T) -> T {
    match raw {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Ignoring invalid value for {}: {:?}", name, raw);
                default
            }
        },
        None => default,
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: var_or("PORT", defaults.port),
            host: env::var("HOST").unwrap_or(defaults.host),
            max_depth: var_or("AXPILOT_MAX_DEPTH", defaults.max_depth),
            max_children: var_or("AXPILOT_MAX_CHILDREN", defaults.max_children),
            extended_attributes: var_or("AXPILOT_EXTENDED_ATTRIBUTES", defaults.extended_attributes),
            wait_between_actions_ms: var_or("AXPILOT_WAIT_BETWEEN_ACTIONS_MS", defaults.wait_between_actions_ms),
            build_timeout_ms: var_or("AXPILOT_BUILD_TIMEOUT_MS", defaults.build_timeout_ms),
            check_new_elements: var_or("AXPILOT_CHECK_NEW_ELEMENTS", defaults.check_new_elements),
            app_launch_wait_ms: var_or("AXPILOT_APP_LAUNCH_WAIT_MS", defaults.app_launch_wait_ms),
        }
    }

    pub fn builder_config(&self) -> BuilderConfig {
        BuilderConfig {
            max_depth: self.max_depth,
            max_children: self.max_children,
            extended_attributes: self.extended_attributes,
            timeout: Duration::from_millis(self.build_timeout_ms),
        }
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            wait_between_actions: Duration::from_millis(self.wait_between_actions_ms),
            check_for_new_elements: self.check_new_elements,
            ..Default::default()
        }
    }

    pub fn app_launch_wait(&self) -> Duration {
        Duration::from_millis(self.app_launch_wait_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8766,
            host: "127.0.0.1".to_string(),
            max_depth: 10,
            max_children: 50,
            extended_attributes: false,
            wait_between_actions_ms: 1000,
            build_timeout_ms: 15000,
            check_new_elements: true,
            app_launch_wait_ms: 1000,
        }
    }
}
