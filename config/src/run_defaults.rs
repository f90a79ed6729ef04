//! Load the `[run_defaults]` table from the same XDG `config.toml` that
//! [`crate::load_and_apply`] reads `[env]` from.

use std::collections::HashMap;

use serde::Deserialize;

use crate::LoadError;

/// Defaults for an execution run, overridable per-invocation by the CLI.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunDefaults {
    pub parallelism: u32,
    pub retries: u32,
    pub timeout_ms: u64,
    pub discovery_concurrency: u32,
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            parallelism: 4,
            retries: 0,
            timeout_ms: 30_000,
            discovery_concurrency: 5,
        }
    }
}

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    run_defaults: RunDefaults,
    #[serde(default)]
    #[allow(dead_code)]
    env: HashMap<String, String>,
}

/// Reads `[run_defaults]` from `$XDG_CONFIG_HOME/<app>/config.toml`. Missing
/// file or missing table falls back to [`RunDefaults::default`].
pub fn load_run_defaults(app_name: &str) -> Result<RunDefaults, LoadError> {
    let base = cross_xdg::BaseDirs::new().map_err(|e| LoadError::XdgPath(e.to_string()))?;
    let path = base.config_home().join(app_name).join("config.toml");
    if !path.exists() {
        return Ok(RunDefaults::default());
    }
    let content = std::fs::read_to_string(&path).map_err(LoadError::XdgRead)?;
    let config: ConfigFile = toml::from_str(&content)?;
    Ok(config.run_defaults)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn missing_config_yields_defaults() {
        let defaults = load_run_defaults("config-crate-test-nonexistent-run-defaults").unwrap();
        assert_eq!(defaults, RunDefaults::default());
    }

    #[test]
    fn reads_run_defaults_table() {
        let dir = tempfile::tempdir().unwrap();
        let app_dir = dir.path().join("fabrik");
        std::fs::create_dir_all(&app_dir).unwrap();
        std::fs::write(
            app_dir.join("config.toml"),
            "[run_defaults]\nparallelism = 8\nretries = 2\ntimeout_ms = 15000\ndiscovery_concurrency = 10\n",
        )
        .unwrap();

        let prev = env::var("XDG_CONFIG_HOME").ok();
        env::set_var("XDG_CONFIG_HOME", dir.path());
        let result = load_run_defaults("fabrik");
        if let Some(p) = prev.as_ref() {
            env::set_var("XDG_CONFIG_HOME", p);
        } else {
            env::remove_var("XDG_CONFIG_HOME");
        }

        let defaults = result.unwrap();
        assert_eq!(defaults.parallelism, 8);
        assert_eq!(defaults.retries, 2);
        assert_eq!(defaults.timeout_ms, 15000);
        assert_eq!(defaults.discovery_concurrency, 10);
    }

    #[test]
    fn partial_table_fills_remaining_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let app_dir = dir.path().join("fabrik-partial");
        std::fs::create_dir_all(&app_dir).unwrap();
        std::fs::write(
            app_dir.join("config.toml"),
            "[run_defaults]\nparallelism = 2\n",
        )
        .unwrap();

        let prev = env::var("XDG_CONFIG_HOME").ok();
        env::set_var("XDG_CONFIG_HOME", dir.path());
        let result = load_run_defaults("fabrik-partial");
        if let Some(p) = prev.as_ref() {
            env::set_var("XDG_CONFIG_HOME", p);
        } else {
            env::remove_var("XDG_CONFIG_HOME");
        }

        let defaults = result.unwrap();
        assert_eq!(defaults.parallelism, 2);
        assert_eq!(defaults.retries, RunDefaults::default().retries);
    }
}
