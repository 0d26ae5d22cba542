#![forbid(unsafe_code)]

//! API credentials and endpoint configuration.
//!
//! Resolved once at startup and passed by reference into everything that
//! talks to the remote catalog; never read from ambient global state.

use anyhow::{Context, Result, anyhow};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Read-only settings for the Data API: the key and the endpoint root.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub api_key: String,
    pub base_url: String,
}

pub fn load_config() -> Result<ApiConfig> {
    resolve_config(ConfigOverrides::default())
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_config(overrides: ConfigOverrides) -> Result<ApiConfig> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    build_config_with_overrides(&file_vars, env_var_string, overrides)
}

#[cfg(test)]
fn build_config(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> Result<ApiConfig> {
    build_config_with_overrides(file_vars, env_lookup, ConfigOverrides::default())
}

fn build_config_with_overrides(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: ConfigOverrides,
) -> Result<ApiConfig> {
    let api_key = overrides
        .api_key
        .and_then(non_blank)
        .or_else(|| lookup_value("YT_DATA_API", file_vars, &env_lookup))
        .ok_or_else(|| anyhow!("YT_DATA_API not set"))?;
    let base_url = overrides
        .base_url
        .and_then(non_blank)
        .or_else(|| lookup_value("BASE", file_vars, &env_lookup))
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    Ok(ApiConfig { api_key, base_url })
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(non_blank)
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| file_vars.get(key).cloned())
}

pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn make_env(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    fn config_from(contents: &str) -> Result<ApiConfig> {
        let env = make_env(contents);
        let vars = read_env_file(env.path()).unwrap();
        build_config(&vars, |_| None)
    }

    #[test]
    fn reads_key_and_base_from_file() {
        let config =
            config_from("YT_DATA_API=\"abc123\"\nBASE=\"https://proxy.example/v3\"\n").unwrap();
        assert_eq!(config.api_key, "abc123");
        assert_eq!(config.base_url, "https://proxy.example/v3");
    }

    #[test]
    fn base_url_defaults_when_missing() {
        let config = config_from("YT_DATA_API=\"abc123\"\n").unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let err = config_from("BASE=\"https://proxy.example/v3\"\n").unwrap_err();
        assert!(err.to_string().contains("YT_DATA_API"));
    }

    #[test]
    fn env_takes_precedence_over_file() {
        let env = make_env("YT_DATA_API=\"from-file\"\n");
        let vars = read_env_file(env.path()).unwrap();
        let config = build_config(&vars, |key| {
            if key == "YT_DATA_API" {
                Some("from-env".to_string())
            } else {
                None
            }
        })
        .unwrap();
        assert_eq!(config.api_key, "from-env");
    }

    #[test]
    fn overrides_win_over_everything() {
        let env = make_env("YT_DATA_API=\"from-file\"\nBASE=\"https://file.example\"\n");
        let vars = read_env_file(env.path()).unwrap();
        let config = build_config_with_overrides(
            &vars,
            |_| Some("from-env".to_string()),
            ConfigOverrides {
                api_key: Some("from-override".to_string()),
                base_url: Some("https://override.example".to_string()),
                env_path: None,
            },
        )
        .unwrap();
        assert_eq!(config.api_key, "from-override");
        assert_eq!(config.base_url, "https://override.example");
    }

    #[test]
    fn blank_override_falls_through() {
        let env = make_env("YT_DATA_API=\"from-file\"\n");
        let vars = read_env_file(env.path()).unwrap();
        let config = build_config_with_overrides(
            &vars,
            |_| None,
            ConfigOverrides {
                api_key: Some("   ".to_string()),
                ..ConfigOverrides::default()
            },
        )
        .unwrap();
        assert_eq!(config.api_key, "from-file");
    }

    #[test]
    fn read_env_file_handles_export_and_quotes() {
        let env = make_env(
            r#"
            export YT_DATA_API="secret"
            BASE='https://quoted.example'
            # comment
            INVALID_LINE
            "#,
        );
        let vars = read_env_file(env.path()).unwrap();
        assert_eq!(vars.get("YT_DATA_API").unwrap(), "secret");
        assert_eq!(vars.get("BASE").unwrap(), "https://quoted.example");
        assert!(!vars.contains_key("INVALID_LINE"));
    }

    #[test]
    fn read_env_file_missing_file_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let vars = read_env_file(&dir.path().join("missing.env")).unwrap();
        assert!(vars.is_empty());
    }
}
