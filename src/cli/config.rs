use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use serde_json::{Map, Value as JsonValue};
use tokio::fs;
use tracing::info;

use super::output::{emit, OutputFormat};
use crate::cli::context::CliContext;
use crate::config::AppConfig;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Set a configuration value (dotted key, e.g. engine.username_wait_ms)
    Set {
        /// Configuration key
        key: String,

        /// Configuration value (parsed as JSON when possible)
        value: String,
    },

    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// Reset configuration to defaults
    Reset,

    /// Validate the configuration file
    Validate,
}

pub async fn cmd_config(args: ConfigArgs, ctx: &CliContext) -> Result<()> {
    let path = ctx.config_path().to_path_buf();
    match args.action {
        ConfigAction::Show => {
            let config = ctx.config();
            if ctx.output() == OutputFormat::Human {
                println!("Current configuration ({}):", path.display());
                print!("{}", serde_yaml::to_string(config)?);
            } else {
                emit(ctx.output(), config, |_| {})?;
            }
        }
        ConfigAction::Set { key, value } => {
            let config = load_config_file(&path).await?;
            let mut json = serde_json::to_value(&config)?;
            let segments = split_key(&key)?;
            set_json_value(&mut json, &segments, parse_cli_value(&value))?;
            let config: AppConfig = serde_json::from_value(json)
                .with_context(|| format!("{} does not accept {}", key, value))?;
            save_config_file(&path, &config).await?;
            info!(%key, "updated configuration key");
            println!("Saved configuration to {}", path.display());
        }
        ConfigAction::Get { key } => {
            let json = serde_json::to_value(ctx.config())?;
            let segments = split_key(&key)?;
            let Some(value) = get_json_value(&json, &segments) else {
                bail!("{} not found in configuration", key);
            };
            match ctx.output() {
                OutputFormat::Json => println!("{}", serde_json::to_string(value)?),
                _ => print!("{}", serde_yaml::to_string(value)?),
            }
        }
        ConfigAction::Reset => {
            save_config_file(&path, &AppConfig::default()).await?;
            println!(
                "Configuration reset to defaults and written to {}",
                path.display()
            );
        }
        ConfigAction::Validate => {
            if fs::try_exists(&path).await? {
                load_config_file(&path).await?;
                println!("Configuration file {} is valid", path.display());
            } else {
                println!(
                    "No configuration file at {}; defaults are valid",
                    path.display()
                );
            }
        }
    }

    Ok(())
}

async fn load_config_file(path: &Path) -> Result<AppConfig> {
    if !fs::try_exists(path).await? {
        return Ok(AppConfig::default());
    }
    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_yaml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

async fn save_config_file(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let serialized = serde_yaml::to_string(config)?;
    fs::write(path, serialized)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn parse_cli_value(raw: &str) -> JsonValue {
    serde_json::from_str(raw).unwrap_or_else(|_| JsonValue::String(raw.to_string()))
}

fn split_key(key: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = key
        .split('.')
        .filter(|segment| !segment.is_empty())
        .collect();
    if segments.is_empty() {
        bail!("configuration key cannot be empty");
    }
    Ok(segments)
}

fn set_json_value(target: &mut JsonValue, path: &[&str], value: JsonValue) -> Result<()> {
    let Some((last, parents)) = path.split_last() else {
        bail!("configuration key cannot be empty");
    };
    let mut current = target;
    for segment in parents {
        current = ensure_object(current, segment)?
            .entry((*segment).to_string())
            .or_insert(JsonValue::Null);
    }
    ensure_object(current, last)?.insert((*last).to_string(), value);
    Ok(())
}

fn ensure_object<'a>(
    value: &'a mut JsonValue,
    segment: &str,
) -> Result<&'a mut Map<String, JsonValue>> {
    if value.is_null() {
        *value = JsonValue::Object(Map::new());
    }
    match value {
        JsonValue::Object(map) => Ok(map),
        _ => bail!(
            "{} resolves to a non-object value; cannot assign nested configuration",
            segment
        ),
    }
}

fn get_json_value<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a JsonValue> {
    let mut current = value;
    for segment in path {
        match current {
            JsonValue::Object(map) => {
                current = map.get(*segment)?;
            }
            _ => return None,
        }
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_and_get_nested_keys() {
        let mut doc = serde_json::to_value(AppConfig::default()).unwrap();
        set_json_value(&mut doc, &["engine", "username_wait_ms"], JsonValue::from(900)).unwrap();
        set_json_value(&mut doc, &["probe", "retry", "max_attempts"], JsonValue::from(3)).unwrap();
        assert_eq!(
            get_json_value(&doc, &["engine", "username_wait_ms"]),
            Some(&JsonValue::from(900))
        );
        let config: AppConfig = serde_json::from_value(doc).unwrap();
        assert_eq!(config.probe.retry.max_attempts, 3);
    }

    #[test]
    fn scalar_parent_is_rejected() {
        let mut doc = json!({ "host": { "login_url": "https://x.com" } });
        assert!(set_json_value(&mut doc, &["host", "login_url", "scheme"], json!("http")).is_err());
        assert!(split_key("..").is_err());
    }
}
