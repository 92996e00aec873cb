use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;

use crate::assistant::Provider;

pub const CONFIG_ENV: &str = "GJ_CONFIG";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProfileConfig {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub system: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout: Option<u64>,
    pub retries: Option<u32>,
    pub retry_delay: Option<u64>,
    pub output: Option<String>,
    pub show_usage: Option<bool>,
    pub stream: Option<bool>,
    pub backend_url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    profiles: Option<HashMap<String, ProfileConfig>>,
}

fn read_config() -> Result<(PathBuf, ConfigFile), String> {
    let path = config_path()?;
    let raw = fs::read_to_string(&path)
        .map_err(|err| format!("Failed to read config file '{}': {err}", path.display()))?;

    let config: ConfigFile = toml::from_str(&raw)
        .map_err(|err| format!("Failed to parse config file '{}': {err}", path.display()))?;

    Ok((path, config))
}

pub fn load_profile(name: &str) -> Result<ProfileConfig, String> {
    let (path, config) = read_config()?;

    let profiles = config.profiles.ok_or_else(|| {
        format!(
            "Config file '{}' does not contain a [profiles] section.",
            path.display()
        )
    })?;

    profiles.get(name).cloned().ok_or_else(|| {
        format!(
            "Profile '{}' not found in config file '{}'.",
            name,
            path.display()
        )
    })
}

/// Parses the config file and checks every profile, or only `profile`.
pub fn validate_config(profile: Option<&str>) -> Result<PathBuf, String> {
    let (path, config) = read_config()?;
    let profiles = config.profiles.unwrap_or_default();

    match profile {
        Some(name) => {
            let selected = profiles.get(name).ok_or_else(|| {
                format!(
                    "Profile '{}' not found in config file '{}'.",
                    name,
                    path.display()
                )
            })?;
            validate_profile(name, selected)?;
        }
        None => {
            let mut names: Vec<&String> = profiles.keys().collect();
            names.sort();
            for name in names {
                validate_profile(name, &profiles[name])?;
            }
        }
    }

    Ok(path)
}

fn validate_profile(name: &str, profile: &ProfileConfig) -> Result<(), String> {
    if let Some(provider) = &profile.provider {
        if Provider::from_str(provider).is_err() {
            return Err(format!(
                "Invalid profile provider '{provider}' in profile '{name}'. Supported values: {}.",
                Provider::supported_values()
            ));
        }
    }
    if let Some(output) = &profile.output {
        if !matches!(output.as_str(), "text" | "json" | "html") {
            return Err(format!(
                "Invalid profile output '{output}' in profile '{name}'. Supported values: text, json, html."
            ));
        }
    }
    if let Some(temperature) = profile.temperature {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(format!(
                "Invalid profile temperature '{temperature}' in profile '{name}'. Expected 0.0 to 2.0."
            ));
        }
    }
    Ok(())
}

/// `GJ_CONFIG`, then `$XDG_CONFIG_HOME/guji/config.toml`, then `~/.config/guji/config.toml`.
pub fn config_path() -> Result<PathBuf, String> {
    if let Ok(path) = env::var(CONFIG_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }

    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        let trimmed = xdg.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed).join("guji").join("config.toml"));
        }
    }

    let home = env::var("HOME").map_err(|_| {
        format!("Cannot resolve config path: set {CONFIG_ENV} or HOME/XDG_CONFIG_HOME.")
    })?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("guji")
        .join("config.toml"))
}

/// Reads `name`, treating unset and blank values alike.
pub fn env_value(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Reads and parses `name`, naming the variable when the value is invalid.
pub fn env_parsed<T: FromStr>(name: &str, expected: &str) -> Result<Option<T>, String> {
    match env_value(name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| format!("Invalid {name} '{raw}'. Expected {expected}.")),
        None => Ok(None),
    }
}

/// Backend URL from the flag, then `GJ_BACKEND_URL`, then the local default.
pub fn backend_url(flag: Option<&str>) -> String {
    flag.map(str::to_string)
        .or_else(|| env_value(crate::backend::BACKEND_URL_ENV))
        .unwrap_or_else(|| crate::backend::DEFAULT_BACKEND_URL.to_string())
}
