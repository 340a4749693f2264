//! `~/.abacus` paths and configuration.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use abacus_enrich::{AnthropicBackend, DEFAULT_MODEL};

pub fn abacus_home() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".abacus"))
}

pub fn ensure_abacus_home() -> Result<PathBuf> {
    let dir = abacus_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_abacus_home()?.join("config.json"))
}

pub fn store_path() -> Result<PathBuf> {
    Ok(ensure_abacus_home()?.join("store.json"))
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: Option<String>,
}

pub fn read_config() -> Result<Config> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents =
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    Ok(serde_json::from_str(&contents)?)
}

pub fn write_config(config: &Config) -> Result<()> {
    let path = config_path()?;
    let json = serde_json::to_string_pretty(config)?;
    fs::write(&path, json).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

impl Config {
    /// Build the inference backend. `ANTHROPIC_API_KEY` overrides the stored
    /// key; a missing key surfaces on the first call, not here.
    pub fn backend(&self) -> AnthropicBackend {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .or_else(|| self.api_key.clone());
        let model = self
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        AnthropicBackend::new(api_key, model)
    }
}
