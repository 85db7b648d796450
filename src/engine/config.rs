//! Engine configuration.
//!
//! Stored as JSON in the user's config directory, by default
//! `~/.config/voxrelay/config.json`. Every field has a default, so a partial
//! file only overrides what it names.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::error::EngineResult;
use super::params::ParamStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  pub sample_rate: u32,
  /// Frames per callback.
  pub block_size: u32,
  pub channels: u16,
  /// Blocks held by the relay before the oldest is dropped.
  pub relay_capacity: usize,
  pub master_gain: f32,
  pub mic_gain: f32,
  pub input_channels: u16,
  /// Device name substrings; `None` picks the host default.
  pub primary_device: Option<String>,
  /// No secondary stream is opened when unset.
  pub secondary_device: Option<String>,
  pub input_device: Option<String>,
  pub sounds: BTreeMap<u32, SoundSlot>,
  pub params: BTreeMap<String, f32>,
  pub effects: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoundSlot {
  pub path: PathBuf,
  #[serde(default = "unity")]
  pub gain: f32,
}

fn unity() -> f32 { 1.0 }

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      sample_rate: 48_000,
      block_size: 1024,
      channels: 2,
      relay_capacity: 256,
      master_gain: 1.0,
      mic_gain: 1.5,
      input_channels: 1,
      primary_device: None,
      secondary_device: None,
      input_device: None,
      sounds: BTreeMap::new(),
      params: BTreeMap::new(),
      effects: Vec::new(),
    }
  }
}

impl EngineConfig {
  pub fn from_json(s: &str) -> EngineResult<Self> { Ok(serde_json::from_str(s)?) }

  /// Writes `params` overrides into the store. Unknown keys are reported and
  /// skipped; the rest still apply.
  pub fn apply_params(&self, store: &ParamStore) -> usize {
    let mut applied = 0;
    for (k, v) in &self.params {
      match store.set(k, *v) {
        Ok(()) => applied += 1,
        Err(e) => log::warn!("config: {e}"),
      }
    }
    applied
  }
}

/// `~/.config/voxrelay/config.json`
pub fn default_config_path() -> PathBuf {
  dirs::config_dir()
    .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    .join("voxrelay")
    .join("config.json")
}

/// Missing file gives defaults; an unreadable or invalid one is reported and
/// also gives defaults.
pub fn load_config(path: &Path) -> EngineConfig {
  log::info!("load_config: loading from {:?}", path);
  if !path.exists() {
    log::info!("load_config: no config file, using defaults");
    return EngineConfig::default();
  }
  match std::fs::read_to_string(path) {
    Ok(contents) => match EngineConfig::from_json(&contents) {
      Ok(cfg) => {
        log::info!(
          "load_config: {} Hz, block {}, {} ch, relay {} blocks, {} sounds",
          cfg.sample_rate,
          cfg.block_size,
          cfg.channels,
          cfg.relay_capacity,
          cfg.sounds.len()
        );
        cfg
      }
      Err(e) => {
        log::warn!("load_config: {e}, using defaults");
        EngineConfig::default()
      }
    },
    Err(e) => {
      log::warn!("load_config: failed to read config file: {e}, using defaults");
      EngineConfig::default()
    }
  }
}
