//! Loading game configuration (settings + optional campaign) from TOML, and
//! the storage backend from the environment.
//!
//! See `QuestConfig` and `GameSettings` for the expected schema.

use std::path::PathBuf;

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::LevelDefinition;
use crate::progression::{DEFAULT_LIVES, STORAGE_KEY};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct QuestConfig {
  #[serde(default)]
  pub game: GameSettings,
  /// Replaces the built-in campaign when non-empty.
  #[serde(default)]
  pub levels: Vec<LevelDefinition>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GameSettings {
  pub starting_lives: u32,
  /// How long the "you just completed level N" hint stays up.
  pub completion_flag_secs: u64,
  pub storage_key: String,
}

impl Default for GameSettings {
  fn default() -> Self {
    Self {
      starting_lives: DEFAULT_LIVES,
      completion_flag_secs: 5,
      storage_key: STORAGE_KEY.into(),
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageBackend {
  File(PathBuf),
  Memory,
}

pub fn parse_quest_config(s: &str) -> Result<QuestConfig, toml::de::Error> {
  toml::from_str::<QuestConfig>(s)
}

/// Attempt to load `QuestConfig` from QUEST_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_quest_config_from_env() -> Option<QuestConfig> {
  let path = std::env::var("QUEST_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_quest_config(&s) {
      Ok(cfg) => {
        info!(target: "sql_quest", %path, levels = cfg.levels.len(), "Loaded quest config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "sql_quest", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "sql_quest", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

/// QUEST_STORAGE=memory keeps progress in-process; anything else writes JSON
/// files under QUEST_DATA_DIR (default `./data`).
pub fn storage_backend_from_env() -> StorageBackend {
  storage_backend_from(
    std::env::var("QUEST_STORAGE").ok().as_deref(),
    std::env::var("QUEST_DATA_DIR").ok().as_deref(),
  )
}

fn storage_backend_from(kind: Option<&str>, dir: Option<&str>) -> StorageBackend {
  match kind {
    Some(k) if k.eq_ignore_ascii_case("memory") => StorageBackend::Memory,
    _ => StorageBackend::File(PathBuf::from(dir.unwrap_or("./data"))),
  }
}
