//! Application state: the composition root.
//!
//! This module owns:
//!   - the campaign (from TOML config or the built-in seeds)
//!   - the single progression store, shared by handle with every controller
//!   - game settings
//!
//! A campaign from config that fails validation is logged and replaced by the
//! built-in one rather than refusing to start.

use std::{sync::Arc, time::Duration};

use tracing::{error, info, instrument};

use crate::campaign::Campaign;
use crate::config::{load_quest_config_from_env, storage_backend_from_env, GameSettings, StorageBackend};
use crate::error::QuestError;
use crate::progression::{expire_completion_hint, ProgressionStore, SharedProgress};
use crate::seeds::seed_levels;
use crate::storage::{FileStorage, MemoryStorage, Storage};

#[derive(Clone)]
pub struct AppState {
    pub campaign: Arc<Campaign>,
    pub progress: SharedProgress,
    pub settings: GameSettings,
}

impl AppState {
    /// Build state from env: load config, build the campaign, open the store.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Result<Self, QuestError> {
        let cfg = load_quest_config_from_env().unwrap_or_default();

        let campaign = if cfg.levels.is_empty() {
            Campaign::new(seed_levels())?
        } else {
            match Campaign::new(cfg.levels) {
                Ok(c) => c,
                Err(e) => {
                    error!(target: "sql_quest", error = %e, "Configured campaign rejected; using built-in levels");
                    Campaign::new(seed_levels())?
                }
            }
        };

        let storage: Arc<dyn Storage> = match storage_backend_from_env() {
            StorageBackend::File(dir) => {
                info!(target: "sql_quest", dir = %dir.display(), "Progress stored on disk");
                Arc::new(FileStorage::new(dir))
            }
            StorageBackend::Memory => {
                info!(target: "sql_quest", "Progress kept in memory only");
                Arc::new(MemoryStorage::new())
            }
        };

        Ok(Self::with_parts(campaign, storage, cfg.game))
    }

    pub fn with_parts(campaign: Campaign, storage: Arc<dyn Storage>, settings: GameSettings) -> Self {
        let store = ProgressionStore::open(storage, settings.storage_key.clone(), campaign.len(), settings.starting_lives);
        info!(
            target: "sql_quest",
            levels = campaign.len(),
            current_level = store.current_level(),
            starting_lives = settings.starting_lives,
            "Campaign loaded"
        );
        Self {
            campaign: Arc::new(campaign),
            progress: store.shared(),
            settings,
        }
    }

    /// Schedules the "just completed" hint for `level_id` to clear after
    /// `completion_flag_secs`.
    pub fn expire_completion_hint(&self, level_id: u32) {
        let delay = Duration::from_secs(self.settings.completion_flag_secs);
        expire_completion_hint(self.progress.clone(), level_id, delay);
    }

    /// A hint restored from storage has no timer behind it; start one.
    pub async fn expire_restored_hint(&self) {
        let restored = self.progress.lock().await.state().last_completed_level;
        if let Some(level_id) = restored {
            info!(target: "sql_quest", level_id, "Restored completion hint scheduled to clear");
            self.expire_completion_hint(level_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progression::STORAGE_KEY;
    use crate::storage::MemoryStorage;

    #[tokio::test(start_paused = true)]
    async fn restored_hint_is_cleared_after_restart() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .write(
                STORAGE_KEY,
                r#"{"currentLevel":2,"progress":[1],"lives":3,"skipCount":0,"videoWatched":true,"lastCompletedLevel":1}"#,
            )
            .unwrap();
        let state = AppState::with_parts(Campaign::new(seed_levels()).unwrap(), storage.clone(), GameSettings::default());
        assert_eq!(state.progress.lock().await.state().last_completed_level, Some(1));

        state.expire_restored_hint().await;
        tokio::time::sleep(Duration::from_secs(6)).await;
        tokio::task::yield_now().await;

        let p = state.progress.lock().await.state().clone();
        assert_eq!(p.last_completed_level, None);
        assert_eq!(p.current_level, 2);
        let raw = storage.read(STORAGE_KEY).unwrap().unwrap();
        let stored: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(stored["lastCompletedLevel"].is_null());
    }
}
