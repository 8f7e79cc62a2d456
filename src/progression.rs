//! Progression store: the only owner of `ProgressionState`.
//!
//! Every transition that changes state is written through to storage before it
//! returns. A failed write is logged and ignored: the in-memory state stays
//! authoritative and the next transition tries again.
//!
//! Impossible game moves (skipping with no skips left, completing a level
//! twice) are no-ops that return the unchanged state. Level ids outside the
//! campaign are programming errors and return `QuestError::UnknownLevel`.

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::domain::ProgressionState;
use crate::error::QuestError;
use crate::storage::Storage;

pub const STORAGE_KEY: &str = "sql-quest-game";
pub const DEFAULT_LIVES: u32 = 3;

/// Single-writer handle shared by the HTTP handlers and every controller.
pub type SharedProgress = Arc<Mutex<ProgressionStore>>;

pub struct ProgressionStore {
  state: ProgressionState,
  storage: Arc<dyn Storage>,
  key: String,
  campaign_len: u32,
  starting_lives: u32,
}

impl ProgressionStore {
  /// Build a store and rehydrate it from `storage`.
  pub fn open(storage: Arc<dyn Storage>, key: impl Into<String>, campaign_len: u32, starting_lives: u32) -> Self {
    let mut store = Self {
      state: ProgressionState::fresh(starting_lives),
      storage,
      key: key.into(),
      campaign_len,
      starting_lives,
    };
    store.load();
    store
  }

  pub fn shared(self) -> SharedProgress {
    Arc::new(Mutex::new(self))
  }

  /// Re-read storage. Absent, unreadable or inconsistent records fall back to
  /// defaults; nothing is propagated.
  #[instrument(level = "debug", skip(self), fields(key = %self.key))]
  pub fn load(&mut self) -> ProgressionState {
    let defaults = ProgressionState::fresh(self.starting_lives);
    self.state = match self.storage.read(&self.key) {
      Ok(Some(raw)) => match serde_json::from_str::<ProgressionState>(&raw) {
        Ok(s) if self.is_consistent(&s) => {
          info!(target: "progress", current_level = s.current_level, completed = s.completed_levels.len(), "Progress restored");
          s
        }
        Ok(s) => {
          warn!(target: "progress", current_level = s.current_level, skips = s.skips_used, lives = s.lives, "Stored progress breaks invariants; starting fresh");
          defaults
        }
        Err(e) => {
          warn!(target: "progress", error = %e, "Stored progress is malformed; starting fresh");
          defaults
        }
      },
      Ok(None) => {
        debug!(target: "progress", "No stored progress; starting fresh");
        defaults
      }
      Err(e) => {
        warn!(target: "progress", error = %e, "Could not read stored progress; starting fresh");
        defaults
      }
    };
    self.state.clone()
  }

  pub fn state(&self) -> &ProgressionState { &self.state }

  pub fn current_level(&self) -> u32 { self.state.current_level }

  pub fn completed_levels(&self) -> &BTreeSet<u32> { &self.state.completed_levels }

  pub fn remaining_skips(&self) -> u32 { self.state.lives.saturating_sub(self.state.skips_used) }

  pub fn is_unlocked(&self, level_id: u32) -> bool {
    level_id <= self.state.current_level || self.state.completed_levels.contains(&level_id)
  }

  pub fn campaign_complete(&self) -> bool {
    (1..=self.campaign_len).all(|id| self.state.completed_levels.contains(&id))
  }

  #[instrument(level = "info", skip(self))]
  pub fn complete_level(&mut self, level_id: u32) -> Result<ProgressionState, QuestError> {
    self.check_level(level_id)?;
    if self.state.completed_levels.contains(&level_id) {
      debug!(target: "progress", level_id, "Level already completed; nothing to do");
      return Ok(self.state.clone());
    }
    self.state.completed_levels.insert(level_id);
    self.state.last_completed_level = Some(level_id);
    self.advance_past(level_id);
    info!(target: "progress", level_id, current_level = self.state.current_level, "Level completed");
    self.persist();
    Ok(self.state.clone())
  }

  /// Marks `level_id` complete at the cost of one skip. No-op when no skips
  /// remain or the level is already complete.
  #[instrument(level = "info", skip(self))]
  pub fn skip_level(&mut self, level_id: u32) -> Result<ProgressionState, QuestError> {
    self.check_level(level_id)?;
    if self.state.skips_used >= self.state.lives {
      info!(target: "progress", level_id, skips_used = self.state.skips_used, "No skips remaining");
      return Ok(self.state.clone());
    }
    if self.state.completed_levels.contains(&level_id) {
      debug!(target: "progress", level_id, "Level already completed; skip not charged");
      return Ok(self.state.clone());
    }
    self.state.skips_used += 1;
    self.state.completed_levels.insert(level_id);
    self.advance_past(level_id);
    info!(target: "progress", level_id, skips_used = self.state.skips_used, current_level = self.state.current_level, "Level skipped");
    self.persist();
    Ok(self.state.clone())
  }

  /// Back to defaults, keeping only `has_seen_intro`.
  #[instrument(level = "info", skip(self))]
  pub fn reset_game(&mut self) -> ProgressionState {
    let seen = self.state.has_seen_intro;
    self.state = ProgressionState::fresh(self.starting_lives);
    self.state.has_seen_intro = seen;
    info!(target: "progress", "Game reset");
    self.persist();
    self.state.clone()
  }

  /// Removes the stored record entirely; the intro flag goes with it.
  #[instrument(level = "info", skip(self))]
  pub fn wipe_saved_data(&mut self) -> ProgressionState {
    if let Err(e) = self.storage.remove(&self.key) {
      warn!(target: "progress", error = %e, "Failed to remove stored progress");
    }
    self.state = ProgressionState::fresh(self.starting_lives);
    info!(target: "progress", "Saved data wiped");
    self.state.clone()
  }

  pub fn mark_intro_seen(&mut self) -> ProgressionState {
    if !self.state.has_seen_intro {
      self.state.has_seen_intro = true;
      self.persist();
    }
    self.state.clone()
  }

  pub fn clear_transient_completion_flag(&mut self) -> ProgressionState {
    if self.state.last_completed_level.take().is_some() {
      debug!(target: "progress", "Completion hint cleared");
      self.persist();
    }
    self.state.clone()
  }

  /// Clears the hint only while it still names `level_id`; a newer completion
  /// keeps its own hint.
  pub fn clear_transient_completion_flag_for(&mut self, level_id: u32) -> ProgressionState {
    if self.state.last_completed_level == Some(level_id) {
      return self.clear_transient_completion_flag();
    }
    debug!(target: "progress", level_id, hint = ?self.state.last_completed_level, "Completion hint moved on; left alone");
    self.state.clone()
  }

  fn check_level(&self, level_id: u32) -> Result<(), QuestError> {
    if (1..=self.campaign_len).contains(&level_id) {
      Ok(())
    } else {
      Err(QuestError::UnknownLevel { level_id, campaign_len: self.campaign_len })
    }
  }

  // The final level only gets marked; there is nothing past it.
  fn advance_past(&mut self, level_id: u32) {
    if level_id == self.state.current_level && level_id < self.campaign_len {
      self.state.current_level = level_id + 1;
    }
  }

  fn is_consistent(&self, s: &ProgressionState) -> bool {
    (1..=self.campaign_len).contains(&s.current_level)
      && s.completed_levels.iter().all(|id| (1..=self.campaign_len).contains(id))
      && s.skips_used <= s.lives
  }

  fn persist(&self) {
    let raw = match serde_json::to_string(&self.state) {
      Ok(raw) => raw,
      Err(e) => {
        warn!(target: "progress", error = %e, "Failed to serialize progress");
        return;
      }
    };
    if let Err(e) = self.storage.write(&self.key, &raw) {
      warn!(target: "progress", error = %e, "Failed to persist progress; keeping in-memory state");
    }
  }
}

/// Clears the completion hint for `level_id` once `delay` has passed.
///
/// The task is detached from whoever scheduled it, so a closed connection does
/// not leave the hint behind. Must be called inside a tokio runtime.
pub fn expire_completion_hint(progress: SharedProgress, level_id: u32, delay: Duration) {
  tokio::spawn(async move {
    tokio::time::sleep(delay).await;
    progress.lock().await.clear_transient_completion_flag_for(level_id);
  });
}
