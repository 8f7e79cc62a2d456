//! Error taxonomy.
//!
//! Only programming errors at the boundary (bad level ids, a broken campaign
//! file) become `QuestError`s. Ordinary play never produces one: rejected
//! answers are verdicts and impossible skips are no-ops.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuestError {
  #[error("unknown level {level_id} (campaign has {campaign_len} levels)")]
  UnknownLevel { level_id: u32, campaign_len: u32 },

  #[error("submission for level {got} sent to the controller of level {expected}")]
  LevelMismatch { expected: u32, got: u32 },

  #[error("invalid campaign: {0}")]
  InvalidCampaign(String),
}

/// Durable storage failures. Logged by the progression store, never surfaced.
#[derive(Debug, Error)]
pub enum StorageError {
  #[error("storage i/o failed: {0}")]
  Io(#[from] std::io::Error),

  #[error("storage unavailable: {0}")]
  Unavailable(String),
}
