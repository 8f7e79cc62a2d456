//! Domain models: level definitions, challenge kinds, verdicts, submissions and
//! the persisted progression record.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which controller behaviour and matcher strategy a level uses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChallengeKind {
  /// Exact-after-normalization against the accepted answers.
  SingleQuery,
  /// Like `SingleQuery`, with a countdown that forces a restart on expiry.
  TimedQuery { time_limit_secs: u64 },
  /// Every required token must appear somewhere in the normalized answer.
  FillInBlanks { required_tokens: Vec<String> },
  /// Ordered prerequisite stages, then the level's own accepted answers.
  MultiStageQuery { stages: Vec<Vec<String>> },
}
impl Default for ChallengeKind {
  fn default() -> Self { ChallengeKind::SingleQuery }
}

impl ChallengeKind {
  pub fn label(&self) -> &'static str {
    match self {
      ChallengeKind::SingleQuery => "single_query",
      ChallengeKind::TimedQuery { .. } => "timed_query",
      ChallengeKind::FillInBlanks { .. } => "fill_in_blanks",
      ChallengeKind::MultiStageQuery { .. } => "multi_stage_query",
    }
  }
}

/// Static, author-provided description of one campaign stage.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LevelDefinition {
  pub id: u32,
  #[serde(default)] pub title: String,
  #[serde(default, alias = "acceptedAnswers")] pub accepted_answers: Vec<String>,
  #[serde(default)] pub kind: ChallengeKind,
  /// Wrong submissions allowed before the level restarts (0 = never).
  #[serde(default, alias = "maxWrongAttempts")] pub max_wrong_attempts: u32,
  /// Judgement is withheld until the host reports the in-game precondition met.
  #[serde(default, alias = "requiresPrecondition")] pub requires_precondition: bool,
}

/// One player attempt. Consumed by the matcher, never persisted.
#[derive(Clone, Debug)]
pub struct AnswerSubmission {
  pub raw_text: String,
  pub level_id: u32,
  pub timestamp: DateTime<Utc>,
}

impl AnswerSubmission {
  pub fn new(level_id: u32, raw_text: impl Into<String>) -> Self {
    Self { raw_text: raw_text.into(), level_id, timestamp: Utc::now() }
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchVerdict {
  pub accepted: bool,
  pub matched_canonical_index: Option<usize>,
  pub normalized_input: String,
  /// Required tokens not found (fill-in-blanks only).
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub missing_tokens: Vec<String>,
}

/// The single persisted progress record.
///
/// Field names on the wire follow the stored layout (`progress`, `skipCount`,
/// `videoWatched`), which predates the names used in code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionState {
  pub current_level: u32,
  #[serde(rename = "progress")]
  pub completed_levels: BTreeSet<u32>,
  pub lives: u32,
  #[serde(rename = "skipCount")]
  pub skips_used: u32,
  #[serde(rename = "videoWatched")]
  pub has_seen_intro: bool,
  #[serde(default)]
  pub last_completed_level: Option<u32>,
}

impl ProgressionState {
  pub fn fresh(lives: u32) -> Self {
    Self {
      current_level: 1,
      completed_levels: BTreeSet::new(),
      lives,
      skips_used: 0,
      has_seen_intro: false,
      last_completed_level: None,
    }
  }
}
