//! The campaign: an ordered, validated list of compiled levels.
//!
//! Compiling a level normalizes its accepted answers (and stage answers /
//! required tokens) once, so judging a submission only normalizes the input.

use std::{sync::Arc, time::Duration};

use crate::domain::{ChallengeKind, LevelDefinition, MatchVerdict};
use crate::error::QuestError;
use crate::matcher::{judge, normalize_tokens, AnswerKey, Strategy};

#[derive(Debug)]
pub struct Level {
  pub def: LevelDefinition,
  answers: AnswerKey,
  stages: Vec<AnswerKey>,
  required_tokens: Vec<String>,
}

impl Level {
  pub fn compile(def: LevelDefinition) -> Self {
    let stages = match &def.kind {
      ChallengeKind::MultiStageQuery { stages } => stages.iter().map(|s| AnswerKey::new(s)).collect(),
      _ => Vec::new(),
    };
    let required_tokens = match &def.kind {
      ChallengeKind::FillInBlanks { required_tokens } => normalize_tokens(required_tokens),
      _ => Vec::new(),
    };
    Self { answers: AnswerKey::new(&def.accepted_answers), stages, required_tokens, def }
  }

  pub fn id(&self) -> u32 { self.def.id }

  /// Prerequisite stages before the level's own answers (0 unless multi-stage).
  pub fn stage_count(&self) -> usize { self.stages.len() }

  pub fn time_limit(&self) -> Option<Duration> {
    match self.def.kind {
      ChallengeKind::TimedQuery { time_limit_secs } => Some(Duration::from_secs(time_limit_secs)),
      _ => None,
    }
  }

  /// Judge `input` at `stage`. Stages past the last prerequisite use the
  /// level's own strategy.
  pub fn judge(&self, input: &str, stage: usize) -> MatchVerdict {
    let strategy = match (self.stages.get(stage), &self.def.kind) {
      (Some(key), _) => Strategy::Exact(key),
      (None, ChallengeKind::FillInBlanks { .. }) => Strategy::RequiredTokens(&self.required_tokens),
      (None, _) => Strategy::Exact(&self.answers),
    };
    judge(input, strategy)
  }

  fn validate(&self) -> Result<(), String> {
    let id = self.id();
    match &self.def.kind {
      ChallengeKind::FillInBlanks { .. } => {
        if self.required_tokens.iter().all(|t| t.is_empty()) {
          return Err(format!("level {id}: fill_in_blanks needs at least one required token"));
        }
      }
      ChallengeKind::TimedQuery { time_limit_secs: 0 } => {
        return Err(format!("level {id}: time_limit_secs must be positive"));
      }
      ChallengeKind::MultiStageQuery { .. } if self.stages.iter().any(AnswerKey::is_empty) => {
        return Err(format!("level {id}: every stage needs an accepted answer"));
      }
      _ => {}
    }
    if self.answers.is_empty() && !matches!(self.def.kind, ChallengeKind::FillInBlanks { .. }) {
      return Err(format!("level {id}: no accepted answers"));
    }
    Ok(())
  }
}

#[derive(Debug)]
pub struct Campaign {
  levels: Vec<Arc<Level>>,
}

impl Campaign {
  /// Ids must be dense and unique (1..=N); every level must be answerable.
  pub fn new(mut defs: Vec<LevelDefinition>) -> Result<Self, QuestError> {
    if defs.is_empty() {
      return Err(QuestError::InvalidCampaign("no levels".into()));
    }
    defs.sort_by_key(|d| d.id);
    for (i, d) in defs.iter().enumerate() {
      let expected = i as u32 + 1;
      if d.id != expected {
        return Err(QuestError::InvalidCampaign(format!(
          "level ids must be 1..={} without gaps or duplicates; found {} where {} was expected",
          defs.len(),
          d.id,
          expected
        )));
      }
    }
    let levels: Vec<Level> = defs.into_iter().map(Level::compile).collect();
    for l in &levels {
      l.validate().map_err(QuestError::InvalidCampaign)?;
    }
    Ok(Self { levels: levels.into_iter().map(Arc::new).collect() })
  }

  pub fn len(&self) -> u32 { self.levels.len() as u32 }

  pub fn get(&self, level_id: u32) -> Result<Arc<Level>, QuestError> {
    level_id
      .checked_sub(1)
      .and_then(|i| self.levels.get(i as usize))
      .cloned()
      .ok_or(QuestError::UnknownLevel { level_id, campaign_len: self.len() })
  }

  pub fn levels(&self) -> impl Iterator<Item = &Arc<Level>> {
    self.levels.iter()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn def(id: u32, answers: &[&str], kind: ChallengeKind) -> LevelDefinition {
    LevelDefinition {
      id,
      title: format!("Level {id}"),
      accepted_answers: answers.iter().map(|s| s.to_string()).collect(),
      kind,
      max_wrong_attempts: 3,
      requires_precondition: false,
    }
  }

  #[test]
  fn orders_levels_and_looks_them_up() {
    let c = Campaign::new(vec![
      def(2, &["select 2"], ChallengeKind::SingleQuery),
      def(1, &["select 1"], ChallengeKind::SingleQuery),
    ])
    .unwrap();
    assert_eq!(c.len(), 2);
    assert_eq!(c.get(1).unwrap().id(), 1);
    assert!(matches!(c.get(0), Err(QuestError::UnknownLevel { level_id: 0, campaign_len: 2 })));
    assert!(matches!(c.get(3), Err(QuestError::UnknownLevel { level_id: 3, .. })));
  }

  #[test]
  fn rejects_gaps_duplicates_and_empty() {
    assert!(Campaign::new(vec![]).is_err());
    assert!(Campaign::new(vec![def(1, &["a"], ChallengeKind::SingleQuery), def(3, &["b"], ChallengeKind::SingleQuery)]).is_err());
    assert!(Campaign::new(vec![def(1, &["a"], ChallengeKind::SingleQuery), def(1, &["b"], ChallengeKind::SingleQuery)]).is_err());
  }

  #[test]
  fn rejects_unanswerable_levels() {
    assert!(Campaign::new(vec![def(1, &[], ChallengeKind::SingleQuery)]).is_err());
    assert!(Campaign::new(vec![def(1, &["a"], ChallengeKind::TimedQuery { time_limit_secs: 0 })]).is_err());
    assert!(Campaign::new(vec![def(1, &[], ChallengeKind::FillInBlanks { required_tokens: vec![" ".into()] })]).is_err());
    assert!(Campaign::new(vec![def(1, &["a"], ChallengeKind::MultiStageQuery { stages: vec![vec![]] })]).is_err());
    // fill-in-blanks does not need full answers
    assert!(Campaign::new(vec![def(1, &[], ChallengeKind::FillInBlanks { required_tokens: vec!["select".into()] })]).is_ok());
  }

  #[test]
  fn multi_stage_judges_stages_then_final() {
    let level = Level::compile(def(
      1,
      &["select * from vault"],
      ChallengeKind::MultiStageQuery { stages: vec![vec!["select * from doors".into()]] },
    ));
    assert_eq!(level.stage_count(), 1);
    assert!(level.judge("SELECT * FROM doors", 0).accepted);
    assert!(!level.judge("select * from vault", 0).accepted);
    assert!(level.judge("select * from vault;", 1).accepted);
  }

  #[test]
  fn fill_in_blanks_uses_required_tokens() {
    let level = Level::compile(def(
      1,
      &["select count(*) from dragons"],
      ChallengeKind::FillInBlanks { required_tokens: vec!["count(*)".into(), "dragons".into()] },
    ));
    let v = level.judge("select count(*) from dragons where age > 100", 0);
    assert!(v.accepted);
    assert_eq!(v.matched_canonical_index, None);
  }
}
