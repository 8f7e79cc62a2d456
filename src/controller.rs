//! Challenge controller: one per active level session.
//!
//! ```text
//! Setup --begin--> Active --submit--> AwaitingJudgement --accepted--> Success
//!                    ^                      |
//!                    +------- Failure <-----+ rejected
//!                               |
//!                  attempts used up / countdown expired
//!                               v
//!                            Failed --> Setup (counter, stage and precondition reset)
//! ```
//!
//! The controller is the only caller of the matcher for its level and calls
//! `complete_level` on the progression store exactly once, on success.
//! Countdowns are stamped with an epoch; any transition out of the running
//! states cancels the task and bumps the epoch, so an expiry that was already
//! queued is recognised as stale and dropped.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, instrument, warn};

use crate::campaign::Level;
use crate::domain::{AnswerSubmission, MatchVerdict, ProgressionState};
use crate::error::QuestError;
use crate::progression::SharedProgress;
use crate::timer::ScheduledTask;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  Setup,
  Active,
  AwaitingJudgement,
  Success,
  Failure,
  Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
  AttemptsExhausted,
  TimeExpired,
}

/// What the host should render after a controller call.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
  Ready { level_id: u32, stage: usize, time_limit_secs: Option<u64> },
  Verdict(MatchVerdict),
  StageCleared { stage: usize, remaining_stages: usize },
  /// `remaining` is `None` when the level never restarts on wrong answers.
  WrongAttempt { remaining: Option<u32> },
  /// Submission withheld: the level's in-game precondition is not met yet.
  Gated,
  LevelFailed { reason: FailureReason },
  LevelComplete { level_id: u32, progress: ProgressionState },
  /// Submission arrived outside `Active` and was dropped.
  Ignored { phase: Phase },
}

/// Delivered on the controller's timer channel when a countdown runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerExpired {
  pub level_id: u32,
  pub epoch: u64,
}

pub struct ChallengeController {
  level: Arc<Level>,
  store: SharedProgress,
  timer_tx: UnboundedSender<TimerExpired>,
  phase: Phase,
  stage: usize,
  wrong_attempts: u32,
  precondition_met: bool,
  epoch: u64,
  countdown: Option<ScheduledTask>,
}

impl ChallengeController {
  pub fn new(level: Arc<Level>, store: SharedProgress, timer_tx: UnboundedSender<TimerExpired>) -> Self {
    Self {
      level,
      store,
      timer_tx,
      phase: Phase::Setup,
      stage: 0,
      wrong_attempts: 0,
      precondition_met: false,
      epoch: 0,
      countdown: None,
    }
  }

  pub fn level_id(&self) -> u32 { self.level.id() }
  pub fn phase(&self) -> Phase { self.phase }
  pub fn stage(&self) -> usize { self.stage }
  pub fn wrong_attempts(&self) -> u32 { self.wrong_attempts }

  /// `Setup -> Active`. Starts the countdown for timed levels, so it needs a
  /// tokio runtime when the level has one.
  #[instrument(level = "debug", skip(self), fields(level_id = self.level.id()))]
  pub fn begin(&mut self) -> Vec<ControllerEvent> {
    if self.phase != Phase::Setup {
      return vec![ControllerEvent::Ignored { phase: self.phase }];
    }
    self.phase = Phase::Active;
    self.arm_countdown();
    info!(target: "quest", level_id = self.level.id(), timed = self.countdown.is_some(), "Level ready");
    vec![ControllerEvent::Ready {
      level_id: self.level.id(),
      stage: self.stage,
      time_limit_secs: self.level.time_limit().map(|d| d.as_secs()),
    }]
  }

  /// Host reports the level's in-game precondition satisfied.
  pub fn satisfy_precondition(&mut self) {
    self.precondition_met = true;
  }

  #[instrument(level = "info", skip(self, submission), fields(level_id = self.level.id(), answer_len = submission.raw_text.len()))]
  pub async fn submit(&mut self, submission: AnswerSubmission) -> Result<Vec<ControllerEvent>, QuestError> {
    if submission.level_id != self.level.id() {
      return Err(QuestError::LevelMismatch { expected: self.level.id(), got: submission.level_id });
    }
    if self.phase != Phase::Active {
      debug!(target: "quest", phase = ?self.phase, "Submission outside active phase ignored");
      return Ok(vec![ControllerEvent::Ignored { phase: self.phase }]);
    }
    if self.level.def.requires_precondition && !self.precondition_met {
      debug!(target: "quest", "Submission gated on precondition");
      return Ok(vec![ControllerEvent::Gated]);
    }

    self.phase = Phase::AwaitingJudgement;
    let verdict = self.level.judge(&submission.raw_text, self.stage);
    debug!(target: "quest", accepted = verdict.accepted, stage = self.stage, at = %submission.timestamp, "Submission judged");
    let accepted = verdict.accepted;
    let mut events = vec![ControllerEvent::Verdict(verdict)];

    if accepted {
      if self.stage < self.level.stage_count() {
        self.stage += 1;
        self.phase = Phase::Active;
        events.push(ControllerEvent::StageCleared {
          stage: self.stage,
          remaining_stages: self.level.stage_count() - self.stage,
        });
        return Ok(events);
      }
      self.phase = Phase::Success;
      self.disarm_countdown();
      let progress = self.store.lock().await.complete_level(self.level.id())?;
      info!(target: "quest", level_id = self.level.id(), wrong_attempts = self.wrong_attempts, "Level complete");
      events.push(ControllerEvent::LevelComplete { level_id: self.level.id(), progress });
      return Ok(events);
    }

    self.phase = Phase::Failure;
    self.wrong_attempts += 1;
    let max = self.level.def.max_wrong_attempts;
    if max > 0 && self.wrong_attempts >= max {
      events.push(ControllerEvent::WrongAttempt { remaining: Some(0) });
      events.push(self.fail(FailureReason::AttemptsExhausted));
    } else {
      self.phase = Phase::Active;
      events.push(ControllerEvent::WrongAttempt { remaining: (max > 0).then(|| max - self.wrong_attempts) });
    }
    Ok(events)
  }

  /// Feed a countdown expiry back in. Stale or foreign expiries yield nothing.
  pub fn on_timer_expired(&mut self, expired: TimerExpired) -> Vec<ControllerEvent> {
    let running = matches!(self.phase, Phase::Active | Phase::AwaitingJudgement);
    if expired.level_id != self.level.id() || expired.epoch != self.epoch || !running {
      debug!(target: "quest", level_id = expired.level_id, epoch = expired.epoch, current_epoch = self.epoch, "Stale countdown ignored");
      return Vec::new();
    }
    vec![self.fail(FailureReason::TimeExpired)]
  }

  /// Tear the session down and go back to `Setup`.
  pub fn restart(&mut self) {
    self.disarm_countdown();
    self.phase = Phase::Setup;
    self.stage = 0;
    self.wrong_attempts = 0;
    self.precondition_met = false;
  }

  fn fail(&mut self, reason: FailureReason) -> ControllerEvent {
    self.phase = Phase::Failed;
    warn!(target: "quest", level_id = self.level.id(), ?reason, wrong_attempts = self.wrong_attempts, "Level failed; restarting");
    self.restart();
    ControllerEvent::LevelFailed { reason }
  }

  fn arm_countdown(&mut self) {
    self.disarm_countdown();
    if let Some(limit) = self.level.time_limit() {
      let tx = self.timer_tx.clone();
      let expired = TimerExpired { level_id: self.level.id(), epoch: self.epoch };
      self.countdown = Some(ScheduledTask::after(limit, async move {
        let _ = tx.send(expired);
      }));
    }
  }

  fn disarm_countdown(&mut self) {
    if let Some(task) = self.countdown.take() {
      task.cancel();
    }
    self.epoch += 1;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{ChallengeKind, LevelDefinition};
  use crate::progression::{ProgressionStore, STORAGE_KEY};
  use crate::storage::MemoryStorage;
  use std::time::Duration;
  use tokio::sync::mpsc::{self, UnboundedReceiver};

  fn level(id: u32, answers: &[&str], kind: ChallengeKind, max_wrong: u32) -> Arc<Level> {
    Arc::new(Level::compile(LevelDefinition {
      id,
      title: String::new(),
      accepted_answers: answers.iter().map(|s| s.to_string()).collect(),
      kind,
      max_wrong_attempts: max_wrong,
      requires_precondition: false,
    }))
  }

  fn store() -> SharedProgress {
    ProgressionStore::open(Arc::new(MemoryStorage::new()), STORAGE_KEY, 10, 3).shared()
  }

  fn controller(level: Arc<Level>, store: SharedProgress) -> (ChallengeController, UnboundedReceiver<TimerExpired>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChallengeController::new(level, store, tx), rx)
  }

  fn submission(level_id: u32, text: &str) -> AnswerSubmission {
    AnswerSubmission::new(level_id, text)
  }

  fn completions(events: &[ControllerEvent]) -> usize {
    events.iter().filter(|e| matches!(e, ControllerEvent::LevelComplete { .. })).count()
  }

  #[tokio::test]
  async fn basic_accept_advances_progress() {
    let store = store();
    let (mut c, _rx) = controller(level(1, &["select * from map"], ChallengeKind::SingleQuery, 3), store.clone());
    assert_eq!(c.begin(), vec![ControllerEvent::Ready { level_id: 1, stage: 0, time_limit_secs: None }]);

    let events = c.submit(submission(1, "  SELECT   *   FROM   MAP  ")).await.unwrap();
    assert_eq!(completions(&events), 1);
    assert_eq!(c.phase(), Phase::Success);

    let s = store.lock().await.state().clone();
    assert_eq!(s.current_level, 2);
    assert_eq!(s.completed_levels.iter().copied().collect::<Vec<_>>(), vec![1]);
  }

  #[tokio::test]
  async fn reject_then_succeed() {
    let store = store();
    let (mut c, _rx) = controller(level(1, &["select * from map"], ChallengeKind::SingleQuery, 3), store.clone());
    c.begin();

    let events = c.submit(submission(1, "select * from maps")).await.unwrap();
    assert!(matches!(&events[0], ControllerEvent::Verdict(v) if !v.accepted));
    assert_eq!(events[1], ControllerEvent::WrongAttempt { remaining: Some(2) });
    assert_eq!(c.wrong_attempts(), 1);
    assert_eq!(c.phase(), Phase::Active);

    let events = c.submit(submission(1, "select * from map")).await.unwrap();
    assert_eq!(completions(&events), 1);

    // terminal: further submissions are ignored, completion recorded once
    let events = c.submit(submission(1, "select * from map")).await.unwrap();
    assert_eq!(events, vec![ControllerEvent::Ignored { phase: Phase::Success }]);
    assert_eq!(store.lock().await.state().completed_levels.len(), 1);
  }

  #[tokio::test]
  async fn exhausting_attempts_restarts_the_level() {
    let (mut c, _rx) = controller(level(1, &["select 1"], ChallengeKind::SingleQuery, 2), store());
    c.begin();
    c.submit(submission(1, "select 2")).await.unwrap();
    let events = c.submit(submission(1, "select 3")).await.unwrap();
    assert_eq!(events[1], ControllerEvent::WrongAttempt { remaining: Some(0) });
    assert_eq!(events[2], ControllerEvent::LevelFailed { reason: FailureReason::AttemptsExhausted });
    assert_eq!(c.phase(), Phase::Setup);
    assert_eq!(c.wrong_attempts(), 0);

    // submitting before the host re-enters is dropped
    let events = c.submit(submission(1, "select 1")).await.unwrap();
    assert_eq!(events, vec![ControllerEvent::Ignored { phase: Phase::Setup }]);
    assert!(matches!(c.begin()[0], ControllerEvent::Ready { .. }));
  }

  #[tokio::test]
  async fn unlimited_attempts_never_restart() {
    let (mut c, _rx) = controller(level(1, &["select 1"], ChallengeKind::SingleQuery, 0), store());
    c.begin();
    for _ in 0..20 {
      let events = c.submit(submission(1, "nope")).await.unwrap();
      assert_eq!(events[1], ControllerEvent::WrongAttempt { remaining: None });
    }
    assert_eq!(c.phase(), Phase::Active);
  }

  #[tokio::test]
  async fn precondition_gates_judgement() {
    let def = LevelDefinition {
      id: 1,
      title: "Guarded".into(),
      accepted_answers: vec!["select 1".into()],
      kind: ChallengeKind::SingleQuery,
      max_wrong_attempts: 1,
      requires_precondition: true,
    };
    let (mut c, _rx) = controller(Arc::new(Level::compile(def)), store());
    c.begin();
    assert_eq!(c.submit(submission(1, "wrong")).await.unwrap(), vec![ControllerEvent::Gated]);
    assert_eq!(c.wrong_attempts(), 0);
    c.satisfy_precondition();
    let events = c.submit(submission(1, "select 1")).await.unwrap();
    assert_eq!(completions(&events), 1);
  }

  #[tokio::test]
  async fn multi_stage_clears_stages_in_order() {
    let kind = ChallengeKind::MultiStageQuery {
      stages: vec![vec!["select * from doors".into()], vec!["select * from doors where locked=1".into()]],
    };
    let (mut c, _rx) = controller(level(1, &["select * from vault"], kind, 2), store());
    c.begin();
    let events = c.submit(submission(1, "select * from doors")).await.unwrap();
    assert_eq!(events[1], ControllerEvent::StageCleared { stage: 1, remaining_stages: 1 });
    assert_eq!(c.stage(), 1);
    // wrong answer at stage 1 counts against the shared budget
    c.submit(submission(1, "select * from vault")).await.unwrap();
    assert_eq!(c.stage(), 1);
    assert_eq!(c.wrong_attempts(), 1);
    let events = c.submit(submission(1, "select * from doors where locked = 1")).await.unwrap();
    assert_eq!(events[1], ControllerEvent::StageCleared { stage: 2, remaining_stages: 0 });
    assert_eq!(c.stage(), 2);
    let events = c.submit(submission(1, "SELECT * FROM vault;")).await.unwrap();
    assert_eq!(completions(&events), 1);
  }

  #[tokio::test]
  async fn mismatched_submission_is_a_programming_error() {
    let (mut c, _rx) = controller(level(1, &["select 1"], ChallengeKind::SingleQuery, 0), store());
    c.begin();
    assert!(matches!(
      c.submit(submission(2, "select 1")).await,
      Err(QuestError::LevelMismatch { expected: 1, got: 2 })
    ));
  }

  #[tokio::test(start_paused = true)]
  async fn countdown_forces_failure() {
    let kind = ChallengeKind::TimedQuery { time_limit_secs: 120 };
    let (mut c, mut rx) = controller(level(6, &["select 1"], kind, 0), store());
    assert_eq!(c.begin(), vec![ControllerEvent::Ready { level_id: 6, stage: 0, time_limit_secs: Some(120) }]);

    tokio::time::sleep(Duration::from_secs(121)).await;
    let expired = rx.try_recv().expect("countdown should have fired");
    assert_eq!(c.on_timer_expired(expired), vec![ControllerEvent::LevelFailed { reason: FailureReason::TimeExpired }]);
    assert_eq!(c.phase(), Phase::Setup);
  }

  #[tokio::test(start_paused = true)]
  async fn stale_countdown_is_ignored_after_restart() {
    let kind = ChallengeKind::TimedQuery { time_limit_secs: 10 };
    let (mut c, mut rx) = controller(level(6, &["select 1"], kind, 0), store());
    c.begin();
    tokio::time::sleep(Duration::from_secs(11)).await;
    let stale = rx.try_recv().unwrap();

    // host restarted before handling the expiry
    c.restart();
    c.begin();
    assert!(c.on_timer_expired(stale).is_empty());
    assert_eq!(c.phase(), Phase::Active);
  }

  #[tokio::test(start_paused = true)]
  async fn success_cancels_countdown() {
    let kind = ChallengeKind::TimedQuery { time_limit_secs: 30 };
    let (mut c, mut rx) = controller(level(6, &["select 1"], kind, 0), store());
    c.begin();
    c.submit(submission(6, "select 1")).await.unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(rx.try_recv().is_err());
  }
}
