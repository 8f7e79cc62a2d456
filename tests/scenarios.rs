// End-to-end play scenarios: controller + matcher + progression store, with
// progress persisted to a real directory and reloaded.

use std::sync::Arc;

use sql_quest_backend::campaign::{Campaign, Level};
use sql_quest_backend::controller::{ChallengeController, ControllerEvent};
use sql_quest_backend::domain::{AnswerSubmission, ChallengeKind, LevelDefinition, ProgressionState};
use sql_quest_backend::normalize::normalize;
use sql_quest_backend::progression::{ProgressionStore, SharedProgress, DEFAULT_LIVES, STORAGE_KEY};
use sql_quest_backend::seeds::seed_levels;
use sql_quest_backend::storage::{FileStorage, Storage};
use tempfile::TempDir;
use tokio::sync::mpsc;

fn map_level() -> Arc<Level> {
  Arc::new(Level::compile(LevelDefinition {
    id: 1,
    title: "The Map Room".into(),
    accepted_answers: vec!["select * from map".into()],
    kind: ChallengeKind::SingleQuery,
    max_wrong_attempts: 3,
    requires_precondition: false,
  }))
}

fn open(storage: Arc<dyn Storage>) -> ProgressionStore {
  ProgressionStore::open(storage, STORAGE_KEY, 10, DEFAULT_LIVES)
}

fn play(level: Arc<Level>, store: SharedProgress) -> ChallengeController {
  let (tx, _rx) = mpsc::unbounded_channel();
  let mut c = ChallengeController::new(level, store, tx);
  c.begin();
  c
}

#[tokio::test]
async fn basic_accept_is_persisted() {
  let dir = TempDir::new().unwrap();
  let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(dir.path()));
  let store = open(storage.clone()).shared();

  let mut c = play(map_level(), store.clone());
  let events = c.submit(AnswerSubmission::new(1, "  SELECT   *   FROM   MAP  ")).await.unwrap();
  assert!(matches!(events.last(), Some(ControllerEvent::LevelComplete { level_id: 1, .. })));

  let reloaded = open(storage).state().clone();
  assert_eq!(reloaded.current_level, 2);
  assert_eq!(reloaded.completed_levels.iter().copied().collect::<Vec<_>>(), vec![1]);
  assert_eq!(&reloaded, store.lock().await.state());
}

#[tokio::test]
async fn reject_then_succeed_records_once() {
  let dir = TempDir::new().unwrap();
  let store = open(Arc::new(FileStorage::new(dir.path()))).shared();
  let mut c = play(map_level(), store.clone());

  let events = c.submit(AnswerSubmission::new(1, "select * from maps")).await.unwrap();
  assert!(matches!(&events[0], ControllerEvent::Verdict(v) if !v.accepted));
  assert_eq!(c.wrong_attempts(), 1);

  let events = c.submit(AnswerSubmission::new(1, "select * from map")).await.unwrap();
  assert!(matches!(&events[0], ControllerEvent::Verdict(v) if v.accepted && v.matched_canonical_index == Some(0)));
  assert_eq!(store.lock().await.state().completed_levels.len(), 1);
}

#[test]
fn skip_exhaustion_then_full_reset() {
  let dir = TempDir::new().unwrap();
  let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(dir.path()));
  let mut store = open(storage.clone());

  store.complete_level(1).unwrap();
  for id in [2, 4, 6] {
    store.skip_level(id).unwrap();
  }
  assert_eq!(store.state().skips_used, 3);
  let s = store.skip_level(7).unwrap();
  assert_eq!(s.skips_used, 3);
  assert!(!s.completed_levels.contains(&7));

  let reset = store.reset_game();
  assert_eq!(reset, ProgressionState::fresh(3));
  assert_eq!(open(storage).state(), &reset);
}

#[test]
fn builtin_campaign_answers_survive_reformatting() {
  let campaign = Campaign::new(seed_levels()).unwrap();
  for level in campaign.levels() {
    let last = level.stage_count();
    for answer in &level.def.accepted_answers {
      let shouted = format!("   {}  ;", answer.to_uppercase().replace(' ', "   "));
      assert!(level.judge(&shouted, last).accepted, "level {}: {shouted:?}", level.id());
      assert_eq!(normalize(&normalize(&shouted)), normalize(&shouted));
    }
  }
}
