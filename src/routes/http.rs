//! HTTP endpoint handlers. These are thin wrappers over the campaign and the
//! progression store. Each handler is instrumented and logs basic result info.

use std::sync::Arc;
use axum::{extract::State, http::StatusCode, response::{IntoResponse, Response}, Json};
use tracing::{info, instrument};

use crate::error::QuestError;
use crate::protocol::*;
use crate::state::AppState;

fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
  (status, Json(ErrorOut { error: message.into() })).into_response()
}

impl IntoResponse for QuestError {
  fn into_response(self) -> Response {
    let status = match &self {
      QuestError::UnknownLevel { .. } => StatusCode::NOT_FOUND,
      QuestError::LevelMismatch { .. } => StatusCode::BAD_REQUEST,
      QuestError::InvalidCampaign(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    json_error(status, self.to_string())
  }
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_get_levels(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let store = state.progress.lock().await;
  let levels: Vec<LevelSummary> = state.campaign.levels().map(|l| to_summary(l, &store)).collect();
  Json(levels)
}

/// Stateless grading: no wrong-attempt counting, no progression effect.
#[instrument(level = "info", skip(state, body), fields(level_id = body.level_id, answer_len = body.answer.len()))]
pub async fn http_post_check(
  State(state): State<Arc<AppState>>,
  Json(body): Json<CheckIn>,
) -> Result<impl IntoResponse, QuestError> {
  let level = state.campaign.get(body.level_id)?;
  let stage = body.stage.unwrap_or(level.stage_count()).min(level.stage_count());
  let verdict = level.judge(&body.answer, stage);
  info!(target: "quest", level_id = body.level_id, accepted = verdict.accepted, "HTTP check evaluated");
  Ok(Json(verdict))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_progress(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(state.progress.lock().await.state().clone())
}

#[instrument(level = "info", skip(state, body), fields(level_id = body.level_id))]
pub async fn http_post_complete(
  State(state): State<Arc<AppState>>,
  Json(body): Json<LevelIn>,
) -> Result<impl IntoResponse, QuestError> {
  let progress = state.progress.lock().await.complete_level(body.level_id)?;
  if progress.last_completed_level == Some(body.level_id) {
    state.expire_completion_hint(body.level_id);
  }
  Ok(Json(progress))
}

#[instrument(level = "info", skip(state, body), fields(level_id = body.level_id))]
pub async fn http_post_skip(
  State(state): State<Arc<AppState>>,
  Json(body): Json<LevelIn>,
) -> Result<impl IntoResponse, QuestError> {
  let mut store = state.progress.lock().await;
  let before = store.state().skips_used;
  let progress = store.skip_level(body.level_id)?;
  let skipped = progress.skips_used > before;
  info!(target: "progress", level_id = body.level_id, %skipped, "HTTP skip handled");
  Ok(Json(SkipOut { skipped, progress }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_reset(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(state.progress.lock().await.reset_game())
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_progress(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(state.progress.lock().await.wipe_saved_data())
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_intro_seen(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(state.progress.lock().await.mark_intro_seen())
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_clear_flag(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(state.progress.lock().await.clear_transient_completion_flag())
}
