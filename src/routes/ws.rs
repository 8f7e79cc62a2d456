//! WebSocket upgrade + session loop. Each connection hosts at most one
//! challenge controller at a time. Client messages are parsed as JSON and
//! answered with zero or more JSON messages; countdown expiries are pushed
//! to the client unprompted.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::controller::{ChallengeController, ControllerEvent, TimerExpired};
use crate::domain::AnswerSubmission;
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "sql_quest", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state), fields(session = %Uuid::new_v4()))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "sql_quest", "WebSocket connected");
  let (timer_tx, mut timer_rx) = mpsc::unbounded_channel();
  let mut session = Session::new(state, timer_tx);

  loop {
    let replies = tokio::select! {
      msg = socket.recv() => match msg {
        Some(Ok(Message::Text(txt))) => match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "sql_quest", "WS received: {:?}", &incoming);
            session.handle(incoming).await
          }
          Err(e) => vec![ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) }],
        },
        Some(Ok(Message::Ping(payload))) => {
          let _ = socket.send(Message::Pong(payload)).await;
          continue;
        }
        Some(Ok(Message::Close(_))) | None => break,
        Some(Err(e)) => {
          error!(target: "sql_quest", error = %e, "WS receive error");
          break;
        }
        Some(Ok(_)) => continue,
      },
      Some(expired) = timer_rx.recv() => session.on_timer(expired),
    };

    for reply in replies {
      let out = serde_json::to_string(&reply).unwrap_or_else(|e| {
        serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
      });
      if let Err(e) = socket.send(Message::Text(out)).await {
        error!(target: "sql_quest", error = %e, "WS send error");
        return;
      }
    }
  }
  info!(target: "sql_quest", "WebSocket disconnected");
}

/// Per-connection host for a challenge controller.
struct Session {
  state: Arc<AppState>,
  timer_tx: UnboundedSender<TimerExpired>,
  controller: Option<ChallengeController>,
}

impl Session {
  fn new(state: Arc<AppState>, timer_tx: UnboundedSender<TimerExpired>) -> Self {
    Self { state, timer_tx, controller: None }
  }

  async fn handle(&mut self, msg: ClientWsMessage) -> Vec<ServerWsMessage> {
    match msg {
      ClientWsMessage::Ping => vec![ServerWsMessage::Pong],

      ClientWsMessage::StartLevel { level_id } => self.start_level(level_id).await,

      ClientWsMessage::SubmitAnswer { text } => {
        let Some(controller) = self.controller.as_mut() else {
          return vec![error_msg("No level in progress; send start_level first.")];
        };
        let submission = AnswerSubmission::new(controller.level_id(), text);
        match controller.submit(submission).await {
          Ok(events) => self.relay(events),
          Err(e) => vec![error_msg(e.to_string())],
        }
      }

      ClientWsMessage::PreconditionMet => match self.controller.as_mut() {
        Some(c) => {
          c.satisfy_precondition();
          vec![ServerWsMessage::PreconditionMet]
        }
        None => vec![error_msg("No level in progress.")],
      },

      ClientWsMessage::SkipLevel { level_id } => {
        let result = {
          let mut store = self.state.progress.lock().await;
          let before = store.state().skips_used;
          store.skip_level(level_id).map(|p| (p.skips_used > before, p))
        };
        match result {
          Ok((skipped, progress)) => {
            if skipped && self.controller.as_ref().is_some_and(|c| c.level_id() == level_id) {
              self.controller = None;
            }
            info!(target: "quest", level_id, %skipped, "WS skip_level handled");
            vec![ServerWsMessage::SkipResult { skipped, progress }]
          }
          Err(e) => vec![error_msg(e.to_string())],
        }
      }

      ClientWsMessage::ResetGame => {
        self.controller = None;
        let progress = self.state.progress.lock().await.reset_game();
        vec![ServerWsMessage::Progress { progress }]
      }

      ClientWsMessage::GetProgress => {
        let progress = self.state.progress.lock().await.state().clone();
        vec![ServerWsMessage::Progress { progress }]
      }
    }
  }

  async fn start_level(&mut self, level_id: u32) -> Vec<ServerWsMessage> {
    let level = match self.state.campaign.get(level_id) {
      Ok(l) => l,
      Err(e) => return vec![error_msg(e.to_string())],
    };
    if !self.state.progress.lock().await.is_unlocked(level_id) {
      return vec![error_msg(format!("Level {} is locked.", level_id))];
    }
    // Dropping the previous controller cancels its countdown.
    let mut controller = ChallengeController::new(level, self.state.progress.clone(), self.timer_tx.clone());
    let events = controller.begin();
    self.controller = Some(controller);
    info!(target: "quest", level_id, "WS start_level");
    self.relay(events)
  }

  fn on_timer(&mut self, expired: TimerExpired) -> Vec<ServerWsMessage> {
    match self.controller.as_mut() {
      Some(c) => {
        let events = c.on_timer_expired(expired);
        self.relay(events)
      }
      None => Vec::new(),
    }
  }

  /// Translate controller events, re-entering the level after a failure and
  /// scheduling the completion-hint expiry after a success.
  fn relay(&mut self, events: Vec<ControllerEvent>) -> Vec<ServerWsMessage> {
    let mut out = Vec::with_capacity(events.len() + 1);
    for event in events {
      let failed = matches!(event, ControllerEvent::LevelFailed { .. });
      if let ControllerEvent::LevelComplete { level_id, .. } = &event {
        self.state.expire_completion_hint(*level_id);
      }
      out.push(ServerWsMessage::from(event));
      if failed {
        if let Some(c) = self.controller.as_mut() {
          out.extend(c.begin().into_iter().map(ServerWsMessage::from));
        }
      }
    }
    out
  }
}

fn error_msg(message: impl Into<String>) -> ServerWsMessage {
  ServerWsMessage::Error { message: message.into() }
}
