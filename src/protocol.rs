//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::campaign::Level;
use crate::controller::{ControllerEvent, FailureReason, Phase};
use crate::domain::{MatchVerdict, ProgressionState};
use crate::progression::ProgressionStore;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    StartLevel {
        #[serde(rename = "levelId")]
        level_id: u32,
    },
    SubmitAnswer {
        text: String,
    },
    PreconditionMet,
    SkipLevel {
        #[serde(rename = "levelId")]
        level_id: u32,
    },
    ResetGame,
    GetProgress,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Ready {
        #[serde(rename = "levelId")]
        level_id: u32,
        stage: usize,
        #[serde(rename = "timeLimitSecs")]
        time_limit_secs: Option<u64>,
    },
    Verdict {
        verdict: MatchVerdict,
    },
    StageCleared {
        stage: usize,
        #[serde(rename = "remainingStages")]
        remaining_stages: usize,
    },
    WrongAttempt {
        remaining: Option<u32>,
    },
    Gated,
    PreconditionMet,
    LevelFailed {
        reason: FailureReason,
    },
    LevelComplete {
        #[serde(rename = "levelId")]
        level_id: u32,
        progress: ProgressionState,
    },
    Ignored {
        phase: Phase,
    },
    SkipResult {
        skipped: bool,
        progress: ProgressionState,
    },
    Progress {
        progress: ProgressionState,
    },
    Error {
        message: String,
    },
}

impl From<ControllerEvent> for ServerWsMessage {
    fn from(e: ControllerEvent) -> Self {
        match e {
            ControllerEvent::Ready { level_id, stage, time_limit_secs } => {
                ServerWsMessage::Ready { level_id, stage, time_limit_secs }
            }
            ControllerEvent::Verdict(verdict) => ServerWsMessage::Verdict { verdict },
            ControllerEvent::StageCleared { stage, remaining_stages } => {
                ServerWsMessage::StageCleared { stage, remaining_stages }
            }
            ControllerEvent::WrongAttempt { remaining } => ServerWsMessage::WrongAttempt { remaining },
            ControllerEvent::Gated => ServerWsMessage::Gated,
            ControllerEvent::LevelFailed { reason } => ServerWsMessage::LevelFailed { reason },
            ControllerEvent::LevelComplete { level_id, progress } => {
                ServerWsMessage::LevelComplete { level_id, progress }
            }
            ControllerEvent::Ignored { phase } => ServerWsMessage::Ignored { phase },
        }
    }
}

/// DTO used by HTTP for the level list. Display fields only; answers stay server-side.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelSummary {
    pub id: u32,
    pub title: String,
    pub kind: &'static str,
    pub max_wrong_attempts: u32,
    pub time_limit_secs: Option<u64>,
    pub stages: usize,
    pub requires_precondition: bool,
    pub unlocked: bool,
    pub completed: bool,
}

pub fn to_summary(level: &Level, store: &ProgressionStore) -> LevelSummary {
    LevelSummary {
        id: level.id(),
        title: level.def.title.clone(),
        kind: level.def.kind.label(),
        max_wrong_attempts: level.def.max_wrong_attempts,
        time_limit_secs: level.time_limit().map(|d| d.as_secs()),
        stages: level.stage_count(),
        requires_precondition: level.def.requires_precondition,
        unlocked: store.is_unlocked(level.id()),
        completed: store.completed_levels().contains(&level.id()),
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct LevelIn {
    #[serde(rename = "levelId")]
    pub level_id: u32,
}

#[derive(Deserialize)]
pub struct CheckIn {
    #[serde(rename = "levelId")]
    pub level_id: u32,
    pub answer: String,
    /// Multi-stage levels only; defaults to the level's own answers.
    #[serde(default)]
    pub stage: Option<usize>,
}

#[derive(Serialize)]
pub struct SkipOut {
    pub skipped: bool,
    pub progress: ProgressionState,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub error: String,
}
