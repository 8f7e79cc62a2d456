//! SQL Quest game core: answer normalization and matching, per-level
//! challenge sessions, and the persisted campaign progression, served over
//! HTTP + WebSocket.

pub mod campaign;
pub mod config;
pub mod controller;
pub mod domain;
pub mod error;
pub mod matcher;
pub mod normalize;
pub mod progression;
pub mod protocol;
pub mod routes;
pub mod seeds;
pub mod state;
pub mod storage;
pub mod telemetry;
pub mod timer;
