//! Tracing setup for the server binary.
//!
//! `LOG_LEVEL` takes an `EnvFilter` directive string; when it is unset or does
//! not parse, `DEFAULT_FILTER` applies. `LOG_FORMAT=json` switches to one JSON
//! object per event, anything else gives the human-readable format.
//!
//! Targets in use: `sql_quest` (service lifecycle), `quest` (level sessions
//! and verdicts), `progress` (store transitions and persistence).

use tracing::warn;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "info,quest=debug,progress=debug,sql_quest=debug,tower_http=info,axum=info";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
  Pretty,
  Json,
}

impl LogFormat {
  pub fn from_env() -> Self {
    Self::parse(std::env::var("LOG_FORMAT").ok().as_deref())
  }

  fn parse(raw: Option<&str>) -> Self {
    match raw.map(str::trim) {
      Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
      _ => LogFormat::Pretty,
    }
  }
}

/// Filter from `raw` directives, plus the parse error when they were rejected.
fn filter_from(raw: Option<&str>) -> (EnvFilter, Option<String>) {
  match raw.map(str::trim).filter(|r| !r.is_empty()) {
    Some(directives) => match EnvFilter::try_new(directives) {
      Ok(f) => (f, None),
      Err(e) => (EnvFilter::new(DEFAULT_FILTER), Some(format!("{directives:?}: {e}"))),
    },
    None => (EnvFilter::new(DEFAULT_FILTER), None),
  }
}

/// Installs the global subscriber. A second call (or one after another
/// subscriber was set) leaves the existing one in place.
pub fn init_tracing() {
  let (filter, rejected) = filter_from(std::env::var("LOG_LEVEL").ok().as_deref());
  let format = LogFormat::from_env();

  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_target(true)
    .with_file(true)
    .with_line_number(true);

  let installed = match format {
    LogFormat::Json => builder.json().try_init(),
    LogFormat::Pretty => builder.try_init(),
  };
  if installed.is_err() {
    return;
  }
  if let Some(reason) = rejected {
    warn!(target: "sql_quest", %reason, default = DEFAULT_FILTER, "LOG_LEVEL rejected; using default filter");
  }
}
