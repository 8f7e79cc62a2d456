//! Answer matching. Pure and stateless: same input, same verdict.
//!
//! Matching is exact-after-normalization. Tolerated alternative phrasings are
//! listed explicitly as extra accepted answers, never inferred.

use crate::domain::MatchVerdict;
use crate::normalize::normalize;

/// Accepted answers of one level (or stage), normalized once up front.
#[derive(Clone, Debug, Default)]
pub struct AnswerKey {
  normalized: Vec<String>,
}

impl AnswerKey {
  pub fn new<S: AsRef<str>>(answers: &[S]) -> Self {
    Self { normalized: answers.iter().map(|a| normalize(a.as_ref())).collect() }
  }

  /// Index of the first accepted form equal to an already-normalized input.
  pub fn position(&self, normalized_input: &str) -> Option<usize> {
    self.normalized.iter().position(|a| a == normalized_input)
  }

  pub fn is_empty(&self) -> bool { self.normalized.is_empty() }
}

/// How a submission is judged; chosen from the level's challenge kind.
#[derive(Clone, Copy, Debug)]
pub enum Strategy<'a> {
  Exact(&'a AnswerKey),
  /// Normalized tokens that must each appear in the normalized input.
  RequiredTokens(&'a [String]),
}

pub fn judge(input: &str, strategy: Strategy<'_>) -> MatchVerdict {
  let normalized_input = normalize(input);
  match strategy {
    Strategy::Exact(key) => {
      let matched = key.position(&normalized_input);
      MatchVerdict {
        accepted: matched.is_some(),
        matched_canonical_index: matched,
        normalized_input,
        missing_tokens: Vec::new(),
      }
    }
    Strategy::RequiredTokens(tokens) => {
      let missing = missing_tokens(&normalized_input, tokens);
      MatchVerdict {
        accepted: missing.is_empty(),
        matched_canonical_index: None,
        normalized_input,
        missing_tokens: missing,
      }
    }
  }
}

/// Exact match of raw `input` against raw accepted answers.
pub fn match_exact<S: AsRef<str>>(input: &str, accepted: &[S]) -> MatchVerdict {
  judge(input, Strategy::Exact(&AnswerKey::new(accepted)))
}

/// True if every required token (normalized) occurs in the normalized input.
/// Declaration order does not matter; each token is checked on its own.
pub fn contains_all_required_tokens<S: AsRef<str>>(input: &str, required: &[S]) -> bool {
  let tokens = normalize_tokens(required);
  missing_tokens(&normalize(input), &tokens).is_empty()
}

pub fn normalize_tokens<S: AsRef<str>>(tokens: &[S]) -> Vec<String> {
  tokens.iter().map(|t| normalize(t.as_ref())).collect()
}

fn missing_tokens(normalized_input: &str, tokens: &[String]) -> Vec<String> {
  tokens.iter().filter(|t| !normalized_input.contains(t.as_str())).cloned().collect()
}
