//! Answer normalization.
//!
//! Collapses incidental formatting so that textually different but equivalent
//! queries compare equal. Rules, applied in order:
//!   1. trim + lowercase
//!   2. collapse whitespace runs to one space
//!   3. drop trailing `;` terminators and the whitespace before them
//!   4. no whitespace next to `= , ( ) < > !` or quote marks
//!   5. exactly one space around keywords (`select`, `from`, `order by`, ...)
//!
//! Nothing here parses SQL. Garbage normalizes "as text" and simply fails to
//! match any accepted answer.

const KEYWORDS: &[&str] = &[
  "on", "in", "and", "or", "where", "limit", "desc", "asc", "join", "from", "select",
];

/// First halves of the two-word keywords `order by` / `group by`.
const BY_KEYWORDS: &[&str] = &["order", "group"];

const TIGHT_PUNCT: &[char] = &['=', ',', '(', ')', '<', '>', '!'];

const QUOTES: &[char] = &['\'', '"', '`'];

#[derive(Debug, Clone, PartialEq)]
enum Token {
  Word(String),
  Keyword(String),
  Quoted { quote: char, inner: String, closed: bool },
  Punct(char),
  Space,
}

impl Token {
  /// Tokens that never keep whitespace next to them.
  fn is_tight(&self) -> bool {
    match self {
      Token::Quoted { .. } => true,
      Token::Punct(c) => TIGHT_PUNCT.contains(c),
      _ => false,
    }
  }
}

/// Canonical comparison form of `text`. Total: never fails, empty in, empty out.
pub fn normalize(text: &str) -> String {
  let lowered = text.trim().to_lowercase();
  let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
  let stripped = strip_terminators(&collapsed);
  let tokens = drop_tight_spaces(mark_keywords(tokenize(stripped)));
  render(&tokens)
}

// A run of terminators goes too: stripping only one would leave `x;;` changing
// on every pass.
fn strip_terminators(mut s: &str) -> &str {
  while let Some(rest) = s.strip_suffix(';') {
    s = rest.trim_end();
  }
  s
}

fn is_word_char(c: char) -> bool {
  c.is_alphanumeric() || c == '_' || c == '.'
}

fn tokenize(s: &str) -> Vec<Token> {
  let mut tokens = Vec::new();
  let mut chars = s.chars().peekable();
  while let Some(ch) = chars.next() {
    if ch == ' ' {
      tokens.push(Token::Space);
    } else if QUOTES.contains(&ch) {
      let mut inner = String::new();
      let mut closed = false;
      for c in chars.by_ref() {
        if c == ch {
          closed = true;
          break;
        }
        inner.push(c);
      }
      tokens.push(Token::Quoted { quote: ch, inner: inner.trim().to_string(), closed });
    } else if is_word_char(ch) {
      let mut word = String::from(ch);
      while let Some(&c) = chars.peek() {
        if !is_word_char(c) {
          break;
        }
        word.push(c);
        chars.next();
      }
      tokens.push(Token::Word(word));
    } else {
      tokens.push(Token::Punct(ch));
    }
  }
  tokens
}

fn mark_keywords(tokens: Vec<Token>) -> Vec<Token> {
  let mut out = Vec::with_capacity(tokens.len());
  let mut i = 0;
  while i < tokens.len() {
    match &tokens[i] {
      Token::Word(w)
        if BY_KEYWORDS.contains(&w.as_str())
          && tokens.get(i + 1) == Some(&Token::Space)
          && matches!(tokens.get(i + 2), Some(Token::Word(b)) if b == "by") =>
      {
        out.push(Token::Keyword(format!("{w} by")));
        i += 3;
        continue;
      }
      Token::Word(w) if KEYWORDS.contains(&w.as_str()) => out.push(Token::Keyword(w.clone())),
      other => out.push(other.clone()),
    }
    i += 1;
  }
  out
}

fn drop_tight_spaces(tokens: Vec<Token>) -> Vec<Token> {
  let keep: Vec<bool> = (0..tokens.len())
    .map(|i| {
      if tokens[i] != Token::Space {
        return true;
      }
      let prev = i.checked_sub(1).map(|j| &tokens[j]);
      let next = tokens.get(i + 1);
      !(prev.is_some_and(Token::is_tight) || next.is_some_and(Token::is_tight))
    })
    .collect();
  tokens.into_iter().zip(keep).filter_map(|(t, k)| k.then_some(t)).collect()
}

fn render(tokens: &[Token]) -> String {
  let mut out = String::new();
  let mut pending_space = false;
  let mut prev_keyword = false;
  for token in tokens {
    if *token == Token::Space {
      pending_space = true;
      continue;
    }
    let is_keyword = matches!(token, Token::Keyword(_));
    if !out.is_empty() && (pending_space || is_keyword || prev_keyword) {
      out.push(' ');
    }
    pending_space = false;
    prev_keyword = is_keyword;

    match token {
      Token::Word(w) | Token::Keyword(w) => out.push_str(w),
      Token::Quoted { quote, inner, closed } => {
        out.push(*quote);
        out.push_str(inner);
        if *closed {
          out.push(*quote);
        }
      }
      Token::Punct(c) => out.push(*c),
      Token::Space => {}
    }
  }
  out
}
