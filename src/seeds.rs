//! The built-in ten-level campaign, used when no TOML config provides one.

use crate::domain::{ChallengeKind, LevelDefinition};

fn answers(forms: &[&str]) -> Vec<String> {
  forms.iter().map(|s| s.to_string()).collect()
}

fn level(id: u32, title: &str, forms: &[&str], kind: ChallengeKind, max_wrong_attempts: u32) -> LevelDefinition {
  LevelDefinition {
    id,
    title: title.into(),
    accepted_answers: answers(forms),
    kind,
    max_wrong_attempts,
    requires_precondition: false,
  }
}

pub fn seed_levels() -> Vec<LevelDefinition> {
  vec![
    level(1, "The Map Room", &["select * from map"], ChallengeKind::SingleQuery, 0),
    level(
      2,
      "Roll Call",
      &["select name from heroes", "select heroes.name from heroes"],
      ChallengeKind::SingleQuery,
      3,
    ),
    level(
      3,
      "Monster Census",
      &[
        "select * from monsters where level > 5",
        "select * from monsters where (level > 5)",
        "select * from monsters where 5 < level",
      ],
      ChallengeKind::SingleQuery,
      3,
    ),
    level(
      4,
      "Richest Merchant",
      &[
        "select name, gold from merchants order by gold desc",
        "select name, gold from merchants order by gold desc limit 1",
      ],
      ChallengeKind::SingleQuery,
      3,
    ),
    level(
      5,
      "Counting Dragons",
      &["select count(*) from dragons"],
      ChallengeKind::FillInBlanks { required_tokens: answers(&["select", "count(*)", "from dragons"]) },
      5,
    ),
    level(
      6,
      "Night Watch",
      &["select * from guards where shift = 'night'", "select * from guards where 'night' = shift"],
      ChallengeKind::TimedQuery { time_limit_secs: 120 },
      0,
    ),
    level(
      7,
      "The Locked Vault",
      &["select * from treasure where vault_id = 7"],
      ChallengeKind::MultiStageQuery {
        stages: vec![
          answers(&["select * from doors"]),
          answers(&["select * from doors where locked = 1", "select * from doors where locked = true"]),
        ],
      },
      4,
    ),
    level(
      8,
      "Guild Hall",
      &[
        "select guild, count(*) from adventurers group by guild",
        "select guild, count(*) as members from adventurers group by guild",
      ],
      ChallengeKind::SingleQuery,
      3,
    ),
    LevelDefinition {
      requires_precondition: true,
      ..level(
        9,
        "The Armoury Guard",
        &[
          "select h.name, w.name from heroes h join weapons w on h.weapon_id = w.id",
          "select heroes.name, weapons.name from heroes join weapons on heroes.weapon_id = weapons.id",
        ],
        ChallengeKind::SingleQuery,
        3,
      )
    },
    level(
      10,
      "The Dragon's Hoard",
      &[
        "select * from treasure where room in (1, 2, 3) order by value desc limit 1",
        "select * from treasure where room in (1, 2, 3) and value > 0 order by value desc limit 1",
      ],
      ChallengeKind::SingleQuery,
      3,
    ),
  ]
}
