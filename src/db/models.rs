use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Poll {
    pub id: Uuid,
    pub question: String,
    pub yes: i64,
    pub no: i64,
    #[sqlx(try_from = "DateTime<Utc>")]
    pub created_at: DateTime<Utc>,
}

impl Poll {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            question: question.into(),
            yes: 0,
            no: 0,
            created_at: Utc::now(),
        }
    }

    pub fn tally(&self) -> Tally {
        Tally {
            yes: self.yes,
            no: self.no,
        }
    }
}

/// Snapshot of a poll's counters taken right after an increment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tally {
    pub yes: i64,
    pub no: i64,
}

impl Tally {
    pub fn new(yes: i64, no: i64) -> Self {
        Self { yes, no }
    }

    pub fn total(&self) -> i64 {
        self.yes + self.no
    }

    /// True when neither counter is lower than in `earlier`.
    pub fn dominates(&self, earlier: &Tally) -> bool {
        self.yes >= earlier.yes && self.no >= earlier.no
    }
}

/// A binary vote. On the wire `0` is No and `1` is Yes; nothing else is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Choice {
    No,
    Yes,
}

impl TryFrom<u8> for Choice {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Choice::No),
            1 => Ok(Choice::Yes),
            other => Err(format!("answer must be 0 or 1, got {other}")),
        }
    }
}

impl From<Choice> for u8 {
    fn from(choice: Choice) -> Self {
        match choice {
            Choice::No => 0,
            Choice::Yes => 1,
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Choice::No => f.write_str("no"),
            Choice::Yes => f.write_str("yes"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteEvent {
    pub poll_id: Uuid,
    pub choice: Choice,
}
