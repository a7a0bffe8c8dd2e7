// src/models/stage.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Lifecycle phase shared by a proposal and the comments posted during it.
///
/// Stored as its camelCase name (e.g. `draftVoting`) in TEXT columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    Idea,
    DraftVoting,
    Commit,
    Reveal,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Idea => "idea",
            Stage::DraftVoting => "draftVoting",
            Stage::Commit => "commit",
            Stage::Reveal => "reveal",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a stored or submitted stage name is not one we know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStage(pub String);

impl fmt::Display for UnknownStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown stage '{}'", self.0)
    }
}

impl std::error::Error for UnknownStage {}

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idea" => Ok(Stage::Idea),
            "draftVoting" => Ok(Stage::DraftVoting),
            "commit" => Ok(Stage::Commit),
            "reveal" => Ok(Stage::Reveal),
            other => Err(UnknownStage(other.to_string())),
        }
    }
}

/// Lets `FromRow` decode the TEXT column via `#[sqlx(try_from = "String")]`.
impl TryFrom<String> for Stage {
    type Error = UnknownStage;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
