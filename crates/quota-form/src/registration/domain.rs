use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of an option. Unique across every question of a schema and never reused
/// by later saves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionId(pub u64);

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Option as authored by an administrator, before ids are assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionDraft {
    #[serde(default)]
    pub text: String,
    /// Signed so that zero and negative quotas surface as validation errors.
    pub quota: i64,
    /// Keep the id (and consumed count) of an option in the current schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retain_id: Option<OptionId>,
}

/// Question as authored by an administrator. `options` must be present in the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuestionDraft {
    #[serde(default)]
    pub prompt: String,
    pub options: Vec<OptionDraft>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormOption {
    pub id: OptionId,
    pub text: String,
    pub quota: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub prompt: String,
    pub options: Vec<FormOption>,
}

impl Question {
    pub fn option(&self, id: OptionId) -> Option<&FormOption> {
        self.options.iter().find(|option| option.id == id)
    }
}

/// The saved form definition.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    /// Zero for the unsaved default, incremented on every save.
    pub version: u64,
    /// First id the next save may hand out.
    pub next_option_id: u64,
    pub questions: Vec<Question>,
}

impl Schema {
    pub fn options(&self) -> impl Iterator<Item = &FormOption> {
        self.questions
            .iter()
            .flat_map(|question| question.options.iter())
    }

    pub fn find_option(&self, id: OptionId) -> Option<&FormOption> {
        self.options().find(|option| option.id == id)
    }

    pub fn is_open(&self) -> bool {
        !self.questions.is_empty()
    }
}

/// One accepted registration: a choice per question of the schema it was checked against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub schema_version: u64,
    pub choices: Vec<OptionId>,
    pub accepted_at: DateTime<Utc>,
}

/// Point-in-time copy of every accepted entry, in acceptance order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerSnapshot {
    pub entries: Vec<LedgerEntry>,
}

impl LedgerSnapshot {
    pub fn consumed(&self, id: OptionId) -> u64 {
        self.entries
            .iter()
            .flat_map(|entry| entry.choices.iter())
            .filter(|choice| **choice == id)
            .count() as u64
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Request body for a registration attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmissionRequest {
    pub choices: Vec<OptionId>,
}

/// Returned when every choice was admitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub submitted_choices: Vec<OptionId>,
    pub schema_version: u64,
    pub accepted_at: DateTime<Utc>,
}

impl From<LedgerEntry> for Confirmation {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            submitted_choices: entry.choices,
            schema_version: entry.schema_version,
            accepted_at: entry.accepted_at,
        }
    }
}
