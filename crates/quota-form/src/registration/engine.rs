//! Admission rules for a candidate submission.
//!
//! These functions are pure: the caller supplies the schema and ledger snapshot and is
//! responsible for holding the commit gate from the moment the snapshot is read until the
//! resulting entry is appended.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::availability::compute_availability;
use super::domain::{LedgerEntry, LedgerSnapshot, OptionId, Schema};

/// Structural mismatch between the choices and the current schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvalidSelection {
    #[error("registration is not open: no form has been published")]
    NoActiveForm,
    #[error("expected {expected} choices, found {found}")]
    WrongChoiceCount { expected: usize, found: usize },
    #[error("option {option_id} is not a choice for question {question}")]
    UnknownOption { question: usize, option_id: OptionId },
}

/// Why a submission was refused. Nothing is recorded in either case.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectionReason {
    #[error("invalid selection: {0}")]
    InvalidSelection(#[from] InvalidSelection),
    #[error("option {0} has no remaining capacity")]
    QuotaExceeded(OptionId),
}

impl RejectionReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectionReason::InvalidSelection(_) => "invalid_selection",
            RejectionReason::QuotaExceeded(_) => "quota_exceeded",
        }
    }
}

/// The i-th choice must be an option of the i-th question, and every question answered.
pub fn check_structure(schema: &Schema, choices: &[OptionId]) -> Result<(), InvalidSelection> {
    if !schema.is_open() {
        return Err(InvalidSelection::NoActiveForm);
    }
    if choices.len() != schema.questions.len() {
        return Err(InvalidSelection::WrongChoiceCount {
            expected: schema.questions.len(),
            found: choices.len(),
        });
    }

    for (index, (question, choice)) in schema.questions.iter().zip(choices).enumerate() {
        if question.option(*choice).is_none() {
            return Err(InvalidSelection::UnknownOption {
                question: index + 1,
                option_id: *choice,
            });
        }
    }

    Ok(())
}

/// First chosen option, in choice order, whose signed remaining capacity is not positive.
pub fn first_exhausted(
    schema: &Schema,
    ledger: &LedgerSnapshot,
    choices: &[OptionId],
) -> Option<OptionId> {
    let capacity = compute_availability(schema, ledger);
    choices.iter().copied().find(|choice| {
        capacity
            .get(choice)
            .map_or(true, |figures| !figures.has_room())
    })
}

/// Run both checks and, if they pass, produce the entry to append.
pub fn admit(
    schema: &Schema,
    ledger: &LedgerSnapshot,
    choices: Vec<OptionId>,
    accepted_at: DateTime<Utc>,
) -> Result<LedgerEntry, RejectionReason> {
    check_structure(schema, &choices)?;

    if let Some(exhausted) = first_exhausted(schema, ledger, &choices) {
        return Err(RejectionReason::QuotaExceeded(exhausted));
    }

    Ok(LedgerEntry {
        schema_version: schema.version,
        choices,
        accepted_at,
    })
}
