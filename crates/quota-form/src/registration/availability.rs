use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::domain::{LedgerSnapshot, OptionId, Schema};

/// Capacity figures for one option. `remaining` is signed so overcommit stays visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionCapacity {
    pub quota: u32,
    pub consumed: u64,
    pub remaining: i64,
}

impl OptionCapacity {
    pub fn has_room(&self) -> bool {
        self.remaining > 0
    }
}

/// Remaining capacity of every option in `schema` given the accepted entries in `ledger`.
///
/// Entries naming ids absent from `schema` (options removed by a later save) are ignored.
pub fn compute_availability(
    schema: &Schema,
    ledger: &LedgerSnapshot,
) -> BTreeMap<OptionId, OptionCapacity> {
    let mut counts: HashMap<OptionId, u64> = HashMap::new();
    for choice in ledger.entries.iter().flat_map(|entry| entry.choices.iter()) {
        *counts.entry(*choice).or_default() += 1;
    }

    schema
        .options()
        .map(|option| {
            let consumed = counts.get(&option.id).copied().unwrap_or(0);
            let remaining = i64::from(option.quota) - consumed as i64;
            (
                option.id,
                OptionCapacity {
                    quota: option.quota,
                    consumed,
                    remaining,
                },
            )
        })
        .collect()
}

/// Availability grouped by question, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityView {
    pub schema_version: u64,
    pub questions: Vec<QuestionAvailability>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionAvailability {
    pub index: usize,
    pub prompt: String,
    pub options: Vec<OptionAvailability>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionAvailability {
    pub id: OptionId,
    pub text: String,
    pub quota: u32,
    pub consumed: u64,
    /// Floored at zero for display.
    pub remaining: u64,
    pub full: bool,
}

impl AvailabilityView {
    pub fn build(schema: &Schema, ledger: &LedgerSnapshot) -> Self {
        let capacity = compute_availability(schema, ledger);

        let questions = schema
            .questions
            .iter()
            .enumerate()
            .map(|(index, question)| QuestionAvailability {
                index,
                prompt: question.prompt.clone(),
                options: question
                    .options
                    .iter()
                    .map(|option| {
                        let figures = capacity.get(&option.id).copied().unwrap_or(OptionCapacity {
                            quota: option.quota,
                            consumed: 0,
                            remaining: i64::from(option.quota),
                        });
                        OptionAvailability {
                            id: option.id,
                            text: option.text.clone(),
                            quota: figures.quota,
                            consumed: figures.consumed,
                            remaining: figures.remaining.max(0) as u64,
                            full: !figures.has_room(),
                        }
                    })
                    .collect(),
            })
            .collect();

        Self {
            schema_version: schema.version,
            questions,
        }
    }

    pub fn option(&self, id: OptionId) -> Option<&OptionAvailability> {
        self.questions
            .iter()
            .flat_map(|question| question.options.iter())
            .find(|option| option.id == id)
    }
}
