use std::collections::HashSet;

use super::domain::{FormOption, OptionId, Question, QuestionDraft, Schema};

/// Reasons an administrator draft is refused. Positions are 1-based, as shown in the editor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaValidationError {
    #[error("question {question} has no options")]
    EmptyQuestion { question: usize },
    #[error("option {option} of question {question} has quota {quota}; quotas must be positive")]
    NonPositiveQuota {
        question: usize,
        option: usize,
        quota: i64,
    },
    #[error("option {option} of question {question} has quota {quota}, above the limit of {max}")]
    QuotaTooLarge {
        question: usize,
        option: usize,
        quota: i64,
        max: u32,
    },
    #[error("option {option} of question {question} retains id {id}, which is not in the current form")]
    UnknownRetainedId {
        question: usize,
        option: usize,
        id: OptionId,
    },
    #[error("option id {id} is retained by more than one option")]
    DuplicateRetainedId { id: OptionId },
}

/// Validate `drafts` and build the schema that replaces `current`.
///
/// Options without `retain_id` draw fresh ids from the counter carried by `current`, in
/// question order then option order, so ids stay contiguous within one save and are never
/// handed out twice.
pub fn prepare_schema(
    current: &Schema,
    drafts: Vec<QuestionDraft>,
) -> Result<Schema, SchemaValidationError> {
    validate_drafts(current, &drafts)?;

    let mut next_id = first_free_id(current);
    let questions = drafts
        .into_iter()
        .map(|draft| Question {
            prompt: draft.prompt,
            options: draft
                .options
                .into_iter()
                .map(|option| {
                    let id = match option.retain_id {
                        Some(id) => id,
                        None => {
                            let id = OptionId(next_id);
                            next_id += 1;
                            id
                        }
                    };
                    FormOption {
                        id,
                        text: option.text,
                        // Range checked by `validate_drafts`.
                        quota: option.quota as u32,
                    }
                })
                .collect(),
        })
        .collect();

    Ok(Schema {
        version: current.version + 1,
        next_option_id: next_id,
        questions,
    })
}

fn validate_drafts(current: &Schema, drafts: &[QuestionDraft]) -> Result<(), SchemaValidationError> {
    let mut retained = HashSet::new();

    for (q_index, question) in drafts.iter().enumerate() {
        let question_pos = q_index + 1;
        if question.options.is_empty() {
            return Err(SchemaValidationError::EmptyQuestion {
                question: question_pos,
            });
        }

        for (o_index, option) in question.options.iter().enumerate() {
            let option_pos = o_index + 1;
            if option.quota <= 0 {
                return Err(SchemaValidationError::NonPositiveQuota {
                    question: question_pos,
                    option: option_pos,
                    quota: option.quota,
                });
            }
            if option.quota > i64::from(u32::MAX) {
                return Err(SchemaValidationError::QuotaTooLarge {
                    question: question_pos,
                    option: option_pos,
                    quota: option.quota,
                    max: u32::MAX,
                });
            }

            if let Some(id) = option.retain_id {
                if current.find_option(id).is_none() {
                    return Err(SchemaValidationError::UnknownRetainedId {
                        question: question_pos,
                        option: option_pos,
                        id,
                    });
                }
                if !retained.insert(id) {
                    return Err(SchemaValidationError::DuplicateRetainedId { id });
                }
            }
        }
    }

    Ok(())
}

fn first_free_id(current: &Schema) -> u64 {
    let past_highest = current
        .options()
        .map(|option| option.id.0 + 1)
        .max()
        .unwrap_or(0);
    current.next_option_id.max(past_highest)
}
