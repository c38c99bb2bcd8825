use std::io::Write;

use serde::Serialize;

use super::availability::AvailabilityView;

#[derive(Debug, Serialize)]
struct AvailabilityRow<'a> {
    question: usize,
    prompt: &'a str,
    option_id: u64,
    option: &'a str,
    quota: u32,
    registered: u64,
    remaining: u64,
    full: bool,
}

/// Write one CSV row per option, questions numbered from 1.
pub fn write_availability_csv<W: Write>(
    view: &AvailabilityView,
    writer: W,
) -> Result<(), csv::Error> {
    let mut csv = csv::Writer::from_writer(writer);

    for question in &view.questions {
        for option in &question.options {
            csv.serialize(AvailabilityRow {
                question: question.index + 1,
                prompt: &question.prompt,
                option_id: option.id.0,
                option: &option.text,
                quota: option.quota,
                registered: option.consumed,
                remaining: option.remaining,
                full: option.full,
            })?;
        }
    }

    csv.flush()?;
    Ok(())
}
