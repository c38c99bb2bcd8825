use crate::admin::{render_availability, render_schema};
use crate::infra::{memory_service, MemoryService};
use clap::Args;
use quota_form::config::StorageConfig;
use quota_form::error::AppError;
use quota_form::registration::{
    OptionDraft, OptionId, QuestionDraft, RegistrationError, RejectionReason,
};
use std::sync::{Arc, Barrier};
use std::thread;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Number of attendees racing for the last evening seat
    #[arg(long, default_value_t = 8)]
    pub(crate) contenders: usize,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct RaceOutcome {
    pub(crate) admitted: usize,
    pub(crate) quota_exceeded: usize,
    pub(crate) other_errors: usize,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    println!("Quota-limited registration demo (in-memory storage)");
    let service = memory_service(&StorageConfig::default());

    println!("\nOrganiser publishes the form");
    let schema = service.save_schema(meetup_form(None))?;
    render_schema(&schema);
    let beijing = schema.questions[0].options[0].id;
    let shanghai = schema.questions[0].options[1].id;
    let morning = schema.questions[1].options[0].id;
    let evening = schema.questions[1].options[1].id;

    println!("\nEarly registrations");
    for choices in [vec![beijing, morning], vec![shanghai, morning]] {
        let confirmation = service.submit(choices)?;
        println!(
            "- confirmed {:?} against form version {}",
            confirmation.submitted_choices, confirmation.schema_version
        );
    }
    report_rejection(&service, vec![beijing, morning], "third morning seat");
    report_rejection(&service, vec![beijing], "answer missing for session");

    println!(
        "\n{} attendees race for the single evening seat",
        args.contenders
    );
    let outcome = race_for(&service, vec![shanghai, evening], args.contenders);
    println!(
        "- admitted {} | quota exceeded {} | other errors {}",
        outcome.admitted, outcome.quota_exceeded, outcome.other_errors
    );

    println!("\nOrganiser raises the Beijing quota, keeping its registrations");
    let schema = service.save_schema(meetup_form(Some(beijing)))?;
    render_schema(&schema);
    report_rejection(&service, vec![shanghai, evening], "id from the replaced form");

    println!();
    render_availability(&service.availability()?);
    Ok(())
}

fn meetup_form(retain_beijing: Option<OptionId>) -> Vec<QuestionDraft> {
    let beijing_quota = if retain_beijing.is_some() { 20 } else { 10 };
    vec![
        QuestionDraft {
            prompt: "Which city will you attend?".to_string(),
            options: vec![
                OptionDraft {
                    text: "Beijing".to_string(),
                    quota: beijing_quota,
                    retain_id: retain_beijing,
                },
                draft("Shanghai", 5),
            ],
        },
        QuestionDraft {
            prompt: "Which session?".to_string(),
            options: vec![draft("Morning", 2), draft("Evening", 1)],
        },
    ]
}

fn draft(text: &str, quota: i64) -> OptionDraft {
    OptionDraft {
        text: text.to_string(),
        quota,
        retain_id: None,
    }
}

fn report_rejection(service: &MemoryService, choices: Vec<OptionId>, label: &str) {
    match service.submit(choices) {
        Ok(confirmation) => println!(
            "- {label}: unexpectedly confirmed {:?}",
            confirmation.submitted_choices
        ),
        Err(RegistrationError::Rejected(reason)) => {
            println!("- {label}: rejected ({}) {}", reason.code(), reason)
        }
        Err(err) => println!("- {label}: unavailable: {}", err),
    }
}

pub(crate) fn race_for(
    service: &Arc<MemoryService>,
    choices: Vec<OptionId>,
    contenders: usize,
) -> RaceOutcome {
    let contenders = contenders.max(1);
    let start = Arc::new(Barrier::new(contenders));
    let handles: Vec<_> = (0..contenders)
        .map(|_| {
            let service = Arc::clone(service);
            let start = Arc::clone(&start);
            let choices = choices.clone();
            thread::spawn(move || {
                start.wait();
                service.submit(choices)
            })
        })
        .collect();

    let mut outcome = RaceOutcome::default();
    for handle in handles {
        match handle.join() {
            Ok(Ok(_)) => outcome.admitted += 1,
            Ok(Err(RegistrationError::Rejected(RejectionReason::QuotaExceeded(_)))) => {
                outcome.quota_exceeded += 1
            }
            Ok(Err(_)) | Err(_) => outcome.other_errors += 1,
        }
    }
    outcome
}
