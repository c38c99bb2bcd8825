use crate::infra::{file_service, read_drafts};
use clap::{Args, ValueEnum};
use quota_form::config::{AppConfig, ConfigError};
use quota_form::error::AppError;
use quota_form::registration::{write_availability_csv, AvailabilityView, Schema};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Csv,
}

#[derive(Args, Debug)]
pub(crate) struct StatusArgs {
    /// Output format for the availability listing
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub(crate) format: OutputFormat,
    /// Registration data directory (defaults to APP_DATA_DIR)
    #[arg(long)]
    pub(crate) data_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct ImportArgs {
    /// JSON file holding an array of question drafts
    pub(crate) file: PathBuf,
    /// Registration data directory (defaults to APP_DATA_DIR)
    #[arg(long)]
    pub(crate) data_dir: Option<PathBuf>,
}

pub(crate) fn run_status(args: StatusArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let dir = args
        .data_dir
        .or_else(|| config.storage.data_dir.clone())
        .ok_or(ConfigError::MissingDataDir)?;

    let service = file_service(&dir, &config.storage)?;
    let view = service.availability()?;

    match args.format {
        OutputFormat::Table => render_availability(&view),
        OutputFormat::Csv => write_availability_csv(&view, std::io::stdout().lock())?,
    }
    Ok(())
}

pub(crate) fn run_import(args: ImportArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let dir = args
        .data_dir
        .or_else(|| config.storage.data_dir.clone())
        .ok_or(ConfigError::MissingDataDir)?;

    let drafts = read_drafts(&args.file)?;
    let service = file_service(&dir, &config.storage)?;
    let schema = service.save_schema(drafts)?;

    render_schema(&schema);
    Ok(())
}

pub(crate) fn render_schema(schema: &Schema) {
    if !schema.is_open() {
        println!(
            "Form version {} saved with no questions: registration is closed",
            schema.version
        );
        return;
    }

    println!(
        "Form version {} saved: {} questions, {} options",
        schema.version,
        schema.questions.len(),
        schema.options().count()
    );
    for (index, question) in schema.questions.iter().enumerate() {
        println!("Q{} {}", index + 1, question.prompt);
        for option in &question.options {
            println!("  [{}] {} (quota {})", option.id, option.text, option.quota);
        }
    }
}

pub(crate) fn render_availability(view: &AvailabilityView) {
    if view.questions.is_empty() {
        println!("No form published (version {})", view.schema_version);
        return;
    }

    println!("Availability for form version {}", view.schema_version);
    for question in &view.questions {
        println!("Q{} {}", question.index + 1, question.prompt);
        for option in &question.options {
            let remaining = if option.full {
                "FULL".to_string()
            } else {
                format!("{} left", option.remaining)
            };
            println!(
                "  [{:>3}] {:<24} {:>4}/{:<4} {}",
                option.id.0, option.text, option.consumed, option.quota, remaining
            );
        }
    }
}
