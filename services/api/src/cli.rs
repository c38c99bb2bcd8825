use crate::admin::{run_import, run_status, ImportArgs, StatusArgs};
use crate::demo::{run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use quota_form::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "quota-form",
    about = "Run and administer the quota-limited registration service",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Print live availability for every option of the current form
    Status(StatusArgs),
    /// Manage the form definition
    Schema {
        #[command(subcommand)]
        command: SchemaCommand,
    },
    /// Run an in-memory walkthrough including a race for the last seat
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum SchemaCommand {
    /// Replace the form with the question drafts in a JSON file
    Import(ImportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Store the form and submissions as JSON documents in this directory
    #[arg(long)]
    pub(crate) data_dir: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Status(args) => run_status(args),
        Command::Schema {
            command: SchemaCommand::Import(args),
        } => run_import(args),
        Command::Demo(args) => run_demo(args),
    }
}
