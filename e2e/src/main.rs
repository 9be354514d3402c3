mod cmd;

use argh::FromArgs;
use cmd::error::{self, Result};
use snafu::ResultExt;
use std::process;
use tracing::{event, Level};

#[derive(FromArgs)]
/// Validate hybrid node configurations and prepare the nodes and cloud resources for end-to-end
/// test runs. Logging is configured with the TRACING_FILTER_DIRECTIVE, LOGGING_FORMATTER and
/// LOGGING_ANSI_ENABLED environment variables.
struct Args {
    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand)]
enum Command {
    Validate(cmd::validate::Validate),
    Plan(cmd::plan::Plan),
    CreateClusterRole(cmd::cluster_role::CreateClusterRole),
    DeleteClusterRole(cmd::cluster_role::DeleteClusterRole),
    SigningHelper(cmd::signing_helper::SigningHelper),
}

#[tokio::main]
async fn main() {
    let args: Args = argh::from_env();
    if let Err(e) = run(args).await {
        event!(Level::ERROR, "{}", e);
        eprintln!("{}", e);
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    models::telemetry::init_telemetry_from_env().context(error::TelemetryInitSnafu)?;

    match args.command {
        Command::Validate(validate) => validate.run().await,
        Command::Plan(plan) => plan.run().await,
        Command::CreateClusterRole(create) => create.run().await,
        Command::DeleteClusterRole(delete) => delete.run().await,
        Command::SigningHelper(signing_helper) => signing_helper.run().await,
    }
}
