use std::process::ExitCode;

use clap::Parser;
use scripts::{cli::Cli, utils::setup_logging};

#[tokio::main]
async fn main() -> ExitCode {
    // A missing `.env` file is fine, the environment may already be set
    dotenvy::dotenv().ok();

    let Cli { globals, command } = Cli::parse();
    setup_logging();

    match command.run(globals).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}
