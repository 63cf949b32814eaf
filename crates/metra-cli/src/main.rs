use clap::Parser;
use metra_observe::{LoggerConfig, logger_init};

mod cli;
mod run;

use cli::{Cli, Command};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let logger = LoggerConfig::from_parts(&cli.log_format, &cli.log_level)
        .and_then(|cfg| logger_init(&cfg));
    if let Err(e) = logger {
        eprintln!("metra: {e}");
        std::process::exit(run::EXIT_CONFIG);
    }

    let result = match cli.command {
        Command::Serve(args) => run::serve_cmd(args).await,
        Command::Export(args) => run::export_cmd(args).await,
        Command::Validate(args) => run::validate_cmd(args).await,
    };

    if let Err(e) = result {
        tracing::error!(error = %format!("{e:#}"), "command failed");
        eprintln!("metra: {e:#}");
        std::process::exit(run::exit_code(&e));
    }
}
