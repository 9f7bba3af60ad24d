use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;

mod commands;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("harness error: {0}")]
    Harness(#[from] bmc_core::HarnessError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{failed} of {total} scenario runs failed")]
    ScenariosFailed { failed: usize, total: usize },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("environment check failed: {0}")]
    Doctor(String),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "BookMyComics end-to-end harness runner", long_about = None)]
pub struct Cli {
    /// Path to the harness configuration file
    #[arg(long, default_value = "bmc.toml")]
    pub config: PathBuf,
    /// Run browsers with a visible window
    #[arg(long)]
    pub headed: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the scenario suite against the selected browsers and readers
    Run(RunArgs),
    /// Check that drivers, extension bundle, and collaborators are in place
    Doctor,
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Browser engine to exercise; repeatable, defaults to all
    #[arg(long = "browser")]
    pub browsers: Vec<String>,
    /// Reader site to exercise; repeatable, defaults to all
    #[arg(long = "reader")]
    pub readers: Vec<String>,
    /// Run only the scenario with this name
    #[arg(long)]
    pub scenario: Option<String>,
    /// Echo the reference website's captured output after the run
    #[arg(long)]
    pub dbg_website: bool,
    /// Directory for failure screenshots and console logs
    #[arg(long, default_value = "artifacts")]
    pub artifacts: PathBuf,
}

pub async fn run(cli: Cli) -> Result<()> {
    let mut config = bmc_core::load_harness_config(&cli.config)?;
    if cli.headed {
        config.selection.headless = false;
    }
    match cli.command {
        Commands::Run(args) => commands::run::execute(config, args).await,
        Commands::Doctor => commands::doctor::execute(config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_declaration_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn browser_and_reader_flags_repeat() {
        let cli = Cli::parse_from([
            "bmcctl",
            "run",
            "--browser",
            "firefox",
            "--browser",
            "chrome",
            "--reader",
            "localhost",
            "--dbg-website",
        ]);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.browsers, vec!["firefox", "chrome"]);
                assert_eq!(args.readers, vec!["localhost"]);
                assert!(args.dbg_website);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
