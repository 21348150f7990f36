use anyhow::{Context, Result};
use clap::Parser;
use crpt_client::Config;
use std::path::PathBuf;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "crpt", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the config file (default: ~/.config/crpt/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Submit documents to the create-document endpoint
    ///
    /// Each submission waits for a slot in the rate-limit window before it
    /// is sent: at most `request_limit` documents go out per `time_unit`.
    /// Submissions beyond that block until the oldest one in the window
    /// ages out, so a burst drains at the configured rate.
    ///
    /// Every response status code is printed as it arrives. Non-2xx
    /// statuses are reported, not retried.
    Submit(commands::SubmitArgs),
    /// Show or initialise configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, clap::Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Print an example config file
    Example,
    /// Write the example config file if none exists
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    if let Err(e) = twyg::setup(config.logging.clone()) {
        eprintln!("Warning: failed to set up logging: {e}");
    }

    match cli.command {
        Commands::Submit(args) => {
            commands::run_submit(&config, args).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show_config(&config, cli.config.as_deref()),
            ConfigAction::Path => commands::config::show_path(cli.config.as_deref()),
            ConfigAction::Example => commands::config::show_example(),
            ConfigAction::Init => commands::config::init_config(cli.config.as_deref())?,
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_submit_defaults_to_twelve_documents() {
        let cli = Cli::try_parse_from(["crpt", "submit"]).unwrap();
        let Commands::Submit(args) = cli.command else {
            panic!("expected submit");
        };
        assert_eq!(args.count, 12);
        assert_eq!(args.concurrency, 1);
        assert!(args.timeout.is_none());
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["crpt", "config", "show", "--config", "/tmp/crpt.toml"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/crpt.toml")));
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Show
            }
        ));
    }
}
