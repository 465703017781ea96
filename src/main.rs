use anyhow::Result;
use clap::{CommandFactory, Parser};
use flow_rsvp::app::{run_read_command, run_tokens_command};
use flow_rsvp::cli::{Cli, Commands, ConfigAction};
use flow_rsvp::config::Config;
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    tracing::debug!("flow-rsvp {}", flow_rsvp::version_string());

    match cli.command {
        Commands::Read(args) => {
            let config = load_config(cli.config.as_deref())?;
            if let Err(e) = run_read_command(config, args, cli.quiet).await {
                eprintln!("{} {e:#}", "error:".red().bold());
                std::process::exit(1);
            }
        }
        Commands::Tokens { file, json } => {
            let config = load_config(cli.config.as_deref())?;
            run_tokens_command(&config, &file, json)?;
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "flow-rsvp",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// Install the log subscriber. `RUST_LOG` wins over `-v`/`-q`.
fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .try_init()
        .ok();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/flow-rsvp/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&std::path::Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path)?
    } else {
        Config::load_or_default(&Config::default_path())?
    };

    Ok(config.with_env_overrides())
}

fn handle_config_command(
    action: ConfigAction,
    custom_path: Option<&std::path::Path>,
) -> Result<()> {
    let config_path = custom_path
        .map(std::path::PathBuf::from)
        .unwrap_or_else(Config::default_path);

    match action {
        ConfigAction::Show => {
            let config = load_config(custom_path)?;
            print!("{}", config.to_toml()?);
            if let Err(e) = config.validate() {
                eprintln!("{} {e}", "warning:".yellow().bold());
            }
        }
        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
    }
    Ok(())
}
