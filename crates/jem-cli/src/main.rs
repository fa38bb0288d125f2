//! jem CLI - install RubyGems archives without Ruby

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use jem::DuplicateBehavior;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod install;
mod validate;

#[derive(Parser)]
#[command(name = "jem")]
#[command(version = jem::VERSION)]
#[command(about = "Install RubyGems archives into a gem home", long_about = None)]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install gem archives
    Install {
        /// Gem archives to install, in order
        #[arg(required = true)]
        gems: Vec<PathBuf>,

        /// Installation directory (defaults to $GEM_HOME)
        #[arg(long, short = 'i')]
        install_dir: Option<PathBuf>,

        /// What to do with artifacts that already exist
        #[arg(long, value_parser = parse_policy)]
        on_duplicate: Option<DuplicateBehavior>,

        /// Write load-root markers into each installed gem
        #[arg(long)]
        markers: bool,

        /// Read settings from this file instead of ./jem.toml
        #[arg(long)]
        config: Option<PathBuf>,

        /// Hold the installation directory lock for the whole batch
        #[arg(long)]
        lock: bool,
    },

    /// Check that files are readable gem archives
    Validate {
        /// Files to check
        #[arg(required = true)]
        gems: Vec<PathBuf>,
    },
}

fn parse_policy(value: &str) -> Result<DuplicateBehavior, String> {
    value.parse()
}

fn init_logging(verbose: u8, quiet: bool) {
    let default = if quiet {
        "warn"
    } else {
        match verbose {
            0 => "jem=info",
            1 => "jem=debug",
            _ => "jem=trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Install {
            gems,
            install_dir,
            on_duplicate,
            markers,
            config,
            lock,
        } => {
            let options = install::InstallOptions {
                install_dir,
                on_duplicate,
                markers,
                config,
                lock,
            };
            install::install_gems(&gems, &options)?;
        }

        Commands::Validate { gems } => {
            validate::validate_gems(&gems)?;
        }
    }

    Ok(())
}
