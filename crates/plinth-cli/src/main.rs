//! plinth CLI - Profile-driven project scaffolding

mod commands;
mod plugins;

use anyhow::Result;
use clap::{Parser, Subcommand};
use plinth_core::ProductConfig;
use std::path::PathBuf;

/// CLI version
pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

/// plinth product configuration
#[derive(Clone)]
pub struct PlinthConfig;

impl ProductConfig for PlinthConfig {
    fn name(&self) -> &'static str {
        "plinth"
    }

    fn display_name(&self) -> &'static str {
        "plinth"
    }

    fn default_registry_url(&self) -> &'static str {
        "https://raw.githubusercontent.com/plinth-dev/registry/main"
    }

    fn registry_url_env(&self) -> &'static str {
        "PLINTH_REGISTRY_URL"
    }

    fn packages_dir(&self) -> PathBuf {
        if let Ok(home) = std::env::var("PLINTH_HOME") {
            return PathBuf::from(home).join("packages");
        }
        std::env::var("HOME")
            .map(|home| PathBuf::from(home).join(".plinth").join("packages"))
            .unwrap_or_else(|_| PathBuf::from(".plinth").join("packages"))
    }

    fn upgrade_command(&self) -> &'static str {
        "cargo install plinth-cli --force"
    }
}

#[derive(Parser, Debug)]
#[command(name = "plinth")]
#[command(about = "CLI for scaffolding projects from profiles")]
#[command(version)]
pub struct Args {
    /// Configuration file (defaults to ./plinth.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new project from a profile
    New(NewArgs),
    /// Show what a profile resolves to using only default answers
    Show(ShowArgs),
    /// List the available profiles
    Profiles,
    /// Install a package from the registry
    Install(InstallArgs),
    /// Build zip files for all packages in a local registry (for development use)
    BuildZips(BuildZipsArgs),
}

#[derive(Parser, Debug, Default)]
pub struct NewArgs {
    /// Profile to use
    pub profile: Option<String>,

    /// Project directory to create
    #[arg(short, long)]
    pub directory: Option<PathBuf>,

    /// Take defaults for optional questions without asking
    #[arg(long = "skip-optional")]
    pub skip_optional: bool,

    /// Answer every question with its default (non-interactive mode)
    #[arg(short, long)]
    pub yes: bool,

    /// JSON file with answers keyed by question name
    #[arg(long, conflicts_with = "yes")]
    pub answers: Option<PathBuf>,

    /// Override a default (KEY=VALUE, VALUE parsed as JSON when possible)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// Resume an interrupted run from its recovery file
    #[arg(long)]
    pub resume: bool,
}

#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Profile to resolve
    pub profile: String,
}

#[derive(Parser, Debug)]
pub struct InstallArgs {
    /// Package name
    pub package: String,

    /// Local registry directory to install from instead of the remote registry
    #[arg(long = "registry-dir")]
    pub registry_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct BuildZipsArgs {
    /// Local registry directory containing packages to build zips from
    #[arg(long = "registry-dir", default_value = "registry")]
    pub registry_dir: PathBuf,
}

fn setup_logging(verbosity: u8) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let level = match verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Ensure terminal cursor is restored on panic
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = console::Term::stderr().show_cursor();
        default_panic(info);
    }));

    // Handle Ctrl+C gracefully
    ctrlc::set_handler(move || {
        let _ = console::Term::stderr().show_cursor();
        std::process::exit(130);
    })
    .ok();

    let args = Args::parse();
    setup_logging(args.verbose);
    let product = PlinthConfig;
    let config_path = args.config;

    let result = match args.command {
        Some(Command::New(new_args)) => {
            commands::new_project(&product, config_path.as_deref(), new_args)
        }
        Some(Command::Show(show_args)) => {
            commands::show_profile(&product, config_path.as_deref(), &show_args.profile)
        }
        Some(Command::Profiles) => commands::list_profiles(&product, config_path.as_deref()),
        Some(Command::Install(install_args)) => {
            commands::install(&product, config_path.as_deref(), install_args).await
        }
        Some(Command::BuildZips(build_args)) => {
            plinth_core::registry::build_zips(&product, &build_args.registry_dir).map(|_| ())
        }
        // No subcommand provided, default to interactive project creation
        None => commands::new_project(&product, config_path.as_deref(), NewArgs::default()),
    };

    // Ensure cursor is visible on normal exit
    let _ = console::Term::stderr().show_cursor();

    result
}
