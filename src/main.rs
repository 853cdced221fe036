use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use acct_switch::{
    commands,
    paths::Paths,
    ui::{ColorMode, Ui},
};

#[derive(Parser)]
#[command(name = "switch")]
#[command(about = "Switch - keep several profiles of an app's config and swap between them")]
#[command(version)]
#[command(after_help = "Built-in templates: codex, claude, vscode, cursor, ssh, git")]
struct Cli {
    /// Registry file to use instead of ~/.switch.toml
    #[arg(long, global = true, value_name = "PATH", env = "SWITCH_CONFIG")]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// When to use colors: always, auto, never
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: ColorMode,

    /// Diagnostic log level, written to stderr
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Warn, env = "SWITCH_LOG")]
    log_level: LogLevel,

    /// Without a command, cycle the default application's profiles
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Switch an app to a profile, or cycle to its next profile
    Use {
        /// Application name, e.g. codex
        app: String,

        /// Profile to activate (omit to cycle)
        profile: Option<String>,
    },

    /// Save the current config as a profile (no arguments starts the setup wizard)
    Add {
        /// Application name
        app: Option<String>,

        /// Profile name (prompted for when omitted)
        profile: Option<String>,

        /// Overwrite an existing profile without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// List applications, or the profiles of one application
    List {
        app: Option<String>,
    },

    /// Print the profile matching an app's live config
    Current {
        app: String,
    },

    /// Set the application cycled by a bare `switch`
    Default {
        app: String,
    },

    /// Open the registry file in your editor
    Config,

    /// Check the registry against what is on disk
    Doctor,

    /// Show built-in templates and which apps are installed
    Templates,

    /// Print shell completions
    Completions {
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_directive(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// Log to stderr so stdout stays clean for command output
fn initialize_tracing(level: LogLevel) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level.as_directive()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    initialize_tracing(cli.log_level);

    if let Some(Commands::Completions { shell }) = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "switch", &mut std::io::stdout());
        return Ok(());
    }

    let paths = Paths::new(cli.config)?;
    let ui = Ui::new(cli.color, cli.no_color);

    let Some(command) = cli.command else {
        return commands::cycle_default(&paths, &ui);
    };

    match command {
        Commands::Use { app, profile } => {
            commands::use_profile(&paths, &app, profile.as_deref(), &ui)
        }
        Commands::Add { app, profile, yes } => {
            commands::add(&paths, app.as_deref(), profile.as_deref(), yes, &ui)
        }
        Commands::List { app: Some(app) } => commands::list_app(&paths, &app, &ui),
        Commands::List { app: None } => commands::list(&paths, &ui),
        Commands::Current { app } => commands::current(&paths, &app, &ui),
        Commands::Default { app } => commands::set_default(&paths, &app, &ui),
        Commands::Config => commands::open_config(&paths, &ui),
        Commands::Doctor => commands::doctor(&paths, &ui),
        Commands::Templates => commands::templates(&paths, &ui),
        Commands::Completions { .. } => Ok(()),
    }
}
