//! recruit - command-line client for the recruitment API.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use client_config_and_utils::{init_logging, Config, Paths};
use commands::Session;
use output::OutputFormat;
use std::path::PathBuf;
use tracing::{debug, error};

/// recruit - sign in and work with jobs, candidates and users.
#[derive(Parser)]
#[command(name = "recruit")]
#[command(about = "Command-line client for the recruitment API")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    format: OutputFormat,

    /// Log level (trace, debug, info, warn, error); defaults to the configured level
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Directory holding config, session and logs (default: ~/.recruit-desk)
    #[arg(long, global = true, env = "RECRUIT_HOME")]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Login with email and password
    Login {
        /// Email address (prompted for if omitted)
        #[arg(short, long)]
        email: Option<String>,
    },

    /// Logout and clear the session
    Logout,

    /// Show authentication status
    Status,

    /// Call an API endpoint with the current session
    Call {
        /// HTTP method (GET, POST, PUT, PATCH, DELETE)
        method: String,
        /// Path relative to the API base, e.g. /jobs/42
        path: String,
        /// JSON request body
        #[arg(short, long)]
        body: Option<String>,
        /// Query parameter as key=value (repeatable)
        #[arg(short, long = "query")]
        query: Vec<String>,
    },

    /// List job postings
    Jobs,

    /// List candidates
    Candidates,

    /// List users
    Users,
}

async fn run(cli: Cli, paths: Paths, config: Config) -> anyhow::Result<()> {
    let session = Session::open(&paths, &config)?;
    let format = cli.format;

    let result = match cli.command {
        Commands::Login { email } => commands::login(&session, email, format).await,
        Commands::Logout => commands::logout(&session, format).await,
        Commands::Status => commands::status(&session, format),
        Commands::Call {
            method,
            path,
            body,
            query,
        } => commands::call(&session, &method, &path, body.as_deref(), &query, format).await,
        Commands::Jobs => commands::list(&session, "/jobs", format).await,
        Commands::Candidates => commands::list(&session, "/candidates", format).await,
        Commands::Users => commands::list(&session, "/users", format).await,
    };

    session.close().await;
    result
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let format = cli.format;

    let paths = match &cli.base_dir {
        Some(dir) => Paths::with_base_dir(dir.clone()),
        None => match Paths::new() {
            Ok(paths) => paths,
            Err(e) => {
                output::print_error(&e.to_string(), format);
                std::process::exit(1);
            }
        },
    };
    if let Err(e) = paths.ensure_dirs() {
        output::print_error(&e.to_string(), format);
        std::process::exit(1);
    }

    let config = match Config::load(&paths) {
        Ok(config) => config,
        Err(e) => {
            output::print_error(&format!("failed to load configuration: {}", e), format);
            std::process::exit(1);
        }
    };

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    init_logging(level, Some(paths.log_file()));
    debug!(base_dir = %paths.base_dir().display(), "Starting recruit");

    if let Err(e) = run(cli, paths, config).await {
        error!(error = %e, "Command failed");
        output::print_error(&format!("{:#}", e), format);
        std::process::exit(1);
    }
}
