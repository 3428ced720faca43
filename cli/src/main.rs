mod commands;
mod util;

use clap::{Parser, Subcommand};
use cpgenie_mcp_runtime::{ConnectionArgs, McpCommands};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(
    name = "cpgenie",
    version,
    about = "Operator CLI for the control-plane MCP tool server"
)]
struct Cli {
    /// Log level filter for stderr logging (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify credentials against the control plane and print a JSON report
    Check {
        #[command(flatten)]
        connection: ConnectionArgs,
    },
    /// Inspect resolved configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Project queries
    Projects {
        #[command(subcommand)]
        command: ProjectCommands,
    },
    /// MCP server
    Mcp {
        #[command(subcommand)]
        command: McpCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the resolved settings with the token masked
    Show {
        #[command(flatten)]
        connection: ConnectionArgs,
    },
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// List projects visible to the configured user
    List {
        #[command(flatten)]
        connection: ConnectionArgs,
    },
}

fn init_tracing(default_level: &str) {
    let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => tracing_subscriber::EnvFilter::try_new(default_level).unwrap_or_else(|e| {
            util::exit_error(
                &format!("Invalid --log-level '{default_level}': {e}"),
                Some("Use a level such as warn, info or debug, or a RUST_LOG style directive."),
            )
        }),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let code = match cli.command {
        Commands::Check { connection } => commands::check::run(&connection).await,
        Commands::Config { command } => match command {
            ConfigCommands::Show { connection } => commands::config::show(&connection),
        },
        Commands::Projects { command } => match command {
            ProjectCommands::List { connection } => commands::project::list(&connection).await,
        },
        Commands::Mcp { command } => cpgenie_mcp_runtime::run(command).await,
    };

    std::process::exit(code);
}
