use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use cpgenie_mcp_runtime::{ConnectionArgs, serve};

#[derive(Parser)]
#[command(
    name = "cpgenie-mcp",
    version,
    about = "Control-plane MCP server over stdio"
)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Emit logs as JSON lines on stderr
    #[arg(long, env = "CPGENIE_LOG_JSON")]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cpgenie_mcp_runtime=info,cpgenie_mcp=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    // stdout carries the protocol; logs must stay on stderr.
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let code = serve(&cli.connection).await;
    std::process::exit(code);
}
