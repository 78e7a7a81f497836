use clap::{Parser, Subcommand};
use querydeck_core::{ConfigError, QuerydeckConfig};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

mod commands;

use commands::{health, serve, tools};

#[derive(Parser, Debug)]
#[command(name = "querydeck", version, about = "Serve SQL template tools over MCP")]
struct Cli {
    /// Configuration file path. A missing file means defaults.
    #[arg(
        short,
        long,
        global = true,
        default_value = "querydeck.yaml",
        env = "QUERYDECK_CONFIG"
    )]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the MCP server on stdin/stdout.
    Serve(serve::ServeArgs),

    /// Run only the HTTP health endpoint.
    Health(health::HealthArgs),

    /// Inspect tool definitions offline.
    Tools {
        #[command(subcommand)]
        cmd: ToolsCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ToolsCommand {
    /// List tools and prompts found in the definitions directory.
    List,

    /// Report definition problems. Exits non-zero if any are found.
    Check,

    /// Validate arguments and print a tool's generated SQL.
    Render {
        /// Tool name.
        name: String,

        /// Arguments as a JSON object.
        #[arg(long, default_value = "{}")]
        args: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, found) = load_config(&cli.config, std::io::stderr)?;
    init_tracing(&config.logging.filter);
    if !found {
        tracing::debug!(config = %cli.config.display(), "Config file not found, using defaults");
    }

    match cli.cmd {
        Command::Serve(args) => serve::execute(config, args).await?,
        Command::Health(args) => health::execute(config, args).await?,
        Command::Tools { cmd } => match cmd {
            ToolsCommand::List => tools::list(&config)?,
            ToolsCommand::Check => tools::check(&config)?,
            ToolsCommand::Render { name, args } => tools::render(&config, &name, &args)?,
        },
    }

    Ok(())
}

/// Load the config file under a temporary subscriber, since the real
/// filter is only known once the file has been read.
fn load_config<W>(path: &Path, writer: W) -> Result<(QuerydeckConfig, bool), ConfigError>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(env_filter(&QuerydeckConfig::default().logging.filter))
        .with_writer(writer)
        .finish();
    tracing::subscriber::with_default(bootstrap, || QuerydeckConfig::load(path))
}

/// Log to stderr; stdout carries the protocol.
fn init_tracing(filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(filter))
        .with_writer(std::io::stderr)
        .init();
}

/// `RUST_LOG` wins over the configured filter.
fn env_filter(filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter))
}
