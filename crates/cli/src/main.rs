use clap::{Parser, Subcommand};
use relay::config::{self, RelayConfig};

#[derive(Parser)]
#[command(name = "line-relay")]
#[command(about = "LINE webhook relay to Vertex AI Search answers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Run the webhook server. Requires ChannelSecret, ChannelAccessToken, ProjectId, Location and EngineId in the environment.
    Serve {
        /// Settings file path (default: RELAY_CONFIG_PATH or ~/.line-relay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default: PORT env, settings file, or 8080)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Validate the environment and settings file, then print the resolved configuration with secrets redacted.
    CheckConfig {
        /// Settings file path (default: RELAY_CONFIG_PATH or ~/.line-relay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Print the X-Line-Signature value for a request body file (for testing the webhook with curl).
    Sign {
        /// Channel secret (default: ChannelSecret env)
        #[arg(long, env = "ChannelSecret", hide_env_values = true)]
        secret: String,

        /// File containing the exact request body
        #[arg(value_name = "FILE")]
        body: std::path::PathBuf,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("line-relay {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("relay failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::CheckConfig { config }) => {
            if let Err(e) = run_check_config(config) {
                log::error!("configuration invalid: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Sign { secret, body }) => {
            if let Err(e) = run_sign(&secret, &body) {
                log::error!("sign failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

/// Load the settings file, then resolve required values from the environment (fails fast).
fn resolve_config(config_path: Option<std::path::PathBuf>) -> anyhow::Result<RelayConfig> {
    let (settings, path) = config::load_config(config_path)?;
    log::debug!("settings loaded from {}", path.display());
    Ok(RelayConfig::from_env(settings)?)
}

async fn run_serve(config_path: Option<std::path::PathBuf>, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = resolve_config(config_path)?;
    if let Some(p) = port {
        config.settings.gateway.port = p;
    }
    log::info!(
        "starting relay on {}:{}",
        config.settings.gateway.bind,
        config.settings.gateway.port
    );
    relay::gateway::run_gateway(config).await
}

fn run_check_config(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let config = resolve_config(config_path)?;
    println!("{:#?}", config);
    Ok(())
}

fn run_sign(secret: &str, body_path: &std::path::Path) -> anyhow::Result<()> {
    use anyhow::Context;
    let body = std::fs::read(body_path)
        .with_context(|| format!("reading body from {}", body_path.display()))?;
    println!("{}", relay::channels::signature::sign(&body, secret));
    Ok(())
}
