use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use xreg_bridge::BridgeConfig;

#[derive(Parser)]
#[command(name = "xreg-bridge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Aggregation bridge over a set of xRegistry ecosystem adapters")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "bridge.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_filter = format!("xreg_bridge={}", cli.log_level);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| log_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting xreg-bridge v{}", env!("CARGO_PKG_VERSION"));

    std::env::set_var("XREG_BRIDGE_CONFIG_FILE", &cli.config);
    let mut config = match BridgeConfig::load("XREG_BRIDGE") {
        Ok(c) => c,
        Err(e) => {
            eprintln!("fatal: failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    if let Some(host) = cli.host {
        config.http.host = host;
    }
    if let Some(port) = cli.port {
        config.http.port = port;
    }

    if let Err(e) = xreg_bridge::serve(config).await {
        eprintln!("fatal: {e}");
        std::process::exit(1);
    }
}
