//! tracilink Probe Binary
//!
//! Connects to a TraCI server and reports what it sees.

use clap::Parser;
use tracilink::{Client, Config, Domain};
use tracing_subscriber::{fmt, EnvFilter};

/// tracilink probe
#[derive(Parser, Debug)]
#[command(name = "tracilink-probe")]
#[command(about = "Connect to a TraCI server and print basic information")]
#[command(version)]
struct Args {
    /// Server host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short, long, default_value = "8813")]
    port: u16,

    /// Connect timeout in milliseconds
    #[arg(short, long, default_value = "5000")]
    timeout_ms: u64,

    /// Extra connect attempts
    #[arg(short, long, default_value = "0")]
    retries: u32,

    /// Print the id list of this domain (e.g. route, vehicle)
    #[arg(short, long)]
    domain: Option<String>,

    /// Simulation steps to advance before closing
    #[arg(short, long, default_value = "0")]
    steps: u32,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tracilink=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("tracilink probe v{}", tracilink::VERSION);

    if let Err(e) = run(&args) {
        tracing::error!("Probe failed: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> tracilink::Result<()> {
    let domain = match &args.domain {
        Some(name) => Some(Domain::by_name(name).ok_or_else(|| {
            tracilink::TraciError::Config(format!("unknown domain '{}'", name))
        })?),
        None => None,
    };

    let config = Config::builder()
        .host(&args.host)
        .port(args.port)
        .connect_timeout_ms(args.timeout_ms)
        .connect_retries(args.retries)
        .build();

    tracing::info!("Connecting to {}", config.addr());
    let client = Client::connect(config)?;

    let version = client.get_version()?;
    println!("api {} / {}", version.api_version, version.version);

    if let Some(domain) = domain {
        let ids = client.domain(domain).get_id_list()?;
        println!("{} ({}): {}", domain.name, ids.len(), ids.join(", "));
    }

    for step in 0..args.steps {
        client.simulation_step(0)?;
        tracing::debug!("Completed step {}", step + 1);
    }

    client.close()
}
