use clap::Parser;
use log::info;
use server::arena::{Arena, ArenaConfig};
use server::network::{self, NetworkConfig};
use server::persist::MemoryStore;
use std::sync::Arc;
use std::time::Duration;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[clap(short, long, default_value = "8765")]
    port: u16,

    /// Game tick rate for continuous games (updates per second)
    #[clap(short, long, default_value = "20")]
    tick_rate: u32,

    /// Maximum concurrent client connections
    #[clap(short, long, default_value = "256")]
    max_clients: usize,

    /// Seconds an ended session lingers before being reaped
    #[clap(long, default_value = "30")]
    reap_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = ArenaConfig {
        max_clients: args.max_clients,
        reap_grace: Duration::from_secs(args.reap_secs),
        ..Default::default()
    };
    let arena = Arena::new(config, Arc::new(MemoryStore::new()));

    let addr = format!("{}:{}", args.host, args.port);
    let listener = network::bind(&addr).await?;

    let net_config = NetworkConfig {
        tick_rate: args.tick_rate,
        ..Default::default()
    };

    tokio::select! {
        _ = network::run(arena, listener, net_config) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
