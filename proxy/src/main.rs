use clap::Parser;
use log::{error, info};
use proxy::config::Config;
use proxy::network::ProxyServer;
use proxy::session::link::tcp_dialer;
use proxy::session::ProxyContext;
use proxy::world::cache::spawn_sweeper;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Anti-cheat proxy for Bedrock-style game servers")]
struct Args {
    /// TOML configuration file
    #[clap(short, long)]
    config: Option<PathBuf>,
    /// Address clients connect to
    #[clap(short, long)]
    listen: Option<String>,
    /// Address of the real game server
    #[clap(short, long)]
    upstream: Option<String>,
    /// Concurrent sessions before new clients are refused
    #[clap(short, long)]
    max_sessions: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(listen) = args.listen {
        config.proxy.listen = listen;
    }
    if let Some(upstream) = args.upstream {
        config.proxy.upstream = upstream;
    }
    if let Some(max_sessions) = args.max_sessions {
        config.proxy.max_sessions = max_sessions;
    }

    let ctx = Arc::new(ProxyContext::new(config, tcp_dialer()));
    let sweeper = spawn_sweeper(Arc::clone(&ctx.cache));
    let server = ProxyServer::bind(ctx).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Proxy stopped: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    sweeper.abort();
    Ok(())
}
