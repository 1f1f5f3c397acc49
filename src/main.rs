use clap::Parser;
use distribution::config::NodeConfig;
use distribution::membership::types::{ALL, Node};
use distribution::node;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Runs one node of the distribution substrate", long_about = None)]
struct Args {
    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1")]
    ip: String,

    /// Port to bind. Use 0 for an ephemeral port.
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Root of this node's persistent store. Defaults to `store_data/<nid>`.
    #[arg(long)]
    store_dir: Option<PathBuf>,

    /// Timeout of every outgoing RPC, in milliseconds.
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,

    /// Known node (`ip:port`) to add to the `all` group. Repeatable.
    #[arg(long = "peer", value_parser = parse_node)]
    peers: Vec<Node>,
}

fn parse_node(raw: &str) -> Result<Node, String> {
    let (ip, port) = raw
        .rsplit_once(':')
        .ok_or_else(|| format!("expected ip:port, got {raw}"))?;
    let port = port
        .parse()
        .map_err(|e| format!("invalid port in {raw}: {e}"))?;
    Ok(Node::new(ip, port))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = NodeConfig::new(Node::new(args.ip, args.port))
        .with_request_timeout(Duration::from_millis(args.timeout_ms));
    if let Some(dir) = args.store_dir {
        config = config.with_store_root(dir);
    }

    let handle = node::start(config).await?;
    let ctx = handle.context().clone();
    for peer in args.peers {
        tracing::info!("Adding peer {} ({})", peer, peer.sid());
        ctx.groups.add(ALL, peer);
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctx.stop();
        }
    });

    tracing::info!("Press Ctrl+C to shutdown");
    handle.wait().await;
    Ok(())
}
