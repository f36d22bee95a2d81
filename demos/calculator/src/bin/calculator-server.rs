//! # Calculator Server
//!
//! Serves `add` and `subtract` over JSON-RPC 2.0.
//!
//! ## Usage
//! ```bash
//! cargo run --bin calculator-server -- --port 8007 --path /jsonrpc
//! ```
//!
//! ```bash
//! curl -X POST http://127.0.0.1:8007/jsonrpc \
//!   -H "Content-Type: application/json" \
//!   -d '{"jsonrpc":"2.0","id":1,"method":"add","params":[1,2]}'
//! ```

use std::net::{IpAddr, SocketAddr};

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use twine_calculator::Calculator;
use twine_http_server::HttpRpcServer;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value = "8007")]
    port: u16,

    /// Path of the JSON-RPC resource
    #[arg(long, default_value = "/jsonrpc")]
    path: String,

    /// Largest request body accepted, in bytes
    #[arg(long, default_value = "1048576")]
    max_body_size: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    info!("Starting calculator server");

    let server = HttpRpcServer::builder()
        .bind_address(SocketAddr::new(args.host, args.port))
        .rpc_path(args.path)
        .max_body_size(args.max_body_size)
        .events(Calculator)
        .build();

    let bound = server.bind().await?;
    info!(
        "Calculator available at http://{}{}",
        bound.local_addr(),
        server.config().rpc_path
    );

    bound
        .serve_with_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
