//! # Calculator Client
//!
//! Calls a running `calculator-server` through the twine proxy: one call by
//! position, one by name, one that fails, then a batch.
//!
//! ## Usage
//! ```bash
//! cargo run --bin calculator-client -- --url http://127.0.0.1:8007/jsonrpc
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::{Map, Value, json};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use twine_client::{ClientConfig, ClientError, Proxy};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Calculator endpoint
    #[arg(short, long, default_value = "http://127.0.0.1:8007/jsonrpc")]
    url: String,

    /// Request timeout in seconds
    #[arg(short, long, default_value = "30")]
    timeout: u64,
}

fn named(a: Value, b: Value) -> Map<String, Value> {
    let mut kwargs = Map::new();
    kwargs.insert("a".to_string(), a);
    kwargs.insert("b".to_string(), b);
    kwargs
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let config = ClientConfig::default().with_request_timeout(Duration::from_secs(args.timeout));
    let proxy = Proxy::from_url_with_config(&args.url, &config)
        .with_context(|| format!("invalid endpoint {}", args.url))?;
    info!("Calling calculator at {}", proxy.url());

    let sum = proxy.method("add").call_args(vec![json!(1), json!(2)]).await?;
    println!("add(1, 2) = {}", sum);

    let difference = proxy
        .method("subtract")
        .call_kwargs(named(json!(10), json!(4)))
        .await?;
    println!("subtract(a=10, b=4) = {}", difference);

    match proxy.method("add").call_args(vec![json!(1), json!("2")]).await {
        Ok(value) => warn!("add(1, \"2\") unexpectedly returned {}", value),
        Err(ClientError::Rpc(err)) => {
            println!("add(1, \"2\") failed: {} (code {})", err.message(), err.code())
        }
        Err(other) => return Err(other.into()),
    }

    let outputs = proxy
        .batch_call(vec![
            ("add", (vec![json!(3), json!(4)], Map::new())),
            ("subtract", (Vec::new(), named(json!(1), json!(5)))),
            ("multiply", (vec![json!(2), json!(2)], Map::new())),
        ])
        .await?;
    for (index, (result, error)) in outputs.into_iter().enumerate() {
        match (result, error) {
            (Some(result), _) => println!("batch[{}] = {}", index, result),
            (None, Some(error)) => {
                println!("batch[{}] failed: {} (code {})", index, error.message, error.code)
            }
            (None, None) => println!("batch[{}] returned nothing", index),
        }
    }

    Ok(())
}
