//! quire-tools - run one quire tool per invocation.
//!
//! Reads a JSON request such as `{"tool": "campaign_list"}` from stdin and
//! prints the JSON result to stdout. Logs go to stderr.
//!
//! Configuration comes from the file named by `QUIRE_CONFIG`, falling back
//! to `QUIRE_*` environment variables.

mod dispatch;
mod tools;

use std::io::Read;
use std::process::ExitCode;

use anyhow::Result;
use quire_core::{QuireError, StoreConfig};
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::dispatch::Tools;
use crate::tools::ToolRequest;

#[tokio::main]
async fn main() -> ExitCode {
    // stdout carries the result, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let (body, code) = match run().await {
        Ok(result) => (dispatch::success(result), ExitCode::SUCCESS),
        Err(err) => {
            tracing::error!(error = %err, "Tool failed");
            let body = match err.downcast_ref::<QuireError>() {
                Some(quire) => dispatch::failure(quire),
                None => dispatch::failure(&QuireError::Internal(format!("{:#}", err))),
            };
            (body, ExitCode::FAILURE)
        }
    };

    println!("{}", body);
    code
}

async fn run() -> Result<Value> {
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;

    let request: ToolRequest = serde_json::from_str(&input)
        .map_err(|e| QuireError::validation(format!("Invalid tool request: {}", e)))?;

    let config = load_config()?;
    tracing::debug!(data_dir = %config.data_dir.display(), "Loaded configuration");

    Ok(Tools::new(config).call(request).await?)
}

fn load_config() -> Result<StoreConfig> {
    match std::env::var("QUIRE_CONFIG") {
        Ok(path) if !path.is_empty() => {
            tracing::info!(path = %path, "Loading configuration file");
            Ok(StoreConfig::from_file(&path)?)
        }
        _ => Ok(StoreConfig::from_env()),
    }
}
