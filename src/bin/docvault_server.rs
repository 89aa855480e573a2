//!
//! docvault server binary
//! ----------------------
//! Command-line entry point for the docvault HTTP server. Configuration comes from
//! environment variables (see `docvault::config`); CLI flags override them.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

use docvault::config::ServerConfig;

fn parse_port_arg(args: &[String], flag: &str) -> Result<Option<u16>> {
    match flag_value(args, flag) {
        Some(raw) => raw.parse::<u16>().map(Some).with_context(|| format!("invalid value for {flag}: '{raw}'")),
        None => Ok(None),
    }
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        i += 1;
    }
    None
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let args: Vec<String> = env::args().collect();

    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("docvault Server\n\nUSAGE:\n  docvault_server [--http-port N] [--upload-dir PATH] [--mongodb-uri URI]\n\nOPTIONS:\n  --http-port N        HTTP API port (env: DOCVAULT_HTTP_PORT, default 8000)\n  --upload-dir PATH    Root of the upload tree (env: DOCVAULT_UPLOAD_DIR, default uploads)\n  --mongodb-uri URI    Record store connection string (env: MONGODB_URI; memory:// for in-process)\n");
        return Ok(());
    }

    // The URI flag must be visible before the env loader insists on MONGODB_URI
    let arg_uri = flag_value(&args, "--mongodb-uri");
    let mut config = match &arg_uri {
        Some(uri) => {
            dotenvy::dotenv().ok();
            ServerConfig::from_lookup(|key| if key == "MONGODB_URI" { Some(uri.clone()) } else { env::var(key).ok() })?
        }
        None => ServerConfig::from_env()?,
    };

    if let Some(port) = parse_port_arg(&args, "--http-port")? {
        config.http_port = port;
    }
    if let Some(dir) = flag_value(&args, "--upload-dir") {
        config.upload_dir = PathBuf::from(dir);
    }

    docvault::server::run_with_config(config).await
}
