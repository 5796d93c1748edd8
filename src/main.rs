use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use mail_ingest::config::{self, Args, LogFormat};
use mail_ingest::sink::HttpSink;
use mail_ingest::store::S3Store;

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

fn read_event(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(p) if p != Path::new("-") => {
            fs::read(p).with_context(|| format!("read event {}", p.display()))
        }
        _ => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("read event from stdin")?;
            Ok(buf)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_format);

    let config = config::load(&args)
        .inspect_err(|e| error!(error = %e, "Invalid configuration"))?;
    let raw_event = read_event(args.event_path.as_deref())
        .inspect_err(|e| error!(error = %e, "Could not read trigger event"))?;

    let store = S3Store::from_env().await;
    let sink = HttpSink::new(&config.ingest_url, &config.ingest_token);

    mail_ingest::handle_raw_event(&raw_event, &config, &store, &sink).await?;
    Ok(())
}
