#![windows_subsystem = "windows"]
use std::io::{self, BufRead, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde_json::Value;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod error;
mod model;
mod parsers;
mod protocol;
mod services;

#[cfg(test)]
mod test_support;

/// Line-delimited JSON core behind the TienIch desktop app.
#[derive(Parser, Debug)]
#[command(name = "tienich-core", version)]
struct Args {
    /// Where settings.json and dictionary.json live
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Log filter (e.g. info, tienich_core=debug); overrides RUST_LOG
    #[arg(long, value_name = "FILTER")]
    log_level: Option<String>,
}

fn init_logging(level: Option<&str>) -> anyhow::Result<()> {
    let filter = match level {
        Some(l) => EnvFilter::try_new(l).with_context(|| format!("invalid --log-level `{l}`"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    // stdout carries the protocol; logs go to stderr only.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();
    Ok(())
}

fn request_id(line: &str) -> Value {
    serde_json::from_str::<Value>(line)
        .ok()
        .and_then(|v| v.get("id").cloned())
        .unwrap_or(Value::Null)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_level.as_deref())?;

    let data_dir = services::settings::data_dir(args.data_dir.as_deref());
    info!(data_dir = %data_dir.display(), "tienich-core starting");

    let mut core = protocol::Core::open(data_dir);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => continue,
        };

        if line.trim().is_empty() {
            continue;
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            core.handle(&line, &mut |event: Value| {
                let _ = writeln!(stdout, "{event}");
                let _ = stdout.flush();
            })
        }));

        let response = match result {
            Ok(resp) => resp,
            Err(_) => {
                error!("handler panicked");
                serde_json::json!({
                    "id": request_id(&line),
                    "status": "error",
                    "message": "internal core error"
                })
                .to_string()
            }
        };

        if writeln!(stdout, "{response}").is_err() {
            break;
        }

        let _ = stdout.flush();
    }

    info!("stdin closed, exiting");
    Ok(())
}
