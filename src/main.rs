//! Workbench session shell
//!
//! Attaches a terminal session to the local stdio: output events print to
//! stdout, stdin lines feed the session. A smoke tool for the adapter
//! layer, not the real orchestrator.

use std::io::Write;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use workbench_sessions::adapter::CreateParams;
use workbench_sessions::config::WorkspaceSettings;
use workbench_sessions::{AdapterRegistry, SessionKind};

/// Workbench session shell
///
/// Runs one terminal session attached to stdio
#[derive(Parser, Debug)]
#[command(name = "workbench-sessions")]
#[command(version, about, long_about = None)]
struct Args {
    /// Working directory for the session
    #[arg(short, long)]
    cwd: Option<String>,

    /// Terminal columns
    #[arg(long, default_value_t = 80)]
    cols: u16,

    /// Terminal rows
    #[arg(long, default_value_t = 24)]
    rows: u16,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    info!("workbench-sessions v{}", env!("CARGO_PKG_VERSION"));

    let settings = args
        .cwd
        .as_deref()
        .map(|cwd| WorkspaceSettings::load(std::path::Path::new(cwd)))
        .transpose()?
        .unwrap_or_default();
    let registry = AdapterRegistry::with_defaults(settings);

    let on_event: workbench_sessions::EventCallback = Arc::new(|evt| {
        if evt.channel == "terminal:result" {
            if let Some(data) = evt.payload["data"].as_str() {
                let mut stdout = std::io::stdout();
                let _ = stdout.write_all(data.as_bytes());
                let _ = stdout.flush();
            }
        } else {
            info!("{} {}", evt.channel, evt.event_type);
        }
    });

    let mut params = CreateParams::new(on_event).with_options(serde_json::json!({
        "cols": args.cols,
        "rows": args.rows,
    }));
    if let Some(cwd) = args.cwd {
        params = params.with_cwd(cwd);
    }

    let handle = registry.create(SessionKind::Terminal, params).await?;
    info!("session started in {}", handle.cwd().display());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("received SIGINT, closing session");
                break;
            }
            line = lines.next_line() => {
                match line? {
                    Some(mut line) => {
                        line.push('\n');
                        handle.write(line.as_bytes()).await;
                    }
                    None => break,
                }
            }
            _ = async {
                loop {
                    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                    if !handle.is_alive().await {
                        break;
                    }
                }
            } => {
                info!("session ended");
                break;
            }
        }
    }

    handle.close().await;
    Ok(())
}
