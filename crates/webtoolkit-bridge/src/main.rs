//! WebToolkit: entry point.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use serde_json::{Map, Value};

use webtoolkit_bridge::config::{resolve_store_path, Timeouts};
use webtoolkit_bridge::page::HostPage;
use webtoolkit_bridge::protocol::Coordinator;
use webtoolkit_bridge::state::{self, FileStateStore};
use webtoolkit_bridge::transport::StdioTransport;
use webtoolkit_bridge::types::{Request, Response};

#[derive(Parser)]
#[command(
    name = "webtoolkit",
    about = "Capture readable page content and answer quiz forms",
    version
)]
struct Cli {
    /// Path to the state file.
    #[arg(short, long, global = true)]
    store: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Milliseconds to wait for the page relay before parsing script tags.
    #[arg(long, default_value_t = 3000, global = true)]
    relay_timeout_ms: u64,

    /// Milliseconds a custom dropdown gets to render its options.
    #[arg(long, default_value_t = 300, global = true)]
    dropdown_settle_ms: u64,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve protocol requests over stdio (default).
    Serve,

    /// Capture an HTML file as a new entry.
    Capture {
        /// HTML file to capture.
        file: PathBuf,

        /// URL the page was loaded from.
        #[arg(long)]
        url: String,
    },

    /// Resolve and fill the quiz form in an HTML file.
    Answer {
        /// HTML file of the form page.
        file: PathBuf,

        /// URL the form was loaded from.
        #[arg(long)]
        url: String,

        /// JSON object file with the page's global variables.
        #[arg(long)]
        globals: Option<PathBuf>,

        /// Write the fill script here instead of printing it.
        #[arg(long)]
        script_out: Option<PathBuf>,
    },

    /// Show or change whether capturing is enabled.
    Status {
        #[arg(value_enum)]
        state: Option<Toggle>,
    },

    /// List stored entries, newest first.
    Entries,

    /// Delete one entry.
    Delete { id: String },

    /// Delete all entries.
    Clear,

    /// Merge entries into one text, oldest first.
    Merge {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Export entries to a JSON file.
    Export { path: PathBuf },

    /// Replace entries with those of an exported JSON file.
    Import { path: PathBuf },

    /// Show or change merge settings.
    Settings {
        #[arg(long)]
        include_title: Option<bool>,

        #[arg(long)]
        include_url: Option<bool>,

        #[arg(long)]
        include_time: Option<bool>,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   webtoolkit completions bash > ~/.local/share/bash-completion/completions/webtoolkit
    ///   webtoolkit completions zsh > ~/.zfunc/_webtoolkit
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let command = cli.command.unwrap_or(Commands::Serve);
    if let Commands::Completions { shell } = command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "webtoolkit", &mut std::io::stdout());
        return Ok(());
    }

    let timeouts = Timeouts {
        relay_timeout: Duration::from_millis(cli.relay_timeout_ms),
        dropdown_settle: Duration::from_millis(cli.dropdown_settle_ms),
        ..Timeouts::default()
    };
    let store_path = resolve_store_path(cli.store.as_deref());
    let store = FileStateStore::open(&store_path)?;
    let coordinator = Arc::new(Coordinator::new(state::shared(store), timeouts));

    match command {
        Commands::Serve => {
            tracing::info!("WebToolkit coordinator");
            tracing::info!("Store: {store_path}");
            let transport = StdioTransport::new(Arc::clone(&coordinator));
            transport.run().await?;
        }

        Commands::Capture { file, url } => {
            let tab_id = open_file(&coordinator, &file, &url, Map::new()).await?;
            let response = send(&coordinator, Request::CaptureContent { tab_id: Some(tab_id) }).await?;
            print_json(&response)?;
        }

        Commands::Answer {
            file,
            url,
            globals,
            script_out,
        } => {
            let globals = match globals {
                Some(path) => read_json(&path)
                    .and_then(|v| serde_json::from_value(v).context("globals must be a JSON object"))?,
                None => Map::new(),
            };
            let tab_id = open_file(&coordinator, &file, &url, globals).await?;
            let mut response = send(&coordinator, Request::AnswerGForm { tab_id: Some(tab_id) }).await?;
            if let Some(path) = script_out {
                if let Some(Value::String(script)) = response.data.remove("fillScript") {
                    std::fs::write(&path, script)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    eprintln!("Fill script written to {}", path.display());
                }
            }
            print_json(&response)?;
        }

        Commands::Status { state } => {
            let request = match state {
                Some(toggle) => Request::SetCaptureStatus {
                    capturing: matches!(toggle, Toggle::On),
                },
                None => Request::GetCaptureStatus,
            };
            let response = send(&coordinator, request).await?;
            let on = response.get("capturing").and_then(Value::as_bool).unwrap_or(false);
            println!("Capturing: {}", if on { "on" } else { "off" });
        }

        Commands::Entries => {
            let response = send(&coordinator, Request::GetEntries).await?;
            let entries: Vec<webtoolkit::Entry> =
                serde_json::from_value(response.get("entries").cloned().unwrap_or_default())?;
            if entries.is_empty() {
                println!("No entries.");
            }
            for entry in entries {
                println!(
                    "{}  {}  {}{}\n    {}",
                    entry.id,
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.title,
                    if entry.trimmed { " (trimmed)" } else { "" },
                    entry.url
                );
            }
        }

        Commands::Delete { id } => {
            send(&coordinator, Request::DeleteEntry { entry_id: id }).await?;
        }

        Commands::Clear => {
            send(&coordinator, Request::ClearAllEntries).await?;
            println!("All entries deleted.");
        }

        Commands::Merge { ids } => {
            let response = send(&coordinator, Request::MergeEntries { entry_ids: ids }).await?;
            if let Some(Value::String(merged)) = response.get("merged") {
                println!("{merged}");
            }
        }

        Commands::Export { path } => {
            let response = send(&coordinator, Request::ExportData).await?;
            let bundle = response.get("bundle").cloned().unwrap_or_default();
            std::fs::write(&path, serde_json::to_string_pretty(&bundle)?)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Data exported to {}", path.display());
        }

        Commands::Import { path } => {
            let bundle = read_json(&path)?;
            let response = send(&coordinator, Request::ImportData { bundle }).await?;
            let count = response.get("count").and_then(Value::as_u64).unwrap_or(0);
            println!("Imported {count} entries successfully!");
        }

        Commands::Settings {
            include_title,
            include_url,
            include_time,
        } => {
            let response = send(&coordinator, Request::GetSettings).await?;
            let mut settings: webtoolkit::MergeSettings =
                serde_json::from_value(response.get("settings").cloned().unwrap_or_default())?;
            if include_title.is_some() || include_url.is_some() || include_time.is_some() {
                settings.include_title = include_title.unwrap_or(settings.include_title);
                settings.include_url = include_url.unwrap_or(settings.include_url);
                settings.include_time = include_time.unwrap_or(settings.include_time);
                send(&coordinator, Request::SaveSettings { settings }).await?;
            }
            print_json(&settings)?;
        }

        Commands::Completions { .. } => {}
    }

    coordinator.shutdown().await?;
    Ok(())
}

async fn open_file(
    coordinator: &Coordinator,
    file: &Path,
    url: &str,
    globals: Map<String, Value>,
) -> anyhow::Result<u32> {
    let html = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let host = HostPage::new(url, html).with_globals(globals);
    Ok(coordinator.bus().open_tab(host, coordinator.timeouts()).await)
}

async fn send(coordinator: &Coordinator, request: Request) -> anyhow::Result<Response> {
    let response = coordinator.handle(request).await;
    if !response.success {
        anyhow::bail!(response.error.unwrap_or_else(|| "Request failed".to_string()));
    }
    Ok(response)
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(serde_json::from_str(&text)?)
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
