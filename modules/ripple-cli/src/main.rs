//! `ripple` command line: mount a markup file, apply scripted state writes and
//! events, settle network actions, and print the result.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ripple_engine::{codec, Event, Lookup, MemoryDocument, Ripple, RippleConfig, Store};
use ripple_http::ReqwestTransport;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ripple")]
#[command(about = "Reactive markup binding engine")]
#[command(version)]
struct Cli {
    /// TOML config file (defaults to RIPPLE_* environment variables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mount a page and print its markup after scripted interaction
    Render {
        /// Markup file containing the root container
        file: PathBuf,

        /// State write applied after mount (`key=value`, value decoded)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        writes: Vec<String>,

        /// Event dispatched after the writes (`kind:selector[=value]`)
        #[arg(long = "event", value_name = "KIND:SELECTOR[=VALUE]")]
        events: Vec<EventArg>,

        /// Persistence prefix (overrides config)
        #[arg(long)]
        prefix: Option<String>,

        /// JSON file used as durable storage (overrides config)
        #[arg(long)]
        storage: Option<PathBuf>,

        /// Print the final state as JSON instead of the markup
        #[arg(long)]
        state: bool,
    },
}

/// A scripted event: `click:#inc`, `input:#name=Ada`.
#[derive(Debug, Clone)]
struct EventArg {
    kind: String,
    selector: String,
    value: Option<String>,
}

impl FromStr for EventArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (kind, rest) = s
            .split_once(':')
            .ok_or_else(|| format!("expected KIND:SELECTOR, got `{s}`"))?;
        // `=` inside an attribute selector belongs to the selector.
        let from = rest.rfind(']').map_or(0, |i| i + 1);
        let (selector, value) = match rest[from..].find('=') {
            Some(i) => (&rest[..from + i], Some(rest[from + i + 1..].to_string())),
            None => (rest, None),
        };
        if kind.is_empty() || selector.is_empty() {
            return Err(format!("expected KIND:SELECTOR, got `{s}`"));
        }
        Ok(Self {
            kind: kind.to_string(),
            selector: selector.to_string(),
            value,
        })
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

async fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("ripple=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => RippleConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => RippleConfig::from_env()?,
    };

    match cli.command {
        Commands::Render {
            file,
            writes,
            events,
            prefix,
            storage,
            state,
        } => {
            let mut config = config;
            if prefix.is_some() {
                config.storage_prefix = prefix;
            }
            if storage.is_some() {
                config.storage_path = storage;
            }
            render(config, &file, &writes, &events, state).await
        }
    }
}

async fn render(
    config: RippleConfig,
    file: &Path,
    writes: &[String],
    events: &[EventArg],
    print_state: bool,
) -> Result<()> {
    let markup = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let transport = ReqwestTransport::new(&config.http)?;

    let ripple = Ripple::builder()
        .transport(transport)
        .config(config)
        .mount_marked(MemoryDocument::parse(&markup))?;

    for write in writes {
        let (key, raw) = write
            .split_once('=')
            .with_context(|| format!("expected KEY=VALUE, got `{write}`"))?;
        ripple.set(key, codec::decode(raw));
    }

    for arg in events {
        let element = ripple
            .select(&arg.selector)
            .and_then(|selection| selection.into_iter().next())
            .with_context(|| format!("No element matches `{}`", arg.selector))?;
        let mut event = Event::new(arg.kind.as_str(), element.node());
        if let Some(value) = &arg.value {
            event = event.with_value(value.as_str());
        }
        ripple.dispatch(&event);
    }

    if ripple.pending_requests() > 0 {
        info!(pending = ripple.pending_requests(), "Settling network actions");
        ripple.settle().await;
    }

    if print_state {
        println!("{}", serde_json::to_string_pretty(&ripple.snapshot())?);
    } else {
        println!("{}", ripple.html());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_event_args() {
        let click: EventArg = "click:#inc".parse().unwrap();
        assert_eq!((click.kind.as_str(), click.selector.as_str()), ("click", "#inc"));
        assert!(click.value.is_none());

        let input: EventArg = "input:#name=Ada Lovelace".parse().unwrap();
        assert_eq!(input.selector, "#name");
        assert_eq!(input.value.as_deref(), Some("Ada Lovelace"));

        let attr: EventArg = "click:[data-id=3]".parse().unwrap();
        assert_eq!(attr.selector, "[data-id=3]");
        assert!(attr.value.is_none());

        assert!("click".parse::<EventArg>().is_err());
        assert!(":#x".parse::<EventArg>().is_err());
    }

    #[test]
    fn cli_accepts_repeated_flags() {
        let cli = Cli::try_parse_from([
            "ripple", "render", "page.html", "--set", "count=2", "--set", "name=\"Ada\"",
            "--event", "click:#inc", "--state",
        ])
        .unwrap();
        let Commands::Render { writes, events, state, .. } = cli.command;
        assert_eq!(writes, vec!["count=2", "name=\"Ada\""]);
        assert_eq!(events.len(), 1);
        assert!(state);
    }
}
