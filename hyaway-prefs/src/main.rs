//! hyaway-prefs - inspect and edit persisted hyAway preferences
//!
//! Operates on the file-backed stores under the resolved root folder, the
//! same files a running hyAway host reads on startup.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use hyaway_common::config::{RootFolderResolver, TomlConfig, ROOT_FOLDER_ENV};
use hyaway_common::tags;
use hyaway_prefs::{DynStore, FileStorage, PreferenceRegistry};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Command-line arguments for hyaway-prefs
#[derive(Parser, Debug)]
#[command(name = "hyaway-prefs")]
#[command(about = "Inspect and edit persisted hyAway preferences")]
#[command(version)]
struct Args {
    /// Folder holding persisted stores (overrides env and config file)
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Log level when RUST_LOG is not set
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(flatten)]
    Store(StoreCommand),
    /// Print tags in listing order
    Tags {
        raw: Vec<String>,
        /// Group output by namespace
        #[arg(long)]
        grouped: bool,
    },
}

#[derive(Subcommand, Debug)]
enum StoreCommand {
    /// List store names
    Stores,
    /// Print a store's current state as JSON
    Show { store: String },
    /// Print key metadata for a store
    Describe { store: String },
    /// Print one value
    Get { store: String, key: String },
    /// Set one value; VALUE is JSON (`500`, `true`, `"grid"`); bare words are taken as strings
    Set {
        store: String,
        key: String,
        value: String,
        /// Enforce the key's documented bounds
        #[arg(long)]
        checked: bool,
    },
    /// Restore a store (or every store with --all) to defaults
    Reset {
        store: Option<String>,
        #[arg(long)]
        all: bool,
    },
}

fn init_tracing(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = TomlConfig::load().context("Failed to load config.toml")?;

    init_tracing(args.log_level.as_deref().unwrap_or(config.log_level()));
    debug!(
        "hyaway-prefs v{} [{}] {} build of {}",
        env!("CARGO_PKG_VERSION"),
        env!("HYAWAY_GIT_REVISION"),
        env!("HYAWAY_BUILD_PROFILE"),
        env!("HYAWAY_BUILD_DATE")
    );

    let command = match args.command {
        Command::Tags { raw, grouped } => {
            print_tags(&raw, grouped);
            return Ok(());
        }
        Command::Store(command) => command,
    };

    let root = RootFolderResolver::new(ROOT_FOLDER_ENV)
        .with_cli_arg(args.root.clone())
        .with_config(&config)
        .resolve();
    info!("Preference root: {}", root.display());

    let registry = PreferenceRegistry::with_defaults(Arc::new(FileStorage::new(root)))?;

    match command {
        StoreCommand::Stores => {
            for name in registry.names() {
                println!("{}", name);
            }
        }
        StoreCommand::Show { store } => {
            let store = registry.by_name(&store)?;
            println!("{}", serde_json::to_string_pretty(&store.snapshot())?);
        }
        StoreCommand::Describe { store } => describe(registry.by_name(&store)?.as_ref()),
        StoreCommand::Get { store, key } => {
            let store = registry.by_name(&store)?;
            match store.get_key(&key) {
                Some(value) => println!("{}", value),
                None => bail!("{} has no key '{}'", store.name(), key),
            }
        }
        StoreCommand::Set {
            store,
            key,
            value,
            checked,
        } => {
            let store = registry.by_name(&store)?;
            let value = parse_value(&value);
            if checked {
                store.set_key_checked(&key, value)?;
            } else {
                store.set_key(&key, value)?;
            }
            info!("{}.{} updated", store.name(), key);
        }
        StoreCommand::Reset { store, all } => match (store, all) {
            (_, true) => registry.reset_all(),
            (Some(name), false) => {
                registry.by_name(&name)?.reset();
            }
            (None, false) => bail!("name a store or pass --all"),
        },
    }

    Ok(())
}

/// JSON if it parses, otherwise the raw text as a string
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn describe(store: &dyn DynStore) {
    println!("{}", store.name());
    for meta in store.metadata() {
        let current = store
            .get_key(meta.key)
            .map(|v| v.to_string())
            .unwrap_or_default();
        println!(
            "  {:<26} {:<8} default {:<10} range {:<24} now {}",
            meta.key,
            meta.kind.as_str(),
            meta.default_value,
            meta.validation_range,
            current
        );
        println!("  {:<26} {}", "", meta.description);
    }
}

fn print_tags(raw: &[String], grouped: bool) {
    if grouped {
        for (namespace, members) in tags::group_by_namespace(raw) {
            let heading = if namespace.is_empty() { "(none)" } else { namespace.as_str() };
            println!("{}", heading);
            for member in members {
                println!("  {}", member);
            }
        }
    } else {
        let mut sorted = raw.to_vec();
        tags::sort_tags(&mut sorted);
        for tag in sorted {
            println!("{}", tag);
        }
    }
}
