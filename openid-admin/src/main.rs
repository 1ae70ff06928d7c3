//! openid-admin - maintenance for a file-backed OpenID store

use anyhow::Context;
use clap::{Arg, ArgMatches, Command};
use openid_core::{AssociationStore, DhParams};
use openid_store::{FjallStore, StoreConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("openid-admin")
        .version("0.1.0")
        .about("Maintenance for OpenID association and nonce stores")
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .value_name("PATH")
                .help("Store directory path")
                .default_value("./openid-data")
                .global(true),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("JSON store configuration")
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(Command::new("cleanup").about("Remove expired associations and stale nonces"))
        .subcommand(Command::new("auth-key").about("Print a fingerprint of the store's auth key"))
        .subcommand(Command::new("dh-defaults").about("Print the default DH modulus and generator as base64"))
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<StoreConfig> {
    match matches.get_one::<String>("config") {
        Some(path) => StoreConfig::from_json_file(path)
            .with_context(|| format!("failed to load config from {}", path)),
        None => Ok(StoreConfig::default()),
    }
}

fn open_store(matches: &ArgMatches) -> anyhow::Result<FjallStore> {
    let data_dir: PathBuf = matches
        .get_one::<String>("data-dir")
        .context("missing --data-dir")?
        .into();
    let config = load_config(matches)?;

    info!("Data directory: {}", data_dir.display());
    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)?;
        info!("Created data directory: {}", data_dir.display());
    }

    FjallStore::open(&data_dir, config)
        .with_context(|| format!("failed to open store at {}", data_dir.display()))
}

/// Run a parsed command line, returning what to print.
///
/// Global flags are read from the subcommand's matches, where clap
/// propagates them regardless of where they appeared.
fn run(matches: &ArgMatches) -> anyhow::Result<String> {
    match matches.subcommand() {
        Some(("cleanup", sub)) => {
            let store = open_store(sub)?;
            let associations = store.cleanup_associations()?;
            let nonces = store.cleanup_nonces()?;
            info!(associations, nonces, "cleanup finished");
            Ok(format!(
                "removed {} expired associations and {} stale nonces",
                associations, nonces
            ))
        }
        Some(("auth-key", sub)) => {
            let store = open_store(sub)?;
            let key = store.auth_key()?;
            let fingerprint = blake3::hash(key.as_bytes());
            Ok(fingerprint.to_hex()[..16].to_string())
        }
        Some(("dh-defaults", _)) => {
            let (p, g) = DhParams::default().to_base64();
            Ok(format!("p: {}\ng: {}", p, g))
        }
        _ => anyhow::bail!("unknown command"),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let matches = cli().get_matches();
    let output = run(&matches)?;
    println!("{}", output);
    Ok(())
}
