//! CLI probe for the board store.
//!
//! # Responsibility
//! - Open a store (file path, JSON config, or in-memory) and print a short
//!   summary of its contents.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `boardstore_cli [DB_PATH | --config CONFIG_JSON]`

use boardstore_core::db::migrations::latest_version;
use boardstore_core::{SqliteStore, Store, StoreConfig};
use log::info;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run(std::env::args().skip(1).collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("boardstore_cli: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Vec<String>) -> Result<(), String> {
    let config = match args.as_slice() {
        [] => StoreConfig::default(),
        [flag, path] if flag == "--config" => {
            StoreConfig::from_json_file(path).map_err(|err| err.to_string())?
        }
        [path] => StoreConfig {
            database_path: Some(path.into()),
            ..StoreConfig::default()
        },
        _ => return Err("usage: boardstore_cli [DB_PATH | --config CONFIG_JSON]".to_string()),
    };
    config.init_logging().map_err(|err| err.to_string())?;

    let store = SqliteStore::open_with_config(&config).map_err(|err| err.to_string())?;
    info!("event=cli_open module=cli status=ok");

    println!("boardstore_core version={}", boardstore_core::core_version());
    println!("schema_version={}", latest_version());
    println!(
        "teams={}",
        store.get_team_count().map_err(|err| err.to_string())?
    );
    println!(
        "registered_users={}",
        store
            .get_registered_user_count()
            .map_err(|err| err.to_string())?
    );

    let mut counts: Vec<(String, i64)> = store
        .get_block_counts_by_type()
        .map_err(|err| err.to_string())?
        .into_iter()
        .collect();
    counts.sort();
    for (block_type, total) in counts {
        println!("blocks.{block_type}={total}");
    }

    store.shutdown().map_err(|err| err.to_string())
}
