//! pagestore - inspect and edit a single-page metadata store file

use anyhow::{bail, Context, Result};
use clap::{Parser as ClapParser, Subcommand};
use log::error;
use pagestore::{MetadataStore, PageLayout, StorageError};
use std::path::PathBuf;

/// pagestore - a single-page disk-backed key/value store
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Store file (created if missing)
    #[arg(short, long, default_value = "./metadata.db")]
    file: PathBuf,

    /// Page size in bytes
    #[arg(long, default_value_t = pagestore::storage::PAGE_SIZE)]
    page_size: usize,

    /// Key size in bytes
    #[arg(long, default_value_t = pagestore::storage::FIXED_KEY_SIZE)]
    key_size: usize,

    /// Value size in bytes
    #[arg(long, default_value_t = pagestore::storage::FIXED_VAL_SIZE)]
    value_size: usize,

    /// Keys and values are hex strings instead of text
    #[arg(long)]
    hex: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the file if needed and report its capacity
    Init,
    /// Print the value stored under a key
    Get { key: String },
    /// Store a value under a key
    Set { key: String, value: String },
    /// Remove a key
    Delete { key: String },
    /// Print the free bytes left in the page
    Free,
    /// Print every stored entry
    List,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let layout = PageLayout::new(args.page_size, args.key_size, args.value_size)
        .context("Invalid page layout")?;
    let store = MetadataStore::open_with_layout(&args.file, layout)
        .with_context(|| format!("Failed to open store at {}", args.file.display()))?;

    let outcome = run(&store, &args);
    if let Err(e) = &outcome {
        report_failure(e, &args);
    }
    store.close().context("Failed to close store")?;
    outcome
}

/// File system failures mean the page on disk may not match what was asked
/// for; caller mistakes (bad sizes, full page, missing key) do not.
fn report_failure(err: &anyhow::Error, args: &Args) {
    match err.downcast_ref::<StorageError>() {
        Some(storage_err) if storage_err.is_io_class() => error!(
            "I/O failure on {}: {}; check the file before retrying",
            args.file.display(),
            storage_err
        ),
        _ => error!("{:#}", err),
    }
}

fn run(store: &MetadataStore, args: &Args) -> Result<()> {
    match &args.command {
        Command::Init => {
            let layout = store.layout();
            println!(
                "{}: page {} bytes, key {} bytes, value {} bytes, capacity {} entries",
                store.path().display(),
                layout.page_size(),
                layout.key_size(),
                layout.value_size(),
                layout.capacity()
            );
        }
        Command::Get { key } => {
            let key = parse_bytes(key, args.hex)?;
            match store.get(&key)? {
                Some(value) => println!("{}", format_bytes(&value, args.hex)),
                None => bail!("Key not found: {}", format_bytes(&key, args.hex)),
            }
        }
        Command::Set { key, value } => {
            let key = parse_bytes(key, args.hex)?;
            let value = parse_bytes(value, args.hex)?;
            store.set(&key, &value)?;
        }
        Command::Delete { key } => {
            let key = parse_bytes(key, args.hex)?;
            store.delete(&key)?;
        }
        Command::Free => {
            println!("{}", store.free_size()?);
        }
        Command::List => {
            let mut entries = store.entries()?;
            entries.sort();
            for (key, value) in entries {
                println!(
                    "{}\t{}",
                    format_bytes(&key, args.hex),
                    format_bytes(&value, args.hex)
                );
            }
        }
    }

    Ok(())
}

fn parse_bytes(input: &str, hex: bool) -> Result<Vec<u8>> {
    if hex {
        hex::decode(input).with_context(|| format!("Invalid hex string: {}", input))
    } else {
        Ok(input.as_bytes().to_vec())
    }
}

fn format_bytes(bytes: &[u8], hex: bool) -> String {
    if hex {
        hex::encode(bytes)
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}
