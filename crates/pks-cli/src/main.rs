//! `pks`: inspect and edit a file-backed persisted key store

mod settings;

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use pks_core::{ConfigPatch, KeySchema, SharedStateBinder, Store};
use pks_storage::{FileBackend, StorageBackend};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    let key = Arg::new("key").required(true).help("Logical key");
    let version = Arg::new("schema-version")
        .long("schema-version")
        .value_parser(value_parser!(u32));

    Command::new("pks")
        .version(pks_core::VERSION)
        .about("Persisted key store inspector")
        .after_help(
            "The logical keys `track` and `init` share physical keys with the \
             version ledger and session marker; avoid them.",
        )
        .subcommand_required(true)
        .arg(
            Arg::new("file")
                .long("file")
                .short('f')
                .global(true)
                .default_value("pks.json")
                .value_parser(value_parser!(PathBuf))
                .help("JSON file holding the store"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML settings file (namespace, delimiter)"),
        )
        .arg(
            Arg::new("namespace")
                .long("namespace")
                .short('n')
                .global(true)
                .help("Namespace prefixed to physical keys"),
        )
        .arg(
            Arg::new("delimiter")
                .long("delimiter")
                .short('d')
                .global(true)
                .help("Separator between namespace and key"),
        )
        .subcommand(
            Command::new("get")
                .about("Print the stored value of a key")
                .arg(key.clone()),
        )
        .subcommand(
            Command::new("set")
                .about("Store a value and record its version")
                .arg(key.clone())
                .arg(
                    Arg::new("value")
                        .required(true)
                        .help("JSON value; anything else is stored as a string"),
                )
                .arg(
                    version
                        .clone()
                        .help("Version to record (default: the ledger's current entry, else 1)"),
                ),
        )
        .subcommand(
            Command::new("remove")
                .about("Delete a key and its ledger entry")
                .arg(key.clone()),
        )
        .subcommand(Command::new("keys").about("List physical keys in the file"))
        .subcommand(Command::new("ledger").about("Print the version ledger"))
        .subcommand(
            Command::new("activate")
                .about("Activate a key: seed defaults and check its version")
                .arg(key)
                .arg(
                    Arg::new("default")
                        .long("default")
                        .help("Default value as JSON"),
                )
                .arg(version.help("Schema version to check the ledger against (default 1)"))
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print only the value, as JSON"),
                ),
        )
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    run(&cli().get_matches())
}

fn run(matches: &ArgMatches) -> anyhow::Result<()> {
    let store = open_store(matches)?;

    match matches.subcommand() {
        Some(("get", args)) => {
            let key = arg(args, "key")?;
            match store.backend().get(&store.physical_key(key))? {
                Some(raw) => println!("{}", pks_storage::decode(&raw).into_value()),
                None => println!("(unset)"),
            }
        }
        Some(("set", args)) => {
            let key = arg(args, "key")?;
            let value = parse_value(arg(args, "value")?);
            let version = match args.get_one::<u32>("schema-version") {
                Some(version) => *version,
                None => recorded_version(&store, key)?,
            };
            let schema = KeySchema::empty().with_version(version);
            let dispatcher = activate(&store, key, schema)?.into_parts().1;
            dispatcher.update(value)?;
        }
        Some(("remove", args)) => {
            let key = arg(args, "key")?;
            let schema = KeySchema::empty().with_version(recorded_version(&store, key)?);
            activate(&store, key, schema)?
                .dispatcher()
                .remove()?;
        }
        Some(("keys", _)) => {
            for key in store.backend().keys()? {
                println!("{key}");
            }
        }
        Some(("ledger", _)) => {
            println!("{}", serde_json::to_string_pretty(&store.ledger()?)?);
        }
        Some(("activate", args)) => {
            let key = arg(args, "key")?;
            let schema = match args.get_one::<String>("default") {
                Some(raw) => KeySchema::new(
                    serde_json::from_str(raw).context("--default must be valid JSON")?,
                ),
                None => KeySchema::empty(),
            };
            let activation = activate(&store, key, with_version(schema, args))?;

            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(activation.value())?);
            } else {
                let report = activation.report();
                println!("Key: {key} ({})", store.physical_key(key));
                println!("Value: {}", activation.value());
                println!("Seeded: {}", report.seeded);
                println!("Migration: {}", report.migration);
                for warning in &report.warnings {
                    println!("Warning: {warning}");
                }
                println!("Activated: {}", store.activated_keys().join(", "));
            }
        }
        _ => {}
    }

    Ok(())
}

/// Store over the file backend, with settings and flags applied
fn open_store(matches: &ArgMatches) -> anyhow::Result<Store> {
    let path = matches
        .get_one::<PathBuf>("file")
        .context("missing --file")?;
    let settings = settings::resolve(
        matches.get_one::<PathBuf>("config").map(PathBuf::as_path),
        matches.get_one::<String>("namespace").cloned(),
        matches.get_one::<String>("delimiter").cloned(),
    )?;

    let backend = FileBackend::open(path)
        .with_context(|| format!("failed to open store {}", path.display()))?;
    tracing::debug!(path = %backend.path().display(), "opened store");

    Ok(Store::with_config(
        settings
            .into_patch()
            .backend(Arc::new(backend))
            .binder(Arc::new(SharedStateBinder::new())),
    ))
}

/// Register `schema` for `key` and activate it
fn activate(store: &Store, key: &str, schema: KeySchema) -> anyhow::Result<pks_core::Activation> {
    store.configure(ConfigPatch::new().storage(key, schema));
    let activation = store.activate(key)?;
    if let Some(err) = activation.report().migration.error() {
        tracing::warn!(key, "{err}");
    }
    Ok(activation)
}

/// Version currently recorded for `key`, so plain edits leave the ledger alone
fn recorded_version(store: &Store, key: &str) -> anyhow::Result<u32> {
    Ok(store.ledger_version(key)?.unwrap_or(pks_core::DEFAULT_VERSION))
}

fn with_version(schema: KeySchema, args: &ArgMatches) -> KeySchema {
    match args.get_one::<u32>("schema-version") {
        Some(version) => schema.with_version(*version),
        None => schema,
    }
}

fn arg<'a>(args: &'a ArgMatches, id: &str) -> anyhow::Result<&'a str> {
    args.get_one::<String>(id)
        .map(String::as_str)
        .with_context(|| format!("missing <{id}>"))
}

/// JSON if it parses, otherwise the literal string
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
