#![forbid(unsafe_code)]

//! Local driver for the collaboration engine: create a plan, join it, and
//! run turns against a storage directory. One process per invocation; all
//! continuity lives in the store.

#[cfg(test)]
mod tests;

use pl_core::ids::RootId;
use pl_engine::{CatalogVendor, Engine, IntakeFirstParty, StaticCatalog, TurnRequest};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;

const USAGE: &str = "\
planloom: durable multi-party planning collaboration engine

USAGE:
  planloom [--storage-dir DIR] init --name NAME --identity WHO --partner WHO [--target-date-ms MS]
  planloom [--storage-dir DIR] join ROOT --identity WHO
  planloom [--storage-dir DIR] turn ROOT --identity WHO --message TEXT
  planloom [--storage-dir DIR] status ROOT --identity WHO

Storage dir defaults to ./planloom_data (or PLANLOOM_STORAGE_DIR).
";

#[derive(Debug)]
struct Cli {
    storage_dir: PathBuf,
    command: Command,
}

#[derive(Debug)]
enum Command {
    Init {
        name: String,
        identity: String,
        partner: String,
        target_date_ms: Option<i64>,
    },
    Join {
        root: String,
        identity: String,
    },
    Turn {
        root: String,
        identity: String,
        message: String,
    },
    Status {
        root: String,
        identity: String,
    },
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(message) => {
            eprintln!("{message}");
            eprintln!();
            eprintln!("{USAGE}");
            return ExitCode::from(2);
        }
    };
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let mut engine = Engine::open(&cli.storage_dir)
        .map_err(|err| err.to_string())?
        .with_catalog(Box::new(demo_catalog()));

    match cli.command {
        Command::Init {
            name,
            identity,
            partner,
            target_date_ms,
        } => {
            let row = engine
                .intake_first_party(IntakeFirstParty {
                    display_name: name,
                    target_date_ms,
                    identity,
                    expected_partner: Some(partner.clone()),
                    details: json!({}),
                })
                .map_err(|err| err.user_message())?;
            println!(
                "{}",
                json!({
                    "root": row.id,
                    "status": row.status.as_str(),
                    "waiting_for": partner,
                })
            );
        }
        Command::Join { root, identity } => {
            let root = parse_root(&root)?;
            let outcome = engine
                .intake_second_party(&root, &identity, &json!({}))
                .map_err(|err| err.user_message())?;
            println!(
                "{}",
                json!({
                    "root": outcome.root.as_str(),
                    "activated": outcome.activated,
                })
            );
        }
        Command::Turn {
            root,
            identity,
            message,
        } => {
            let reply = engine.handle_turn(&TurnRequest {
                root,
                identity,
                message,
            });
            println!("{}", reply.into_value());
        }
        Command::Status { root, identity } => {
            let reply = engine.handle_turn(&TurnRequest {
                root,
                identity,
                message: "status overview".to_string(),
            });
            println!("{}", reply.into_value());
        }
    }
    Ok(())
}

fn parse_root(raw: &str) -> Result<RootId, String> {
    RootId::try_new(raw).map_err(|err| format!("bad root id: {err}"))
}

fn parse_args(args: &[String]) -> Result<Cli, String> {
    let mut storage_dir = std::env::var("PLANLOOM_STORAGE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("planloom_data"));

    let mut rest: Vec<String> = Vec::new();
    let mut iter = args.iter().peekable();
    while let Some(arg) = iter.next() {
        if arg == "--storage-dir" {
            let value = iter
                .next()
                .ok_or_else(|| "--storage-dir needs a value".to_string())?;
            storage_dir = PathBuf::from(value);
        } else {
            rest.push(arg.clone());
        }
    }

    let Some(command) = rest.first() else {
        return Err("missing command".to_string());
    };
    let command = match command.as_str() {
        "init" => {
            let flags = parse_flags(&rest[1..])?;
            Command::Init {
                name: require_flag(&flags, "name")?,
                identity: require_flag(&flags, "identity")?,
                partner: require_flag(&flags, "partner")?,
                target_date_ms: optional_i64(&flags, "target-date-ms")?,
            }
        }
        "join" => {
            let (root, flags) = positional_then_flags(&rest[1..], "join needs a root id")?;
            Command::Join {
                root,
                identity: require_flag(&flags, "identity")?,
            }
        }
        "turn" => {
            let (root, flags) = positional_then_flags(&rest[1..], "turn needs a root id")?;
            Command::Turn {
                root,
                identity: require_flag(&flags, "identity")?,
                message: require_flag(&flags, "message")?,
            }
        }
        "status" => {
            let (root, flags) = positional_then_flags(&rest[1..], "status needs a root id")?;
            Command::Status {
                root,
                identity: require_flag(&flags, "identity")?,
            }
        }
        other => return Err(format!("unknown command: {other}")),
    };

    Ok(Cli {
        storage_dir,
        command,
    })
}

type Flags = Vec<(String, String)>;

fn parse_flags(args: &[String]) -> Result<Flags, String> {
    let mut flags = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let Some(name) = arg.strip_prefix("--") else {
            return Err(format!("unexpected argument: {arg}"));
        };
        let value = iter
            .next()
            .ok_or_else(|| format!("--{name} needs a value"))?;
        flags.push((name.to_string(), value.clone()));
    }
    Ok(flags)
}

fn positional_then_flags(args: &[String], missing: &str) -> Result<(String, Flags), String> {
    let Some(first) = args.first() else {
        return Err(missing.to_string());
    };
    if first.starts_with("--") {
        return Err(missing.to_string());
    }
    Ok((first.clone(), parse_flags(&args[1..])?))
}

fn require_flag(flags: &Flags, name: &str) -> Result<String, String> {
    flags
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.clone())
        .ok_or_else(|| format!("--{name} is required"))
}

fn optional_i64(flags: &Flags, name: &str) -> Result<Option<i64>, String> {
    match flags.iter().find(|(k, _)| k == name) {
        None => Ok(None),
        Some((_, raw)) => raw
            .parse::<i64>()
            .map(Some)
            .map_err(|_| format!("--{name} must be an integer")),
    }
}

fn demo_catalog() -> StaticCatalog {
    StaticCatalog {
        vendors: vec![
            CatalogVendor {
                name: "Grand Palace Banquets".to_string(),
                category: "venue".to_string(),
                city: Some("Jaipur".to_string()),
                rating: Some(4.6),
                price_cents: Some(80_000_00),
            },
            CatalogVendor {
                name: "Riverside Lawns".to_string(),
                category: "venue".to_string(),
                city: Some("Pune".to_string()),
                rating: Some(4.2),
                price_cents: Some(45_000_00),
            },
            CatalogVendor {
                name: "Lumen Studio".to_string(),
                category: "photographer".to_string(),
                city: Some("Mumbai".to_string()),
                rating: Some(4.8),
                price_cents: Some(12_000_00),
            },
            CatalogVendor {
                name: "Saffron Table".to_string(),
                category: "caterer".to_string(),
                city: Some("Delhi".to_string()),
                rating: Some(4.4),
                price_cents: Some(30_000_00),
            },
        ],
    }
}
