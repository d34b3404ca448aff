//! `nodecred-ctl` — inspect and edit a node's credential databases offline.
//!
//! # Usage
//!
//! ```text
//! nodecred-ctl [--config <path>] <command>
//!
//! Commands:
//!   identity            print the stored node identity (never creates one)
//!   get <key>           print the value stored under <key>
//!   put <key> <value>   store <value> under <key>, replacing any old value
//!   delete <key>        remove <key> (no error if absent)
//!
//! Flags:
//!   --config <path>   config file (default: $NODECRED_CONFIG or config/default.toml)
//!   --help, -h        print this help
//! ```

use std::io::Write;
use std::path::Path;
use std::process;

use node_credentials::config::{self, EnvOverrides};
use node_credentials::error::AppError;
use node_credentials::kv::KvStore;

const USAGE: &str = "\
usage: nodecred-ctl [--config <path>] <command>

commands:
  identity            print the stored node identity
  get <key>           print the value stored under <key>
  put <key> <value>   store <value> under <key>
  delete <key>        remove <key>
";

struct Args {
    config: Option<String>,
    command: Option<String>,
    rest: Vec<String>,
}

fn parse_args() -> Args {
    let mut config = None;
    let mut command = None;
    let mut rest = Vec::new();
    let mut iter = std::env::args().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                print!("{USAGE}");
                process::exit(0);
            }
            "--config" => match iter.next() {
                Some(path) => config = Some(path),
                None => {
                    eprintln!("--config requires a path");
                    process::exit(2);
                }
            },
            _ if command.is_none() => command = Some(arg),
            _ => rest.push(arg),
        }
    }

    Args { config, command, rest }
}

fn main() {
    let args = parse_args();
    let Some(command) = args.command.clone() else {
        eprint!("{USAGE}");
        process::exit(2);
    };

    if let Err(e) = run(&command, &args) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn run(command: &str, args: &Args) -> Result<(), AppError> {
    let _ = dotenvy::dotenv();

    let config = match &args.config {
        Some(path) => config::load_from(Path::new(path), &EnvOverrides::from_env())?,
        None => config::load()?,
    };
    let (store, manager) = node_credentials::open(&config)?;
    let kv = KvStore::new(store);

    match (command, args.rest.as_slice()) {
        ("identity", []) => match manager.load()? {
            Some(identity) => {
                println!("node_id     {}", identity.node_id());
                println!("public_key  {}", identity.public_key());
                if manager.has_override() {
                    println!("source      override");
                }
            }
            None => println!("no node identity stored"),
        },
        ("get", [key]) => match kv.fetch(key)? {
            Some(value) => {
                let mut out = std::io::stdout().lock();
                out.write_all(&value)?;
                out.write_all(b"\n")?;
            }
            None => {
                eprintln!("{key}: not found");
                process::exit(1);
            }
        },
        ("put", [key, value]) => kv.store(key, value)?,
        ("delete", [key]) => kv.delete(key)?,
        _ => {
            eprint!("{USAGE}");
            process::exit(2);
        }
    }
    Ok(())
}
