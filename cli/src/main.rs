//! koios-rest: query the Koios API from the terminal.
//!
//! Usage:
//! ```bash
//! # List native assets
//! koios-rest asset-list
//!
//! # Asset info against the guild network, stats included
//! koios-rest --host guild.koios.rest --stats asset-info <policy> <name>
//! ```

use std::env;
use std::process;

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use koios_core::{ClientOption, LIBRARY_VERSION};
use koios_http::{AssetName, Client, PolicyId, RequestFailure};

/// Global flags, valid before or after the command.
#[derive(Debug, Default)]
struct GlobalFlags {
    options: Vec<ClientOption>,
    ugly: bool,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    let (flags, positional) = match parse_global_flags(&args) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("Error: {e:#}");
            print_usage();
            process::exit(1);
        }
    };
    let Some((command, rest)) = positional.split_first() else {
        print_usage();
        process::exit(1);
    };

    let result = match command.as_str() {
        "version" | "--version" | "-V" => {
            println!("koios-rest {} (library {LIBRARY_VERSION})", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => run(other, rest, flags).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_usage() {
    println!("koios-rest {}", env!("CARGO_PKG_VERSION"));
    println!("CLI client for the Koios API https://api.koios.rest\n");
    println!("USAGE:");
    println!("    koios-rest [FLAGS] <COMMAND> [ARGS]\n");
    println!("COMMANDS:");
    println!("    asset-list                          List of all native assets");
    println!("    asset-address-list <policy> <name>  Addresses holding the asset");
    println!("    asset-info <policy> <name>          Asset info and registry metadata");
    println!("    asset-summary <policy> <name>       Asset summary");
    println!("    asset-txs <policy> <name>           Transaction hashes of the asset");
    println!("    version                             Print version");
    println!("    help                                Print this help\n");
    println!("FLAGS:");
    println!("    --host <HOST>          Set host             [default: api.koios.rest]");
    println!("    -p, --port <PORT>      Set port             [default: 443]");
    println!("    --api-version <VER>    Set API version      [default: v0]");
    println!("    --schema <SCHEMA>      Set URL schema       [default: https]");
    println!("    --origin <URL>         Set Origin header for requests");
    println!("    --rate-limit <N>       Outgoing requests per second [default: 5]");
    println!("    --stats                Include request timing in output");
    println!("    --ugly                 Print compact json instead of pretty json\n");
    println!("Set RUST_LOG=debug for request logs on stderr.");
}

async fn run(command: &str, args: &[String], flags: GlobalFlags) -> Result<()> {
    let client = Client::new(flags.options).context("invalid client configuration")?;
    tracing::debug!(command, base_url = %client.base_url(), "running command");

    match command {
        "asset-list" => output(client.asset_list().await, flags.ugly),
        "asset-address-list" => {
            let (policy, name) = asset_args(args)?;
            output(client.asset_address_list(&policy, &name).await, flags.ugly)
        }
        "asset-info" => {
            let (policy, name) = asset_args(args)?;
            output(client.asset_info(&policy, &name).await, flags.ugly)
        }
        "asset-summary" => {
            let (policy, name) = asset_args(args)?;
            output(client.asset_summary(&policy, &name).await, flags.ugly)
        }
        "asset-txs" => {
            let (policy, name) = asset_args(args)?;
            output(client.asset_txs(&policy, &name).await, flags.ugly)
        }
        other => bail!("unknown command: {other}"),
    }
}

/// Print the envelope of a result. Failed calls print their envelope too,
/// then exit non-zero.
fn output<T: Serialize>(
    result: std::result::Result<T, RequestFailure>,
    ugly: bool,
) -> Result<()> {
    match result {
        Ok(rsp) => print_json(&rsp, ugly),
        Err(failure) => {
            print_json(&failure.response, ugly)?;
            Err(anyhow!(failure))
        }
    }
}

fn print_json<T: Serialize>(value: &T, ugly: bool) -> Result<()> {
    let out = if ugly {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{out}");
    Ok(())
}

fn asset_args(args: &[String]) -> Result<(PolicyId, AssetName)> {
    let policy = args.first().ok_or_else(|| anyhow!("<policy> is required"))?;
    let name = args.get(1).map(String::as_str).unwrap_or_default();
    Ok((PolicyId::from(policy.as_str()), AssetName::from(name)))
}

fn parse_global_flags(args: &[String]) -> Result<(GlobalFlags, Vec<String>)> {
    let mut flags = GlobalFlags::default();
    let mut positional = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| anyhow!("{flag} requires a value"))
        };
        match arg.as_str() {
            "--host" => flags.options.push(ClientOption::Host(value("--host")?)),
            "--api-version" => flags
                .options
                .push(ClientOption::ApiVersion(value("--api-version")?)),
            "--schema" => flags.options.push(ClientOption::Schema(value("--schema")?)),
            "--origin" => flags.options.push(ClientOption::Origin(value("--origin")?)),
            "-p" | "--port" => {
                let port = value("--port")?
                    .parse()
                    .context("--port must be between 0 and 65535")?;
                flags.options.push(ClientOption::Port(port));
            }
            "--rate-limit" => {
                let limit = value("--rate-limit")?
                    .parse()
                    .context("--rate-limit must be between 1 and 255")?;
                flags.options.push(ClientOption::RateLimit(limit));
            }
            "--stats" => flags.options.push(ClientOption::CollectRequestStats(true)),
            "--ugly" => flags.ugly = true,
            _ => positional.push(arg.clone()),
        }
    }
    Ok((flags, positional))
}
