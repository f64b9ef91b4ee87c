//! ethbackend CLI — query a remote ETHBACKEND service from the terminal.
//!
//! Usage:
//! ```bash
//! # Check interface compatibility
//! ethbackend check --url ws://127.0.0.1:9090
//!
//! # One-shot queries
//! ETHBACKEND_URL=ws://127.0.0.1:9090 ethbackend peer-count
//! ethbackend node-info --url ws://127.0.0.1:9090 --limit 5
//!
//! # Stream header events or logs until Ctrl-C
//! ethbackend logs --url ws://127.0.0.1:9090 --address 0xdac17f958d2ee523a2206206994597c13d831ec7
//! ```

mod logging;

use std::env;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use ethbackend_core::proto::{H160, LogsFilterRequest, SubscribeLogsReply, SubscribeReply};
use ethbackend_core::{Address, ApiBackend, CallContext, LogsRequestSlot};
use ethbackend_remote::RemoteBackend;
use ethbackend_ws::{WsBackendClient, WsClientConfig};

use crate::logging::LogConfig;

const URL_ENV: &str = "ETHBACKEND_URL";
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

const COMMANDS: &[&str] = &[
    "check",
    "etherbase",
    "net-version",
    "peer-count",
    "protocol-version",
    "client-version",
    "node-info",
    "subscribe",
    "logs",
];

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "version" | "--version" | "-V" => {
            println!("ethbackend {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        cmd if COMMANDS.contains(&cmd) => run(cmd, &args[2..]).await,
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("ethbackend {}", env!("CARGO_PKG_VERSION"));
    println!("Query a remote ETHBACKEND service\n");
    println!("USAGE:");
    println!("    ethbackend <COMMAND> [FLAGS]\n");
    println!("COMMANDS:");
    println!("    check             Check interface version compatibility");
    println!("    etherbase         Print the coinbase address");
    println!("    net-version       Print the network id");
    println!("    peer-count        Print the number of connected peers");
    println!("    protocol-version  Print the eth protocol version");
    println!("    client-version    Print the node's client name");
    println!("    node-info         Print node records as JSON");
    println!("    subscribe         Stream header events until Ctrl-C");
    println!("    logs              Stream logs until Ctrl-C");
    println!("    version           Print version");
    println!("    help              Print this help\n");
    println!("FLAGS:");
    println!("    --url <URL>         Service WebSocket URL  [required, or {URL_ENV}]");
    println!("    --timeout-ms <MS>   Per-call timeout       [default: {DEFAULT_TIMEOUT_MS}]");
    println!("    --log-level <LVL>   trace|debug|info|warn|error  [default: warn]");
    println!("    --log-component <C=LVL>  Level for one crate, e.g. ethbackend-ws=debug (repeatable)");
    println!("    --json-logs         Emit logs as JSON on stderr");
    println!("    --limit <N>         node-info: maximum records (0 = all)");
    println!("    --address <ADDR>    logs: only this address (repeatable)");
}

/// Settings shared by every command, resolved from flags and environment.
#[derive(Debug, Clone, PartialEq)]
struct CliConfig {
    url: String,
    timeout: Duration,
    log: LogConfig,
}

impl CliConfig {
    fn from_args(args: &[String], env_url: Option<String>) -> Result<Self, String> {
        let url = parse_flag(args, "--url")
            .or(env_url)
            .ok_or_else(|| format!("--url is required (or set {URL_ENV})"))?;

        let timeout_ms = match parse_flag(args, "--timeout-ms") {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| format!("invalid --timeout-ms: {raw}"))?,
            None => DEFAULT_TIMEOUT_MS,
        };

        let mut log = LogConfig::default();
        if let Some(level) = parse_flag(args, "--log-level") {
            log.level = level;
        }
        for raw in parse_flag_all(args, "--log-component") {
            let (component, level) = raw
                .split_once('=')
                .ok_or_else(|| format!("invalid --log-component {raw}: expected crate=level"))?;
            log.components.insert(component.to_string(), level.to_string());
        }
        log.json = args.iter().any(|a| a == "--json-logs");

        Ok(Self {
            url,
            timeout: Duration::from_millis(timeout_ms),
            log,
        })
    }
}

async fn run(command: &str, args: &[String]) -> Result<(), String> {
    let config = CliConfig::from_args(args, env::var(URL_ENV).ok())?;
    logging::init_tracing(&config.log);

    let client = WsBackendClient::connect(&config.url, WsClientConfig::default())
        .await
        .map_err(|e| e.to_string())?;
    let backend = RemoteBackend::new(Arc::new(client));

    let session = CallContext::background();
    let call = session.with_timeout(config.timeout);

    let compatible = backend.ensure_version_compatibility_with(&call).await;
    if command == "check" {
        return if compatible {
            println!("compatible (client {})", backend.version());
            Ok(())
        } else {
            Err(format!("incompatible with client {}", backend.version()))
        };
    }

    match command {
        "etherbase" => {
            let address = backend.etherbase(&call).await.map_err(|e| e.to_string())?;
            println!("{address}");
        }
        "net-version" => {
            let id = backend.net_version(&call).await.map_err(|e| e.to_string())?;
            println!("{id}");
        }
        "peer-count" => {
            let count = backend.net_peer_count(&call).await.map_err(|e| e.to_string())?;
            println!("{count}");
        }
        "protocol-version" => {
            let id = backend.protocol_version(&call).await.map_err(|e| e.to_string())?;
            println!("{id}");
        }
        "client-version" => {
            let name = backend.client_version(&call).await.map_err(|e| e.to_string())?;
            println!("{name}");
        }
        "node-info" => cmd_node_info(&backend, &call, args).await?,
        "subscribe" => cmd_subscribe(&backend, &session).await?,
        "logs" => cmd_logs(&backend, &session, args).await?,
        other => return Err(format!("Unknown command: {other}")),
    }
    Ok(())
}

async fn cmd_node_info(
    backend: &RemoteBackend,
    ctx: &CallContext,
    args: &[String],
) -> Result<(), String> {
    let limit = match parse_flag(args, "--limit") {
        Some(raw) => raw.parse::<u32>().map_err(|_| format!("invalid --limit: {raw}"))?,
        None => 0,
    };
    let nodes = backend.node_info(ctx, limit).await.map_err(|e| e.to_string())?;
    println!("{}", serde_json::to_string_pretty(&nodes).unwrap_or_default());
    Ok(())
}

async fn cmd_subscribe(backend: &RemoteBackend, session: &CallContext) -> Result<(), String> {
    cancel_on_ctrl_c(session);
    let mut print = |event: SubscribeReply| print_json(&event);
    match backend.subscribe(session, &mut print).await {
        Ok(()) => Ok(()),
        Err(_) if session.is_cancelled() => Ok(()),
        Err(e) => Err(e.to_string()),
    }
}

async fn cmd_logs(
    backend: &RemoteBackend,
    session: &CallContext,
    args: &[String],
) -> Result<(), String> {
    let filter = logs_filter(args)?;
    cancel_on_ctrl_c(session);

    let slot = LogsRequestSlot::new();
    let mut print = |log: SubscribeLogsReply| print_json(&log);
    let subscription = backend.subscribe_logs(session, &mut print, &slot);
    tokio::pin!(subscription);

    // the filter can only go out once the stream has published its sender
    let send_filter = async {
        loop {
            if let Some(requester) = slot.current() {
                return requester.send(filter.clone()).await;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    };

    let result = tokio::select! {
        res = &mut subscription => res,
        sent = send_filter => {
            sent.map_err(|e| e.to_string())?;
            subscription.await
        }
    };

    match result {
        Ok(()) => Ok(()),
        Err(_) if session.is_cancelled() => Ok(()),
        Err(e) => Err(e.to_string()),
    }
}

/// Build the logs filter from repeated `--address` flags; none means all logs.
fn logs_filter(args: &[String]) -> Result<LogsFilterRequest, String> {
    let addresses: Vec<H160> = parse_flag_all(args, "--address")
        .into_iter()
        .map(|raw| {
            raw.parse::<Address>()
                .map(Into::into)
                .map_err(|e| format!("--address: {e}"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if addresses.is_empty() {
        return Ok(LogsFilterRequest::all());
    }
    Ok(LogsFilterRequest {
        all_addresses: false,
        addresses,
        all_topics: true,
        topics: vec![],
    })
}

fn cancel_on_ctrl_c(ctx: &CallContext) {
    let ctx = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted");
            ctx.cancel();
        }
    });
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{line}"),
        Err(e) => tracing::warn!(error = %e, "failed to encode item"),
    }
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}

fn parse_flag_all(args: &[String], flag: &str) -> Vec<String> {
    args.windows(2)
        .filter(|pair| pair[0] == flag)
        .map(|pair| pair[1].clone())
        .collect()
}
