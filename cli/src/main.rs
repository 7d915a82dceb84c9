//! wcrelay CLI — talk to a relay from the terminal.
//!
//! Usage:
//! ```bash
//! # Publish a JSON-RPC request on a topic
//! wcrelay publish --url wss://relay.walletconnect.com --project-id <ID> \
//!     --topic <TOPIC> --method wc_sessionPing --params '{}'
//!
//! # Print requests and responses arriving on a topic
//! wcrelay subscribe --url wss://relay.walletconnect.com --topic <TOPIC>
//!
//! # Print connection state changes
//! wcrelay watch --url wss://relay.walletconnect.com
//! ```

mod logging;

use std::env;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;

use wcrelay_core::{
    ClientRequest, Delivery, InMemoryHistory, Inbound, PlainJsonSerializer, Relayer,
    RelayerConfig, Topic,
};
use wcrelay_ws::{WsRelayConfig, WsRelayTransport};

use crate::logging::{init_tracing, LogConfig};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Optional `--config` file contents.
#[derive(Debug, Default, Deserialize)]
struct CliConfig {
    #[serde(default)]
    relayer: RelayerConfig,
    #[serde(default)]
    log: LogConfig,
    #[serde(default)]
    project_id: Option<String>,
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let rest = &args[2..];
    let config = match load_config(rest) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };
    init_tracing(&config.log);

    let result = match args[1].as_str() {
        "publish" => cmd_publish(rest, &config).await,
        "subscribe" => cmd_subscribe(rest, &config).await,
        "watch" => cmd_watch(rest, &config).await,
        "version" | "--version" | "-V" => {
            println!("wcrelay {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
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
    println!("wcrelay {}", env!("CARGO_PKG_VERSION"));
    println!("Publish to, subscribe on and watch a relay\n");
    println!("USAGE:");
    println!("    wcrelay <COMMAND> [FLAGS]\n");
    println!("COMMANDS:");
    println!("    publish    Publish a JSON-RPC request on a topic");
    println!("    subscribe  Print messages arriving on a topic");
    println!("    watch      Print connection state changes");
    println!("    version    Print version");
    println!("    help       Print this help\n");
    println!("FLAGS:");
    println!("    --url <URL>          Relay WebSocket URL  [required]");
    println!("    --project-id <ID>    Project id sent to the relay");
    println!("    --topic <TOPIC>      Topic (publish, subscribe)");
    println!("    --method <METHOD>    Request method (publish)  [default: wc_sessionPing]");
    println!("    --params <JSON>      Request params (publish)  [default: {{}}]");
    println!("    --config <FILE>      JSON config file");
}

fn load_config(args: &[String]) -> Result<CliConfig, String> {
    let Some(path) = parse_flag(args, "--config") else {
        return Ok(CliConfig::default());
    };
    let text = std::fs::read_to_string(&path).map_err(|e| format!("{path}: {e}"))?;
    serde_json::from_str(&text).map_err(|e| format!("{path}: {e}"))
}

/// Build a relayer over a WebSocket transport and wait until it is connected.
async fn connect(args: &[String], config: &CliConfig) -> Result<Relayer, String> {
    let url = parse_flag(args, "--url").ok_or("--url is required")?;
    let mut ws_config = WsRelayConfig::new(url);
    ws_config.project_id = parse_flag(args, "--project-id").or_else(|| config.project_id.clone());

    let transport = Arc::new(WsRelayTransport::new(ws_config));
    let relayer = Relayer::new(
        transport.clone(),
        Arc::new(PlainJsonSerializer),
        Arc::new(InMemoryHistory::new()),
        config.relayer.clone(),
    );

    let mut health = relayer.connection_health();
    let mut errors = relayer.initialization_errors();
    transport.start();

    let outcome = tokio::time::timeout(CONNECT_TIMEOUT, async {
        tokio::select! {
            open = health.changed() => match open {
                Some(true) => Ok(()),
                _ => Err("connection closed".to_string()),
            },
            failure = errors.recv() => Err(failure
                .map(|f| f.to_string())
                .unwrap_or_else(|| "transport closed".into())),
        }
    })
    .await
    .map_err(|_| format!("no connection after {}s", CONNECT_TIMEOUT.as_secs()))?;

    outcome.map(|()| relayer)
}

async fn cmd_publish(args: &[String], config: &CliConfig) -> Result<(), String> {
    let topic = Topic::new(parse_flag(args, "--topic").ok_or("--topic is required")?);
    let method = parse_flag(args, "--method").unwrap_or_else(|| "wc_sessionPing".into());
    let params: Value = match parse_flag(args, "--params") {
        Some(raw) => serde_json::from_str(&raw).map_err(|e| format!("--params: {e}"))?,
        None => Value::Object(Default::default()),
    };

    let relayer = connect(args, config).await?;
    let request = ClientRequest::new(method, params);

    match relayer
        .send_request(&topic, &request)
        .await
        .map_err(|e| e.to_string())?
    {
        Delivery::Acknowledged(ack) => {
            println!("  Request id: {}", request.id);
            println!("  Topic:      {topic}");
            println!("  Relay ack:  {}", ack.relay_id);
        }
        Delivery::Skipped => println!("  Request {} already published", request.id),
    }
    Ok(())
}

async fn cmd_subscribe(args: &[String], config: &CliConfig) -> Result<(), String> {
    let topic = Topic::new(parse_flag(args, "--topic").ok_or("--topic is required")?);
    let relayer = connect(args, config).await?;
    let mut incoming = Box::pin(relayer.incoming());

    let id = relayer
        .subscribe(&topic)
        .await
        .ok_or_else(|| format!("subscribe to {topic} failed"))?;
    println!("Subscribed to {topic} ({id}), Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            item = incoming.next() => match item {
                Some(Inbound::Request(req)) => {
                    println!("← request  {} {} {}", req.id, req.method, req.params);
                }
                Some(Inbound::Response { entry, response }) => {
                    println!("← response {} to {} ok={}", entry.request_id, entry.method, response.is_ok());
                }
                None => break,
            },
        }
    }

    relayer.unsubscribe(&topic, &id).await;
    Ok(())
}

async fn cmd_watch(args: &[String], config: &CliConfig) -> Result<(), String> {
    let relayer = connect(args, config).await?;
    let mut states = Box::pin(relayer.connection_health().stream());
    let mut errors = relayer.initialization_errors();
    println!("Watching connection, Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            state = states.next() => match state {
                Some(open) => println!("  connected: {open}"),
                None => break,
            },
            failure = errors.recv() => match failure {
                Some(f) => println!("  {f}"),
                None => break,
            },
        }
    }
    Ok(())
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}
