//! A load generator that connects many clients to a running hub, has them
//! exchange peer lists, then hammers each other with Relay traffic for a
//! fixed number of messages per client.

use clap::{Arg, Command};
use hub_client::Client;
use hub_core::{Stats, MAX_BODY, MAX_RECIPIENTS};
use rand::RngCore;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

struct SimConfig {
    addr: String,
    port: u16,
    payload_size: usize,
    num_clients: usize,
    num_messages: usize,
    interval: Duration,
    show_stats: bool,
}

fn validate_port_value(value: &str) -> Result<usize, String> {
    value
        .parse::<u16>()
        .map(|p| p as usize)
        .map_err(|_| "Invalid port number".to_owned())
}

fn validate_size_value(value: &str) -> Result<usize, String> {
    let parsed: usize = value.parse().map_err(|_| "not a number".to_owned())?;
    if parsed > MAX_BODY {
        return Err(format!("must be between 0-{MAX_BODY}"));
    }
    Ok(parsed)
}

fn validate_ncli_value(value: &str) -> Result<usize, String> {
    let parsed: usize = value.parse().map_err(|_| "not a number".to_owned())?;
    if parsed > MAX_RECIPIENTS {
        return Err(format!("must be between 0-{MAX_RECIPIENTS}"));
    }
    Ok(parsed)
}

fn validate_count_value(value: &str) -> Result<usize, String> {
    value.parse().map_err(|_| "not a number".to_owned())
}

fn gen_payload(size: usize) -> Vec<u8> {
    let mut out = vec![0u8; size];
    rand::thread_rng().fill_bytes(&mut out);
    out
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let matches = Command::new("Message Hub Load Simulator")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Connects many clients to a hub and relays traffic between them")
        .arg(Arg::new("addr").long("addr").default_value("localhost"))
        .arg(
            Arg::new("port")
                .long("port")
                .value_parser(validate_port_value)
                .default_value("9999"),
        )
        .arg(
            Arg::new("size")
                .long("size")
                .value_parser(validate_size_value)
                .default_value("10240"),
        )
        .arg(
            Arg::new("ncli")
                .long("ncli")
                .value_parser(validate_ncli_value)
                .default_value("100"),
        )
        .arg(
            Arg::new("nmex")
                .long("nmex")
                .value_parser(validate_count_value)
                .default_value("100"),
        )
        .arg(
            Arg::new("i")
                .long("i")
                .value_parser(validate_count_value)
                .default_value("1"),
        )
        .arg(
            Arg::new("stat")
                .long("stat")
                .value_parser(clap::value_parser!(bool))
                .default_value("true"),
        )
        .get_matches();

    let config = SimConfig {
        addr: matches.get_one::<String>("addr").unwrap().clone(),
        port: *matches.get_one::<usize>("port").unwrap() as u16,
        payload_size: *matches.get_one::<usize>("size").unwrap(),
        num_clients: *matches.get_one::<usize>("ncli").unwrap(),
        num_messages: *matches.get_one::<usize>("nmex").unwrap(),
        interval: Duration::from_millis(*matches.get_one::<usize>("i").unwrap() as u64),
        show_stats: *matches.get_one::<bool>("stat").unwrap(),
    };

    let stats = Arc::new(Stats::new());

    info!(clients = config.num_clients, "connecting clients");
    let mut clients = connect_clients(&config, &stats).await;

    info!("clients fetching peer list");
    fetch_lists(&mut clients).await;

    info!("simulation starting");
    simulate(config.num_messages, config.interval, config.payload_size, clients, &stats).await;

    if config.show_stats {
        println!("\n\n*** Execution statistics ***\n");
        println!("{}", stats.snapshot());
    }
}

async fn connect_clients(config: &SimConfig, stats: &Arc<Stats>) -> Vec<Client> {
    let mut tasks = Vec::with_capacity(config.num_clients);
    for _ in 0..config.num_clients {
        let addr = config.addr.clone();
        let port = config.port;
        tasks.push(tokio::spawn(async move { Client::connect(&addr, port).await }));
    }

    let mut clients = Vec::with_capacity(config.num_clients);
    for task in tasks {
        match task.await.expect("connect task panicked") {
            Ok(client) => {
                stats.record_connect();
                clients.push(client);
            }
            Err(e) => tracing::warn!(error = %e, "client failed to connect"),
        }
    }
    clients
}

async fn fetch_lists(clients: &mut [Client]) {
    let mut handles = Vec::new();
    for client in clients.iter_mut() {
        handles.push(client.refresh_list());
    }
    for result in futures_join_all(handles).await {
        if let Err(e) = result {
            tracing::warn!(error = %e, "client failed to fetch peer list");
        }
    }
}

/// Minimal stand-in for `futures::future::join_all` to avoid pulling in
/// the `futures` crate for a single call site.
async fn futures_join_all<F: std::future::Future>(futures: Vec<F>) -> Vec<F::Output> {
    let mut out = Vec::with_capacity(futures.len());
    for fut in futures {
        out.push(fut.await);
    }
    out
}

async fn simulate(
    num_messages: usize,
    interval: Duration,
    payload_size: usize,
    clients: Vec<Client>,
    stats: &Arc<Stats>,
) {
    let payload = Arc::new(gen_payload(payload_size));
    let num_clients = clients.len();
    let mut handles = Vec::with_capacity(num_clients * 2);

    for mut client in clients {
        let stats = stats.clone();
        let payload = payload.clone();
        let expected_incoming = num_messages * (num_clients.saturating_sub(1));

        handles.push(tokio::spawn(async move {
            let list = client.list().await;
            let recipients: Vec<u64> = list.into_iter().take(MAX_RECIPIENTS).collect();
            let send_payload = (*payload).clone();

            let write_stats = stats.clone();
            let writer = tokio::spawn({
                let recipients = recipients.clone();
                async move {
                    for _ in 0..num_messages {
                        if client.relay(recipients.clone(), send_payload.clone()).await.is_err() {
                            break;
                        }
                        write_stats.record_outgoing();
                        tokio::time::sleep(interval).await;
                    }
                    client
                }
            });

            let mut client = writer.await.expect("writer task panicked");

            for _ in 0..expected_incoming {
                if client.incoming_relay().await.is_none() {
                    break;
                }
                stats.record_incoming();
            }
            client.disconnect();
            stats.record_disconnect();
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }
}
