use clap::{Arg, Command};
use hub_core::{Hub, IdPoolKind};
use std::sync::Arc;
use tracing::info;

fn validate_port_value(value: &str) -> Result<u16, String> {
    value.parse::<u16>().map_err(|_| "Invalid port number".to_owned())
}

fn validate_bool_value(value: &str) -> Result<bool, String> {
    value.parse::<bool>().map_err(|_| "Expected true or false".to_owned())
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let matches = Command::new("Message Hub Server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("A TCP message relay hub")
        .arg(
            Arg::new("port")
                .help("Port to listen on")
                .long("port")
                .value_parser(validate_port_value)
                .default_value("9999"),
        )
        .arg(
            Arg::new("stat")
                .help("Display cumulative counters on termination")
                .long("stat")
                .value_parser(validate_bool_value)
                .default_value("true"),
        )
        .get_matches();

    let port = *matches.get_one::<u16>("port").expect("port has a default");
    let show_stats = *matches.get_one::<bool>("stat").expect("stat has a default");

    let hub = match Hub::bind(port, IdPoolKind::Reusable).await {
        Ok(hub) => Arc::new(hub),
        Err(e) => {
            tracing::error!(error = %e, "failed to bind hub");
            return std::process::ExitCode::from(1);
        }
    };

    info!(port, "hub listening");

    let run_hub = hub.clone();
    let accept_loop = tokio::spawn(async move { run_hub.run().await });

    let interrupted = tokio::select! {
        _ = accept_loop => false,
        _ = wait_for_interrupt() => true,
    };

    hub.stop().await;
    if show_stats {
        println!("\n\n*** Execution statistics ***");
        println!("{}", hub.stats().snapshot());
    }

    if interrupted {
        info!("server stopped on interrupt");
        std::process::ExitCode::from(2)
    } else {
        info!("server stopped");
        std::process::ExitCode::SUCCESS
    }
}

async fn wait_for_interrupt() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl+C, shutting down"); },
        _ = terminate => { info!("received SIGTERM, shutting down"); },
    }
}
