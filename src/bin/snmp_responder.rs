//! snmp-responder: serve recorded SNMP device snapshots.

use std::process::ExitCode;

use clap::Parser;
use snmp_responder::Responder;
use snmp_responder::cli::args::Args;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    args.init_tracing();

    let config = match args.config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let responder = match Responder::from_config(&config) {
        Ok(responder) => responder,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    for addr in responder.local_addrs() {
        eprintln!("Listening on udp://{}", addr);
    }
    for key in responder.registry().keys() {
        tracing::info!(target: "snmp_responder::registry", { snmp.context = %String::from_utf8_lossy(key) }, "serving context");
    }

    let cancel = responder.cancel();
    tokio::spawn(async move {
        shutdown_signal().await;
        cancel.cancel();
    });

    match responder.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(target: "snmp_responder::dispatch", { error = %e }, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(target: "snmp_responder::dispatch", { error = %e }, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
