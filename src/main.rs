//! `biocalm` - guided biofeedback session orchestrator

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use clap::Parser;
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio_util::sync::CancellationToken;

use biocalm::cli::args::{Cli, OutputFormat};
use biocalm::cli::commands;
use biocalm::error::ExitCode;
use biocalm::observability::{LogFormat, init_logging};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if !cli.quiet {
        let format = match cli.log_format {
            OutputFormat::Human => LogFormat::Human,
            OutputFormat::Json => LogFormat::Json,
        };
        init_logging(format, cli.verbose, cli.color);
    }

    let cancel = CancellationToken::new();
    let signalled = Arc::new(AtomicI32::new(ExitCode::SUCCESS));

    // First signal stops the session cleanly, the second exits at once.
    {
        let cancel = cancel.clone();
        let signalled = Arc::clone(&signalled);
        tokio::spawn(async move {
            let mut sigterm = signal(SignalKind::terminate()).ok();

            let code = tokio::select! {
                _ = tokio::signal::ctrl_c() => ExitCode::INTERRUPTED,
                () = recv_sigterm(&mut sigterm) => ExitCode::TERMINATED,
            };
            signalled.store(code, Ordering::SeqCst);
            eprintln!("\nShutting down gracefully... (press Ctrl+C again to force)");
            cancel.cancel();

            tokio::select! {
                _ = tokio::signal::ctrl_c() => std::process::exit(ExitCode::INTERRUPTED),
                () = recv_sigterm(&mut sigterm) => std::process::exit(ExitCode::TERMINATED),
            }
        });
    }

    match commands::dispatch(cli, cancel).await {
        Ok(()) => std::process::exit(signalled.load(Ordering::SeqCst)),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}

async fn recv_sigterm(sigterm: &mut Option<Signal>) {
    match sigterm {
        Some(sig) => {
            sig.recv().await;
        }
        None => std::future::pending().await,
    }
}
