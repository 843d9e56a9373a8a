use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio_util::sync::CancellationToken;

/// Cancel the returned token on the first SIGINT or SIGTERM.
///
/// Cancellation stops the HTTP listener from taking new connections and lets
/// open requests drain. Pending `/api/wait` calls answer 503 with outcome
/// `cancelled`. Jobs still in flight are not waited for: their tasks are
/// dropped with the runtime, which kills the child process and removes the
/// working directory.
pub fn install_shutdown_handler() -> std::io::Result<CancellationToken> {
    let token = CancellationToken::new();
    let sigterm = signal(SignalKind::terminate())?;
    let sigint = signal(SignalKind::interrupt())?;

    let trigger = token.clone();
    tokio::spawn(async move {
        let name = first_signal(sigterm, sigint).await;
        tracing::info!(signal = name, "Shutting down ci-lite server");
        trigger.cancel();
    });

    Ok(token)
}

async fn first_signal(mut sigterm: Signal, mut sigint: Signal) -> &'static str {
    tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    }
}
