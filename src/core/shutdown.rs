use tokio::signal;

/// Resolves on Ctrl+C or SIGTERM. Used to leave an exam session without submitting.
pub async fn leave_signal() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    result = signal::ctrl_c() => {
                        if let Err(err) = result {
                            tracing::error!(error = %err, "Failed to listen for Ctrl+C");
                            std::future::pending::<()>().await;
                        }
                    }
                    _ = terminate.recv() => {}
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                if signal::ctrl_c().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        }
    }

    #[cfg(not(unix))]
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }

    tracing::info!("leave signal received");
}
