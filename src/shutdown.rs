//! Interrupt handling shared by both run loops.

use tokio::sync::broadcast;
use tracing::{error, info};

/// Install a ctrl-c handler and return a receiver that fires once.
///
/// Loops poll the receiver only between cycles, so an in-flight store call
/// always completes before the loop observes the signal.
pub fn setup_shutdown_handler() -> broadcast::Receiver<()> {
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install interrupt handler: {e}");
            return;
        }
        info!("received interrupt signal");
        let _ = shutdown_tx.send(());
    });

    shutdown_rx
}
