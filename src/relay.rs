//! The change-feed relay loop.
//!
//! Polls a [`ChangeSource`] from the persisted watermark, applies each
//! record in `(committed, member_id)` order, advances the watermark, and
//! persists it after every non-empty batch and finally on shutdown.
//!
//! A query failure is fatal to the run. The last successfully persisted
//! watermark is retained, so a restart resumes from that point and may
//! redeliver records applied after the last persist — at-least-once, never
//! a skip.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{error, info};
use watermark::{ChangeSource, Watermark};

/// Relay loop configuration, passed in as plain values by the CLI layer.
#[derive(Clone, Debug)]
pub struct RelayOpts {
    /// Watermark state file.
    pub state_file: PathBuf,
    /// Delay between poll cycles.
    pub interval: Duration,
    /// Number of poll cycles to run when not following.
    pub count: u64,
    /// Poll until interrupted instead of stopping after `count` cycles.
    pub follow: bool,
    /// Maximum records fetched per poll.
    pub limit: i64,
}

/// Run the relay loop until `count` cycles complete, the source fails, or
/// the shutdown signal fires.
///
/// Cancellation is observed only between cycles: an in-flight
/// poll/apply/advance/persist cycle always finishes first, and the final
/// watermark is persisted on every exit path.
pub async fn run_relay<S: ChangeSource>(
    source: &S,
    opts: &RelayOpts,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let mut watermark = watermark::load_or_origin(&opts.state_file);
    info!(state = %watermark, "initial watermark");

    let mut ticker = tokio::time::interval(opts.interval);
    let mut remaining = opts.count;

    let result = loop {
        if !opts.follow {
            if remaining == 0 {
                break Ok(());
            }
            remaining -= 1;
        }

        match poll_once(source, opts, &mut watermark).await {
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, "relay cycle failed");
                break Err(e);
            }
        }

        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.recv() => {
                info!("shutting down relay");
                break Ok(());
            }
        }
    };

    // Always persist on the way out, even after a failed cycle; the file
    // then reflects the last fully applied batch.
    if let Err(e) = watermark::save(&opts.state_file, &watermark) {
        error!(error = %e, "failed to persist final watermark");
    } else {
        info!(state = %watermark, "final watermark persisted");
    }

    result
}

/// One poll/apply/advance/persist cycle.
async fn poll_once<S: ChangeSource>(
    source: &S,
    opts: &RelayOpts,
    watermark: &mut Watermark,
) -> anyhow::Result<()> {
    let entries = source.changes_since(watermark, opts.limit).await?;
    if entries.is_empty() {
        return Ok(());
    }

    // Delivery: each record is handed to the consumer in commit order.
    // Here the consumer is the structured log; anything downstream of it
    // must tolerate redelivery of records above the persisted watermark.
    for entry in &entries {
        info!(member = %entry, "member");
    }

    *watermark = watermark.advanced(&entries);
    watermark::save(&opts.state_file, watermark)?;
    info!(state = %watermark, applied = entries.len(), "updated watermark");
    Ok(())
}
