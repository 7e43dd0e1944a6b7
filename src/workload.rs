//! The synthetic workload loop.
//!
//! Each tick draws a uniform fraction: below the configured add ratio it
//! creates a new member and registers it in the corpus; otherwise it samples
//! an existing member under that member's exclusive lock, renames it, and
//! writes the update back. Every store mutation also upserts the member's
//! feed record inside the same transaction, which is what the relay later
//! picks up.

use std::sync::Arc;
use std::time::Duration;

use corpus::{Corpus, CorpusError};
use feed_relay_postgresql::{create_member, list_changes_since, update_member, StoreError};
use rand::Rng;
use tokio::sync::{broadcast, Mutex};
use tokio_postgres::Client;
use tracing::{debug, info};
use watermark::Watermark;

const NAME_LEN: usize = 10;

/// Workload loop configuration, passed in as plain values by the CLI layer.
#[derive(Clone, Debug)]
pub struct WorkloadOpts {
    /// Delay between ticks.
    pub interval: Duration,
    /// Snapshot size used to seed the corpus at start.
    pub seed_limit: i64,
}

/// Driver for the workload loop: a store client plus the sampling corpus.
pub struct WorkloadRunner {
    client: Arc<Mutex<Client>>,
    corpus: Corpus,
    add_ratio: f64,
}

impl WorkloadRunner {
    /// Create a runner with an empty corpus.
    pub fn new(client: Arc<Mutex<Client>>, add_ratio: f64) -> Self {
        Self {
            client,
            corpus: Corpus::new(),
            add_ratio,
        }
    }

    /// Seed the corpus from the store's current snapshot.
    ///
    /// The corpus is never persisted; it is rebuilt each run by listing the
    /// feed from the origin watermark.
    pub async fn seed(&self, limit: i64) -> Result<usize, StoreError> {
        let entries = list_changes_since(&self.client, &Watermark::origin(), limit).await?;
        let count = entries.len();
        self.corpus
            .add(entries.into_iter().map(|entry| entry.member))
            .await;
        Ok(count)
    }

    /// Run one tick: create or mutate, per the add ratio.
    pub async fn tick(&self) -> Result<(), StoreError> {
        let ratio = rand::rng().random::<f64>();
        debug!(ratio, "tick");
        if ratio < self.add_ratio {
            self.add(ratio).await
        } else {
            self.update(ratio).await
        }
    }

    async fn add(&self, ratio: f64) -> Result<(), StoreError> {
        let name = random_name(NAME_LEN);
        let created = create_member(&self.client, &name, commit_delay(ratio)).await?;
        info!(member = %created, "added");
        self.corpus.add([created.member]).await;
        Ok(())
    }

    async fn update(&self, ratio: f64) -> Result<(), StoreError> {
        let mut sampled = match self.corpus.sample().await {
            Ok(sampled) => sampled,
            // Nothing to mutate yet, or everything is locked; either way
            // this tick is a no-op.
            Err(e @ (CorpusError::Empty | CorpusError::Busy(_))) => {
                debug!(error = %e, "sampling skipped");
                return Ok(());
            }
        };

        sampled.name = random_name(NAME_LEN);
        let feed = update_member(&self.client, &sampled, commit_delay(ratio)).await?;
        info!(member = %*sampled, feed = %feed, "updated");
        Ok(())
    }
}

/// Run the workload loop until a store error or the shutdown signal.
///
/// Store errors are fatal to the run; `Empty`/`Busy` ticks are no-ops.
pub async fn run_workload(
    runner: &WorkloadRunner,
    opts: &WorkloadOpts,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let seeded = runner.seed(opts.seed_limit).await?;
    info!(seeded, "corpus seeded from snapshot");

    let mut ticker = tokio::time::interval(opts.interval);
    loop {
        runner.tick().await?;

        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.recv() => {
                info!("shutting down workload");
                return Ok(());
            }
        }
    }
}

/// Transaction-duration delay as a bell curve over the sampled fraction.
///
/// Gaussian density centered at 1.0 with sigma 0.1, scaled and floored at
/// 10 ms, so most ticks commit quickly while ticks whose fraction lands
/// near the peak hold their transaction open for a few hundred
/// milliseconds. Varying the hold time this way produces realistic
/// commit-order/visibility races for the relay to chew on.
pub fn commit_delay(ratio: f64) -> Duration {
    const BASE_MS: f64 = 10.0;
    const MU: f64 = 1.0;
    const SIGMA: f64 = 0.1;
    const SCALE: f64 = 0.8;

    let density = (-((ratio - MU).powi(2)) / (2.0 * SIGMA * SIGMA)).exp()
        / (std::f64::consts::TAU * SIGMA * SIGMA).sqrt();
    Duration::from_millis((SCALE * density * 100.0 + BASE_MS) as u64)
}

fn random_name(len: usize) -> String {
    const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::rng();
    (0..len)
        .map(|_| LETTERS[rng.random_range(0..LETTERS.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_delay_peaks_at_one() {
        let peak = commit_delay(1.0);
        assert!(peak > commit_delay(0.5));
        assert!(peak > commit_delay(0.9));
        // k * pdf(1.0) * 100 + base = 0.8 * 3.989 * 100 + 10
        assert!(peak >= Duration::from_millis(300));
        assert!(peak <= Duration::from_millis(350));
    }

    #[test]
    fn commit_delay_floors_at_base() {
        let floor = commit_delay(0.0);
        assert_eq!(floor, Duration::from_millis(10));
    }

    #[test]
    fn random_names_have_requested_length() {
        for len in [1, 10, 32] {
            let name = random_name(len);
            assert_eq!(name.len(), len);
            assert!(name.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn random_names_differ() {
        assert_ne!(random_name(16), random_name(16));
    }
}
