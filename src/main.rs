//! Command-line interface for feed-relay
//!
//! # Usage Examples
//!
//! ```bash
//! # Drive the synthetic workload (creates schema on first run)
//! feed-relay workload \
//!   --connection-string "host=localhost user=postgres dbname=feed" \
//!   --interval-ms 500 --add-ratio 0.3
//!
//! # Relay committed changes for 10 poll cycles
//! feed-relay relay \
//!   --connection-string "host=localhost user=postgres dbname=feed" \
//!   --state-file data/state.json --count 10
//!
//! # Relay until interrupted
//! feed-relay relay --follow \
//!   --connection-string "host=localhost user=postgres dbname=feed"
//! ```
//!
//! The relay requires `track_commit_timestamp = on` on the PostgreSQL
//! server; without it, feed records never become eligible for delivery.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use feed_relay::shutdown::setup_shutdown_handler;
use feed_relay::{run_relay, run_workload, RelayOpts, WorkloadOpts, WorkloadRunner};
use feed_relay_postgresql::{ensure_schema, new_postgresql_client, PostgresChangeSource};

#[derive(Parser)]
#[command(name = "feed-relay")]
#[command(about = "Synthetic workload driver and commit-ordered change-feed relay for PostgreSQL")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive the synthetic member workload against the store
    Workload {
        /// PostgreSQL connection string
        #[arg(long, env = "POSTGRESQL_CONNECTION_STRING")]
        connection_string: String,

        /// Milliseconds between ticks
        #[arg(long, short = 'i', default_value_t = 500)]
        interval_ms: u64,

        /// Fraction of ticks that create a new member
        #[arg(long, default_value_t = 0.3)]
        add_ratio: f64,

        /// Snapshot size used to seed the corpus
        #[arg(long, default_value_t = 1000)]
        seed_limit: i64,
    },

    /// Relay newly committed changes in commit order
    Relay {
        /// PostgreSQL connection string
        #[arg(long, env = "POSTGRESQL_CONNECTION_STRING")]
        connection_string: String,

        /// Watermark state file
        #[arg(long, default_value = "data/state.json")]
        state_file: PathBuf,

        /// Milliseconds between poll cycles
        #[arg(long, short = 'i', default_value_t = 5000)]
        interval_ms: u64,

        /// Number of poll cycles to run
        #[arg(long, short = 'c', default_value_t = 10)]
        count: u64,

        /// Poll until interrupted instead of stopping after --count cycles
        #[arg(long, short = 'l')]
        follow: bool,

        /// Maximum records fetched per poll
        #[arg(long, default_value_t = 1000)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Workload {
            connection_string,
            interval_ms,
            add_ratio,
            seed_limit,
        } => {
            let client = new_postgresql_client(&connection_string).await?;
            ensure_schema(&client).await?;

            let runner = WorkloadRunner::new(client, add_ratio);
            let opts = WorkloadOpts {
                interval: Duration::from_millis(interval_ms),
                seed_limit,
            };
            run_workload(&runner, &opts, setup_shutdown_handler()).await?;
        }

        Commands::Relay {
            connection_string,
            state_file,
            interval_ms,
            count,
            follow,
            limit,
        } => {
            let client = new_postgresql_client(&connection_string).await?;
            let source = PostgresChangeSource::new(client);

            let opts = RelayOpts {
                state_file,
                interval: Duration::from_millis(interval_ms),
                count,
                follow,
                limit,
            };
            run_relay(&source, &opts, setup_shutdown_handler()).await?;
        }
    }

    Ok(())
}
