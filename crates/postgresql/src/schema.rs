//! Schema bootstrap for the workload tables.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_postgres::Client;
use tracing::{info, warn};

use crate::StoreError;

/// Create the `members` and `member_feed` tables if they do not exist.
///
/// `member_feed` keeps one row per member: the latest merged change record,
/// not an append log. `last_txid` is stored as `BIGINT` (cast from
/// `pg_current_xact_id()`) so `GREATEST` merging stays a plain integer
/// comparison; `last_lsn` uses the native `PG_LSN` type, which `GREATEST`
/// compares numerically.
///
/// Also checks `track_commit_timestamp`, which the change feed's ordering
/// key requires, and warns when it is off — the tables still work, but
/// every feed row stays ineligible because its commit timestamp never
/// becomes visible.
pub async fn ensure_schema(client: &Arc<Mutex<Client>>) -> Result<(), StoreError> {
    let client = client.lock().await;

    client
        .batch_execute(
            r#"
CREATE TABLE IF NOT EXISTS members (
    id         BIGSERIAL PRIMARY KEY,
    name       TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS member_feed (
    member_id  BIGINT PRIMARY KEY REFERENCES members (id),
    last_txid  BIGINT NOT NULL,
    last_lsn   PG_LSN NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);
"#,
        )
        .await
        .map_err(StoreError::from_query)?;

    let row = client
        .query_one("SELECT current_setting('track_commit_timestamp')", &[])
        .await?;
    let setting: &str = row.get(0);
    if setting != "on" {
        warn!(
            "track_commit_timestamp is '{setting}'; feed records will never become \
             eligible for relay until it is enabled"
        );
    }

    info!("schema ready");
    Ok(())
}
