//! Workload mutations and the commit-ordered change listing.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use feed_core::{Member, MemberFeed, MemberWithFeed};
use tokio::sync::Mutex;
use tokio_postgres::{Client, Row, Transaction};
use watermark::Watermark;

use crate::StoreError;

/// Upsert the feed record for `member_id` inside the caller's transaction.
///
/// The merge keeps the maximum of each component independently, so the
/// upsert is idempotent and commutative across concurrent transactions.
/// `pg_current_xact_id()` supplies the commit-order token and
/// `pg_current_wal_lsn()` the log position; both are bridged through text
/// casts because the driver has no native `xid8`/`pg_lsn` mappings.
async fn upsert_feed(tx: &Transaction<'_>, member_id: i64) -> Result<MemberFeed, StoreError> {
    let row = tx
        .query_one(
            r#"
INSERT INTO member_feed (member_id, last_txid, last_lsn, updated_at)
VALUES ($1, pg_current_xact_id()::text::bigint, pg_current_wal_lsn(), now())
ON CONFLICT (member_id) DO UPDATE
SET last_txid  = GREATEST(member_feed.last_txid, EXCLUDED.last_txid),
    last_lsn   = GREATEST(member_feed.last_lsn, EXCLUDED.last_lsn),
    updated_at = GREATEST(member_feed.updated_at, EXCLUDED.updated_at)
RETURNING member_id, last_txid, last_lsn::text, updated_at
"#,
            &[&member_id],
        )
        .await
        .map_err(StoreError::from_query)?;

    Ok(MemberFeed {
        member_id: row.get(0),
        last_txid: row.get(1),
        // Our own transaction has not committed yet, so its commit timestamp
        // cannot be visible here.
        committed: None,
        last_lsn: row.get(2),
        updated_at: row.get(3),
    })
}

/// Insert a new member and its feed record in one transaction.
///
/// `commit_delay` is slept inside the transaction, before commit, to
/// emulate transaction duration and vary contention across ticks.
pub async fn create_member(
    client: &Arc<Mutex<Client>>,
    name: &str,
    commit_delay: Duration,
) -> Result<MemberWithFeed, StoreError> {
    let mut client = client.lock().await;
    let tx = client
        .transaction()
        .await
        .map_err(StoreError::from_query)?;

    let row = tx
        .query_one(
            "INSERT INTO members (name, created_at) VALUES ($1, now()) RETURNING id, created_at",
            &[&name],
        )
        .await
        .map_err(StoreError::from_query)?;
    let member = Member {
        id: row.get(0),
        name: name.to_string(),
        created_at: row.get(1),
    };

    let feed = upsert_feed(&tx, member.id).await?;

    tokio::time::sleep(commit_delay).await;
    tx.commit().await.map_err(StoreError::from_query)?;

    Ok(MemberWithFeed { member, feed })
}

/// Write a member's current name and upsert its feed record in one
/// transaction.
pub async fn update_member(
    client: &Arc<Mutex<Client>>,
    member: &Member,
    commit_delay: Duration,
) -> Result<MemberFeed, StoreError> {
    let mut client = client.lock().await;
    let tx = client
        .transaction()
        .await
        .map_err(StoreError::from_query)?;

    tx.execute(
        "UPDATE members SET name = $1 WHERE id = $2",
        &[&member.name, &member.id],
    )
    .await
    .map_err(StoreError::from_query)?;

    let feed = upsert_feed(&tx, member.id).await?;

    tokio::time::sleep(commit_delay).await;
    tx.commit().await.map_err(StoreError::from_query)?;

    Ok(feed)
}

/// List feed records strictly after `from`, in `(committed, member_id)`
/// order, truncated to `limit`.
///
/// Eligibility requires a non-null `pg_xact_commit_timestamp`, i.e. a
/// durably visible commit. Ordering by `updated_at` instead would let the
/// poller skip a transaction that commits visibly after a later-timestamped
/// one under concurrent-commit races.
pub async fn list_changes_since(
    client: &Arc<Mutex<Client>>,
    from: &Watermark,
    limit: i64,
) -> Result<Vec<MemberWithFeed>, StoreError> {
    let client = client.lock().await;

    let rows = client
        .query(
            r#"
WITH feeds AS (
    SELECT member_id,
           last_txid,
           pg_xact_commit_timestamp(last_txid::text::xid) AS committed,
           last_lsn,
           updated_at
    FROM member_feed
)
SELECT members.id, members.name, members.created_at,
       feeds.member_id, feeds.last_txid, feeds.committed,
       feeds.last_lsn::text, feeds.updated_at
FROM feeds
INNER JOIN members ON feeds.member_id = members.id
WHERE feeds.committed IS NOT NULL
  AND (feeds.committed > $1 OR (feeds.committed = $1 AND members.id > $2))
ORDER BY feeds.committed, members.id
LIMIT $3
"#,
            &[&from.committed, &from.member_id, &limit],
        )
        .await
        .map_err(StoreError::from_query)?;

    Ok(rows.iter().map(row_to_member_with_feed).collect())
}

fn row_to_member_with_feed(row: &Row) -> MemberWithFeed {
    let committed: Option<DateTime<Utc>> = row.get(5);
    MemberWithFeed {
        member: Member {
            id: row.get(0),
            name: row.get(1),
            created_at: row.get(2),
        },
        feed: MemberFeed {
            member_id: row.get(3),
            last_txid: row.get(4),
            committed,
            last_lsn: row.get(6),
            updated_at: row.get(7),
        },
    }
}
