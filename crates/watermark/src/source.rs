//! The change-feed source boundary.

use async_trait::async_trait;
use feed_core::MemberWithFeed;

use crate::Watermark;

/// A paged, cursor-addressed view of a commit-ordered change feed.
///
/// Implementations must return records satisfying
///
/// ```text
/// committed > from.committed
///   OR (committed = from.committed AND member_id > from.member_id)
/// ```
///
/// ordered by `(committed, member_id)` ascending and truncated to `limit`.
/// Only records whose commit timestamp is already visible may be returned;
/// ordering by wall-clock update time instead would let a poller skip a
/// transaction that commits visibly after a later-timestamped one.
///
/// # Ordering hazard
///
/// This contract assumes the store exposes commit timestamps to readers in
/// commit order. If a store can expose a commit to one reader's snapshot
/// before it is durably visible to another concurrently polling reader, a
/// consumer could advance past an earlier-ordered but later-visible
/// transaction and silently skip it. That hazard is inherent to polling a
/// merged latest-state table and is flagged here rather than worked around.
#[async_trait]
pub trait ChangeSource {
    /// List feed records strictly after `from`, up to `limit` of them.
    async fn changes_since(
        &self,
        from: &Watermark,
        limit: i64,
    ) -> anyhow::Result<Vec<MemberWithFeed>>;
}
