//! Member and feed record types.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::compare_lsn;

/// A record in the `members` table.
///
/// `id` and `created_at` are assigned by the store on insert and are
/// immutable thereafter from the caller's view; only `name` is mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:05}~{:?} ({})",
            self.id,
            self.name,
            self.created_at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
        )
    }
}

/// The latest merged change record for a member.
///
/// One logical record per member, continuously upserted by the store; this
/// is not an append log of every mutation but the component-wise maximum of
/// `last_txid`, `last_lsn`, and `updated_at` over all mutations so far.
///
/// `committed` is the server-assigned commit timestamp of the transaction
/// identified by `last_txid`. It is `None` until that transaction is durably
/// visible, which is what makes a feed record eligible for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberFeed {
    pub member_id: i64,
    /// Commit-order token (`pg_current_xact_id()` at upsert time).
    pub last_txid: i64,
    /// Commit timestamp, present only once the owning transaction is visible.
    pub committed: Option<DateTime<Utc>>,
    /// Opaque monotonic log position (`pg_current_wal_lsn()` at upsert time).
    pub last_lsn: String,
    pub updated_at: DateTime<Utc>,
}

impl MemberFeed {
    /// Merge two feed records for the same member, keeping the maximum of
    /// each component independently.
    ///
    /// This mirrors the store's `ON CONFLICT ... GREATEST(...)` upsert and is
    /// commutative and idempotent, so concurrent upserts converge regardless
    /// of arrival order.
    pub fn merged(&self, other: &MemberFeed) -> MemberFeed {
        let last_lsn = match compare_lsn(&self.last_lsn, &other.last_lsn) {
            Ordering::Less => other.last_lsn.clone(),
            _ => self.last_lsn.clone(),
        };
        MemberFeed {
            member_id: self.member_id,
            last_txid: self.last_txid.max(other.last_txid),
            committed: self.committed.max(other.committed),
            last_lsn,
            updated_at: self.updated_at.max(other.updated_at),
        }
    }
}

impl fmt::Display for MemberFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.committed {
            Some(committed) => write!(
                f,
                "{:05} @ [{}, {}, {}] ({})",
                self.member_id,
                self.last_txid,
                committed.to_rfc3339_opts(SecondsFormat::AutoSi, true),
                self.last_lsn,
                self.updated_at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
            ),
            None => write!(
                f,
                "{:05} @ [{}, {}] ({})",
                self.member_id,
                self.last_txid,
                self.last_lsn,
                self.updated_at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
            ),
        }
    }
}

/// A member joined with its feed record, as delivered by the change feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberWithFeed {
    pub member: Member,
    pub feed: MemberFeed,
}

impl fmt::Display for MemberWithFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ^ {}", self.member, self.feed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn feed(txid: i64, lsn: &str, updated_secs: i64) -> MemberFeed {
        MemberFeed {
            member_id: 1,
            last_txid: txid,
            committed: None,
            last_lsn: lsn.to_string(),
            updated_at: Utc.timestamp_opt(updated_secs, 0).unwrap(),
        }
    }

    #[test]
    fn merge_keeps_componentwise_maximum() {
        let a = feed(10, "0/10", 100);
        let b = feed(12, "0/9", 50);

        let merged = a.merged(&b);
        assert_eq!(merged.last_txid, 12);
        // "0/10" > "0/9" numerically even though it sorts lower as a string.
        assert_eq!(merged.last_lsn, "0/10");
        assert_eq!(merged.updated_at, a.updated_at);
    }

    #[test]
    fn merge_is_commutative() {
        let a = feed(10, "0/100", 100);
        let b = feed(12, "0/200", 50);

        assert_eq!(a.merged(&b), b.merged(&a));
        assert_eq!(a.merged(&b).last_txid, 12);
    }

    #[test]
    fn merge_is_idempotent() {
        let a = feed(12, "0/200", 100);
        assert_eq!(a.merged(&a), a);
        let b = feed(10, "0/100", 50);
        assert_eq!(a.merged(&b).merged(&b), a.merged(&b));
    }

    #[test]
    fn merge_prefers_present_commit_timestamp() {
        let mut a = feed(10, "0/100", 100);
        let b = feed(12, "0/200", 50);
        a.committed = Some(Utc.timestamp_opt(99, 0).unwrap());

        assert_eq!(a.merged(&b).committed, a.committed);
        assert_eq!(b.merged(&a).committed, a.committed);
    }
}
