//! Watermark cursor for commit-ordered change feeds.
//!
//! A [`Watermark`] marks how far a consumer has progressed through the
//! change feed. It defines a strict total order over feed records keyed by
//! `(committed, member_id)` and is the only ordered state in the system:
//! the relay loads it at start, advances it after every applied batch, and
//! persists it so a restart resumes without skipping records.
//!
//! The [`ChangeSource`] trait models the store boundary as a generic
//! `since(cursor) -> page` capability, so a push-based subscription could
//! replace the polling source without changing the ordering or tie-break
//! algorithm.

pub mod file;
mod source;

pub use file::{load, load_or_origin, save, StateError};
pub use source::ChangeSource;

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use feed_core::MemberWithFeed;
use serde::{Deserialize, Serialize};

/// The ordering key marking how far a consumer has progressed.
///
/// Total order: primary key `committed`, tie-broken by `member_id`
/// ascending. `lsn` is carried along for diagnostics and resumption against
/// log-positioned stores but does not participate in the order.
///
/// A watermark returned by [`Watermark::advanced`] is always `>=` every
/// previously returned watermark under this order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    pub member_id: i64,
    pub committed: DateTime<Utc>,
    pub lsn: String,
}

impl Watermark {
    /// The origin watermark: epoch timestamp, member 0, empty log position.
    ///
    /// Every feed record with a visible commit sorts after this, so a
    /// consumer starting here sees the full history.
    pub fn origin() -> Self {
        Watermark {
            member_id: 0,
            committed: DateTime::UNIX_EPOCH,
            lsn: "0/0".to_string(),
        }
    }

    /// The `(committed, member_id)` ordering key.
    pub fn key(&self) -> (DateTime<Utc>, i64) {
        (self.committed, self.member_id)
    }

    /// Advance over a batch of applied feed records.
    ///
    /// Returns the watermark positioned at the last record of the batch, or
    /// an unchanged clone when the batch is empty. Records are expected in
    /// `(committed, member_id)` order, as returned by
    /// [`ChangeSource::changes_since`]; a record whose commit timestamp is
    /// somehow absent keeps the previous `committed` rather than rewinding.
    pub fn advanced(&self, entries: &[MemberWithFeed]) -> Watermark {
        let mut next = self.clone();
        for entry in entries {
            if let Some(committed) = entry.feed.committed {
                next.committed = committed;
            }
            next.lsn = entry.feed.last_lsn.clone();
            next.member_id = entry.feed.member_id;
        }
        next
    }
}

impl PartialOrd for Watermark {
    /// Orders by [`Watermark::key`] alone. Watermarks sharing a key but
    /// differing in `lsn` are incomparable rather than equal, keeping the
    /// ordering consistent with `PartialEq`.
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match self.key().cmp(&other.key()) {
            std::cmp::Ordering::Equal if self == other => Some(std::cmp::Ordering::Equal),
            std::cmp::Ordering::Equal => None,
            ord => Some(ord),
        }
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ [{}, {}]",
            self.member_id,
            self.committed.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            self.lsn
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use feed_core::{Member, MemberFeed};

    fn entry(member_id: i64, committed_secs: i64, lsn: &str) -> MemberWithFeed {
        let committed = Utc.timestamp_opt(committed_secs, 0).unwrap();
        MemberWithFeed {
            member: Member {
                id: member_id,
                name: format!("member-{member_id}"),
                created_at: committed,
            },
            feed: MemberFeed {
                member_id,
                last_txid: committed_secs,
                committed: Some(committed),
                last_lsn: lsn.to_string(),
                updated_at: committed,
            },
        }
    }

    #[test]
    fn origin_sorts_before_everything() {
        let origin = Watermark::origin();
        let advanced = origin.advanced(&[entry(1, 1, "0/10")]);
        assert!(origin < advanced);
        assert_eq!(origin.lsn, "0/0");
        assert_eq!(origin.member_id, 0);
    }

    #[test]
    fn advanced_takes_key_of_last_record() {
        let t0 = 1_700_000_000;
        let w = Watermark {
            member_id: 0,
            committed: Utc.timestamp_opt(t0, 0).unwrap(),
            lsn: "0/0".to_string(),
        };

        let batch = [
            entry(5, t0, "0/100"),
            entry(7, t0, "0/200"),
            entry(2, t0 + 1, "0/300"),
        ];
        let next = w.advanced(&batch);

        assert_eq!(next.member_id, 2);
        assert_eq!(next.committed, Utc.timestamp_opt(t0 + 1, 0).unwrap());
        assert_eq!(next.lsn, "0/300");
        assert!(w < next);
    }

    #[test]
    fn advanced_over_empty_batch_is_unchanged() {
        let w = Watermark::origin();
        assert_eq!(w.advanced(&[]), w);
    }

    #[test]
    fn tie_break_orders_by_member_id() {
        let t = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let a = Watermark {
            member_id: 5,
            committed: t,
            lsn: "0/100".to_string(),
        };
        let b = Watermark {
            member_id: 7,
            committed: t,
            lsn: "0/90".to_string(),
        };
        assert!(a < b);
    }

    #[test]
    fn missing_commit_timestamp_keeps_previous() {
        let w = Watermark::origin().advanced(&[entry(3, 100, "0/10")]);

        let mut pending = entry(4, 0, "0/20");
        pending.feed.committed = None;
        let next = w.advanced(&[pending]);

        assert_eq!(next.committed, w.committed);
        assert_eq!(next.member_id, 4);
        assert_eq!(next.lsn, "0/20");
    }
}
