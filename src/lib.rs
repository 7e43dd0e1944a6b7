//! feed-relay: synthetic workload driver and commit-ordered change-feed
//! relay for PostgreSQL.
//!
//! Two independent loops, coupled only through the store:
//!
//! - [`workload`] drives random member creation and mutation against the
//!   `members` table, maintaining an in-memory corpus for sampling.
//! - [`relay`] polls the `member_feed` table for newly committed changes and
//!   delivers them in commit order behind a persisted watermark cursor.
//!
//! Delivery is at-least-once: a relay restart resumes from the last
//! persisted watermark and may redeliver records applied after that point,
//! but never skips one. Consumers needing exactly-once must deduplicate on
//! `(committed, member_id)` or apply idempotently.

pub mod relay;
pub mod shutdown;
pub mod workload;

pub use relay::{run_relay, RelayOpts};
pub use workload::{run_workload, WorkloadOpts, WorkloadRunner};
