//! Core types for feed-relay.
//!
//! This crate provides the foundational types shared by the workload
//! generator, the corpus, and the change-feed relay:
//!
//! - [`Member`] - a record in the `members` table
//! - [`MemberFeed`] - the latest merged change record for a member
//! - [`MemberWithFeed`] - a member joined with its feed record, the unit
//!   delivered by the change feed
//! - [`compare_lsn`] - numeric comparison of PostgreSQL LSN strings
//!
//! # Architecture
//!
//! ```text
//! feed-core (this crate)
//!    │
//!    ├─── watermark             (cursor over (committed, member_id) keys)
//!    ├─── corpus                (in-memory member mirror for sampling)
//!    └─── feed-relay-postgresql (store collaborator)
//! ```

mod lsn;
mod member;

pub use lsn::compare_lsn;
pub use member::{Member, MemberFeed, MemberWithFeed};
