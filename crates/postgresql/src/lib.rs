//! PostgreSQL store collaborator for feed-relay.
//!
//! This crate owns everything that talks to the transactional store:
//!
//! - [`new_postgresql_client`] - connection setup with a spawned connection
//!   task
//! - [`ensure_schema`] - bootstrap of the `members` and `member_feed` tables
//! - [`create_member`] / [`update_member`] - workload mutations, each a
//!   single transaction that also upserts the member's feed record
//! - [`list_changes_since`] - the commit-ordered eligibility query behind
//!   the relay's watermark cursor
//! - [`PostgresChangeSource`] - the [`watermark::ChangeSource`]
//!   implementation wrapping it
//!
//! Commit ordering relies on `pg_xact_commit_timestamp()`, so the server
//! must run with `track_commit_timestamp = on`; [`ensure_schema`] warns when
//! it is off.

mod client;
mod error;
mod schema;
mod source;
mod store;

pub use client::new_postgresql_client;
pub use error::StoreError;
pub use schema::ensure_schema;
pub use source::PostgresChangeSource;
pub use store::{create_member, list_changes_since, update_member};
