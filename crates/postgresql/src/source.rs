//! `ChangeSource` implementation backed by the feed tables.

use std::sync::Arc;

use async_trait::async_trait;
use feed_core::MemberWithFeed;
use tokio::sync::Mutex;
use tokio_postgres::Client;
use watermark::{ChangeSource, Watermark};

use crate::store::list_changes_since;

/// Polling change source over the `member_feed` table.
pub struct PostgresChangeSource {
    client: Arc<Mutex<Client>>,
}

impl PostgresChangeSource {
    pub fn new(client: Arc<Mutex<Client>>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChangeSource for PostgresChangeSource {
    async fn changes_since(
        &self,
        from: &Watermark,
        limit: i64,
    ) -> anyhow::Result<Vec<MemberWithFeed>> {
        Ok(list_changes_since(&self.client, from, limit).await?)
    }
}
