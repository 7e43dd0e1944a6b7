//! Connection setup.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_postgres::{Client, NoTls};
use tracing::error;

use crate::StoreError;

/// Connect to PostgreSQL and return a shareable client handle.
///
/// Spawns the connection task and verifies the session with `SELECT 1`
/// before handing the client out, so callers get a fully initialized handle
/// or a [`StoreError::Connection`] — there is no hidden first-use setup.
pub async fn new_postgresql_client(
    connection_string: &str,
) -> Result<Arc<Mutex<Client>>, StoreError> {
    let (client, connection) = tokio_postgres::connect(connection_string, NoTls)
        .await
        .map_err(|e| StoreError::Connection(e.to_string()))?;

    // Spawn the connection task
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("PostgreSQL connection error: {e}");
        }
    });

    // Test connection
    client
        .simple_query("SELECT 1")
        .await
        .map_err(|e| StoreError::Connection(e.to_string()))?;

    Ok(Arc::new(Mutex::new(client)))
}
