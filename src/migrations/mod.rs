// Embedded migration runner
// Migrations are versioned SQL applied in lexicographic order on startup;
// diesel_migrations requires a sync connection, so the harness runs in a
// blocking task.

use diesel::Connection;
use diesel::PgConnection;
use diesel_migrations::MigrationHarness;
use std::error::Error;
use tracing::{debug, info};

use crate::db::MIGRATIONS;

/// Run all pending migrations. Returns the number applied.
pub async fn run_migrations(database_url: &str) -> Result<usize, Box<dyn Error + Send + Sync>> {
    let database_url = database_url.to_string();

    let applied =
        tokio::task::spawn_blocking(move || -> Result<usize, Box<dyn Error + Send + Sync>> {
            debug!("Establishing sync connection for migrations...");
            let mut conn = PgConnection::establish(&database_url)
                .map_err(|e| format!("Failed to establish sync connection: {}", e))?;

            let pending = conn
                .pending_migrations(MIGRATIONS)
                .map_err(|e| format!("Failed to check pending migrations: {}", e))?;

            if pending.is_empty() {
                debug!("No pending migrations to run");
                return Ok(0);
            }

            info!("Applying {} pending migrations...", pending.len());
            let applied = conn
                .run_pending_migrations(MIGRATIONS)
                .map_err(|e| format!("Migration failed: {}", e))?;

            for migration in &applied {
                info!("Applied migration: {}", migration);
            }

            Ok(applied.len())
        })
        .await
        .map_err(|e| format!("Migration task panicked: {}", e))??;

    Ok(applied)
}
