use sqlx::SqlitePool;

use super::SqliteInitError;

/// Create the `local_store` table: one row per `StorageKey`.
pub(super) async fn ensure_local_store(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS local_store (
            key TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        ",
    )
    .execute(pool)
    .await?;
    Ok(())
}
