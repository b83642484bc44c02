//! Create SQL tables for registered models.
//! Idempotent (CREATE TABLE IF NOT EXISTS); existing tables are not altered when fields are added later.

use crate::config::ModelRegistry;
use crate::error::AppError;
use crate::sql::{create_table, Dialect};
use sqlx::AnyPool;

pub async fn apply_migrations(pool: &AnyPool, dialect: Dialect, registry: &ModelRegistry) -> Result<(), AppError> {
    for model in registry.iter() {
        let ddl = create_table(dialect, model);
        tracing::debug!(sql = %ddl, model = %model.name, "ensure table");
        sqlx::query(&ddl).execute(pool).await?;
    }
    tracing::info!(tables = registry.len(), "model tables ready");
    Ok(())
}
