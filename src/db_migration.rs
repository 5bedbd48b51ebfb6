use sqlx::SqlitePool;

use crate::errors::{DbError, DomainError, DomainResult};

// Embed all migration SQL files at compile time
const MIGRATION_ENTITIES: &str = include_str!("../migrations/20250601000000_entities.sql");
const MIGRATION_SYS_META: &str = include_str!("../migrations/20250601000001_sys_meta.sql");

// List of migrations with their names and SQL content, in apply order
const MIGRATIONS: &[(&str, &str)] = &[
    ("20250601000000_entities.sql", MIGRATION_ENTITIES),
    ("20250601000001_sys_meta.sql", MIGRATION_SYS_META),
];

/// Bring the database schema up to date. Pending migrations are applied in
/// one transaction and recorded in the `migrations` table.
pub async fn initialize_database(pool: &SqlitePool) -> DomainResult<()> {
    create_migrations_table(pool).await?;

    let last_migration = get_last_migration(pool).await?;
    let pending = get_pending_migrations(last_migration);
    if pending.is_empty() {
        return Ok(());
    }

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| DomainError::Database(DbError::Transaction(e.to_string())))?;

    for (name, sql) in pending {
        log::info!("applying migration {}", name);

        sqlx::raw_sql(sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DomainError::Database(DbError::Migration(format!("{} failed: {}", name, e)))
            })?;

        sqlx::query("INSERT INTO migrations (name, applied_at) VALUES (?, ?)")
            .bind(name)
            .bind(crate::utils::format_ts(chrono::Utc::now()))
            .execute(&mut *tx)
            .await
            .map_err(DbError::from)?;
    }

    tx.commit()
        .await
        .map_err(|e| DomainError::Database(DbError::Transaction(e.to_string())))?;

    Ok(())
}

async fn create_migrations_table(pool: &SqlitePool) -> DomainResult<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .map_err(DbError::from)?;

    Ok(())
}

async fn get_last_migration(pool: &SqlitePool) -> DomainResult<Option<String>> {
    let result =
        sqlx::query_scalar::<_, String>("SELECT name FROM migrations ORDER BY id DESC LIMIT 1")
            .fetch_optional(pool)
            .await
            .map_err(DbError::from)?;

    Ok(result)
}

fn get_pending_migrations(last_migration: Option<String>) -> Vec<(&'static str, &'static str)> {
    let mut pending = Vec::new();
    let mut should_include = last_migration.is_none();

    for &(name, sql) in MIGRATIONS {
        if should_include {
            pending.push((name, sql));
        } else if Some(name) == last_migration.as_deref() {
            should_include = true;
        }
    }

    pending
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_migrations_resume_after_last_applied() {
        let all = get_pending_migrations(None);
        assert_eq!(all.len(), MIGRATIONS.len());

        let rest = get_pending_migrations(Some("20250601000000_entities.sql".to_string()));
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].0, "20250601000001_sys_meta.sql");

        let none = get_pending_migrations(Some("20250601000001_sys_meta.sql".to_string()));
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let pool = crate::database::connect_in_memory().await.unwrap();
        initialize_database(&pool).await.unwrap();
        initialize_database(&pool).await.unwrap();

        let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM migrations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(applied as usize, MIGRATIONS.len());
    }
}
