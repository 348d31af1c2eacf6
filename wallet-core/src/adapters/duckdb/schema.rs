//! Schema migrations for the DuckDB ledger
//!
//! Every applied migration is recorded in `sys_migrations`, so running the
//! set again is a no-op.

use anyhow::{Context, Result};
use duckdb::Connection;
use tracing::{info, warn};

use crate::migrations::{BOOTSTRAP, MIGRATIONS};

/// Outcome of a migration run
#[derive(Debug, Default)]
pub struct MigrationReport {
    /// Migrations applied by this run, in order
    pub applied: Vec<String>,
    /// Migrations that were already recorded before this run
    pub already_applied: usize,
}

/// Apply every migration that is not yet recorded
pub fn migrate(conn: &Connection) -> Result<MigrationReport> {
    let mut report = MigrationReport::default();

    if !migrations_table_exists(conn)? {
        let (name, sql) = MIGRATIONS
            .iter()
            .find(|(name, _)| *name == BOOTSTRAP)
            .context("bootstrap migration missing")?;
        apply(conn, name, sql)?;
        report.applied.push(name.to_string());
    }

    let recorded = applied_migrations(conn)?;
    report.already_applied = recorded.len() - report.applied.len();

    for (name, sql) in MIGRATIONS {
        if recorded.iter().any(|r| r == name) {
            continue;
        }
        apply(conn, name, sql)?;
        report.applied.push(name.to_string());
    }

    if !report.applied.is_empty() {
        info!(applied = ?report.applied, "applied schema migrations");
    }
    Ok(report)
}

/// Names of recorded migrations, sorted
pub fn applied_migrations(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT migration_name FROM sys_migrations ORDER BY migration_name")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<duckdb::Result<Vec<_>>>()?;
    Ok(names)
}

fn migrations_table_exists(conn: &Connection) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = 'sys_migrations'",
        [],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Run one migration and record it, atomically
fn apply(conn: &Connection, name: &str, sql: &str) -> Result<()> {
    conn.execute_batch("BEGIN TRANSACTION")?;
    let outcome = conn
        .execute_batch(sql)
        .and_then(|_| {
            conn.execute(
                "INSERT INTO sys_migrations (migration_name) VALUES (?)",
                [name],
            )
        })
        .with_context(|| format!("migration {} failed", name));

    match outcome {
        Ok(_) => {
            conn.execute_batch("COMMIT")?;
            Ok(())
        }
        Err(err) => {
            if let Err(rollback_err) = conn.execute_batch("ROLLBACK") {
                warn!(migration = name, error = %rollback_err, "migration rollback failed");
            }
            Err(err)
        }
    }
}
