//! Database migrations - embedded SQL files
//!
//! Migrations are compiled into the binary with `include_str!` and applied
//! in order by [`crate::adapters::duckdb::schema`].

/// All migrations as `(filename, sql)`, in application order.
///
/// When adding one: create `NNN_description.sql` next to this file and
/// append it here.
pub const MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    ("001_initial_schema.sql", include_str!("001_initial_schema.sql")),
];

/// The bootstrap migration that creates `sys_migrations`
pub const BOOTSTRAP: &str = "000_migrations.sql";
