// Copyright 2023 Remi Bernotavicius

use crate::{Error, Result};
use diesel::connection::SimpleConnection as _;
use diesel::prelude::Connection as _;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::path::Path;
use std::time::Duration;

pub mod models;
pub mod schema;

pub type Connection = diesel::sqlite::SqliteConnection;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

diesel::define_sql_function! {
    /// Lowercases with full Unicode case folding. SQLite's `lower()` and `LIKE` only fold ASCII.
    fn fold_case(text: diesel::sql_types::Text) -> diesel::sql_types::Text;
}

/// Opens a connection and brings the schema up to date.
///
/// Every caller is expected to hold its own connection. WAL mode lets readers keep seeing the
/// last committed state while another connection is writing, and `busy_timeout` bounds how long a
/// writer waits for the lock.
pub fn establish_connection(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Connection> {
    let path = path.as_ref();
    let url = path
        .to_str()
        .ok_or_else(|| Error::InvalidDatabasePath(path.to_owned()))?;
    let mut connection = Connection::establish(url)?;
    connection.batch_execute(&format!(
        "PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL; PRAGMA busy_timeout = {};",
        busy_timeout.as_millis()
    ))?;
    fold_case_utils::register_impl(&mut connection, |text: String| text.to_lowercase())?;
    connection
        .run_pending_migrations(MIGRATIONS)
        .map_err(Error::Migration)?;
    Ok(connection)
}

#[test]
fn migrations() {
    let mut conn = establish_connection(":memory:", Duration::from_secs(1)).unwrap();
    conn.revert_all_migrations(MIGRATIONS).unwrap();
    assert!(conn.has_pending_migration(MIGRATIONS).unwrap());
    conn.run_pending_migrations(MIGRATIONS).unwrap();
    assert!(!conn.has_pending_migration(MIGRATIONS).unwrap());
}

#[test]
fn foreign_keys_are_enforced() {
    use diesel::RunQueryDsl as _;

    let mut conn = establish_connection(":memory:", Duration::from_secs(1)).unwrap();
    let orphan = diesel::sql_query(
        "INSERT INTO recipes (author_id, name, image, text, cooking_time, created_at) \
         VALUES (42, 'x', 'x.png', '', 1, CURRENT_TIMESTAMP)",
    )
    .execute(&mut conn);
    assert!(matches!(
        orphan,
        Err(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::ForeignKeyViolation,
            _
        ))
    ));
}
