//! Database introspection.

use rusqlite::Connection;

/// Lists the names of all tables in the connected database, sorted.
///
/// SQLite's own bookkeeping tables (`sqlite_*`) are excluded.
pub fn list_tables(conn: &Connection) -> Result<Vec<String>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\'
         ORDER BY name",
    )?;
    let tables = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(tables)
}
