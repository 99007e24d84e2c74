//! User CRUD queries.

use chrono::NaiveDateTime;
use roster_types::{NewUser, User, UserPatch};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, ToSql};
use thiserror::Error;

/// Errors that can occur during user operations.
#[derive(Debug, Error)]
pub enum UserError {
    /// The email is already taken by another user.
    #[error("email already registered: {0}")]
    DuplicateEmail(String),
    /// No user row has this id.
    #[error("user not found: {0}")]
    NotFound(i64),
    /// An update request supplied no fields.
    #[error("no fields to update")]
    NoFieldsToUpdate,
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

const USER_COLUMNS: &str = "id, name, email, role, status, created_at, updated_at";

/// Normalizes an SQLite `datetime('now')` value to ISO 8601.
///
/// Values that do not parse are passed through unchanged.
fn canonical_timestamp(raw: String) -> String {
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .map(|ts| ts.format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or(raw)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        role: row.get(3)?,
        status: row.get(4)?,
        created_at: canonical_timestamp(row.get(5)?),
        updated_at: canonical_timestamp(row.get(6)?),
    })
}

/// Maps a write failure, turning a UNIQUE violation into `DuplicateEmail`.
fn map_write_error(err: rusqlite::Error, email: Option<&str>) -> UserError {
    match err {
        rusqlite::Error::SqliteFailure(ref failure, _)
            if failure.code == ErrorCode::ConstraintViolation
                && failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            UserError::DuplicateEmail(email.unwrap_or_default().to_string())
        }
        other => UserError::Database(other),
    }
}

/// Lists every user, newest first.
pub fn list_users(conn: &Connection) -> Result<Vec<User>, UserError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC"
    ))?;
    let users = stmt
        .query_map([], user_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

/// Fetches a single user by id.
pub fn get_user(conn: &Connection, id: i64) -> Result<User, UserError> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        [id],
        user_from_row,
    )
    .optional()?
    .ok_or(UserError::NotFound(id))
}

/// Inserts a user and returns the generated id.
pub fn create_user(conn: &Connection, user: &NewUser) -> Result<i64, UserError> {
    conn.execute(
        "INSERT INTO users (name, email, role, status) VALUES (?1, ?2, ?3, ?4)",
        params![
            user.name,
            user.email,
            user.effective_role(),
            user.effective_status()
        ],
    )
    .map_err(|e| map_write_error(e, Some(&user.email)))?;
    Ok(conn.last_insert_rowid())
}

/// Applies a partial update. Only the fields present in `patch` are written.
///
/// `updated_at` is bumped on every successful update.
pub fn update_user(conn: &Connection, id: i64, patch: &UserPatch) -> Result<(), UserError> {
    if patch.is_empty() {
        return Err(UserError::NoFieldsToUpdate);
    }

    let assignments = patch.assignments();
    let mut set_clause: Vec<String> = assignments
        .iter()
        .enumerate()
        .map(|(i, (column, _))| format!("{column} = ?{}", i + 1))
        .collect();
    set_clause.push("updated_at = datetime('now')".to_string());

    let sql = format!(
        "UPDATE users SET {} WHERE id = ?{}",
        set_clause.join(", "),
        assignments.len() + 1
    );

    let mut values: Vec<&dyn ToSql> = assignments
        .iter()
        .map(|(_, value)| value as &dyn ToSql)
        .collect();
    values.push(&id);

    let changed = conn
        .execute(&sql, values.as_slice())
        .map_err(|e| map_write_error(e, patch.email.as_deref()))?;

    if changed == 0 {
        return Err(UserError::NotFound(id));
    }
    Ok(())
}

/// Deletes a user by id.
pub fn delete_user(conn: &Connection, id: i64) -> Result<(), UserError> {
    let changed = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
    if changed == 0 {
        return Err(UserError::NotFound(id));
    }
    Ok(())
}
