//! User database queries.

use rusqlite::{params, Connection, OptionalExtension, Result};

use crate::domain::{User, UserId};

/// Inserts a new user.
pub fn insert(conn: &Connection, user: &User) -> Result<()> {
    conn.execute(
        "INSERT INTO users (id, email, about, created_at)
         VALUES (?1, ?2, ?3, datetime('now'))",
        params![user.id.0.as_str(), user.email, user.about],
    )?;
    Ok(())
}

/// Gets a user by ID.
pub fn get_by_id(conn: &Connection, id: &UserId) -> Result<Option<User>> {
    conn.query_row(
        "SELECT id, email, about FROM users WHERE id = ?1",
        params![id.0.as_str()],
        |row| {
            Ok(User {
                id: UserId::from(row.get::<_, String>(0)?),
                email: row.get(1)?,
                about: row.get(2)?,
            })
        },
    )
    .optional()
}
