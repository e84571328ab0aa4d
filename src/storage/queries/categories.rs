//! Category database queries.
//!
//! Names are unique per user; inserting a duplicate fails with a
//! constraint violation.

use rusqlite::{params, Connection, OptionalExtension, Result, Row};

use crate::domain::{Category, CategoryId, UserId};

fn from_row(row: &Row<'_>) -> Result<Category> {
    Ok(Category {
        id: CategoryId::from(row.get::<_, String>(0)?),
        user_id: UserId::from(row.get::<_, String>(1)?),
        name: row.get(2)?,
        description: row.get(3)?,
    })
}

/// Inserts a new category.
pub fn insert(conn: &Connection, category: &Category) -> Result<()> {
    conn.execute(
        "INSERT INTO categories (id, user_id, name, description, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, datetime('now'), datetime('now'))",
        params![
            category.id.0.as_str(),
            category.user_id.0.as_str(),
            category.name,
            category.description,
        ],
    )?;
    Ok(())
}

/// Gets a category by exact name.
pub fn get_by_name(conn: &Connection, user_id: &UserId, name: &str) -> Result<Option<Category>> {
    conn.query_row(
        "SELECT id, user_id, name, description
         FROM categories WHERE user_id = ?1 AND name = ?2",
        params![user_id.0.as_str(), name],
        from_row,
    )
    .optional()
}

/// Gets all categories for a user, ordered by name.
pub fn list_by_user(conn: &Connection, user_id: &UserId) -> Result<Vec<Category>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, name, description
         FROM categories WHERE user_id = ?1 ORDER BY name",
    )?;

    let categories = stmt.query_map(params![user_id.0.as_str()], from_row)?;
    categories.collect()
}

/// Deletes a category. Assignments pointing at it keep their rows with a
/// NULL category.
pub fn delete(conn: &Connection, id: &CategoryId) -> Result<bool> {
    let rows = conn.execute("DELETE FROM categories WHERE id = ?1", params![id.0.as_str()])?;
    Ok(rows > 0)
}
