//! Categorization watermark queries.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result};

use crate::domain::{UserId, Watermark};

fn parse_timestamp(idx: usize, value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        idx,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })
        })
        .transpose()
}

/// Gets the stored watermark for a user.
pub fn get(conn: &Connection, user_id: &UserId) -> Result<Option<Watermark>> {
    conn.query_row(
        "SELECT oldest, newest FROM categorization_watermarks WHERE user_id = ?1",
        params![user_id.0.as_str()],
        |row| {
            Ok(Watermark {
                oldest: parse_timestamp(0, row.get(0)?)?,
                newest: parse_timestamp(1, row.get(1)?)?,
            })
        },
    )
    .optional()
}

/// Inserts or replaces a user's watermark.
pub fn save(conn: &Connection, user_id: &UserId, watermark: &Watermark) -> Result<()> {
    conn.execute(
        "INSERT INTO categorization_watermarks (user_id, oldest, newest, updated_at)
         VALUES (?1, ?2, ?3, datetime('now'))
         ON CONFLICT(user_id) DO UPDATE SET
            oldest = excluded.oldest,
            newest = excluded.newest,
            updated_at = excluded.updated_at",
        params![
            user_id.0.as_str(),
            watermark.oldest.map(|dt| dt.to_rfc3339()),
            watermark.newest.map(|dt| dt.to_rfc3339()),
        ],
    )?;
    Ok(())
}
