//! Sender assignment queries.
//!
//! One row per (sender, user). The `outcome` column records whether the row
//! points at a category or holds a sentinel.

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, Result};

use crate::domain::{
    AssignmentTarget, CategoryOutcome, ExistingAssignment, SenderAssignment, UserId,
};

/// Inserts or replaces the assignment for (sender, user).
pub fn upsert(
    conn: &Connection,
    sender: &str,
    user_id: &UserId,
    target: &AssignmentTarget,
    now: DateTime<Utc>,
) -> Result<SenderAssignment> {
    let timestamp = now.to_rfc3339();
    conn.execute(
        "INSERT INTO sender_categories (sender, user_id, category_id, outcome, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)
         ON CONFLICT(sender, user_id) DO UPDATE SET
            category_id = excluded.category_id,
            outcome = excluded.outcome,
            updated_at = excluded.updated_at",
        params![
            sender,
            user_id.0.as_str(),
            target.category_id().map(|id| id.0.as_str()),
            target.outcome_str(),
            timestamp,
        ],
    )?;

    Ok(SenderAssignment {
        sender: sender.to_string(),
        user_id: user_id.clone(),
        target: target.clone(),
        updated_at: now,
    })
}

/// Reads stored assignments for the given senders.
///
/// A resolved row whose category was deleted comes back with no outcome so
/// the caller can reclassify it.
pub fn find_for_senders(
    conn: &Connection,
    senders: &[String],
    user_id: &UserId,
) -> Result<Vec<ExistingAssignment>> {
    if senders.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = (0..senders.len())
        .map(|i| format!("?{}", i + 2))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT sc.sender, sc.outcome, c.name
         FROM sender_categories sc
         LEFT JOIN categories c ON c.id = sc.category_id
         WHERE sc.user_id = ?1 AND sc.sender IN ({placeholders})
         ORDER BY sc.sender"
    );

    let mut stmt = conn.prepare(&sql)?;
    let values = std::iter::once(user_id.0.as_str()).chain(senders.iter().map(String::as_str));

    let rows = stmt.query_map(params_from_iter(values), |row| {
        let sender: String = row.get(0)?;
        let outcome: String = row.get(1)?;
        let category: Option<String> = row.get(2)?;
        Ok(ExistingAssignment {
            sender,
            outcome: outcome_from_columns(&outcome, category),
        })
    })?;

    rows.collect()
}

fn outcome_from_columns(outcome: &str, category: Option<String>) -> Option<CategoryOutcome> {
    match outcome {
        "deferred" => Some(CategoryOutcome::Deferred),
        "insufficient_evidence" => Some(CategoryOutcome::InsufficientEvidence),
        _ => category.map(CategoryOutcome::Resolved),
    }
}
