//! Append-only audit trail for task status and assignment changes.
//!
//! Writers take a `Transaction` so a record can only ever be committed
//! together with the mutation that caused it.

use chrono::Utc;
use rusqlite::{Connection, Row, Transaction, params};

use super::models::{AssignmentChange, StatusChange};
use crate::errors::Result;

/// Record that `task_id` entered `new_column_id`. `old_column_id` is `None`
/// for the record written when the task is created.
pub(crate) fn record_status_change(
    tx: &Transaction<'_>,
    task_id: i64,
    old_column_id: Option<i64>,
    new_column_id: i64,
) -> Result<StatusChange> {
    let changed_at = Utc::now().to_rfc3339();
    tx.execute(
        "INSERT INTO task_status_history (task_id, old_column_id, new_column_id, changed_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![task_id, old_column_id, new_column_id, changed_at],
    )?;
    Ok(StatusChange {
        id: tx.last_insert_rowid(),
        task_id,
        old_column_id,
        new_column_id,
        changed_at,
    })
}

/// Record an assignee change. Callers only invoke this when the assignee
/// actually differs.
pub(crate) fn record_assignment_change(
    tx: &Transaction<'_>,
    task_id: i64,
    old_assignee_id: Option<i64>,
    new_assignee_id: Option<i64>,
) -> Result<AssignmentChange> {
    debug_assert_ne!(old_assignee_id, new_assignee_id);
    let changed_at = Utc::now().to_rfc3339();
    tx.execute(
        "INSERT INTO task_assignment_history (task_id, old_assignee_id, new_assignee_id, changed_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![task_id, old_assignee_id, new_assignee_id, changed_at],
    )?;
    Ok(AssignmentChange {
        id: tx.last_insert_rowid(),
        task_id,
        old_assignee_id,
        new_assignee_id,
        changed_at,
    })
}

fn status_from_row(row: &Row<'_>) -> rusqlite::Result<StatusChange> {
    Ok(StatusChange {
        id: row.get(0)?,
        task_id: row.get(1)?,
        old_column_id: row.get(2)?,
        new_column_id: row.get(3)?,
        changed_at: row.get(4)?,
    })
}

fn assignment_from_row(row: &Row<'_>) -> rusqlite::Result<AssignmentChange> {
    Ok(AssignmentChange {
        id: row.get(0)?,
        task_id: row.get(1)?,
        old_assignee_id: row.get(2)?,
        new_assignee_id: row.get(3)?,
        changed_at: row.get(4)?,
    })
}

/// Status records of a task, oldest first.
pub(crate) fn status_history(conn: &Connection, task_id: i64) -> Result<Vec<StatusChange>> {
    let mut stmt = conn.prepare(
        "SELECT id, task_id, old_column_id, new_column_id, changed_at
         FROM task_status_history WHERE task_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![task_id], status_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Assignment records of a task, oldest first.
pub(crate) fn assignment_history(
    conn: &Connection,
    task_id: i64,
) -> Result<Vec<AssignmentChange>> {
    let mut stmt = conn.prepare(
        "SELECT id, task_id, old_assignee_id, new_assignee_id, changed_at
         FROM task_assignment_history WHERE task_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![task_id], assignment_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
