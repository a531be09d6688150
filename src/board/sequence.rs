//! Project-scoped task number allocation.

use rusqlite::{OptionalExtension, Transaction, params};

use crate::errors::{BoardError, Entity, Result};

/// Take the next `project_task_id` for `project_id` and advance the counter.
///
/// Must run inside the transaction that inserts the task: it takes a
/// `Transaction` rather than a `Connection` for that reason. Mutations open
/// `BEGIN IMMEDIATE`, so the write lock is already held when the counter is
/// read and is released only at commit, after the task row exists. A
/// rollback un-does the increment, so a failed creation consumes no id.
pub(crate) fn allocate_task_number(tx: &Transaction<'_>, project_id: i64) -> Result<i64> {
    let next: i64 = tx
        .query_row(
            "SELECT next_task_id FROM projects WHERE id = ?1 AND is_deleted = 0",
            params![project_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| BoardError::not_found(Entity::Project, project_id))?;

    tx.execute(
        "UPDATE projects SET next_task_id = ?1, updated_at = datetime('now') WHERE id = ?2",
        params![next + 1, project_id],
    )?;
    Ok(next)
}
