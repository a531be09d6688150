//! Ordering engine: dense `position` indices for sibling groups.
//!
//! Columns of a board and tasks of a column are both kept as a contiguous
//! `0..n` sequence. Every move, insert or delete funnels through the same
//! two routines, [`place`] and [`repack`], which rewrite the whole group so
//! the sequence is dense afterwards even if it was corrupted before.

use rusqlite::{Connection, params};
use tracing::debug;

use crate::errors::Result;

/// A set of rows sharing one parent whose positions form one sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiblingGroup {
    BoardColumns { board_id: i64 },
    ColumnTasks { column_id: i64 },
}

impl SiblingGroup {
    fn table(&self) -> &'static str {
        match self {
            Self::BoardColumns { .. } => "board_columns",
            Self::ColumnTasks { .. } => "tasks",
        }
    }

    fn parent_key(&self) -> &'static str {
        match self {
            Self::BoardColumns { .. } => "board_id",
            Self::ColumnTasks { .. } => "column_id",
        }
    }

    fn parent_id(&self) -> i64 {
        match self {
            Self::BoardColumns { board_id } => *board_id,
            Self::ColumnTasks { column_id } => *column_id,
        }
    }
}

/// Remove `moved` from `siblings` (if present) and re-insert it at
/// `target`, clamped to `[0, len]`.
pub fn reorder<T: PartialEq>(mut siblings: Vec<T>, moved: T, target: i64) -> Vec<T> {
    siblings.retain(|s| *s != moved);
    let index = target.clamp(0, siblings.len() as i64) as usize;
    siblings.insert(index, moved);
    siblings
}

/// Member ids of `group` in their current order. Ties (from corrupted
/// positions) break on id so the result is deterministic.
pub(crate) fn member_ids(conn: &Connection, group: SiblingGroup) -> Result<Vec<i64>> {
    let sql = format!(
        "SELECT id FROM {} WHERE {} = ?1 ORDER BY position, id",
        group.table(),
        group.parent_key()
    );
    let mut stmt = conn.prepare(&sql)?;
    let ids = stmt
        .query_map(params![group.parent_id()], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;
    Ok(ids)
}

/// Write `position = index` for every id, touching only rows whose value
/// changes. Returns the number of rows rewritten.
fn write_positions(conn: &Connection, group: SiblingGroup, ordered: &[i64]) -> Result<usize> {
    let sql = format!(
        "UPDATE {} SET position = ?1 WHERE id = ?2 AND position != ?1",
        group.table()
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut changed = 0;
    for (index, id) in ordered.iter().enumerate() {
        changed += stmt.execute(params![index as i64, id])?;
    }
    Ok(changed)
}

/// Move `moved_id` (already a member of `group`) to `target` and repack.
pub(crate) fn place(
    conn: &Connection,
    group: SiblingGroup,
    moved_id: i64,
    target: i64,
) -> Result<Vec<i64>> {
    let ordered = reorder(member_ids(conn, group)?, moved_id, target);
    let changed = write_positions(conn, group, &ordered)?;
    debug!(?group, moved_id, target, changed, "placed item");
    Ok(ordered)
}

/// Rewrite the group's positions as `0..n` in their current order.
pub(crate) fn repack(conn: &Connection, group: SiblingGroup) -> Result<Vec<i64>> {
    let ordered = member_ids(conn, group)?;
    let changed = write_positions(conn, group, &ordered)?;
    debug!(?group, changed, "repacked group");
    Ok(ordered)
}
