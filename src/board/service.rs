//! Board mutation service: every write the board supports.
//!
//! Each operation is one `transact` call, so the mutation, its reindexing,
//! counter allocation and history append commit or roll back together.

use rusqlite::{Transaction, params};
use tracing::info;

use super::db::{
    BoardDb, find_board_for_project, list_columns, list_tags, list_tasks, require_board,
    require_column, require_project, require_tag, require_task, require_user,
};
use super::history;
use super::models::*;
use super::ordering::{self, SiblingGroup};
use super::sequence;
use crate::errors::{BoardError, Result};

const UNASSIGNED_MOVE: &str = "unassigned tasks cannot change status";

fn non_empty(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(BoardError::validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn count_members(tx: &Transaction<'_>, group: SiblingGroup) -> Result<i64> {
    Ok(ordering::member_ids(tx, group)?.len() as i64)
}

/// Resolve `tag_ids` to tags of `project_id`, dropping duplicates.
fn project_tags(tx: &Transaction<'_>, project_id: i64, tag_ids: &[i64]) -> Result<Vec<i64>> {
    let mut resolved: Vec<i64> = Vec::with_capacity(tag_ids.len());
    for &tag_id in tag_ids {
        let tag = require_tag(tx, tag_id)?;
        if tag.project_id != project_id {
            return Err(BoardError::validation(format!(
                "tag {tag_id} belongs to another project"
            )));
        }
        if !resolved.contains(&tag_id) {
            resolved.push(tag_id);
        }
    }
    Ok(resolved)
}

fn replace_task_tags(tx: &Transaction<'_>, task_id: i64, tag_ids: &[i64]) -> Result<()> {
    tx.execute("DELETE FROM task_tags WHERE task_id = ?1", params![task_id])?;
    let mut stmt = tx.prepare("INSERT INTO task_tags (task_id, tag_id) VALUES (?1, ?2)")?;
    for tag_id in tag_ids {
        stmt.execute(params![task_id, tag_id])?;
    }
    Ok(())
}

impl BoardDb {
    // ── Projects ──────────────────────────────────────────────────────

    pub fn create_project(&self, name: &str) -> Result<Project> {
        let name = non_empty("project name", name)?;
        let project = self.transact("create_project", |tx| {
            tx.execute("INSERT INTO projects (name) VALUES (?1)", params![name])?;
            require_project(tx, tx.last_insert_rowid())
        })?;
        info!(project_id = project.id, name = %project.name, "created project");
        Ok(project)
    }

    /// Soft-delete: the row stays, every read path stops seeing it.
    pub fn delete_project(&self, id: i64) -> Result<()> {
        self.transact("delete_project", |tx| {
            require_project(tx, id)?;
            tx.execute(
                "UPDATE projects SET is_deleted = 1, updated_at = datetime('now') WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })?;
        info!(project_id = id, "soft-deleted project");
        Ok(())
    }

    // ── Boards & columns ──────────────────────────────────────────────

    /// Return the project's board, creating it with the default columns on
    /// first access.
    pub fn get_or_create_board(&self, project_id: i64) -> Result<Board> {
        let default_columns = &self.settings().default_columns;
        self.transact("get_or_create_board", |tx| {
            let project = require_project(tx, project_id)?;
            if let Some(board) = find_board_for_project(tx, project_id)? {
                return Ok(board);
            }
            tx.execute(
                "INSERT INTO boards (project_id, name) VALUES (?1, ?2)",
                params![project_id, format!("{} Board", project.name)],
            )?;
            let board_id = tx.last_insert_rowid();
            for (position, name) in default_columns.iter().enumerate() {
                tx.execute(
                    "INSERT INTO board_columns (board_id, name, position) VALUES (?1, ?2, ?3)",
                    params![board_id, name, position as i64],
                )?;
            }
            info!(project_id, board_id, "created board with default columns");
            require_board(tx, board_id)
        })
    }

    /// The whole board of a project: ordered columns, their ordered tasks
    /// and the project's tags.
    pub fn board_view(&self, project_id: i64) -> Result<BoardView> {
        let board = self.get_or_create_board(project_id)?;
        let project = require_project(&self.conn, project_id)?;
        let columns = list_columns(&self.conn, board.id)?
            .into_iter()
            .map(|column| {
                let tasks = list_tasks(&self.conn, column.id)?;
                Ok(ColumnView { column, tasks })
            })
            .collect::<Result<Vec<_>>>()?;
        let tags = list_tags(&self.conn, project_id)?;
        Ok(BoardView {
            project,
            board,
            columns,
            tags,
        })
    }

    /// Append a column at the end of the board.
    pub fn create_column(&self, board_id: i64, name: &str) -> Result<Column> {
        let name = non_empty("column name", name)?;
        let column = self.transact("create_column", |tx| {
            require_board(tx, board_id)?;
            let position = count_members(tx, SiblingGroup::BoardColumns { board_id })?;
            tx.execute(
                "INSERT INTO board_columns (board_id, name, position) VALUES (?1, ?2, ?3)",
                params![board_id, name, position],
            )?;
            require_column(tx, tx.last_insert_rowid())
        })?;
        info!(board_id, column_id = column.id, position = column.position, "created column");
        Ok(column)
    }

    /// Delete a column with its tasks and close the gap it leaves.
    /// Returns the removed column.
    pub fn delete_column(&self, id: i64) -> Result<Column> {
        let column = self.transact("delete_column", |tx| {
            let column = require_column(tx, id)?;
            tx.execute("DELETE FROM board_columns WHERE id = ?1", params![id])?;
            ordering::repack(tx, SiblingGroup::BoardColumns { board_id: column.board_id })?;
            Ok(column)
        })?;
        info!(board_id = column.board_id, column_id = id, "deleted column");
        Ok(column)
    }

    /// Move a column to `position` within its board. Returns the board's
    /// columns in their new order.
    pub fn move_column(&self, id: i64, position: i64) -> Result<Vec<Column>> {
        let columns = self.transact("move_column", |tx| {
            let column = require_column(tx, id)?;
            let group = SiblingGroup::BoardColumns { board_id: column.board_id };
            ordering::place(tx, group, id, position)?;
            list_columns(tx, column.board_id)
        })?;
        info!(column_id = id, position, "moved column");
        Ok(columns)
    }

    // ── Tasks ─────────────────────────────────────────────────────────

    /// Create a task at the end of `column_id`, allocating its
    /// project-scoped number and recording its initial status.
    pub fn create_task(&self, column_id: i64, new: NewTask) -> Result<Task> {
        let title = non_empty("task title", &new.title)?;
        let task = self.transact("create_task", |tx| {
            let column = require_column(tx, column_id)?;
            let project_id = require_board(tx, column.board_id)?.project_id;
            let number = sequence::allocate_task_number(tx, project_id)?;
            let position = count_members(tx, SiblingGroup::ColumnTasks { column_id })?;
            tx.execute(
                "INSERT INTO tasks (column_id, project_id, project_task_id, title, description, position)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![column_id, project_id, number, title, new.description, position],
            )?;
            let task_id = tx.last_insert_rowid();
            let tag_ids = project_tags(tx, project_id, &new.tag_ids)?;
            replace_task_tags(tx, task_id, &tag_ids)?;
            history::record_status_change(tx, task_id, None, column_id)?;
            require_task(tx, task_id)
        })?;
        info!(
            task_id = task.id,
            project_id = task.project_id,
            project_task_id = task.project_task_id,
            column_id,
            "created task"
        );
        Ok(task)
    }

    pub fn update_task_details(&self, id: i64, update: TaskUpdate) -> Result<Task> {
        let title = update
            .title
            .as_deref()
            .map(|t| non_empty("task title", t))
            .transpose()?;
        let task = self.transact("update_task_details", |tx| {
            let task = require_task(tx, id)?;
            let title = title.as_deref().unwrap_or(&task.title);
            let description = update.description.as_deref().unwrap_or(&task.description);
            tx.execute(
                "UPDATE tasks SET title = ?1, description = ?2, updated_at = datetime('now')
                 WHERE id = ?3",
                params![title, description, id],
            )?;
            require_task(tx, id)
        })?;
        info!(task_id = id, "updated task details");
        Ok(task)
    }

    /// Delete a task and repack the column it leaves. Returns the removed task.
    pub fn delete_task(&self, id: i64) -> Result<Task> {
        let task = self.transact("delete_task", |tx| {
            let task = require_task(tx, id)?;
            tx.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
            ordering::repack(tx, SiblingGroup::ColumnTasks { column_id: task.column_id })?;
            Ok(task)
        })?;
        info!(task_id = id, column_id = task.column_id, "deleted task");
        Ok(task)
    }

    /// Move a task to `position` in `column_id`.
    ///
    /// Within its own column this only reorders. Across columns the task
    /// must have an assignee and stay on the same board; the old column is
    /// repacked and one status change is recorded.
    pub fn move_task(&self, id: i64, column_id: i64, position: i64) -> Result<Task> {
        let (task, from_column) = self.transact("move_task", |tx| {
            let task = require_task(tx, id)?;
            let target = require_column(tx, column_id)?;

            if target.id == task.column_id {
                ordering::place(tx, SiblingGroup::ColumnTasks { column_id }, id, position)?;
                return Ok((require_task(tx, id)?, task.column_id));
            }

            if task.assignee_id.is_none() {
                return Err(BoardError::validation(UNASSIGNED_MOVE));
            }
            let source = require_column(tx, task.column_id)?;
            if source.board_id != target.board_id {
                return Err(BoardError::validation(format!(
                    "column {column_id} is on a different board"
                )));
            }

            tx.execute(
                "UPDATE tasks SET column_id = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![column_id, id],
            )?;
            ordering::repack(tx, SiblingGroup::ColumnTasks { column_id: source.id })?;
            ordering::place(tx, SiblingGroup::ColumnTasks { column_id }, id, position)?;
            history::record_status_change(tx, id, Some(source.id), column_id)?;
            Ok((require_task(tx, id)?, source.id))
        })?;
        info!(
            task_id = id,
            from_column,
            to_column = column_id,
            position = task.position,
            "moved task"
        );
        Ok(task)
    }

    /// Set or clear the assignee. Returns whether anything changed.
    pub fn assign_task(&self, id: i64, user_id: Option<i64>) -> Result<bool> {
        let changed = self.transact("assign_task", |tx| {
            let task = require_task(tx, id)?;
            if let Some(user_id) = user_id {
                require_user(tx, user_id)?;
            }
            if task.assignee_id == user_id {
                return Ok(false);
            }
            tx.execute(
                "UPDATE tasks SET assignee_id = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![user_id, id],
            )?;
            history::record_assignment_change(tx, id, task.assignee_id, user_id)?;
            Ok(true)
        })?;
        if changed {
            info!(task_id = id, assignee_id = ?user_id, "assigned task");
        }
        Ok(changed)
    }

    /// Replace the task's tag set. Every tag must belong to the task's project.
    pub fn set_task_tags(&self, id: i64, tag_ids: &[i64]) -> Result<Task> {
        let task = self.transact("set_task_tags", |tx| {
            let task = require_task(tx, id)?;
            let resolved = project_tags(tx, task.project_id, tag_ids)?;
            replace_task_tags(tx, id, &resolved)?;
            tx.execute(
                "UPDATE tasks SET updated_at = datetime('now') WHERE id = ?1",
                params![id],
            )?;
            require_task(tx, id)
        })?;
        info!(task_id = id, tags = ?task.tag_ids, "set task tags");
        Ok(task)
    }

    // ── Tags & users ──────────────────────────────────────────────────

    pub fn create_tag(&self, project_id: i64, name: &str, color: Option<&str>) -> Result<Tag> {
        let name = non_empty("tag name", name)?;
        let color = match color {
            Some(c) => non_empty("tag color", c)?,
            None => self.settings().default_tag_color.clone(),
        };
        let tag = self.transact("create_tag", |tx| {
            require_project(tx, project_id)?;
            tx.execute(
                "INSERT INTO tags (project_id, name, color) VALUES (?1, ?2, ?3)",
                params![project_id, name, color],
            )?;
            require_tag(tx, tx.last_insert_rowid())
        })?;
        info!(project_id, tag_id = tag.id, "created tag");
        Ok(tag)
    }

    /// Delete a tag; its task associations go with it. Returns the removed tag.
    pub fn delete_tag(&self, id: i64) -> Result<Tag> {
        let tag = self.transact("delete_tag", |tx| {
            let tag = require_tag(tx, id)?;
            tx.execute("DELETE FROM tags WHERE id = ?1", params![id])?;
            Ok(tag)
        })?;
        info!(tag_id = id, project_id = tag.project_id, "deleted tag");
        Ok(tag)
    }

    pub fn create_user(&self, username: &str) -> Result<User> {
        let username = non_empty("username", username)?;
        let user = self.transact("create_user", |tx| {
            let taken: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
                params![username],
                |row| row.get(0),
            )?;
            if taken {
                return Err(BoardError::validation(format!(
                    "username '{username}' is already taken"
                )));
            }
            tx.execute("INSERT INTO users (username) VALUES (?1)", params![username])?;
            require_user(tx, tx.last_insert_rowid())
        })?;
        info!(user_id = user.id, "created user");
        Ok(user)
    }
}
