use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, TransactionBehavior, params};
use tracing::{debug, warn};

use super::history;
use super::models::*;
use crate::errors::{BoardError, Entity, Result};

/// Async-safe handle to the board database.
///
/// Wraps `BoardDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, preventing synchronous SQLite
/// I/O from tying up async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<BoardDb>>,
}

impl DbHandle {
    pub fn new(db: BoardDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&BoardDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|_| BoardError::LockPoisoned)?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }
}

/// Tunables for a `BoardDb` connection.
#[derive(Debug, Clone, PartialEq)]
pub struct DbSettings {
    /// How long SQLite itself waits on a held lock before reporting busy.
    pub busy_timeout: Duration,
    /// Total tries for one mutation, including the first.
    pub max_attempts: u32,
    /// Sleep before retry `n` is `retry_backoff * n`.
    pub retry_backoff: Duration,
    /// Columns created with a project's board on first access.
    pub default_columns: Vec<String>,
    pub default_tag_color: String,
}

impl Default for DbSettings {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_millis(5000),
            max_attempts: 3,
            retry_backoff: Duration::from_millis(25),
            default_columns: vec![
                "To Do".to_string(),
                "In Progress".to_string(),
                "Done".to_string(),
            ],
            default_tag_color: DEFAULT_TAG_COLOR.to_string(),
        }
    }
}

pub struct BoardDb {
    pub(super) conn: Connection,
    settings: DbSettings,
}

impl BoardDb {
    /// Open (or create) a SQLite database at the given path with default settings.
    pub fn new(path: &Path) -> Result<Self> {
        Self::open(path, DbSettings::default())
    }

    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn open(path: &Path, settings: DbSettings) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite database at {}", path.display()))?;
        conn.busy_timeout(settings.busy_timeout)?;
        let db = Self { conn, settings };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self {
            conn,
            settings: DbSettings::default(),
        };
        db.init()?;
        Ok(db)
    }

    pub fn settings(&self) -> &DbSettings {
        &self.settings
    }

    fn init(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.run_migrations()?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS projects (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                is_deleted INTEGER NOT NULL DEFAULT 0,
                next_task_id INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS boards (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER NOT NULL UNIQUE REFERENCES projects(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS board_columns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                board_id INTEGER NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                position INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                column_id INTEGER NOT NULL REFERENCES board_columns(id) ON DELETE CASCADE,
                project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                project_task_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                position INTEGER NOT NULL DEFAULT 0,
                assignee_id INTEGER REFERENCES users(id),
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(project_id, project_task_id)
            );

            CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                color TEXT NOT NULL DEFAULT '#3b82f6'
            );

            CREATE TABLE IF NOT EXISTS task_tags (
                task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                PRIMARY KEY (task_id, tag_id)
            );

            -- Column references are plain ids: audit rows outlive the columns they name.
            CREATE TABLE IF NOT EXISTS task_status_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                old_column_id INTEGER,
                new_column_id INTEGER NOT NULL,
                changed_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS task_assignment_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                old_assignee_id INTEGER REFERENCES users(id),
                new_assignee_id INTEGER REFERENCES users(id),
                changed_at TEXT NOT NULL
            );

            CREATE TRIGGER IF NOT EXISTS task_status_history_append_only
            BEFORE UPDATE ON task_status_history
            BEGIN
                SELECT RAISE(ABORT, 'history records are immutable');
            END;

            CREATE TRIGGER IF NOT EXISTS task_assignment_history_append_only
            BEFORE UPDATE ON task_assignment_history
            BEGIN
                SELECT RAISE(ABORT, 'history records are immutable');
            END;

            CREATE INDEX IF NOT EXISTS idx_columns_board ON board_columns(board_id, position);
            CREATE INDEX IF NOT EXISTS idx_tasks_column ON tasks(column_id, position);
            CREATE INDEX IF NOT EXISTS idx_tags_project ON tags(project_id);
            CREATE INDEX IF NOT EXISTS idx_status_history_task ON task_status_history(task_id);
            CREATE INDEX IF NOT EXISTS idx_assignment_history_task ON task_assignment_history(task_id);
            ",
        )?;
        Ok(())
    }

    // ── Transactions ──────────────────────────────────────────────────

    /// Run `f` inside one `BEGIN IMMEDIATE` transaction, retrying on lock
    /// contention up to `max_attempts` times.
    ///
    /// `IMMEDIATE` takes the write lock before the first read, so every
    /// read-modify-write sequence inside `f` (reindexing, counter
    /// allocation) is serialised against other connections. Any error
    /// drops the transaction, which rolls it back.
    ///
    /// The backoff sleeps on the calling thread. Behind a [`DbHandle`] that
    /// thread holds the mutex, so other requests wait out the retries too.
    pub(crate) fn transact<F, R>(&self, operation: &'static str, mut f: F) -> Result<R>
    where
        F: FnMut(&Transaction<'_>) -> Result<R>,
    {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.run_once(&mut f) {
                Err(e) if e.is_contention() && attempt < max_attempts => {
                    warn!(operation, attempt, error = %e, "transaction contended, retrying");
                    std::thread::sleep(self.settings.retry_backoff * attempt);
                }
                Err(e) if e.is_contention() => {
                    warn!(operation, attempts = attempt, "transaction retries exhausted");
                    return Err(BoardError::Conflict {
                        operation,
                        attempts: attempt,
                    });
                }
                other => {
                    if other.is_ok() {
                        debug!(operation, attempt, "transaction committed");
                    }
                    return other;
                }
            }
        }
    }

    fn run_once<F, R>(&self, f: &mut F) -> Result<R>
    where
        F: FnMut(&Transaction<'_>) -> Result<R>,
    {
        // A BoardDb is only shared through DbHandle's mutex, so no other
        // transaction can be open on this connection.
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    // ── Reads ─────────────────────────────────────────────────────────

    pub fn get_project(&self, id: i64) -> Result<Option<Project>> {
        find_project(&self.conn, id)
    }

    /// Look a project up regardless of its soft-delete flag.
    pub fn get_project_including_deleted(&self, id: i64) -> Result<Option<Project>> {
        let project = self
            .conn
            .query_row(
                &format!("SELECT {PROJECT_FIELDS} FROM projects p WHERE p.id = ?1"),
                params![id],
                project_from_row,
            )
            .optional()?;
        Ok(project)
    }

    /// Visible (not soft-deleted) projects, oldest first.
    pub fn list_projects(&self) -> Result<Vec<Project>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PROJECT_FIELDS} FROM projects p WHERE p.is_deleted = 0 ORDER BY p.id"
        ))?;
        let rows = stmt.query_map([], project_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_board(&self, id: i64) -> Result<Option<Board>> {
        find_board(&self.conn, id)
    }

    pub fn board_for_project(&self, project_id: i64) -> Result<Option<Board>> {
        find_board_for_project(&self.conn, project_id)
    }

    pub fn get_column(&self, id: i64) -> Result<Option<Column>> {
        find_column(&self.conn, id)
    }

    /// Columns of a board in board order.
    pub fn list_columns(&self, board_id: i64) -> Result<Vec<Column>> {
        list_columns(&self.conn, board_id)
    }

    pub fn get_task(&self, id: i64) -> Result<Option<Task>> {
        find_task(&self.conn, id)
    }

    /// Tasks of a column in column order.
    pub fn list_tasks(&self, column_id: i64) -> Result<Vec<Task>> {
        list_tasks(&self.conn, column_id)
    }

    pub fn get_tag(&self, id: i64) -> Result<Option<Tag>> {
        find_tag(&self.conn, id)
    }

    pub fn list_tags(&self, project_id: i64) -> Result<Vec<Tag>> {
        require_project(&self.conn, project_id)?;
        list_tags(&self.conn, project_id)
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        find_user(&self.conn, id)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, username FROM users ORDER BY id")?;
        let rows = stmt.query_map([], user_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn status_history(&self, task_id: i64) -> Result<Vec<StatusChange>> {
        require_task(&self.conn, task_id)?;
        history::status_history(&self.conn, task_id)
    }

    pub fn assignment_history(&self, task_id: i64) -> Result<Vec<AssignmentChange>> {
        require_task(&self.conn, task_id)?;
        history::assignment_history(&self.conn, task_id)
    }

    /// Task with its tags and both history trails.
    pub fn task_detail(&self, task_id: i64) -> Result<Option<TaskDetail>> {
        let task = match find_task(&self.conn, task_id)? {
            Some(t) => t,
            None => return Ok(None),
        };
        let mut tags = Vec::with_capacity(task.tag_ids.len());
        for tag_id in &task.tag_ids {
            if let Some(tag) = find_tag(&self.conn, *tag_id)? {
                tags.push(tag);
            }
        }
        let status_history = history::status_history(&self.conn, task_id)?;
        let assignment_history = history::assignment_history(&self.conn, task_id)?;
        Ok(Some(TaskDetail {
            task,
            tags,
            status_history,
            assignment_history,
        }))
    }
}

// ── Row mapping ───────────────────────────────────────────────────────
//
// Every project-scoped lookup and list below goes through the visibility
// predicate `p.is_deleted = 0`, so entities under a soft-deleted project
// resolve as missing. Users are global and have no such filter.

const PROJECT_FIELDS: &str = "p.id, p.name, p.is_deleted, p.next_task_id, p.created_at, p.updated_at";
const BOARD_FIELDS: &str = "b.id, b.project_id, b.name, b.created_at";
const COLUMN_FIELDS: &str = "c.id, c.board_id, c.name, c.position, c.created_at";
const TASK_FIELDS: &str = "t.id, t.column_id, t.project_id, t.project_task_id, t.title, t.description, t.position, t.assignee_id, t.created_at, t.updated_at";
const TAG_FIELDS: &str = "g.id, g.project_id, g.name, g.color";

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        is_deleted: row.get(2)?,
        next_task_id: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn board_from_row(row: &Row<'_>) -> rusqlite::Result<Board> {
    Ok(Board {
        id: row.get(0)?,
        project_id: row.get(1)?,
        name: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn column_from_row(row: &Row<'_>) -> rusqlite::Result<Column> {
    Ok(Column {
        id: row.get(0)?,
        board_id: row.get(1)?,
        name: row.get(2)?,
        position: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Intermediate row for tasks; tag ids are loaded by a second query.
struct TaskRow {
    id: i64,
    column_id: i64,
    project_id: i64,
    project_task_id: i64,
    title: String,
    description: String,
    position: i64,
    assignee_id: Option<i64>,
    created_at: String,
    updated_at: String,
}

impl TaskRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            column_id: row.get(1)?,
            project_id: row.get(2)?,
            project_task_id: row.get(3)?,
            title: row.get(4)?,
            description: row.get(5)?,
            position: row.get(6)?,
            assignee_id: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn into_task(self, conn: &Connection) -> Result<Task> {
        let tag_ids = task_tag_ids(conn, self.id)?;
        Ok(Task {
            id: self.id,
            column_id: self.column_id,
            project_id: self.project_id,
            project_task_id: self.project_task_id,
            title: self.title,
            description: self.description,
            position: self.position,
            assignee_id: self.assignee_id,
            tag_ids,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn tag_from_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        project_id: row.get(1)?,
        name: row.get(2)?,
        color: row.get(3)?,
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
    })
}

// ── Shared queries (usable with a Connection or an open Transaction) ──

pub(crate) fn find_project(conn: &Connection, id: i64) -> Result<Option<Project>> {
    let project = conn
        .query_row(
            &format!("SELECT {PROJECT_FIELDS} FROM projects p WHERE p.id = ?1 AND p.is_deleted = 0"),
            params![id],
            project_from_row,
        )
        .optional()?;
    Ok(project)
}

pub(crate) fn require_project(conn: &Connection, id: i64) -> Result<Project> {
    find_project(conn, id)?.ok_or_else(|| BoardError::not_found(Entity::Project, id))
}

pub(crate) fn find_board(conn: &Connection, id: i64) -> Result<Option<Board>> {
    let board = conn
        .query_row(
            &format!(
                "SELECT {BOARD_FIELDS} FROM boards b
                 JOIN projects p ON p.id = b.project_id
                 WHERE b.id = ?1 AND p.is_deleted = 0"
            ),
            params![id],
            board_from_row,
        )
        .optional()?;
    Ok(board)
}

pub(crate) fn require_board(conn: &Connection, id: i64) -> Result<Board> {
    find_board(conn, id)?.ok_or_else(|| BoardError::not_found(Entity::Board, id))
}

pub(crate) fn find_board_for_project(conn: &Connection, project_id: i64) -> Result<Option<Board>> {
    let board = conn
        .query_row(
            &format!(
                "SELECT {BOARD_FIELDS} FROM boards b
                 JOIN projects p ON p.id = b.project_id
                 WHERE b.project_id = ?1 AND p.is_deleted = 0"
            ),
            params![project_id],
            board_from_row,
        )
        .optional()?;
    Ok(board)
}

pub(crate) fn find_column(conn: &Connection, id: i64) -> Result<Option<Column>> {
    let column = conn
        .query_row(
            &format!(
                "SELECT {COLUMN_FIELDS} FROM board_columns c
                 JOIN boards b ON b.id = c.board_id
                 JOIN projects p ON p.id = b.project_id
                 WHERE c.id = ?1 AND p.is_deleted = 0"
            ),
            params![id],
            column_from_row,
        )
        .optional()?;
    Ok(column)
}

pub(crate) fn require_column(conn: &Connection, id: i64) -> Result<Column> {
    find_column(conn, id)?.ok_or_else(|| BoardError::not_found(Entity::Column, id))
}

pub(crate) fn list_columns(conn: &Connection, board_id: i64) -> Result<Vec<Column>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMN_FIELDS} FROM board_columns c
         JOIN boards b ON b.id = c.board_id
         JOIN projects p ON p.id = b.project_id
         WHERE c.board_id = ?1 AND p.is_deleted = 0
         ORDER BY c.position, c.id"
    ))?;
    let rows = stmt.query_map(params![board_id], column_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub(crate) fn find_task(conn: &Connection, id: i64) -> Result<Option<Task>> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {TASK_FIELDS} FROM tasks t
                 JOIN projects p ON p.id = t.project_id
                 WHERE t.id = ?1 AND p.is_deleted = 0"
            ),
            params![id],
            TaskRow::from_row,
        )
        .optional()?;
    row.map(|r| r.into_task(conn)).transpose()
}

pub(crate) fn require_task(conn: &Connection, id: i64) -> Result<Task> {
    find_task(conn, id)?.ok_or_else(|| BoardError::not_found(Entity::Task, id))
}

pub(crate) fn list_tasks(conn: &Connection, column_id: i64) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_FIELDS} FROM tasks t
         JOIN projects p ON p.id = t.project_id
         WHERE t.column_id = ?1 AND p.is_deleted = 0
         ORDER BY t.position, t.id"
    ))?;
    let rows = stmt
        .query_map(params![column_id], TaskRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(|r| r.into_task(conn)).collect()
}

fn task_tag_ids(conn: &Connection, task_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT tag_id FROM task_tags WHERE task_id = ?1 ORDER BY tag_id")?;
    let ids = stmt
        .query_map(params![task_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;
    Ok(ids)
}

pub(crate) fn find_tag(conn: &Connection, id: i64) -> Result<Option<Tag>> {
    let tag = conn
        .query_row(
            &format!(
                "SELECT {TAG_FIELDS} FROM tags g
                 JOIN projects p ON p.id = g.project_id
                 WHERE g.id = ?1 AND p.is_deleted = 0"
            ),
            params![id],
            tag_from_row,
        )
        .optional()?;
    Ok(tag)
}

pub(crate) fn require_tag(conn: &Connection, id: i64) -> Result<Tag> {
    find_tag(conn, id)?.ok_or_else(|| BoardError::not_found(Entity::Tag, id))
}

pub(crate) fn list_tags(conn: &Connection, project_id: i64) -> Result<Vec<Tag>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TAG_FIELDS} FROM tags g
         JOIN projects p ON p.id = g.project_id
         WHERE g.project_id = ?1 AND p.is_deleted = 0
         ORDER BY g.name, g.id"
    ))?;
    let rows = stmt.query_map(params![project_id], tag_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub(crate) fn find_user(conn: &Connection, id: i64) -> Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, username FROM users WHERE id = ?1",
            params![id],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

pub(crate) fn require_user(conn: &Connection, id: i64) -> Result<User> {
    find_user(conn, id)?.ok_or_else(|| BoardError::not_found(Entity::User, id))
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_create_database_and_run_migrations() -> Result<()> {
        let db = BoardDb::new_in_memory()?;

        let table_count: i32 = db.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN
             ('projects', 'boards', 'board_columns', 'tasks', 'tags', 'task_tags',
              'users', 'task_status_history', 'task_assignment_history')",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(table_count, 9, "Expected 9 tables to exist");

        let fk: i32 = db.conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
        assert_eq!(fk, 1, "foreign keys must be enforced");

        Ok(())
    }

    #[test]
    fn test_migrations_are_idempotent() -> Result<()> {
        let db = BoardDb::new_in_memory()?;
        db.run_migrations()?;
        db.run_migrations()?;
        Ok(())
    }

    #[test]
    fn test_history_rows_reject_updates() -> Result<()> {
        let db = BoardDb::new_in_memory()?;
        let project = db.create_project("audit")?;
        let board = db.get_or_create_board(project.id)?;
        let column = db.list_columns(board.id)?.remove(0);
        let task = db.create_task(column.id, NewTask::titled("immutable"))?;

        let err = db
            .conn
            .execute(
                "UPDATE task_status_history SET new_column_id = 999 WHERE task_id = ?1",
                params![task.id],
            )
            .unwrap_err();
        assert!(err.to_string().contains("immutable"));
        Ok(())
    }

    #[test]
    fn test_transact_rolls_back_on_error() -> Result<()> {
        let db = BoardDb::new_in_memory()?;
        let project = db.create_project("rollback")?;

        let result: crate::errors::Result<()> = db.transact("test_rollback", |tx| {
            tx.execute(
                "UPDATE projects SET name = 'renamed' WHERE id = ?1",
                params![project.id],
            )?;
            Err(BoardError::validation("abort"))
        });
        assert!(matches!(result, Err(BoardError::Validation(_))));

        let fetched = db.get_project(project.id)?.expect("project should exist");
        assert_eq!(fetched.name, "rollback");
        Ok(())
    }

    #[test]
    fn test_transact_gives_up_with_conflict_when_locked() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("locked.db");
        let settings = DbSettings {
            busy_timeout: Duration::from_millis(0),
            max_attempts: 2,
            retry_backoff: Duration::from_millis(1),
            ..DbSettings::default()
        };
        let holder = BoardDb::open(&path, settings.clone())?;
        let contender = BoardDb::open(&path, settings)?;

        // Hold the write lock on one connection while the other tries to write.
        holder.conn.execute_batch("BEGIN IMMEDIATE;")?;
        let result = contender.create_project("blocked");
        holder.conn.execute_batch("ROLLBACK;")?;

        match result {
            Err(BoardError::Conflict { operation, attempts }) => {
                assert_eq!(operation, "create_project");
                assert_eq!(attempts, 2);
            }
            other => panic!("Expected Conflict, got {other:?}"),
        }
        assert!(contender.list_projects()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_reads_hide_soft_deleted_projects() -> Result<()> {
        let db = BoardDb::new_in_memory()?;
        let project = db.create_project("ghost")?;
        let board = db.get_or_create_board(project.id)?;
        let column = db.list_columns(board.id)?.remove(0);
        let task = db.create_task(column.id, NewTask::titled("hidden"))?;
        let tag = db.create_tag(project.id, "bug", None)?;

        db.delete_project(project.id)?;

        assert!(db.get_project(project.id)?.is_none());
        assert!(db.get_board(board.id)?.is_none());
        assert!(db.get_column(column.id)?.is_none());
        assert!(db.get_task(task.id)?.is_none());
        assert!(db.get_tag(tag.id)?.is_none());
        assert!(db.list_columns(board.id)?.is_empty());
        assert!(db.list_tasks(column.id)?.is_empty());
        assert!(list_tags(&db.conn, project.id)?.is_empty());
        assert!(matches!(
            db.list_tags(project.id),
            Err(BoardError::NotFound { .. })
        ));

        let stored = db
            .get_project_including_deleted(project.id)?
            .expect("soft-deleted project keeps its row");
        assert!(stored.is_deleted);
        Ok(())
    }

    #[test]
    fn test_task_detail_includes_tags_and_history() -> Result<()> {
        let db = BoardDb::new_in_memory()?;
        let project = db.create_project("detail")?;
        let board = db.get_or_create_board(project.id)?;
        let column = db.list_columns(board.id)?.remove(0);
        let tag = db.create_tag(project.id, "ui", Some("#ff0000"))?;
        let user = db.create_user("ada")?;
        let task = db.create_task(
            column.id,
            NewTask::titled("Detail me").with_tags(vec![tag.id]),
        )?;
        db.assign_task(task.id, Some(user.id))?;

        let detail = db.task_detail(task.id)?.expect("task should exist");
        assert_eq!(detail.task.title, "Detail me");
        assert_eq!(detail.tags.len(), 1);
        assert_eq!(detail.tags[0].color, "#ff0000");
        assert_eq!(detail.status_history.len(), 1);
        assert_eq!(detail.assignment_history.len(), 1);

        assert!(db.task_detail(9999)?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_db_handle_runs_closure_on_blocking_pool() -> Result<()> {
        let handle = DbHandle::new(BoardDb::new_in_memory()?);
        let project = handle.call(|db| db.create_project("async")).await?;
        let fetched = handle
            .call(move |db| db.get_project(project.id))
            .await?
            .expect("project should exist");
        assert_eq!(fetched.name, "async");
        Ok(())
    }
}
