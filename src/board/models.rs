use serde::{Deserialize, Serialize};

pub const DEFAULT_TAG_COLOR: &str = "#3b82f6";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub is_deleted: bool,
    /// The `project_task_id` the next created task will receive.
    pub next_task_id: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Board {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Column {
    pub id: i64,
    pub board_id: i64,
    pub name: String,
    pub position: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: i64,
    pub column_id: i64,
    pub project_id: i64,
    pub project_task_id: i64,
    pub title: String,
    pub description: String,
    pub position: i64,
    pub assignee_id: Option<i64>,
    pub tag_ids: Vec<i64>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
}

/// One append-only row of `task_status_history`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusChange {
    pub id: i64,
    pub task_id: i64,
    /// `None` for the record written at task creation.
    pub old_column_id: Option<i64>,
    pub new_column_id: i64,
    pub changed_at: String,
}

/// One append-only row of `task_assignment_history`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssignmentChange {
    pub id: i64,
    pub task_id: i64,
    pub old_assignee_id: Option<i64>,
    pub new_assignee_id: Option<i64>,
    pub changed_at: String,
}

/// Input for task creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tags(mut self, tag_ids: Vec<i64>) -> Self {
        self.tag_ids = tag_ids;
        self
    }
}

/// Partial update of a task's text fields. `None` leaves a field as is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
}

// API view types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardView {
    pub project: Project,
    pub board: Board,
    pub columns: Vec<ColumnView>,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnView {
    #[serde(flatten)]
    pub column: Column,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: Task,
    pub tags: Vec<Tag>,
    pub status_history: Vec<StatusChange>,
    pub assignment_history: Vec<AssignmentChange>,
}
