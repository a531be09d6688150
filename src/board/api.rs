use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::error;

use super::db::DbHandle;
#[cfg(test)]
use super::db::BoardDb;
use super::events::{BoardEvent, broadcast_event};
use super::models::{NewTask, TaskUpdate};
use crate::errors::BoardError;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
    pub events_tx: broadcast::Sender<String>,
}

impl AppState {
    pub fn new(db: DbHandle) -> Self {
        let (events_tx, _) = broadcast::channel::<String>(256);
        Self { db, events_tx }
    }

    fn publish(&self, event: BoardEvent) {
        broadcast_event(&self.events_tx, &event);
    }
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct CreateColumnRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct MoveColumnRequest {
    pub position: i64,
}

#[derive(Deserialize)]
pub struct MoveTaskRequest {
    pub column_id: i64,
    pub position: i64,
}

#[derive(Deserialize)]
pub struct AssignTaskRequest {
    pub user_id: Option<i64>,
}

#[derive(Deserialize)]
pub struct SetTagsRequest {
    pub tag_ids: Vec<i64>,
}

#[derive(Deserialize)]
pub struct CreateTagRequest {
    pub name: String,
    pub color: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl From<BoardError> for ApiError {
    fn from(err: BoardError) -> Self {
        match err {
            BoardError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            BoardError::Validation(reason) => ApiError::BadRequest(reason),
            BoardError::Conflict { .. } => ApiError::Conflict(err.to_string()),
            other => {
                error!(error = %other, "request failed");
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/projects", get(list_projects).post(create_project))
        .route("/api/projects/{id}", get(get_project).delete(delete_project))
        .route("/api/projects/{id}/board", get(get_board))
        .route("/api/projects/{id}/tags", get(list_tags).post(create_tag))
        .route("/api/tags/{id}", delete(delete_tag))
        .route("/api/boards/{id}/columns", post(create_column))
        .route("/api/columns/{id}", delete(delete_column))
        .route("/api/columns/{id}/move", post(move_column))
        .route("/api/columns/{id}/tasks", post(create_task))
        .route(
            "/api/tasks/{id}",
            get(get_task).patch(update_task).delete(delete_task),
        )
        .route("/api/tasks/{id}/move", post(move_task))
        .route("/api/tasks/{id}/assign", post(assign_task))
        .route("/api/tasks/{id}/tags", put(set_task_tags))
        .route("/api/users", get(list_users).post(create_user))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn list_projects(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let projects = state.db.call(|db| db.list_projects()).await?;
    Ok(Json(projects))
}

async fn create_project(
    State(state): State<SharedState>,
    Json(req): Json<CreateProjectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name;
    let project = state.db.call(move |db| db.create_project(&name)).await?;
    state.publish(BoardEvent::ProjectListUpdated);
    Ok((StatusCode::CREATED, Json(project)))
}

async fn get_project(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let project = state.db.call(move |db| db.get_project(id)).await?;
    match project {
        Some(project) => Ok(Json(project)),
        None => Err(ApiError::NotFound(format!("project {} not found", id))),
    }
}

async fn delete_project(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.call(move |db| db.delete_project(id)).await?;
    state.publish(BoardEvent::ProjectListUpdated);
    Ok(StatusCode::NO_CONTENT)
}

async fn get_board(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.db.call(move |db| db.board_view(id)).await?;
    Ok(Json(view))
}

async fn list_tags(
    State(state): State<SharedState>,
    Path(project_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let tags = state.db.call(move |db| db.list_tags(project_id)).await?;
    Ok(Json(tags))
}

async fn create_tag(
    State(state): State<SharedState>,
    Path(project_id): Path<i64>,
    Json(req): Json<CreateTagRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tag = state
        .db
        .call(move |db| db.create_tag(project_id, &req.name, req.color.as_deref()))
        .await?;
    state.publish(BoardEvent::TagsUpdated { project_id });
    Ok((StatusCode::CREATED, Json(tag)))
}

async fn delete_tag(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let tag = state.db.call(move |db| db.delete_tag(id)).await?;
    state.publish(BoardEvent::TagsUpdated {
        project_id: tag.project_id,
    });
    Ok(StatusCode::NO_CONTENT)
}

async fn create_column(
    State(state): State<SharedState>,
    Path(board_id): Path<i64>,
    Json(req): Json<CreateColumnRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (column, columns) = state
        .db
        .call(move |db| {
            let column = db.create_column(board_id, &req.name)?;
            Ok((column, db.list_columns(board_id)?))
        })
        .await?;
    state.publish(BoardEvent::ColumnsUpdated { board_id, columns });
    Ok((StatusCode::CREATED, Json(column)))
}

async fn delete_column(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let (board_id, columns) = state
        .db
        .call(move |db| {
            let removed = db.delete_column(id)?;
            Ok((removed.board_id, db.list_columns(removed.board_id)?))
        })
        .await?;
    state.publish(BoardEvent::ColumnsUpdated { board_id, columns });
    Ok(StatusCode::NO_CONTENT)
}

async fn move_column(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(req): Json<MoveColumnRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let columns = state
        .db
        .call(move |db| db.move_column(id, req.position))
        .await?;
    if let Some(first) = columns.first() {
        state.publish(BoardEvent::ColumnsUpdated {
            board_id: first.board_id,
            columns: columns.clone(),
        });
    }
    Ok(Json(columns))
}

async fn create_task(
    State(state): State<SharedState>,
    Path(column_id): Path<i64>,
    Json(req): Json<NewTask>,
) -> Result<impl IntoResponse, ApiError> {
    let task = state.db.call(move |db| db.create_task(column_id, req)).await?;
    state.publish(BoardEvent::TaskCreated { task: task.clone() });
    Ok((StatusCode::CREATED, Json(task)))
}

async fn get_task(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state.db.call(move |db| db.task_detail(id)).await?;
    match detail {
        Some(detail) => Ok(Json(detail)),
        None => Err(ApiError::NotFound(format!("task {} not found", id))),
    }
}

async fn update_task(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(req): Json<TaskUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let task = state
        .db
        .call(move |db| db.update_task_details(id, req))
        .await?;
    state.publish(BoardEvent::TaskUpdated { task: task.clone() });
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let task = state.db.call(move |db| db.delete_task(id)).await?;
    state.publish(BoardEvent::TaskDeleted {
        task_id: task.id,
        column_id: task.column_id,
    });
    Ok(StatusCode::NO_CONTENT)
}

async fn move_task(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(req): Json<MoveTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (from_column, task) = state
        .db
        .call(move |db| {
            // Read the origin under the same lock as the move.
            let from_column = db
                .get_task(id)?
                .ok_or_else(|| BoardError::not_found(crate::errors::Entity::Task, id))?
                .column_id;
            let task = db.move_task(id, req.column_id, req.position)?;
            Ok((from_column, task))
        })
        .await?;
    state.publish(BoardEvent::TaskMoved {
        task: task.clone(),
        from_column,
    });
    Ok(Json(task))
}

async fn assign_task(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(req): Json<AssignTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (changed, task) = state
        .db
        .call(move |db| {
            let changed = db.assign_task(id, req.user_id)?;
            let task = db
                .get_task(id)?
                .ok_or_else(|| BoardError::not_found(crate::errors::Entity::Task, id))?;
            Ok((changed, task))
        })
        .await?;
    if changed {
        state.publish(BoardEvent::TaskUpdated { task: task.clone() });
    }
    Ok(Json(task))
}

async fn set_task_tags(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(req): Json<SetTagsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let task = state
        .db
        .call(move |db| db.set_task_tags(id, &req.tag_ids))
        .await?;
    state.publish(BoardEvent::TaskUpdated { task: task.clone() });
    Ok(Json(task))
}

async fn list_users(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let users = state.db.call(|db| db.list_users()).await?;
    Ok(Json(users))
}

async fn create_user(
    State(state): State<SharedState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.db.call(move |db| db.create_user(&req.username)).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn test_state() -> SharedState {
        let db = BoardDb::new_in_memory().unwrap();
        Arc::new(AppState::new(DbHandle::new(db)))
    }

    fn test_app() -> Router {
        api_router().with_state(test_state())
    }

    async fn body_json<T: serde::de::DeserializeOwned>(body: Body) -> T {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    /// Send a request and return status plus JSON body (`Null` when empty).
    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    /// Create a project and return `(project_id, board_id, column ids)`.
    async fn seed_board(app: &Router) -> (i64, i64, Vec<i64>) {
        let (_, project) = send(
            app,
            json_request("POST", "/api/projects", json!({"name": "api"})),
        )
        .await;
        let project_id = project["id"].as_i64().unwrap();
        let (_, view) = send(
            app,
            empty_request("GET", &format!("/api/projects/{project_id}/board")),
        )
        .await;
        let board_id = view["board"]["id"].as_i64().unwrap();
        let columns = view["columns"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["id"].as_i64().unwrap())
            .collect();
        (project_id, board_id, columns)
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = test_app();
        let response = app.oneshot(empty_request("GET", "/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_list_projects_empty() {
        let app = test_app();
        let response = app
            .oneshot(empty_request("GET", "/api/projects"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let projects: Vec<Value> = body_json(response.into_body()).await;
        assert!(projects.is_empty());
    }

    #[tokio::test]
    async fn test_create_and_get_project() {
        let app = test_app();
        let (status, project) = send(
            &app,
            json_request("POST", "/api/projects", json!({"name": "my-project"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(project["name"], "my-project");
        assert_eq!(project["next_task_id"], 1);

        let id = project["id"].as_i64().unwrap();
        let (status, fetched) = send(&app, empty_request("GET", &format!("/api/projects/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["id"], id);
    }

    #[tokio::test]
    async fn test_blank_project_name_is_bad_request() {
        let app = test_app();
        let (status, body) = send(
            &app,
            json_request("POST", "/api/projects", json!({"name": ""})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("must not be empty"));
    }

    #[tokio::test]
    async fn test_deleted_project_disappears() {
        let app = test_app();
        let (project_id, _, _) = seed_board(&app).await;

        let (status, _) = send(
            &app,
            empty_request("DELETE", &format!("/api/projects/{project_id}")),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(
            &app,
            empty_request("GET", &format!("/api/projects/{project_id}/board")),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (_, projects) = send(&app, empty_request("GET", "/api/projects")).await;
        assert!(projects.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_board_view_has_default_columns() {
        let app = test_app();
        let (_, _, columns) = seed_board(&app).await;
        assert_eq!(columns.len(), 3);
    }

    #[tokio::test]
    async fn test_column_lifecycle() {
        let app = test_app();
        let (_, board_id, columns) = seed_board(&app).await;

        let (status, column) = send(
            &app,
            json_request(
                "POST",
                &format!("/api/boards/{board_id}/columns"),
                json!({"name": "Review"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(column["position"], 3);

        let (status, reordered) = send(
            &app,
            json_request(
                "POST",
                &format!("/api/columns/{}/move", columns[2]),
                json!({"position": 0}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = reordered
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Done", "To Do", "In Progress", "Review"]);

        let (status, _) = send(
            &app,
            empty_request("DELETE", &format!("/api/columns/{}", columns[0])),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(
            &app,
            empty_request("DELETE", &format!("/api/columns/{}", columns[0])),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_task_and_get_detail() {
        let app = test_app();
        let (project_id, _, columns) = seed_board(&app).await;
        let (_, tag) = send(
            &app,
            json_request(
                "POST",
                &format!("/api/projects/{project_id}/tags"),
                json!({"name": "bug"}),
            ),
        )
        .await;
        assert_eq!(tag["color"], "#3b82f6");

        let (status, task) = send(
            &app,
            json_request(
                "POST",
                &format!("/api/columns/{}/tasks", columns[0]),
                json!({"title": "First", "description": "d", "tag_ids": [tag["id"]]}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(task["project_task_id"], 1);
        assert_eq!(task["position"], 0);

        let task_id = task["id"].as_i64().unwrap();
        let (status, detail) = send(&app, empty_request("GET", &format!("/api/tasks/{task_id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["title"], "First");
        assert_eq!(detail["tags"][0]["name"], "bug");
        assert_eq!(detail["status_history"].as_array().unwrap().len(), 1);
        assert!(detail["status_history"][0]["old_column_id"].is_null());
    }

    #[tokio::test]
    async fn test_update_task_details() {
        let app = test_app();
        let (_, _, columns) = seed_board(&app).await;
        let (_, task) = send(
            &app,
            json_request(
                "POST",
                &format!("/api/columns/{}/tasks", columns[0]),
                json!({"title": "Old", "description": "keep"}),
            ),
        )
        .await;

        let (status, updated) = send(
            &app,
            json_request(
                "PATCH",
                &format!("/api/tasks/{}", task["id"]),
                json!({"title": "New"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["title"], "New");
        assert_eq!(updated["description"], "keep");
    }

    #[tokio::test]
    async fn test_move_unassigned_task_across_columns_is_bad_request() {
        let app = test_app();
        let (_, _, columns) = seed_board(&app).await;
        let (_, task) = send(
            &app,
            json_request(
                "POST",
                &format!("/api/columns/{}/tasks", columns[0]),
                json!({"title": "Stuck"}),
            ),
        )
        .await;

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                &format!("/api/tasks/{}/move", task["id"]),
                json!({"column_id": columns[1], "position": 0}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "unassigned tasks cannot change status");
    }

    #[tokio::test]
    async fn test_move_missing_task_is_not_found() {
        let app = test_app();
        let (_, _, columns) = seed_board(&app).await;

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/api/tasks/999/move",
                json!({"column_id": columns[0], "position": 0}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "task 999 not found");
    }

    #[tokio::test]
    async fn test_assign_then_move_across_columns() {
        let app = test_app();
        let (_, _, columns) = seed_board(&app).await;
        let (status, user) = send(
            &app,
            json_request("POST", "/api/users", json!({"username": "ada"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let (_, task) = send(
            &app,
            json_request(
                "POST",
                &format!("/api/columns/{}/tasks", columns[0]),
                json!({"title": "Ship"}),
            ),
        )
        .await;
        let task_id = task["id"].as_i64().unwrap();

        let (status, assigned) = send(
            &app,
            json_request(
                "POST",
                &format!("/api/tasks/{task_id}/assign"),
                json!({"user_id": user["id"]}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(assigned["assignee_id"], user["id"]);

        let (status, moved) = send(
            &app,
            json_request(
                "POST",
                &format!("/api/tasks/{task_id}/move"),
                json!({"column_id": columns[1], "position": 0}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(moved["column_id"], columns[1]);

        let (_, detail) = send(&app, empty_request("GET", &format!("/api/tasks/{task_id}"))).await;
        assert_eq!(detail["status_history"].as_array().unwrap().len(), 2);
        assert_eq!(detail["assignment_history"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_assign_unknown_user_is_not_found() {
        let app = test_app();
        let (_, _, columns) = seed_board(&app).await;
        let (_, task) = send(
            &app,
            json_request(
                "POST",
                &format!("/api/columns/{}/tasks", columns[0]),
                json!({"title": "Nobody"}),
            ),
        )
        .await;

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                &format!("/api/tasks/{}/assign", task["id"]),
                json!({"user_id": 77}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "user 77 not found");
    }

    #[tokio::test]
    async fn test_set_tags_and_delete_tag() {
        let app = test_app();
        let (project_id, _, columns) = seed_board(&app).await;
        let (_, tag) = send(
            &app,
            json_request(
                "POST",
                &format!("/api/projects/{project_id}/tags"),
                json!({"name": "ui", "color": "#ff0000"}),
            ),
        )
        .await;
        let (_, task) = send(
            &app,
            json_request(
                "POST",
                &format!("/api/columns/{}/tasks", columns[0]),
                json!({"title": "Tag me"}),
            ),
        )
        .await;

        let (status, tagged) = send(
            &app,
            json_request(
                "PUT",
                &format!("/api/tasks/{}/tags", task["id"]),
                json!({"tag_ids": [tag["id"]]}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(tagged["tag_ids"], json!([tag["id"]]));

        let (status, _) = send(
            &app,
            empty_request("DELETE", &format!("/api/tags/{}", tag["id"])),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, tags) = send(
            &app,
            empty_request("GET", &format!("/api/projects/{project_id}/tags")),
        )
        .await;
        assert!(tags.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_task_then_get_is_not_found() {
        let app = test_app();
        let (_, _, columns) = seed_board(&app).await;
        let (_, task) = send(
            &app,
            json_request(
                "POST",
                &format!("/api/columns/{}/tasks", columns[0]),
                json!({"title": "Short-lived"}),
            ),
        )
        .await;

        let (status, _) = send(
            &app,
            empty_request("DELETE", &format!("/api/tasks/{}", task["id"])),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, empty_request("GET", &format!("/api/tasks/{}", task["id"]))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_task_broadcasts_event() {
        let state = test_state();
        let mut rx = state.events_tx.subscribe();
        let app = api_router().with_state(state);
        let (_, _, columns) = seed_board(&app).await;

        // Drain ProjectListUpdated.
        let first: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(first["type"], "ProjectListUpdated");

        send(
            &app,
            json_request(
                "POST",
                &format!("/api/columns/{}/tasks", columns[0]),
                json!({"title": "Broadcast me"}),
            ),
        )
        .await;

        let msg: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(msg["type"], "TaskCreated");
        assert_eq!(msg["data"]["task"]["title"], "Broadcast me");
    }

    #[test]
    fn test_board_errors_map_to_api_errors() {
        use crate::errors::Entity;

        assert!(matches!(
            ApiError::from(BoardError::not_found(Entity::Task, 1)),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from(BoardError::validation("bad")),
            ApiError::BadRequest(msg) if msg == "bad"
        ));
        assert!(matches!(
            ApiError::from(BoardError::Conflict {
                operation: "move_task",
                attempts: 3
            }),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            ApiError::from(BoardError::LockPoisoned),
            ApiError::Internal(_)
        ));
        assert_eq!(
            ApiError::Conflict("x".into()).into_response().status(),
            StatusCode::CONFLICT
        );
    }
}
