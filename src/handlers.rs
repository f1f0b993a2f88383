use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

use crate::auth::{generate_token, AuthUser};
use crate::session::Assistant;
use crate::store::{
    Assignment, AssignmentUpdate, Attendance, CalendarEvent, Course, Exam, NewAttendance, Priority,
    Store, StoreError,
};
use crate::tools::datetime::parse_iso_datetime;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub assistant: Arc<Assistant>,
    pub max_message_chars: usize,
}

/// Errors returned to HTTP clients as `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Store(StoreError::Conflict { .. }) => StatusCode::CONFLICT,
            AppError::Store(StoreError::Invalid { .. }) => StatusCode::BAD_REQUEST,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("Internal error: {:?}", self);
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// `Json<T>` that reports malformed bodies as [`AppError::BadRequest`].
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(AppError::BadRequest(format!(
                "Invalid request body: {}",
                rejection.body_text()
            ))),
        }
    }
}

/// Every route except `/signup` and `/health` is scoped to the bearer token's user.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/signup", post(signup))
        .route("/chat/api", post(chat_api))
        .route("/dashboard", get(dashboard))
        .route("/calendar-data", get(calendar_data))
        .route(
            "/assignment/{id}",
            put(update_assignment).delete(delete_assignment),
        )
        .route("/assignment/{id}/toggle", post(toggle_assignment))
        .route("/course/{id}", get(course_detail))
        .route("/course/{id}/attendance", post(record_attendance))
        .layer(middleware::from_fn(access_log))
        .with_state(state)
}

async fn access_log(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let response = next.run(req).await;
    log::info!(
        "{} {} -> {} ({} ms)",
        method,
        path,
        response.status().as_u16(),
        start.elapsed().as_millis()
    );
    response
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let (status, http_status) = match state.store.ping() {
        Ok(()) => ("ok", StatusCode::OK),
        Err(e) => {
            log::warn!("Health check: database unavailable: {}", e);
            ("degraded", StatusCode::SERVICE_UNAVAILABLE)
        }
    };
    (
        http_status,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

#[derive(Deserialize)]
struct SignupRequest {
    username: String,
}

async fn signup(
    State(state): State<AppState>,
    AppJson(req): AppJson<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let username = req.username.trim();
    if username.is_empty() {
        return Err(AppError::BadRequest("Username is required".to_string()));
    }

    let (token, hash) = generate_token();
    let user = state.store.create_user(username, &hash).map_err(|e| match e {
        StoreError::Conflict { .. } => {
            AppError::Conflict(format!("Username '{}' is already taken", username))
        }
        other => other.into(),
    })?;
    log::info!("Signed up user {} ({})", user.id, user.username);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "user_id": user.id,
            "username": user.username,
            "token": token,
        })),
    ))
}

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: Option<String>,
}

async fn chat_api(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(req): AppJson<ChatRequest>,
) -> Result<Json<Value>, AppError> {
    let message = req
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("No message provided".to_string()))?;

    let length = message.chars().count();
    if length > state.max_message_chars {
        return Err(AppError::BadRequest(format!(
            "Message is too long ({} characters, limit {})",
            length, state.max_message_chars
        )));
    }

    log::info!(
        "Chat message from {} (user {}, {} chars)",
        user.username, user.id, length
    );
    let mut session = state.assistant.session(user.id);
    let response = session.submit(&message).await;

    Ok(Json(json!({ "response": response })))
}

#[derive(Serialize)]
struct Dashboard {
    courses: Vec<Course>,
    upcoming_assignments: Vec<Assignment>,
    overdue_assignments: Vec<Assignment>,
    upcoming_exams: Vec<Exam>,
    upcoming_events: Vec<CalendarEvent>,
}

async fn dashboard(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Dashboard>, AppError> {
    let now = Utc::now();
    let (overdue_assignments, upcoming_assignments): (Vec<_>, Vec<_>) = state
        .store
        .list_assignments(user.id)?
        .into_iter()
        .filter(|a| !a.completed)
        .partition(|a| a.is_overdue(now));

    let mut upcoming_exams = state.store.list_exams(user.id)?;
    upcoming_exams.retain(|e| e.exam_date >= now);
    let mut upcoming_events = state.store.list_events(user.id)?;
    upcoming_events.retain(|e| e.event_date >= now);

    Ok(Json(Dashboard {
        courses: state.store.list_courses(user.id)?,
        upcoming_assignments,
        overdue_assignments,
        upcoming_exams,
        upcoming_events,
    }))
}

async fn calendar_data(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Value>>, AppError> {
    let now = Utc::now();
    let mut items = Vec::new();

    for assignment in state.store.list_assignments(user.id)? {
        items.push(json!({
            "id": format!("assignment-{}", assignment.id),
            "title": format!("📝 {}", assignment.title),
            "start": assignment.due_date.to_rfc3339(),
            "color": assignment.course.color,
            "extendedProps": {
                "type": "assignment",
                "course": assignment.course.name,
                "priority": assignment.priority,
                "completed": assignment.completed,
                "overdue": assignment.is_overdue(now),
            }
        }));
    }

    for exam in state.store.list_exams(user.id)? {
        items.push(json!({
            "id": format!("exam-{}", exam.id),
            "title": format!("📋 {}", exam.title),
            "start": exam.exam_date.to_rfc3339(),
            "color": exam.course.color,
            "extendedProps": {
                "type": "exam",
                "course": exam.course.name,
                "exam_type": exam.exam_type,
            }
        }));
    }

    for event in state.store.list_events(user.id)? {
        items.push(json!({
            "id": format!("event-{}", event.id),
            "title": format!("🎉 {}", event.title),
            "start": event.event_date.to_rfc3339(),
            "end": event.end_date.map(|end| end.to_rfc3339()),
            "color": event.color,
            "extendedProps": {
                "type": "event",
                "event_type": event.event_type,
                "location": event.location,
            }
        }));
    }

    Ok(Json(items))
}

async fn toggle_assignment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let assignment = state
        .store
        .toggle_assignment_completion(user.id, id)
        .map_err(assignment_not_found)?;

    let status = if assignment.completed {
        "completed"
    } else {
        "marked as incomplete"
    };
    Ok(Json(json!({
        "success": true,
        "message": format!("Assignment {}", status),
        "completed": assignment.completed,
    })))
}

#[derive(Deserialize)]
struct AssignmentEditRequest {
    title: String,
    #[serde(default)]
    description: Option<String>,
    due_date: String,
    priority: String,
    estimated_hours: u32,
    #[serde(default)]
    completed: bool,
}

impl AssignmentEditRequest {
    fn into_update(self) -> Result<AssignmentUpdate, AppError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::BadRequest("Title is required".to_string()));
        }
        let due_date = parse_iso_datetime(&self.due_date).ok_or_else(|| {
            AppError::BadRequest(format!("Invalid due_date '{}'", self.due_date))
        })?;
        let priority = self
            .priority
            .parse::<Priority>()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        Ok(AssignmentUpdate {
            title,
            description: self.description.filter(|d| !d.trim().is_empty()),
            due_date,
            priority,
            estimated_hours: self.estimated_hours,
            completed: self.completed,
        })
    }
}

fn assignment_not_found(e: StoreError) -> AppError {
    match e {
        StoreError::NotFound(what) => AppError::NotFound(what),
        other => other.into(),
    }
}

async fn update_assignment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    AppJson(req): AppJson<AssignmentEditRequest>,
) -> Result<Json<Assignment>, AppError> {
    let update = req.into_update()?;
    let assignment = state
        .store
        .update_assignment(user.id, id, &update)
        .map_err(assignment_not_found)?;
    Ok(Json(assignment))
}

async fn delete_assignment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    state
        .store
        .delete_assignment(user.id, id)
        .map_err(assignment_not_found)?;
    Ok(Json(json!({
        "success": true,
        "message": "Assignment deleted successfully!",
    })))
}

#[derive(Serialize)]
struct CourseDetail {
    course: Course,
    assignments: Vec<Assignment>,
    exams: Vec<Exam>,
    attendance_records: Vec<Attendance>,
    attendance_percentage: f64,
    total_classes: u32,
    present_classes: u32,
}

fn owned_course(state: &AppState, user: &AuthUser, id: i64) -> Result<Course, AppError> {
    state
        .store
        .get_course(user.id, id)?
        .ok_or(AppError::NotFound("course"))
}

async fn course_detail(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<CourseDetail>, AppError> {
    let course = owned_course(&state, &user, id)?;
    let stats = state.store.attendance_stats(user.id, course.id)?;

    Ok(Json(CourseDetail {
        assignments: state.store.list_course_assignments(user.id, course.id)?,
        exams: state.store.list_course_exams(user.id, course.id)?,
        attendance_records: state.store.course_attendance(user.id, course.id)?,
        attendance_percentage: stats.percentage(),
        total_classes: stats.total_classes,
        present_classes: stats.present_classes,
        course,
    }))
}

fn default_present() -> bool {
    true
}

#[derive(Deserialize)]
struct AttendanceRequest {
    date: NaiveDate,
    #[serde(default = "default_present")]
    present: bool,
    #[serde(default)]
    notes: Option<String>,
}

async fn record_attendance(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    AppJson(req): AppJson<AttendanceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let course = owned_course(&state, &user, id)?;
    let record = state
        .store
        .record_attendance(&NewAttendance {
            course_id: course.id,
            date: req.date,
            present: req.present,
            notes: req.notes.filter(|n| !n.trim().is_empty()),
        })
        .map_err(|e| match e {
            StoreError::Conflict { .. } => AppError::Conflict(format!(
                "Attendance for {} on {} is already recorded",
                course.name, req.date
            )),
            other => other.into(),
        })?;

    Ok((StatusCode::CREATED, Json(record)))
}
