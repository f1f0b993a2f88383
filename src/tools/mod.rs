pub mod academic_summary;
pub mod add_assignment;
pub mod add_calendar_event;
pub mod add_exam;
pub mod add_new_course;
pub mod catalog;
pub mod datetime;

pub use academic_summary::AcademicSummary;
pub use add_assignment::AddAssignment;
pub use add_calendar_event::AddCalendarEvent;
pub use add_exam::AddExam;
pub use add_new_course::AddNewCourse;
pub use catalog::{ArgumentError, ToolCall, ToolCatalog, ToolDeclaration};

use crate::store::{Store, StoreError, User, UserId};
use serde::de::DeserializeOwned;

/// Tool trait for operations the assistant may request.
///
/// Not object-safe (associated types and consts). The catalog dispatches
/// through the closed [`ToolCall`] enum, never through `dyn Tool`.
pub trait Tool {
    /// Typed arguments decoded from the model's call payload.
    type Args: DeserializeOwned;

    const NAME: &'static str;
    /// Shown to the model so it can decide when to call the tool.
    const DESCRIPTION: &'static str;
    /// Completes "I need the ... to {ACTION}." in clarification replies.
    const ACTION: &'static str;
    const PARAMS: &'static [Param];

    /// Runs against `user`'s data. Failures come back as [`ToolError`], whose
    /// text is what the user ultimately sees.
    fn run(&self, store: &Store, user: UserId, args: Self::Args) -> Result<String, ToolError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
}

impl ParamKind {
    pub fn json_type(&self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
        }
    }
}

/// One argument of a tool's schema.
#[derive(Debug, Clone, Copy)]
pub struct Param {
    pub name: &'static str,
    pub kind: ParamKind,
    pub description: &'static str,
    pub required: bool,
}

impl Param {
    pub const fn required(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            description,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            description,
            required: false,
        }
    }
}

/// Reported failures of a tool run. The `Display` text of each variant is
/// the message handed back to the model.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("❌ User not found. Please make sure you're logged in.")]
    UserNotFound,

    #[error("❌ Course with code '{0}' not found. Please check the course code or add the course first.")]
    CourseNotFound(String),

    #[error("❌ A course with code '{0}' already exists. Please use a different code.")]
    DuplicateCourse(String),

    #[error("❌ Invalid date format. Please use YYYY-MM-DDTHH:MM:SS format.")]
    InvalidDate,

    #[error("❌ Error retrieving your academic data: {0}\n\nPlease try again or contact support if the problem persists.")]
    Summary(StoreError),

    #[error("❌ Error {action}: {source}")]
    Storage {
        action: &'static str,
        source: StoreError,
    },
}

impl ToolError {
    fn storage(action: &'static str) -> impl FnOnce(StoreError) -> ToolError {
        move |source| ToolError::Storage { action, source }
    }
}

/// Resolves the caller's identity before any tool touches their data.
fn require_user(store: &Store, user: UserId, action: &'static str) -> Result<User, ToolError> {
    store
        .get_user(user)
        .map_err(ToolError::storage(action))?
        .ok_or(ToolError::UserNotFound)
}

/// Shortens free text to `max` characters, marking the cut with "...".
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Empty optional text is stored as absent.
fn non_empty(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}
