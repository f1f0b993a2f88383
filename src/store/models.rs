use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Color used for courses created without an explicit one.
pub const DEFAULT_COURSE_COLOR: &str = "#007bff";
/// Color used for calendar events created without an explicit one.
pub const DEFAULT_EVENT_COLOR: &str = "#28a745";
pub const DEFAULT_COURSE_CREDITS: u32 = 3;

/// Identity of an authenticated planner user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Course {
    pub id: i64,
    pub user_id: UserId,
    pub name: String,
    pub code: Option<String>,
    pub instructor: Option<String>,
    pub credits: u32,
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCourse {
    pub name: String,
    pub code: Option<String>,
    pub instructor: Option<String>,
    pub credits: u32,
    pub color: String,
}

/// The parts of the owning course carried along with coursework rows.
#[derive(Debug, Clone, Serialize)]
pub struct CourseRef {
    pub id: i64,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Assignment {
    pub id: i64,
    pub course: CourseRef,
    pub title: String,
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    pub priority: Priority,
    pub completed: bool,
    pub estimated_hours: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Assignment {
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.due_date < now && !self.completed
    }
}

#[derive(Debug, Clone)]
pub struct NewAssignment {
    pub course_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    pub priority: Priority,
    pub estimated_hours: u32,
}

/// Full replacement of an assignment's editable fields.
#[derive(Debug, Clone)]
pub struct AssignmentUpdate {
    pub title: String,
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    pub priority: Priority,
    pub estimated_hours: u32,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Exam {
    pub id: i64,
    pub course: CourseRef,
    pub title: String,
    pub exam_type: ExamType,
    pub exam_date: DateTime<Utc>,
    pub duration: u32,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewExam {
    pub course_id: i64,
    pub title: String,
    pub exam_type: ExamType,
    pub exam_date: DateTime<Utc>,
    pub duration: u32,
    pub location: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Attendance {
    pub id: i64,
    pub course: CourseRef,
    pub date: NaiveDate,
    pub present: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAttendance {
    pub course_id: i64,
    pub date: NaiveDate,
    pub present: bool,
    pub notes: Option<String>,
}

/// Attendance totals for a single course.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AttendanceStats {
    pub total_classes: u32,
    pub present_classes: u32,
}

impl AttendanceStats {
    /// Share of attended classes in percent, rounded to one decimal place.
    pub fn percentage(&self) -> f64 {
        if self.total_classes == 0 {
            return 0.0;
        }
        let raw = f64::from(self.present_classes) / f64::from(self.total_classes) * 100.0;
        (raw * 10.0).round() / 10.0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarEvent {
    pub id: i64,
    pub user_id: UserId,
    pub title: String,
    pub event_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub event_type: EventType,
    pub location: Option<String>,
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCalendarEvent {
    pub title: String,
    pub event_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub event_type: EventType,
    pub location: Option<String>,
    pub color: String,
}

impl NewCalendarEvent {
    /// Rejects events whose end is not strictly after their start.
    pub fn validate(&self) -> Result<(), String> {
        match self.end_date {
            Some(end) if end <= self.event_date => Err(format!(
                "event end {} must be after its start {}",
                end.to_rfc3339(),
                self.event_date.to_rfc3339()
            )),
            _ => Ok(()),
        }
    }
}

/// Error for enum values that are not part of a closed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal, default = $default:ident,
        { $($variant:ident => ($text:literal, $label:literal)),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            /// Title-cased name for display.
            pub fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let text = value.as_str()?;
                text.parse().map_err(|err| FromSqlError::Other(Box::new(err)))
            }
        }
    };
}

text_enum!(
    /// Assignment urgency.
    Priority, "priority", default = Medium,
    {
        Low => ("low", "Low"),
        Medium => ("medium", "Medium"),
        High => ("high", "High"),
        Urgent => ("urgent", "Urgent"),
    }
);

text_enum!(
    ExamType, "exam type", default = Midterm,
    {
        Midterm => ("midterm", "Midterm"),
        Final => ("final", "Final"),
        Quiz => ("quiz", "Quiz"),
        Project => ("project", "Project"),
        Presentation => ("presentation", "Presentation"),
    }
);

text_enum!(
    EventType, "event type", default = Personal,
    {
        Personal => ("personal", "Personal"),
        Academic => ("academic", "Academic"),
        Social => ("social", "Social"),
        Other => ("other", "Other"),
    }
);
