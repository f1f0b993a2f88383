use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use super::datetime::{display, DISPLAY_DATE_FORMAT};
use super::{require_user, truncate, Param, Tool, ToolError};
use crate::store::{EventType, ExamType, Priority, Store, UserId};

const RECENT_ATTENDANCE_LIMIT: u32 = 5;
const UPCOMING_EVENT_DAYS: i64 = 14;
const SNIPPET_CHARS: usize = 100;

/// Read-only overview of everything the caller has planned.
pub struct AcademicSummary;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AcademicSummaryArgs {}

impl Tool for AcademicSummary {
    type Args = AcademicSummaryArgs;

    const NAME: &'static str = "get_academic_summary";
    const DESCRIPTION: &'static str =
        "Get an overview of the user's courses, assignments, exams, recent attendance and upcoming events.";
    const ACTION: &'static str = "get your academic summary";
    const PARAMS: &'static [Param] = &[];

    fn run(&self, store: &Store, user: UserId, _args: AcademicSummaryArgs) -> Result<String, ToolError> {
        compose_summary(store, user, Utc::now())
    }
}

fn priority_emoji(priority: Priority) -> &'static str {
    match priority {
        Priority::Low => "🟢",
        Priority::Medium => "🟡",
        Priority::High => "🟠",
        Priority::Urgent => "🔴",
    }
}

fn exam_type_emoji(exam_type: ExamType) -> &'static str {
    match exam_type {
        ExamType::Midterm => "📝",
        ExamType::Final => "🏆",
        ExamType::Quiz => "✏️",
        ExamType::Project => "📊",
        ExamType::Presentation => "🎤",
    }
}

fn event_type_emoji(event_type: EventType) -> &'static str {
    match event_type {
        EventType::Personal => "👤",
        EventType::Academic => "🎓",
        EventType::Social => "👥",
        EventType::Other => "📅",
    }
}

/// Builds the summary text as of `now`.
///
/// Sections appear in a fixed order: courses, assignments by due date,
/// exams by date, the latest attendance records, then events starting in
/// the next two weeks. Empty sections are left out.
pub fn compose_summary(store: &Store, user: UserId, now: DateTime<Utc>) -> Result<String, ToolError> {
    let user = match require_user(store, user, "retrieving your academic data") {
        Ok(user) => user.id,
        Err(ToolError::Storage { source, .. }) => return Err(ToolError::Summary(source)),
        Err(other) => return Err(other),
    };

    let courses = store.list_courses(user).map_err(ToolError::Summary)?;
    let mut summary = String::from("Here is your current academic data:\n\n");

    if courses.is_empty() {
        summary.push_str("📚 **No courses found.** You can add courses by saying something like:\n");
        summary.push_str(
            "- 'Add a course called Advanced Mathematics with code MATH301 taught by Dr. Smith'\n",
        );
        summary.push_str("- 'I want to add Computer Science 101 taught by Professor Johnson'\n\n");
        return Ok(summary);
    }

    summary.push_str("📚 **My Courses:**\n");
    for course in &courses {
        summary.push_str(&format!(
            "- **{}** ({})\n",
            course.name,
            course.code.as_deref().unwrap_or("no code")
        ));
        summary.push_str(&format!(
            "  👨‍🏫 Instructor: {}\n",
            course.instructor.as_deref().unwrap_or("Not specified")
        ));
        summary.push_str(&format!("  🎓 Credits: {}\n\n", course.credits));
    }

    let assignments = store.list_assignments(user).map_err(ToolError::Summary)?;
    if !assignments.is_empty() {
        summary.push_str("📝 **My Assignments:**\n");
        for assignment in &assignments {
            let status = if assignment.completed {
                "✅ Completed"
            } else {
                "⏰ Pending"
            };
            summary.push_str(&format!(
                "- **{}** ({} {})\n",
                assignment.title,
                priority_emoji(assignment.priority),
                assignment.priority.label()
            ));
            summary.push_str(&format!("  📚 Course: {}\n", assignment.course.name));
            summary.push_str(&format!("  📅 Due: {}\n", display(assignment.due_date)));
            summary.push_str(&format!("  ⏱️ Status: {}\n", status));
            if let Some(description) = assignment.description.as_deref().filter(|d| !d.is_empty()) {
                summary.push_str(&format!(
                    "  📄 Description: {}\n",
                    truncate(description, SNIPPET_CHARS)
                ));
            }
            summary.push('\n');
        }
    }

    let exams = store.list_exams(user).map_err(ToolError::Summary)?;
    if !exams.is_empty() {
        summary.push_str("📋 **My Exams:**\n");
        for exam in &exams {
            summary.push_str(&format!(
                "- **{}** ({} {})\n",
                exam.title,
                exam_type_emoji(exam.exam_type),
                exam.exam_type.label()
            ));
            summary.push_str(&format!("  📚 Course: {}\n", exam.course.name));
            summary.push_str(&format!("  📅 Date: {}\n", display(exam.exam_date)));
            summary.push_str(&format!("  ⏱️ Duration: {} minutes\n", exam.duration));
            if let Some(location) = exam.location.as_deref().filter(|l| !l.is_empty()) {
                summary.push_str(&format!("  📍 Location: {}\n", location));
            }
            if let Some(notes) = exam.notes.as_deref().filter(|n| !n.is_empty()) {
                summary.push_str(&format!("  📄 Notes: {}\n", truncate(notes, SNIPPET_CHARS)));
            }
            summary.push('\n');
        }
    }

    let attendance = store
        .recent_attendance(user, RECENT_ATTENDANCE_LIMIT)
        .map_err(ToolError::Summary)?;
    if !attendance.is_empty() {
        summary.push_str("✅ **Recent Attendance:**\n");
        for record in &attendance {
            let status = if record.present {
                "✅ Present"
            } else {
                "❌ Absent"
            };
            summary.push_str(&format!(
                "- **{}** - {}: {}\n",
                record.course.name,
                record.date.format(DISPLAY_DATE_FORMAT),
                status
            ));
        }
        summary.push('\n');
    }

    let events = store
        .list_events_between(user, now, now + Duration::days(UPCOMING_EVENT_DAYS))
        .map_err(ToolError::Summary)?;
    if !events.is_empty() {
        summary.push_str("📅 **Upcoming Events (Next 14 Days):**\n");
        for event in &events {
            summary.push_str(&format!(
                "- **{}** ({})\n",
                event.title,
                event_type_emoji(event.event_type)
            ));
            summary.push_str(&format!("  📅 Date: {}\n", display(event.event_date)));
            if let Some(location) = event.location.as_deref().filter(|l| !l.is_empty()) {
                summary.push_str(&format!("  📍 Location: {}\n", location));
            }
            if let Some(description) = event.description.as_deref().filter(|d| !d.is_empty()) {
                summary.push_str(&format!(
                    "  📄 Description: {}\n",
                    truncate(description, SNIPPET_CHARS)
                ));
            }
            summary.push('\n');
        }
    }

    Ok(summary)
}
