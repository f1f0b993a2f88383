use serde::Deserialize;

use super::catalog::lenient;
use super::datetime::{display, parse_iso_datetime};
use super::{non_empty, require_user, Param, ParamKind, Tool, ToolError};
use crate::store::{NewAssignment, Priority, Store, UserId};

const DEFAULT_ESTIMATED_HOURS: u32 = 2;

/// Adds an assignment to one of the caller's courses, found by code.
pub struct AddAssignment;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddAssignmentArgs {
    #[serde(deserialize_with = "lenient::string")]
    pub course_code: String,
    #[serde(deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(deserialize_with = "lenient::string")]
    pub due_date: String,
    #[serde(default = "default_priority", deserialize_with = "lenient::string")]
    pub priority: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: String,
}

fn default_priority() -> String {
    Priority::default().to_string()
}

/// Unrecognized priorities fall back to the default instead of failing.
pub fn normalize_priority(raw: &str) -> Priority {
    raw.to_lowercase().parse().unwrap_or_default()
}

impl Tool for AddAssignment {
    type Args = AddAssignmentArgs;

    const NAME: &'static str = "add_assignment";
    const DESCRIPTION: &'static str = "Add an assignment to one of the user's courses.";
    const ACTION: &'static str = "add the assignment";
    const PARAMS: &'static [Param] = &[
        Param::required("course_code", ParamKind::String, "The code of the course."),
        Param::required("title", ParamKind::String, "The title of the assignment."),
        Param::required(
            "due_date",
            ParamKind::String,
            "The due date in ISO format (YYYY-MM-DDTHH:MM:SS).",
        ),
        Param::optional(
            "priority",
            ParamKind::String,
            "The priority level (low, medium, high, urgent). Defaults to medium.",
        ),
        Param::optional("description", ParamKind::String, "A description of the assignment."),
    ];

    fn run(&self, store: &Store, user: UserId, args: AddAssignmentArgs) -> Result<String, ToolError> {
        const ACTION: &str = "adding assignment";
        require_user(store, user, ACTION)?;

        let course = store
            .find_course_by_code(user, &args.course_code)
            .map_err(ToolError::storage(ACTION))?
            .ok_or_else(|| ToolError::CourseNotFound(args.course_code.clone()))?;
        let due_date = parse_iso_datetime(&args.due_date).ok_or(ToolError::InvalidDate)?;

        let assignment = NewAssignment {
            course_id: course.id,
            title: args.title,
            description: non_empty(args.description),
            due_date,
            priority: normalize_priority(&args.priority),
            estimated_hours: DEFAULT_ESTIMATED_HOURS,
        };
        let created = store
            .create_assignment(&assignment)
            .map_err(ToolError::storage(ACTION))?;

        Ok(format!(
            "✅ Successfully added assignment '{}' to {} due on {}! 📝",
            created.title,
            course.name,
            display(created.due_date)
        ))
    }
}
