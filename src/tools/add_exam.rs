use serde::Deserialize;

use super::catalog::lenient;
use super::datetime::{display, parse_iso_datetime};
use super::{non_empty, require_user, Param, ParamKind, Tool, ToolError};
use crate::store::{ExamType, NewExam, Store, UserId};

const DEFAULT_DURATION_MINUTES: u32 = 120;

/// Schedules an exam in one of the caller's courses, found by code.
pub struct AddExam;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddExamArgs {
    #[serde(deserialize_with = "lenient::string")]
    pub course_code: String,
    #[serde(deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(deserialize_with = "lenient::string")]
    pub exam_date: String,
    #[serde(default = "default_exam_type", deserialize_with = "lenient::string")]
    pub exam_type: String,
    #[serde(default = "default_duration", deserialize_with = "lenient::minutes")]
    pub duration: u32,
    #[serde(default, deserialize_with = "lenient::string")]
    pub location: String,
}

fn default_exam_type() -> String {
    ExamType::default().to_string()
}

fn default_duration() -> u32 {
    DEFAULT_DURATION_MINUTES
}

/// Unrecognized exam types fall back to the default instead of failing.
pub fn normalize_exam_type(raw: &str) -> ExamType {
    raw.to_lowercase().parse().unwrap_or_default()
}

impl Tool for AddExam {
    type Args = AddExamArgs;

    const NAME: &'static str = "add_exam";
    const DESCRIPTION: &'static str = "Add an exam to one of the user's courses.";
    const ACTION: &'static str = "add the exam";
    const PARAMS: &'static [Param] = &[
        Param::required("course_code", ParamKind::String, "The code of the course."),
        Param::required("title", ParamKind::String, "The title of the exam."),
        Param::required(
            "exam_date",
            ParamKind::String,
            "The exam date in ISO format (YYYY-MM-DDTHH:MM:SS).",
        ),
        Param::optional(
            "exam_type",
            ParamKind::String,
            "The type of exam (midterm, final, quiz, project, presentation). Defaults to midterm.",
        ),
        Param::optional(
            "duration",
            ParamKind::Integer,
            "The duration in minutes. Defaults to 120.",
        ),
        Param::optional("location", ParamKind::String, "The exam location."),
    ];

    fn run(&self, store: &Store, user: UserId, args: AddExamArgs) -> Result<String, ToolError> {
        const ACTION: &str = "adding exam";
        require_user(store, user, ACTION)?;

        let course = store
            .find_course_by_code(user, &args.course_code)
            .map_err(ToolError::storage(ACTION))?
            .ok_or_else(|| ToolError::CourseNotFound(args.course_code.clone()))?;
        let exam_date = parse_iso_datetime(&args.exam_date).ok_or(ToolError::InvalidDate)?;

        let exam = NewExam {
            course_id: course.id,
            title: args.title,
            exam_type: normalize_exam_type(&args.exam_type),
            exam_date,
            duration: args.duration,
            location: non_empty(args.location),
            notes: None,
        };
        let created = store.create_exam(&exam).map_err(ToolError::storage(ACTION))?;

        Ok(format!(
            "✅ Successfully added {} exam '{}' for {} on {}! 📋",
            created.exam_type,
            created.title,
            course.name,
            display(created.exam_date)
        ))
    }
}
