use serde::Deserialize;

use super::catalog::lenient;
use super::{require_user, Param, ParamKind, Tool, ToolError};
use crate::store::{NewCourse, Store, StoreError, UserId, DEFAULT_COURSE_COLOR, DEFAULT_COURSE_CREDITS};

const STORE_ACTION: &str = "adding course";

/// Adds a course to the caller's course list.
pub struct AddNewCourse;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddNewCourseArgs {
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub code: String,
    #[serde(deserialize_with = "lenient::string")]
    pub instructor: String,
}

impl Tool for AddNewCourse {
    type Args = AddNewCourseArgs;

    const NAME: &'static str = "add_new_course";
    const DESCRIPTION: &'static str =
        "Add a new course to the user's course list with its name, course code and instructor.";
    const ACTION: &'static str = "add the course";
    const PARAMS: &'static [Param] = &[
        Param::required("name", ParamKind::String, "The name of the course."),
        Param::required("code", ParamKind::String, "The course code, e.g. MATH301."),
        Param::required("instructor", ParamKind::String, "The name of the instructor."),
    ];

    fn run(&self, store: &Store, user: UserId, args: AddNewCourseArgs) -> Result<String, ToolError> {
        require_user(store, user, STORE_ACTION)?;

        if store
            .course_code_exists(user, &args.code)
            .map_err(ToolError::storage(STORE_ACTION))?
        {
            return Err(ToolError::DuplicateCourse(args.code));
        }

        let course = NewCourse {
            name: args.name,
            code: Some(args.code),
            instructor: Some(args.instructor),
            credits: DEFAULT_COURSE_CREDITS,
            color: DEFAULT_COURSE_COLOR.to_string(),
        };

        let created = store
            .create_course(user, &course)
            .map_err(|err| creation_error(err, course.code.as_deref().unwrap_or_default()))?;

        Ok(format!(
            "✅ Successfully added the course '{}' ({}) taught by {} to your list! 🎓",
            created.name,
            created.code.as_deref().unwrap_or_default(),
            created.instructor.as_deref().unwrap_or_default()
        ))
    }
}

/// A UNIQUE(user, code) violation means another request won the race past
/// the pre-check.
fn creation_error(err: StoreError, code: &str) -> ToolError {
    match err {
        StoreError::Conflict { .. } => ToolError::DuplicateCourse(code.to_string()),
        other => ToolError::storage(STORE_ACTION)(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::store_with_user;

    fn args(name: &str, code: &str, instructor: &str) -> AddNewCourseArgs {
        AddNewCourseArgs {
            name: name.to_string(),
            code: code.to_string(),
            instructor: instructor.to_string(),
        }
    }

    #[test]
    fn test_creates_course_with_defaults() {
        let (store, user) = store_with_user("ada");
        let reply = AddNewCourse
            .run(&store, user, args("Advanced Mathematics", "MATH301", "Dr. Smith"))
            .unwrap();
        assert_eq!(
            reply,
            "✅ Successfully added the course 'Advanced Mathematics' (MATH301) taught by Dr. Smith to your list! 🎓"
        );

        let courses = store.list_courses(user).unwrap();
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].credits, 3);
        assert_eq!(courses[0].color, "#007bff");
        assert_eq!(courses[0].instructor.as_deref(), Some("Dr. Smith"));
    }

    #[test]
    fn test_duplicate_code_is_reported_not_created() {
        let (store, user) = store_with_user("ada");
        AddNewCourse
            .run(&store, user, args("Math", "MATH301", "Dr. Smith"))
            .unwrap();
        let err = AddNewCourse
            .run(&store, user, args("Other Math", "MATH301", "Dr. Jones"))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "❌ A course with code 'MATH301' already exists. Please use a different code."
        );
        assert_eq!(store.list_courses(user).unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_user_is_reported() {
        let (store, _) = store_with_user("ada");
        let err = AddNewCourse
            .run(&store, UserId(404), args("Math", "MATH301", "Dr. Smith"))
            .unwrap_err();
        assert!(matches!(err, ToolError::UserNotFound));
    }

    #[test]
    fn test_constraint_conflict_maps_to_duplicate_text() {
        let (store, user) = store_with_user("ada");
        AddNewCourse
            .run(&store, user, args("Math", "MATH301", "Dr. Smith"))
            .unwrap();

        // Insert past the pre-check, as a concurrent request would.
        let course = NewCourse {
            name: "Other Math".to_string(),
            code: Some("MATH301".to_string()),
            instructor: Some("Dr. Jones".to_string()),
            credits: DEFAULT_COURSE_CREDITS,
            color: DEFAULT_COURSE_COLOR.to_string(),
        };
        let err = store.create_course(user, &course).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        let err = creation_error(err, "MATH301");
        assert_eq!(
            err.to_string(),
            "❌ A course with code 'MATH301' already exists. Please use a different code."
        );
        assert_eq!(store.list_courses(user).unwrap().len(), 1);
    }

    #[test]
    fn test_other_creation_failures_stay_storage_errors() {
        let err = creation_error(StoreError::NotFound("user"), "MATH301");
        assert!(matches!(err, ToolError::Storage { action: "adding course", .. }));
        assert_eq!(err.to_string(), "❌ Error adding course: user not found");
    }
}
