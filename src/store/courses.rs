use super::{now, Course, NewCourse, Store, StoreError, StoreResult, UserId};
use rusqlite::{params, OptionalExtension, Row};

const COURSE_COLUMNS: &str =
    "id, user_id, name, code, instructor, credits, color, created_at, updated_at";

fn course_from_row(row: &Row<'_>) -> rusqlite::Result<Course> {
    Ok(Course {
        id: row.get(0)?,
        user_id: UserId(row.get(1)?),
        name: row.get(2)?,
        code: row.get(3)?,
        instructor: row.get(4)?,
        credits: row.get(5)?,
        color: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

impl Store {
    /// Inserts a course for `user`.
    ///
    /// A second course with the same code for the same user fails with
    /// [`StoreError::Conflict`]; the check is the table's UNIQUE constraint,
    /// so concurrent inserts cannot both succeed.
    pub fn create_course(&self, user: UserId, course: &NewCourse) -> StoreResult<Course> {
        let conn = self.conn();
        let stamp = now();
        conn.execute(
            "INSERT INTO courses
                (user_id, name, code, instructor, credits, color, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                user.0,
                course.name,
                course.code,
                course.instructor,
                course.credits,
                course.color,
                stamp
            ],
        )
        .map_err(|err| {
            StoreError::from_constraint(
                err,
                "course",
                course.code.clone().unwrap_or_else(|| course.name.clone()),
            )
        })?;

        let created = Course {
            id: conn.last_insert_rowid(),
            user_id: user,
            name: course.name.clone(),
            code: course.code.clone(),
            instructor: course.instructor.clone(),
            credits: course.credits,
            color: course.color.clone(),
            created_at: stamp,
            updated_at: stamp,
        };
        log::info!(
            "Store: created course {} for user {}",
            created.id,
            created.user_id
        );
        Ok(created)
    }

    /// Looks a course up by code among `user`'s own courses only.
    pub fn find_course_by_code(&self, user: UserId, code: &str) -> StoreResult<Option<Course>> {
        let course = self
            .conn()
            .query_row(
                &format!("SELECT {COURSE_COLUMNS} FROM courses WHERE user_id = ?1 AND code = ?2"),
                params![user.0, code],
                course_from_row,
            )
            .optional()?;
        Ok(course)
    }

    pub fn course_code_exists(&self, user: UserId, code: &str) -> StoreResult<bool> {
        let exists = self.conn().query_row(
            "SELECT EXISTS(SELECT 1 FROM courses WHERE user_id = ?1 AND code = ?2)",
            params![user.0, code],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    pub fn get_course(&self, user: UserId, course_id: i64) -> StoreResult<Option<Course>> {
        let course = self
            .conn()
            .query_row(
                &format!("SELECT {COURSE_COLUMNS} FROM courses WHERE user_id = ?1 AND id = ?2"),
                params![user.0, course_id],
                course_from_row,
            )
            .optional()?;
        Ok(course)
    }

    /// All of `user`'s courses ordered by name.
    pub fn list_courses(&self, user: UserId) -> StoreResult<Vec<Course>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE user_id = ?1 ORDER BY name, id"
        ))?;
        let courses = stmt
            .query_map(params![user.0], course_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(courses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DEFAULT_COURSE_COLOR, DEFAULT_COURSE_CREDITS};

    fn new_course(name: &str, code: &str) -> NewCourse {
        NewCourse {
            name: name.to_string(),
            code: Some(code.to_string()),
            instructor: Some("Dr. Smith".to_string()),
            credits: DEFAULT_COURSE_CREDITS,
            color: DEFAULT_COURSE_COLOR.to_string(),
        }
    }

    #[test]
    fn test_course_codes_are_unique_per_user() {
        let store = Store::open_in_memory().unwrap();
        let ada = store.create_user("ada", "a").unwrap().id;
        let bob = store.create_user("bob", "b").unwrap().id;

        store.create_course(ada, &new_course("Math", "MATH301")).unwrap();
        let err = store
            .create_course(ada, &new_course("Math again", "MATH301"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { entity: "course", .. }));

        // Another user may reuse the code.
        store.create_course(bob, &new_course("Math", "MATH301")).unwrap();
        assert_eq!(store.list_courses(ada).unwrap().len(), 1);
    }

    #[test]
    fn test_course_lookup_is_scoped_to_owner() {
        let store = Store::open_in_memory().unwrap();
        let ada = store.create_user("ada", "a").unwrap().id;
        let bob = store.create_user("bob", "b").unwrap().id;
        let course = store.create_course(ada, &new_course("Math", "MATH301")).unwrap();

        assert!(store.find_course_by_code(ada, "MATH301").unwrap().is_some());
        assert!(store.find_course_by_code(bob, "MATH301").unwrap().is_none());
        assert!(store.course_code_exists(ada, "MATH301").unwrap());
        assert!(!store.course_code_exists(bob, "MATH301").unwrap());
        assert!(store.get_course(bob, course.id).unwrap().is_none());
    }

    #[test]
    fn test_courses_listed_by_name() {
        let store = Store::open_in_memory().unwrap();
        let ada = store.create_user("ada", "a").unwrap().id;
        store.create_course(ada, &new_course("Zoology", "ZOO1")).unwrap();
        store.create_course(ada, &new_course("Algebra", "ALG1")).unwrap();

        let names: Vec<String> = store
            .list_courses(ada)
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Algebra", "Zoology"]);
    }
}
