use super::{
    now, stamp, Assignment, AssignmentUpdate, CourseRef, Exam, NewAssignment, NewExam, Store, StoreError,
    StoreResult, UserId,
};
use rusqlite::{params, OptionalExtension, Row};

const ASSIGNMENT_SELECT: &str = "SELECT
    a.id, c.id, c.name, c.color,
    a.title, a.description, a.due_date, a.priority, a.completed, a.estimated_hours,
    a.created_at, a.updated_at
FROM assignments a
JOIN courses c ON c.id = a.course_id";

const EXAM_SELECT: &str = "SELECT
    e.id, c.id, c.name, c.color,
    e.title, e.exam_type, e.exam_date, e.duration, e.location, e.notes,
    e.created_at, e.updated_at
FROM exams e
JOIN courses c ON c.id = e.course_id";

fn course_ref_from_row(row: &Row<'_>) -> rusqlite::Result<CourseRef> {
    Ok(CourseRef {
        id: row.get(1)?,
        name: row.get(2)?,
        color: row.get(3)?,
    })
}

fn assignment_from_row(row: &Row<'_>) -> rusqlite::Result<Assignment> {
    Ok(Assignment {
        id: row.get(0)?,
        course: course_ref_from_row(row)?,
        title: row.get(4)?,
        description: row.get(5)?,
        due_date: row.get(6)?,
        priority: row.get(7)?,
        completed: row.get(8)?,
        estimated_hours: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn exam_from_row(row: &Row<'_>) -> rusqlite::Result<Exam> {
    Ok(Exam {
        id: row.get(0)?,
        course: course_ref_from_row(row)?,
        title: row.get(4)?,
        exam_type: row.get(5)?,
        exam_date: row.get(6)?,
        duration: row.get(7)?,
        location: row.get(8)?,
        notes: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

impl Store {
    /// Inserts an assignment into a course already resolved for its owner.
    pub fn create_assignment(&self, assignment: &NewAssignment) -> StoreResult<Assignment> {
        let conn = self.conn();
        let created_at = now();
        conn.execute(
            "INSERT INTO assignments
                (course_id, title, description, due_date, priority, completed,
                 estimated_hours, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7, ?7)",
            params![
                assignment.course_id,
                assignment.title,
                assignment.description,
                stamp(assignment.due_date),
                assignment.priority,
                assignment.estimated_hours,
                created_at
            ],
        )
        .map_err(|err| StoreError::from_constraint(err, "assignment", assignment.title.clone()))?;

        let id = conn.last_insert_rowid();
        log::info!(
            "Store: created assignment {} in course {}",
            id,
            assignment.course_id
        );
        let created = conn.query_row(
            &format!("{ASSIGNMENT_SELECT} WHERE a.id = ?1"),
            params![id],
            assignment_from_row,
        )?;
        Ok(created)
    }

    /// Every assignment across `user`'s courses, earliest due first.
    pub fn list_assignments(&self, user: UserId) -> StoreResult<Vec<Assignment>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{ASSIGNMENT_SELECT} WHERE c.user_id = ?1 ORDER BY a.due_date, a.id"
        ))?;
        let rows = stmt
            .query_map(params![user.0], assignment_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list_course_assignments(
        &self,
        user: UserId,
        course_id: i64,
    ) -> StoreResult<Vec<Assignment>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{ASSIGNMENT_SELECT} WHERE c.user_id = ?1 AND c.id = ?2 ORDER BY a.due_date, a.id"
        ))?;
        let rows = stmt
            .query_map(params![user.0, course_id], assignment_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Flips the completion flag of one of `user`'s assignments.
    pub fn toggle_assignment_completion(
        &self,
        user: UserId,
        assignment_id: i64,
    ) -> StoreResult<Assignment> {
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE assignments
             SET completed = NOT completed, updated_at = ?3
             WHERE id = ?1
               AND course_id IN (SELECT id FROM courses WHERE user_id = ?2)",
            params![assignment_id, user.0, now()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound("assignment"));
        }

        let updated = conn
            .query_row(
                &format!("{ASSIGNMENT_SELECT} WHERE a.id = ?1"),
                params![assignment_id],
                assignment_from_row,
            )
            .optional()?
            .ok_or(StoreError::NotFound("assignment"))?;
        log::info!(
            "Store: assignment {} completed={}",
            updated.id,
            updated.completed
        );
        Ok(updated)
    }

    /// Overwrites the editable fields of one of `user`'s assignments.
    pub fn update_assignment(
        &self,
        user: UserId,
        assignment_id: i64,
        update: &AssignmentUpdate,
    ) -> StoreResult<Assignment> {
        let conn = self.conn();
        let changed = conn
            .execute(
                "UPDATE assignments
                 SET title = ?3, description = ?4, due_date = ?5, priority = ?6,
                     estimated_hours = ?7, completed = ?8, updated_at = ?9
                 WHERE id = ?1
                   AND course_id IN (SELECT id FROM courses WHERE user_id = ?2)",
                params![
                    assignment_id,
                    user.0,
                    update.title,
                    update.description,
                    stamp(update.due_date),
                    update.priority,
                    update.estimated_hours,
                    update.completed,
                    now()
                ],
            )
            .map_err(|err| StoreError::from_constraint(err, "assignment", update.title.clone()))?;
        if changed == 0 {
            return Err(StoreError::NotFound("assignment"));
        }

        log::info!("Store: updated assignment {}", assignment_id);
        let updated = conn.query_row(
            &format!("{ASSIGNMENT_SELECT} WHERE a.id = ?1"),
            params![assignment_id],
            assignment_from_row,
        )?;
        Ok(updated)
    }

    pub fn delete_assignment(&self, user: UserId, assignment_id: i64) -> StoreResult<()> {
        let changed = self.conn().execute(
            "DELETE FROM assignments
             WHERE id = ?1
               AND course_id IN (SELECT id FROM courses WHERE user_id = ?2)",
            params![assignment_id, user.0],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound("assignment"));
        }
        log::info!("Store: deleted assignment {}", assignment_id);
        Ok(())
    }

    /// Inserts an exam into a course already resolved for its owner.
    pub fn create_exam(&self, exam: &NewExam) -> StoreResult<Exam> {
        let conn = self.conn();
        let created_at = now();
        conn.execute(
            "INSERT INTO exams
                (course_id, title, exam_type, exam_date, duration, location, notes,
                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                exam.course_id,
                exam.title,
                exam.exam_type,
                stamp(exam.exam_date),
                exam.duration,
                exam.location,
                exam.notes,
                created_at
            ],
        )
        .map_err(|err| StoreError::from_constraint(err, "exam", exam.title.clone()))?;

        let id = conn.last_insert_rowid();
        log::info!("Store: created exam {} in course {}", id, exam.course_id);
        let created = conn.query_row(
            &format!("{EXAM_SELECT} WHERE e.id = ?1"),
            params![id],
            exam_from_row,
        )?;
        Ok(created)
    }

    /// Every exam across `user`'s courses, earliest first.
    pub fn list_exams(&self, user: UserId) -> StoreResult<Vec<Exam>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{EXAM_SELECT} WHERE c.user_id = ?1 ORDER BY e.exam_date, e.id"
        ))?;
        let rows = stmt
            .query_map(params![user.0], exam_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list_course_exams(&self, user: UserId, course_id: i64) -> StoreResult<Vec<Exam>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{EXAM_SELECT} WHERE c.user_id = ?1 AND c.id = ?2 ORDER BY e.exam_date, e.id"
        ))?;
        let rows = stmt
            .query_map(params![user.0, course_id], exam_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ExamType, NewCourse, Priority};
    use chrono::{Duration, TimeZone, Utc};

    fn setup() -> (Store, UserId, i64) {
        let store = Store::open_in_memory().unwrap();
        let user = store.create_user("ada", "a").unwrap().id;
        let course = store
            .create_course(
                user,
                &NewCourse {
                    name: "Math".to_string(),
                    code: Some("MATH301".to_string()),
                    instructor: None,
                    credits: 3,
                    color: "#007bff".to_string(),
                },
            )
            .unwrap();
        (store, user, course.id)
    }

    fn homework(course_id: i64, title: &str, days: i64) -> NewAssignment {
        NewAssignment {
            course_id,
            title: title.to_string(),
            description: None,
            due_date: Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap() + Duration::days(days),
            priority: Priority::High,
            estimated_hours: 2,
        }
    }

    #[test]
    fn test_assignments_sorted_by_due_date() {
        let (store, user, course) = setup();
        store.create_assignment(&homework(course, "Later", 5)).unwrap();
        store.create_assignment(&homework(course, "Sooner", 1)).unwrap();

        let titles: Vec<String> = store
            .list_assignments(user)
            .unwrap()
            .into_iter()
            .map(|a| a.title)
            .collect();
        assert_eq!(titles, vec!["Sooner", "Later"]);

        let first = &store.list_course_assignments(user, course).unwrap()[0];
        assert_eq!(first.course.name, "Math");
        assert_eq!(first.priority, Priority::High);
        assert!(!first.completed);
    }

    #[test]
    fn test_toggle_completion_scoped_to_owner() {
        let (store, user, course) = setup();
        let other = store.create_user("bob", "b").unwrap().id;
        let hw = store.create_assignment(&homework(course, "HW1", 1)).unwrap();

        let err = store.toggle_assignment_completion(other, hw.id).unwrap_err();
        assert!(matches!(err, StoreError::NotFound("assignment")));

        assert!(store.toggle_assignment_completion(user, hw.id).unwrap().completed);
        assert!(!store.toggle_assignment_completion(user, hw.id).unwrap().completed);
    }

    #[test]
    fn test_update_and_delete_scoped_to_owner() {
        let (store, user, course) = setup();
        let other = store.create_user("bob", "b").unwrap().id;
        let hw = store.create_assignment(&homework(course, "HW1", 1)).unwrap();
        let update = AssignmentUpdate {
            title: "HW1 (revised)".to_string(),
            description: Some("chapters 3-4".to_string()),
            due_date: hw.due_date + Duration::days(2),
            priority: Priority::Low,
            estimated_hours: 5,
            completed: true,
        };

        let err = store.update_assignment(other, hw.id, &update).unwrap_err();
        assert!(matches!(err, StoreError::NotFound("assignment")));
        let err = store.delete_assignment(other, hw.id).unwrap_err();
        assert!(matches!(err, StoreError::NotFound("assignment")));

        let updated = store.update_assignment(user, hw.id, &update).unwrap();
        assert_eq!(updated.title, "HW1 (revised)");
        assert_eq!(updated.priority, Priority::Low);
        assert_eq!(updated.estimated_hours, 5);
        assert!(updated.completed);
        assert_eq!(updated.due_date, hw.due_date + Duration::days(2));

        store.delete_assignment(user, hw.id).unwrap();
        assert!(store.list_assignments(user).unwrap().is_empty());
        assert!(matches!(
            store.delete_assignment(user, hw.id).unwrap_err(),
            StoreError::NotFound("assignment")
        ));
    }

    #[test]
    fn test_exam_roundtrip_keeps_type_and_duration() {
        let (store, user, course) = setup();
        store
            .create_exam(&NewExam {
                course_id: course,
                title: "Final".to_string(),
                exam_type: ExamType::Final,
                exam_date: Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
                duration: 90,
                location: Some("Hall B".to_string()),
                notes: None,
            })
            .unwrap();

        let exams = store.list_exams(user).unwrap();
        assert_eq!(exams.len(), 1);
        assert_eq!(exams[0].exam_type, ExamType::Final);
        assert_eq!(exams[0].duration, 90);
        assert_eq!(exams[0].location.as_deref(), Some("Hall B"));
        assert_eq!(store.list_course_exams(user, course).unwrap().len(), 1);
    }
}
