use super::{now, Attendance, AttendanceStats, CourseRef, NewAttendance, Store, StoreError, StoreResult, UserId};
use rusqlite::{params, Row};

const ATTENDANCE_SELECT: &str = "SELECT
    r.id, c.id, c.name, c.color, r.date, r.present, r.notes, r.created_at
FROM attendance r
JOIN courses c ON c.id = r.course_id";

fn attendance_from_row(row: &Row<'_>) -> rusqlite::Result<Attendance> {
    Ok(Attendance {
        id: row.get(0)?,
        course: CourseRef {
            id: row.get(1)?,
            name: row.get(2)?,
            color: row.get(3)?,
        },
        date: row.get(4)?,
        present: row.get(5)?,
        notes: row.get(6)?,
        created_at: row.get(7)?,
    })
}

impl Store {
    /// Records one class date for a course. A second record for the same
    /// date is a [`StoreError::Conflict`].
    pub fn record_attendance(&self, record: &NewAttendance) -> StoreResult<Attendance> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO attendance (course_id, date, present, notes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![record.course_id, record.date, record.present, record.notes, now()],
        )
        .map_err(|err| StoreError::from_constraint(err, "attendance", record.date.to_string()))?;

        let id = conn.last_insert_rowid();
        let created = conn.query_row(
            &format!("{ATTENDANCE_SELECT} WHERE r.id = ?1"),
            params![id],
            attendance_from_row,
        )?;
        Ok(created)
    }

    /// The `limit` latest records across `user`'s courses, newest first.
    pub fn recent_attendance(&self, user: UserId, limit: u32) -> StoreResult<Vec<Attendance>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{ATTENDANCE_SELECT} WHERE c.user_id = ?1 ORDER BY r.date DESC, r.id DESC LIMIT ?2"
        ))?;
        let rows = stmt
            .query_map(params![user.0, limit], attendance_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn course_attendance(&self, user: UserId, course_id: i64) -> StoreResult<Vec<Attendance>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{ATTENDANCE_SELECT} WHERE c.user_id = ?1 AND c.id = ?2 ORDER BY r.date DESC"
        ))?;
        let rows = stmt
            .query_map(params![user.0, course_id], attendance_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn attendance_stats(&self, user: UserId, course_id: i64) -> StoreResult<AttendanceStats> {
        let stats = self.conn().query_row(
            "SELECT COUNT(*), COALESCE(SUM(r.present), 0)
             FROM attendance r
             JOIN courses c ON c.id = r.course_id
             WHERE c.user_id = ?1 AND c.id = ?2",
            params![user.0, course_id],
            |row| {
                Ok(AttendanceStats {
                    total_classes: row.get(0)?,
                    present_classes: row.get(1)?,
                })
            },
        )?;
        Ok(stats)
    }
}
