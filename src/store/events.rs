use super::{now, stamp, CalendarEvent, NewCalendarEvent, Store, StoreError, StoreResult, UserId};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

const EVENT_COLUMNS: &str = "id, user_id, title, event_date, end_date, description, event_type,
    location, color, created_at, updated_at";

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<CalendarEvent> {
    Ok(CalendarEvent {
        id: row.get(0)?,
        user_id: UserId(row.get(1)?),
        title: row.get(2)?,
        event_date: row.get(3)?,
        end_date: row.get(4)?,
        description: row.get(5)?,
        event_type: row.get(6)?,
        location: row.get(7)?,
        color: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

impl Store {
    pub fn create_event(&self, user: UserId, event: &NewCalendarEvent) -> StoreResult<CalendarEvent> {
        event.validate().map_err(|reason| StoreError::Invalid {
            entity: "calendar event",
            reason,
        })?;

        let conn = self.conn();
        let created_at = now();
        let event_date = stamp(event.event_date);
        let end_date = event.end_date.map(stamp);
        conn.execute(
            "INSERT INTO calendar_events
                (user_id, title, event_date, end_date, description, event_type, location,
                 color, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                user.0,
                event.title,
                event_date,
                end_date,
                event.description,
                event.event_type,
                event.location,
                event.color,
                created_at
            ],
        )
        .map_err(|err| StoreError::from_constraint(err, "calendar event", event.title.clone()))?;

        let created = CalendarEvent {
            id: conn.last_insert_rowid(),
            user_id: user,
            title: event.title.clone(),
            event_date,
            end_date,
            description: event.description.clone(),
            event_type: event.event_type,
            location: event.location.clone(),
            color: event.color.clone(),
            created_at,
            updated_at: created_at,
        };
        log::info!("Store: created event {} for user {}", created.id, user);
        Ok(created)
    }

    pub fn list_events(&self, user: UserId) -> StoreResult<Vec<CalendarEvent>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM calendar_events WHERE user_id = ?1 ORDER BY event_date, id"
        ))?;
        let rows = stmt
            .query_map(params![user.0], event_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Events starting within `[from, to]`, inclusive on both ends.
    pub fn list_events_between(
        &self,
        user: UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<CalendarEvent>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM calendar_events
             WHERE user_id = ?1 AND event_date >= ?2 AND event_date <= ?3
             ORDER BY event_date, id"
        ))?;
        let rows = stmt
            .query_map(params![user.0, stamp(from), stamp(to)], event_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{EventType, DEFAULT_EVENT_COLOR};
    use chrono::{Duration, TimeZone};

    fn event(title: &str, at: DateTime<Utc>) -> NewCalendarEvent {
        NewCalendarEvent {
            title: title.to_string(),
            event_date: at,
            end_date: None,
            description: None,
            event_type: EventType::Personal,
            location: None,
            color: DEFAULT_EVENT_COLOR.to_string(),
        }
    }

    #[test]
    fn test_window_query_is_inclusive_and_ordered() {
        let store = Store::open_in_memory().unwrap();
        let user = store.create_user("ada", "a").unwrap().id;
        let base = Utc.with_ymd_and_hms(2025, 4, 1, 8, 0, 0).unwrap();

        store.create_event(user, &event("Far", base + Duration::days(20))).unwrap();
        store.create_event(user, &event("Edge", base + Duration::days(14))).unwrap();
        store.create_event(user, &event("Soon", base + Duration::days(1))).unwrap();
        store.create_event(user, &event("Past", base - Duration::days(1))).unwrap();

        let titles: Vec<String> = store
            .list_events_between(user, base, base + Duration::days(14))
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(titles, vec!["Soon", "Edge"]);
        assert_eq!(store.list_events(user).unwrap().len(), 4);
    }

    #[test]
    fn test_end_before_start_is_rejected() {
        let store = Store::open_in_memory().unwrap();
        let user = store.create_user("ada", "a").unwrap().id;
        let start = Utc.with_ymd_and_hms(2025, 4, 1, 8, 0, 0).unwrap();
        let mut bad = event("Backwards", start);
        bad.end_date = Some(start - Duration::hours(1));

        let err = store.create_event(user, &bad).unwrap_err();
        assert!(matches!(err, StoreError::Invalid { .. }));
        assert!(store.list_events(user).unwrap().is_empty());
    }
}
