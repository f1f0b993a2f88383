use serde::Deserialize;

use super::catalog::lenient;
use super::datetime::{display, parse_iso_datetime};
use super::{non_empty, require_user, Param, ParamKind, Tool, ToolError};
use crate::store::{EventType, NewCalendarEvent, Store, UserId, DEFAULT_EVENT_COLOR};

/// Puts a personal event on the caller's calendar.
pub struct AddCalendarEvent;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddCalendarEventArgs {
    #[serde(deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(deserialize_with = "lenient::string")]
    pub event_date: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: String,
}

impl Tool for AddCalendarEvent {
    type Args = AddCalendarEventArgs;

    const NAME: &'static str = "add_calendar_event";
    const DESCRIPTION: &'static str = "Add an event to the user's calendar.";
    const ACTION: &'static str = "add the event";
    const PARAMS: &'static [Param] = &[
        Param::required("title", ParamKind::String, "The title of the event."),
        Param::required(
            "event_date",
            ParamKind::String,
            "The date and time of the event in ISO format (YYYY-MM-DDTHH:MM:SS).",
        ),
        Param::optional("description", ParamKind::String, "A description of the event."),
    ];

    fn run(
        &self,
        store: &Store,
        user: UserId,
        args: AddCalendarEventArgs,
    ) -> Result<String, ToolError> {
        const ACTION: &str = "adding calendar event";
        require_user(store, user, ACTION)?;

        let event_date = parse_iso_datetime(&args.event_date).ok_or(ToolError::InvalidDate)?;
        let event = NewCalendarEvent {
            title: args.title,
            event_date,
            end_date: None,
            description: non_empty(args.description),
            event_type: EventType::Personal,
            location: None,
            color: DEFAULT_EVENT_COLOR.to_string(),
        };
        let created = store
            .create_event(user, &event)
            .map_err(ToolError::storage(ACTION))?;

        Ok(format!(
            "✅ Successfully added '{}' to your calendar for {}! 📅",
            created.title,
            display(created.event_date)
        ))
    }
}
