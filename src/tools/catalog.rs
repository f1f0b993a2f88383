use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use super::academic_summary::AcademicSummaryArgs;
use super::add_assignment::AddAssignmentArgs;
use super::add_calendar_event::AddCalendarEventArgs;
use super::add_exam::AddExamArgs;
use super::add_new_course::AddNewCourseArgs;
use super::{AcademicSummary, AddAssignment, AddCalendarEvent, AddExam, AddNewCourse, Tool};
use crate::store::{Store, UserId};

/// Argument keys that name the caller. The session always supplies the
/// caller itself, so any value the model sends under these keys is dropped.
const IDENTITY_FIELDS: &[&str] = &["user_id"];

/// A tool signature as declared to the language model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDeclaration {
    pub name: &'static str,
    pub description: &'static str,
    /// JSON Schema of the argument object.
    pub parameters: Value,
}

impl ToolDeclaration {
    fn of<T: Tool>() -> Self {
        let properties: Map<String, Value> = T::PARAMS
            .iter()
            .map(|param| {
                (
                    param.name.to_string(),
                    serde_json::json!({
                        "type": param.kind.json_type(),
                        "description": param.description,
                    }),
                )
            })
            .collect();
        let required: Vec<&str> = required_fields::<T>().collect();

        Self {
            name: T::NAME,
            description: T::DESCRIPTION,
            parameters: serde_json::json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }
}

fn required_fields<T: Tool>() -> impl Iterator<Item = &'static str> {
    T::PARAMS.iter().filter(|p| p.required).map(|p| p.name)
}

/// Why a model-requested call could not be turned into a [`ToolCall`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgumentError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("arguments for {tool} must be a JSON object")]
    NotAnObject { tool: &'static str },

    #[error("missing required arguments for {tool}: {}", fields.join(", "))]
    Missing {
        tool: &'static str,
        action: &'static str,
        fields: Vec<String>,
    },

    #[error("unexpected arguments for {tool}: {}", fields.join(", "))]
    Unexpected {
        tool: &'static str,
        fields: Vec<String>,
    },

    #[error("invalid arguments for {tool}: {reason}")]
    Invalid { tool: &'static str, reason: String },
}

/// One validated request to run a catalog tool.
#[derive(Debug, Clone)]
pub enum ToolCall {
    AcademicSummary(AcademicSummaryArgs),
    AddNewCourse(AddNewCourseArgs),
    AddCalendarEvent(AddCalendarEventArgs),
    AddAssignment(AddAssignmentArgs),
    AddExam(AddExamArgs),
}

impl ToolCall {
    /// Decode a model-originated call. `arguments` may be `null` for tools
    /// without parameters.
    pub fn parse(name: &str, arguments: &Value) -> Result<ToolCall, ArgumentError> {
        if name == AcademicSummary::NAME {
            decode::<AcademicSummary>(arguments).map(ToolCall::AcademicSummary)
        } else if name == AddNewCourse::NAME {
            decode::<AddNewCourse>(arguments).map(ToolCall::AddNewCourse)
        } else if name == AddCalendarEvent::NAME {
            decode::<AddCalendarEvent>(arguments).map(ToolCall::AddCalendarEvent)
        } else if name == AddAssignment::NAME {
            decode::<AddAssignment>(arguments).map(ToolCall::AddAssignment)
        } else if name == AddExam::NAME {
            decode::<AddExam>(arguments).map(ToolCall::AddExam)
        } else {
            Err(ArgumentError::UnknownTool(name.to_string()))
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::AcademicSummary(_) => AcademicSummary::NAME,
            ToolCall::AddNewCourse(_) => AddNewCourse::NAME,
            ToolCall::AddCalendarEvent(_) => AddCalendarEvent::NAME,
            ToolCall::AddAssignment(_) => AddAssignment::NAME,
            ToolCall::AddExam(_) => AddExam::NAME,
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn decode<T: Tool>(arguments: &Value) -> Result<T::Args, ArgumentError> {
    let mut fields = match arguments {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        _ => return Err(ArgumentError::NotAnObject { tool: T::NAME }),
    };

    for key in IDENTITY_FIELDS {
        if fields.remove(*key).is_some() {
            log::warn!("Catalog: dropped model-supplied '{}' for {}", key, T::NAME);
        }
    }
    // Null means "not given"; optional fields then take their defaults.
    fields.retain(|_, value| !value.is_null());

    let missing: Vec<String> = required_fields::<T>()
        .filter(|name| fields.get(*name).map_or(true, is_blank))
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(ArgumentError::Missing {
            tool: T::NAME,
            action: T::ACTION,
            fields: missing,
        });
    }

    let mut unexpected: Vec<String> = fields
        .keys()
        .filter(|key| !T::PARAMS.iter().any(|p| p.name == key.as_str()))
        .cloned()
        .collect();
    if !unexpected.is_empty() {
        unexpected.sort();
        return Err(ArgumentError::Unexpected {
            tool: T::NAME,
            fields: unexpected,
        });
    }

    serde_json::from_value(Value::Object(fields)).map_err(|err| ArgumentError::Invalid {
        tool: T::NAME,
        reason: err.to_string(),
    })
}

/// Executes tool calls against the store for one caller at a time.
#[derive(Clone)]
pub struct ToolCatalog {
    store: Arc<Store>,
}

impl ToolCatalog {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Every tool, in the order they are offered to the model.
    pub fn declarations() -> Vec<ToolDeclaration> {
        vec![
            ToolDeclaration::of::<AcademicSummary>(),
            ToolDeclaration::of::<AddNewCourse>(),
            ToolDeclaration::of::<AddCalendarEvent>(),
            ToolDeclaration::of::<AddAssignment>(),
            ToolDeclaration::of::<AddExam>(),
        ]
    }

    /// Runs `call` on behalf of `user` and returns the text for the model.
    /// Failures are reported in the returned text, never as an error.
    pub fn dispatch(&self, user: UserId, call: ToolCall) -> String {
        let name = call.name();
        log::info!("Catalog: running {} for user {}", name, user);

        let store = self.store.as_ref();
        let result = match call {
            ToolCall::AcademicSummary(args) => AcademicSummary.run(store, user, args),
            ToolCall::AddNewCourse(args) => AddNewCourse.run(store, user, args),
            ToolCall::AddCalendarEvent(args) => AddCalendarEvent.run(store, user, args),
            ToolCall::AddAssignment(args) => AddAssignment.run(store, user, args),
            ToolCall::AddExam(args) => AddExam.run(store, user, args),
        };

        match result {
            Ok(text) => {
                log::info!("Catalog: {} succeeded ({} chars)", name, text.len());
                text
            }
            Err(err) => {
                log::warn!("Catalog: {} reported failure: {:?}", name, err);
                err.to_string()
            }
        }
    }
}

/// Deserializers that accept the loosely-typed scalars models tend to emit.
pub(crate) mod lenient {
    use serde::de::{Deserializer, Error};
    use serde::Deserialize;
    use serde_json::Value;

    /// Text, also accepting numbers and booleans (e.g. a course code `301`).
    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(D::Error::custom(format!("expected text, found {other}"))),
        }
    }

    /// A non-negative whole number of minutes, given as an integer, a float
    /// without fraction (`120.0`) or numeric text (`"90"`).
    pub fn minutes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let minutes = match &value {
            Value::Number(n) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                    .map(|f| f as u64)
            }),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        minutes
            .and_then(|m| u32::try_from(m).ok())
            .ok_or_else(|| D::Error::custom(format!("expected a number of minutes, found {value}")))
    }
}
