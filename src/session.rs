use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;

use crate::llm::{ChatMessage, LanguageModel, ModelReply, ToolInvocation};
use crate::store::UserId;
use crate::tools::{ArgumentError, ToolCall, ToolCatalog, ToolDeclaration};

pub const FALLBACK_REPLY: &str = "I'm sorry, I couldn't process that request.";
pub const APOLOGY_REPLY: &str = "I'm sorry, an error occurred. Please try again later.";

const SYSTEM_INSTRUCTION: &str = "You are an AI academic planner assistant. You have access to tools that can get \
and modify the user's academic data. Do NOT ask for the user's ID; \
it is handled automatically by your tool calls.

Available tools:
- get_academic_summary: Get overview of courses, assignments, exams, and events
- add_new_course: Add a new course with name, code, and instructor
- add_calendar_event: Add events to the calendar
- add_assignment: Add assignments to specific courses
- add_exam: Add exams to specific courses

Dates passed to tools must use ISO format (YYYY-MM-DDTHH:MM:SS).
Always use the get_academic_summary tool when users ask about their academic data. \
Be helpful, friendly, and use emojis in your responses to make them engaging. \
When adding items, provide clear confirmation messages with details.";

/// Creates conversation sessions. Built once at startup and shared.
pub struct Assistant {
    model: Arc<dyn LanguageModel>,
    catalog: ToolCatalog,
    tools: Vec<ToolDeclaration>,
}

impl Assistant {
    pub fn new(model: Arc<dyn LanguageModel>, catalog: ToolCatalog) -> Self {
        Self {
            model,
            catalog,
            tools: ToolCatalog::declarations(),
        }
    }

    /// Starts a fresh transcript for `user`, who must already be
    /// authenticated. Every tool call in the session runs as this user.
    pub fn session(&self, user: UserId) -> ChatSession<'_> {
        let instruction = format!(
            "{}\n\nToday's date is {}.",
            SYSTEM_INSTRUCTION,
            Utc::now().format("%Y-%m-%d")
        );
        ChatSession {
            assistant: self,
            user,
            transcript: vec![ChatMessage::system(instruction)],
        }
    }
}

/// One transcript. Handles at most one tool call per user turn.
pub struct ChatSession<'a> {
    assistant: &'a Assistant,
    user: UserId,
    transcript: Vec<ChatMessage>,
}

impl ChatSession<'_> {
    /// Handle one user message and return the reply text. Never fails; errors
    /// become [`APOLOGY_REPLY`].
    pub async fn submit(&mut self, text: &str) -> String {
        match self.exchange(text).await {
            Ok(reply) => reply,
            Err(e) => {
                log::error!("Session: request for user {} failed: {:#}", self.user, e);
                APOLOGY_REPLY.to_string()
            }
        }
    }

    async fn ask_model(&self) -> Result<ModelReply> {
        self.assistant
            .model
            .chat(&self.transcript, &self.assistant.tools)
            .await
            .with_context(|| format!("Model '{}' request failed", self.assistant.model.name()))
    }

    async fn exchange(&mut self, text: &str) -> Result<String> {
        self.transcript.push(ChatMessage::user(text));
        let reply = self.ask_model().await?;

        let mut calls = reply.tool_calls.into_iter();
        if let Some(first) = calls.next() {
            let ignored: Vec<String> = calls.map(|call| call.name).collect();
            if !ignored.is_empty() {
                log::warn!(
                    "Session: model requested {} extra tool call(s), ignoring: {}",
                    ignored.len(),
                    ignored.join(", ")
                );
            }
            return self.run_tool(first, reply.text.unwrap_or_default()).await;
        }

        match reply.text.filter(|t| !t.trim().is_empty()) {
            Some(text) => {
                self.transcript.push(ChatMessage::assistant(text.clone()));
                Ok(text)
            }
            None => {
                log::warn!("Session: model returned neither text nor a tool call");
                Ok(FALLBACK_REPLY.to_string())
            }
        }
    }

    async fn run_tool(&mut self, invocation: ToolInvocation, preface: String) -> Result<String> {
        let call = match ToolCall::parse(&invocation.name, &invocation.arguments) {
            Ok(call) => call,
            Err(ArgumentError::Missing { action, fields, .. }) => {
                log::info!(
                    "Session: {} is missing {}; asking the user",
                    invocation.name,
                    fields.join(", ")
                );
                return Ok(clarification(action, &fields));
            }
            Err(e) => {
                log::warn!("Session: rejected tool call: {}", e);
                return Ok(format!(
                    "I'm sorry, I couldn't use the details for that request ({}). Could you rephrase it?",
                    e
                ));
            }
        };

        // The call carries no identity of its own; the session's user is the
        // only one it can act for.
        let name = call.name();
        let catalog = self.assistant.catalog.clone();
        let user = self.user;
        let result = tokio::task::spawn_blocking(move || catalog.dispatch(user, call))
            .await
            .with_context(|| format!("Tool '{}' did not complete", name))?;

        self.transcript
            .push(ChatMessage::assistant_tool_call(preface, invocation));
        self.transcript
            .push(ChatMessage::tool_result(name, result.clone()));

        let follow_up = self.ask_model().await?;
        if !follow_up.tool_calls.is_empty() {
            log::warn!(
                "Session: ignoring {} tool call(s) in the follow-up turn",
                follow_up.tool_calls.len()
            );
        }
        match follow_up.non_empty_text() {
            Some(text) => {
                let text = text.to_string();
                self.transcript.push(ChatMessage::assistant(text.clone()));
                Ok(text)
            }
            None => Ok(result),
        }
    }
}

fn clarification(action: &str, fields: &[String]) -> String {
    format!(
        "I need the {} to {}. Can you provide it?",
        fields.join(", "),
        action
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;
    use crate::store::Store;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays queued replies and records every transcript it was sent.
    struct ScriptedModel {
        replies: Mutex<VecDeque<Result<ModelReply>>>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<ModelReply>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }

        fn last_transcript(&self) -> Vec<ChatMessage> {
            self.seen.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait::async_trait]
    impl LanguageModel for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn chat(&self, transcript: &[ChatMessage], tools: &[ToolDeclaration]) -> Result<ModelReply> {
            assert_eq!(tools.len(), 5);
            self.seen.lock().unwrap().push(transcript.to_vec());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow::anyhow!("no scripted reply left")))
        }
    }

    struct Fixture {
        assistant: Assistant,
        model: Arc<ScriptedModel>,
        ada: UserId,
        bob: UserId,
    }

    fn fixture(replies: Vec<Result<ModelReply>>) -> Fixture {
        let store = Store::open_in_memory().unwrap();
        let ada = store.create_user("ada", "hash-ada").unwrap().id;
        let bob = store.create_user("bob", "hash-bob").unwrap().id;
        let model = ScriptedModel::new(replies);
        let assistant = Assistant::new(model.clone(), ToolCatalog::new(Arc::new(store)));
        Fixture {
            assistant,
            model,
            ada,
            bob,
        }
    }

    fn store(f: &Fixture) -> &Store {
        f.assistant.catalog.store()
    }

    #[tokio::test]
    async fn test_plain_text_is_returned_verbatim() {
        let f = fixture(vec![Ok(ModelReply::text("Hi there! 👋"))]);
        let mut session = f.assistant.session(f.ada);

        assert_eq!(session.submit("hello").await, "Hi there! 👋");
        assert_eq!(f.model.calls(), 1);

        let sent = f.model.last_transcript();
        assert_eq!(sent[0].role, Role::System);
        assert_eq!(sent[1], ChatMessage::user("hello"));
    }

    #[tokio::test]
    async fn test_tool_result_is_round_tripped_through_model() {
        let f = fixture(vec![
            Ok(ModelReply::tool_call(
                "add_new_course",
                json!({"name": "Advanced Mathematics", "code": "MATH301", "instructor": "Dr. Smith"}),
            )),
            Ok(ModelReply::text("Done! MATH301 is on your list 🎓")),
        ]);
        let mut session = f.assistant.session(f.ada);

        let reply = session.submit("add advanced maths MATH301 with Dr. Smith").await;
        assert_eq!(reply, "Done! MATH301 is on your list 🎓");
        assert_eq!(f.model.calls(), 2);

        let follow_up = f.model.last_transcript();
        let observation = follow_up.last().unwrap();
        assert_eq!(observation.role, Role::Tool);
        assert_eq!(observation.tool_name.as_deref(), Some("add_new_course"));
        assert!(observation.content.starts_with("✅ Successfully added the course"));
        assert_eq!(follow_up[follow_up.len() - 2].tool_calls.len(), 1);

        assert_eq!(store(&f).list_courses(f.ada).unwrap().len(), 1);
        assert_eq!(session.transcript.last().unwrap().role, Role::Assistant);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_tool_runs_on_blocking_pool_under_multi_thread_runtime() {
        let f = fixture(vec![
            Ok(ModelReply::tool_call(
                "add_calendar_event",
                json!({"title": "Study Group", "event_date": "2030-03-04T12:00:00"}),
            )),
            Ok(ModelReply::text("Added 👥")),
        ]);
        let mut session = f.assistant.session(f.bob);

        assert_eq!(session.submit("study group on march 4th at noon").await, "Added 👥");
        let events = store(&f).list_events(f.bob).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Study Group");
        assert!(store(&f).list_events(f.ada).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_arguments_never_reach_the_tool() {
        let f = fixture(vec![Ok(ModelReply::tool_call(
            "add_new_course",
            json!({"name": "Advanced Mathematics"}),
        ))]);
        let mut session = f.assistant.session(f.ada);

        let reply = session.submit("add advanced maths").await;
        assert_eq!(
            reply,
            "I need the code, instructor to add the course. Can you provide it?"
        );
        assert_eq!(f.model.calls(), 1);
        assert!(store(&f).list_courses(f.ada).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_arguments_checked_for_every_tool() {
        let f = fixture(vec![Ok(ModelReply::tool_call(
            "add_assignment",
            json!({"title": "HW1"}),
        ))]);
        let mut session = f.assistant.session(f.ada);

        let reply = session.submit("add HW1").await;
        assert_eq!(
            reply,
            "I need the course_code, due_date to add the assignment. Can you provide it?"
        );
    }

    #[tokio::test]
    async fn test_model_supplied_user_id_is_ignored() {
        let f = fixture(vec![
            Ok(ModelReply::tool_call(
                "add_new_course",
                json!({"user_id": 2, "name": "Physics", "code": "PHY101", "instructor": "Dr. Curie"}),
            )),
            Ok(ModelReply::text("Added!")),
        ]);
        assert_eq!(f.bob, UserId(2));
        let mut session = f.assistant.session(f.ada);

        assert_eq!(session.submit("add physics").await, "Added!");
        assert_eq!(store(&f).list_courses(f.ada).unwrap().len(), 1);
        assert!(store(&f).list_courses(f.bob).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_only_first_tool_call_is_processed() {
        let f = fixture(vec![
            Ok(ModelReply {
                text: None,
                tool_calls: vec![
                    ToolInvocation {
                        name: "add_new_course".to_string(),
                        arguments: json!({"name": "A", "code": "A1", "instructor": "X"}),
                    },
                    ToolInvocation {
                        name: "add_new_course".to_string(),
                        arguments: json!({"name": "B", "code": "B1", "instructor": "Y"}),
                    },
                ],
            }),
            Ok(ModelReply::text("Added A")),
        ]);
        let mut session = f.assistant.session(f.ada);

        assert_eq!(session.submit("add A and B").await, "Added A");
        let courses = store(&f).list_courses(f.ada).unwrap();
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].code.as_deref(), Some("A1"));
    }

    #[tokio::test]
    async fn test_model_failure_becomes_apology() {
        let f = fixture(vec![Err(anyhow::anyhow!("connection refused"))]);
        let mut session = f.assistant.session(f.ada);
        assert_eq!(session.submit("hello").await, APOLOGY_REPLY);
    }

    #[tokio::test]
    async fn test_follow_up_failure_becomes_apology_after_write() {
        let f = fixture(vec![
            Ok(ModelReply::tool_call(
                "add_calendar_event",
                json!({"title": "Study Group", "event_date": "2030-01-01T18:00:00"}),
            )),
            Err(anyhow::anyhow!("timeout")),
        ]);
        let mut session = f.assistant.session(f.ada);
        assert_eq!(session.submit("study group").await, APOLOGY_REPLY);
        assert_eq!(store(&f).list_events(f.ada).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_reply_uses_fallback() {
        let f = fixture(vec![Ok(ModelReply::default())]);
        let mut session = f.assistant.session(f.ada);
        assert_eq!(session.submit("???").await, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn test_silent_follow_up_returns_tool_text() {
        let f = fixture(vec![
            Ok(ModelReply::tool_call(
                "add_calendar_event",
                json!({"title": "Study Group", "event_date": "not-a-date"}),
            )),
            Ok(ModelReply::text("")),
        ]);
        let mut session = f.assistant.session(f.ada);

        let reply = session.submit("study group sometime").await;
        assert_eq!(
            reply,
            "❌ Invalid date format. Please use YYYY-MM-DDTHH:MM:SS format."
        );
        assert!(store(&f).list_events(f.ada).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tool_is_not_dispatched() {
        let f = fixture(vec![Ok(ModelReply::tool_call(
            "delete_course",
            json!({"code": "MATH301"}),
        ))]);
        let mut session = f.assistant.session(f.ada);

        let reply = session.submit("delete maths").await;
        assert!(reply.contains("unknown tool 'delete_course'"));
        assert_eq!(f.model.calls(), 1);
    }

    #[tokio::test]
    async fn test_course_codes_resolve_per_user() {
        let assignment = json!({
            "course_code": "MATH301",
            "title": "HW1",
            "due_date": "2025-01-01T10:00:00"
        });
        let f = fixture(vec![
            Ok(ModelReply::tool_call("add_assignment", assignment.clone())),
            Ok(ModelReply::text("not found")),
            Ok(ModelReply::tool_call("add_assignment", assignment)),
            Ok(ModelReply::text("added")),
        ]);
        crate::tools::test_support::add_course(store(&f), f.ada, "Advanced Mathematics", "MATH301");

        let mut bob = f.assistant.session(f.bob);
        bob.submit("add HW1 to MATH301").await;
        let observation = f.model.last_transcript().last().cloned().unwrap();
        assert!(observation.content.starts_with("❌ Course with code 'MATH301' not found"));

        let mut ada = f.assistant.session(f.ada);
        ada.submit("add HW1 to MATH301").await;
        let assignments = store(&f).list_assignments(f.ada).unwrap();
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].estimated_hours, 2);

        let summary = crate::tools::academic_summary::compose_summary(store(&f), f.ada, Utc::now()).unwrap();
        assert!(summary.contains("- **HW1** (🟡 Medium)"));
    }
}
