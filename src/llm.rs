use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;

use crate::config::AiModelConfig;
use crate::ollama::OllamaClient;
use crate::tools::ToolDeclaration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    /// Result of a tool run, observed by the model.
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// A tool call as requested by the model, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: Value,
}

/// One turn of a transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub tool_calls: Vec<ToolInvocation>,
    /// Set on [`Role::Tool`] messages.
    pub tool_name: Option<String>,
}

impl ChatMessage {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn assistant_tool_call(content: impl Into<String>, call: ToolInvocation) -> Self {
        Self {
            tool_calls: vec![call],
            ..Self::new(Role::Assistant, content)
        }
    }

    pub fn tool_result(tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_name: Some(tool_name.into()),
            ..Self::new(Role::Tool, content)
        }
    }
}

/// What the model answered for one turn: text, tool calls, both or neither.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolInvocation>,
}

impl ModelReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_call(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            text: None,
            tool_calls: vec![ToolInvocation {
                name: name.into(),
                arguments,
            }],
        }
    }

    /// The text, if it has any non-whitespace content.
    pub fn non_empty_text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// Chat-style language model that can request tool calls.
#[async_trait::async_trait]
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &str;

    async fn chat(&self, transcript: &[ChatMessage], tools: &[ToolDeclaration]) -> Result<ModelReply>;
}

/// Build the language model named by the configuration.
pub fn create_language_model(config: &AiModelConfig) -> Result<Arc<dyn LanguageModel>> {
    match config.provider.as_str() {
        "ollama" => {
            log::info!(
                "Using Ollama model '{}' at {}",
                config.model,
                config.endpoint
            );
            Ok(Arc::new(OllamaClient::new(
                config.endpoint.clone(),
                config.model.clone(),
                config.temperature,
            )))
        }
        other => anyhow::bail!(
            "Unsupported AI provider '{}'. Supported providers: ollama",
            other
        ),
    }
}
