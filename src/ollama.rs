use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::llm::{ChatMessage, LanguageModel, ModelReply, ToolInvocation};
use crate::tools::ToolDeclaration;

/// HTTP client for the Ollama chat API with tool calling.
pub struct OllamaClient {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

impl OllamaClient {
    pub fn new(endpoint: String, model: String, temperature: f32) -> Self {
        Self {
            endpoint,
            model,
            temperature,
            client: reqwest::Client::new(),
        }
    }

    fn message_json(message: &ChatMessage) -> Value {
        let mut body = json!({
            "role": message.role.as_str(),
            "content": message.content,
        });
        if !message.tool_calls.is_empty() {
            body["tool_calls"] = message
                .tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "function": { "name": call.name, "arguments": call.arguments }
                    })
                })
                .collect();
        }
        if let Some(name) = &message.tool_name {
            body["tool_name"] = json!(name);
        }
        body
    }

    fn request_body(&self, transcript: &[ChatMessage], tools: &[ToolDeclaration]) -> Value {
        let messages: Vec<Value> = transcript.iter().map(Self::message_json).collect();
        let tools: Vec<Value> = tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    }
                })
            })
            .collect();

        json!({
            "model": self.model,
            "messages": messages,
            "tools": tools,
            "stream": false,
            "options": { "temperature": self.temperature }
        })
    }

    /// Some models send arguments as a JSON-encoded string instead of an object.
    fn decode_arguments(raw: Value) -> Value {
        match raw {
            Value::String(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
            other => other,
        }
    }

    fn parse_response(response: ChatResponse) -> ModelReply {
        let message = response.message;
        let text = if message.content.trim().is_empty() {
            None
        } else {
            Some(message.content)
        };
        let tool_calls = message
            .tool_calls
            .into_iter()
            .map(|call| ToolInvocation {
                name: call.function.name,
                arguments: Self::decode_arguments(call.function.arguments),
            })
            .collect();
        ModelReply { text, tool_calls }
    }
}

#[async_trait::async_trait]
impl LanguageModel for OllamaClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn chat(&self, transcript: &[ChatMessage], tools: &[ToolDeclaration]) -> Result<ModelReply> {
        let body = self.request_body(transcript, tools);

        let response = self
            .client
            .post(format!("{}/api/chat", self.endpoint.trim_end_matches('/')))
            .json(&body)
            .send()
            .await
            .context("Failed to send request to Ollama")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama API error ({}): {}", status, error_text);
        }

        let response: ChatResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        let reply = Self::parse_response(response);
        log::debug!(
            "Ollama: reply with {} tool call(s), text={}",
            reply.tool_calls.len(),
            reply.text.is_some()
        );
        Ok(reply)
    }
}
