// Language-model seam
//
// The agent loop talks to `dyn LanguageModel`; production uses the Messages
// API over reqwest, tests plug in scripted models.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::errors::{AgentError, AgentResult};
use crate::domain::role::AgentRole;

/// One block of a conversation turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

/// A single turn of conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Speaker,
    pub content: Vec<ContentBlock>,
}

impl Turn {
    pub fn user(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Speaker::User,
            content,
        }
    }

    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Speaker::Assistant,
            content,
        }
    }

    /// Concatenation of the plain-text blocks, newline separated
    pub fn text(&self) -> String {
        join_text(&self.content)
    }
}

pub(crate) fn join_text(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Tool declaration as the model sees it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

/// Everything needed for one model call
#[derive(Debug, Clone, Serialize)]
pub struct ModelRequest {
    /// Which agent is asking; not sent over the wire
    #[serde(skip)]
    pub agent: AgentRole,
    pub system: String,
    pub messages: Vec<Turn>,
    pub tools: Vec<ToolSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: StopReason,
}

impl ModelResponse {
    /// A final answer with no tool use
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            stop_reason: StopReason::EndTurn,
        }
    }

    /// A response that requests the given tool calls, as `(id, name, input)`
    pub fn tool_calls(calls: Vec<(&str, &str, Value)>) -> Self {
        Self {
            content: calls
                .into_iter()
                .map(|(id, name, input)| ContentBlock::ToolUse {
                    id: id.to_string(),
                    name: name.to_string(),
                    input,
                })
                .collect(),
            stop_reason: StopReason::ToolUse,
        }
    }

    /// True while the model is waiting on tool results
    pub fn wants_tools(&self) -> bool {
        self.stop_reason == StopReason::ToolUse
            && self
                .content
                .iter()
                .any(|b| matches!(b, ContentBlock::ToolUse { .. }))
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: &ModelRequest) -> AgentResult<ModelResponse>;
}

/// Settings for the Messages API client
#[derive(Debug, Clone)]
pub struct AnthropicSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    tools: &'a [ToolSpec],
    messages: &'a [Turn],
}

/// Messages API client
///
/// No retry or backoff: a failed call fails the agent's turn.
pub struct AnthropicClient {
    settings: AnthropicSettings,
    client: Client,
}

impl AnthropicClient {
    pub fn new(settings: AnthropicSettings) -> Self {
        Self {
            settings,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl LanguageModel for AnthropicClient {
    async fn complete(&self, request: &ModelRequest) -> AgentResult<ModelResponse> {
        let body = MessagesRequest {
            model: &self.settings.model,
            max_tokens: self.settings.max_tokens,
            system: &request.system,
            tools: &request.tools,
            messages: &request.messages,
        };

        debug!(
            agent = %request.agent,
            turns = request.messages.len(),
            "Calling language model"
        );

        let res = self
            .client
            .post(format!(
                "{}/v1/messages",
                self.settings.base_url.trim_end_matches('/')
            ))
            .header("x-api-key", &self.settings.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            return Err(AgentError::LlmError(format!(
                "{}: {}",
                status,
                res.text().await.unwrap_or_default()
            )));
        }

        Ok(res.json::<ModelResponse>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_tool_use_response() {
        let raw = json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "text", "text": "Writing the file."},
                {"type": "tool_use", "id": "toolu_1", "name": "write_file",
                 "input": {"path": "a.txt", "content": "hi"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        });

        let response: ModelResponse = serde_json::from_value(raw).unwrap();
        assert!(response.wants_tools());
        assert_eq!(response.content.len(), 2);
    }

    #[test]
    fn unknown_stop_reason_is_other() {
        let raw = json!({"content": [], "stop_reason": "pause_turn"});
        let response: ModelResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(response.stop_reason, StopReason::Other);
        assert!(!response.wants_tools());
    }

    #[test]
    fn tool_result_omits_false_error_flag() {
        let block = ContentBlock::ToolResult {
            tool_use_id: "toolu_1".to_string(),
            content: "{}".to_string(),
            is_error: false,
        };
        assert_eq!(
            serde_json::to_value(&block).unwrap(),
            json!({"type": "tool_result", "tool_use_id": "toolu_1", "content": "{}"})
        );
    }

    #[test]
    fn turn_text_joins_text_blocks() {
        let turn = Turn::assistant(vec![
            ContentBlock::text("first"),
            ContentBlock::ToolUse {
                id: "t".to_string(),
                name: "list_files".to_string(),
                input: json!({}),
            },
            ContentBlock::text("second"),
        ]);
        assert_eq!(turn.text(), "first\nsecond");
    }

    #[test]
    fn request_body_hides_agent() {
        let request = ModelRequest {
            agent: AgentRole::Designer,
            system: "sys".to_string(),
            messages: vec![],
            tools: vec![],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("agent").is_none());
    }
}
