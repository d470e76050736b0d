use std::fmt;

use crate::rchain::tools::ToolCall;

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    System,
    Human,
    Ai,
    Tool,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Human => "human",
            Self::Ai => "ai",
            Self::Tool => "tool",
        }
    }

    /// Transcript prefix used when a prompt is rendered as plain text.
    pub fn label(self) -> &'static str {
        match self {
            Self::System => "System",
            Self::Human => "Human",
            Self::Ai => "AI",
            Self::Tool => "Tool",
        }
    }
}

/// One entry of a conversation history.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Tool calls requested by an assistant turn.
    pub tool_calls: Vec<ToolCall>,
    /// Call id a tool-result message answers.
    pub tool_call_id: Option<String>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self::with_role(Role::Human, content)
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self::with_role(Role::Ai, content)
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::with_role(Role::Tool, content)
        }
    }
}

impl From<&AIMessage> for Message {
    fn from(message: &AIMessage) -> Self {
        Self {
            tool_calls: message.tool_calls.clone(),
            ..Self::ai(message.content.clone())
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.role.label(), self.content)
    }
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

/// Assistant message returned by chat models.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AIMessage {
    /// Natural language content.
    pub content: String,
    /// Tool call requests emitted by the model.
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<Usage>,
    /// Model id echoed back by the provider.
    pub model: Option<String>,
    pub finish_reason: Option<String>,
}

impl AIMessage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }
}

impl fmt::Display for AIMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "content={:?}", self.content)?;
        if !self.tool_calls.is_empty() {
            let names = self
                .tool_calls
                .iter()
                .map(|call| call.name.as_str())
                .collect::<Vec<_>>();
            write!(f, " tool_calls={names:?}")?;
        }
        if let Some(model) = &self.model {
            write!(f, " model={model:?}")?;
        }
        if let Some(reason) = &self.finish_reason {
            write!(f, " finish_reason={reason:?}")?;
        }
        if let Some(usage) = &self.usage {
            write!(
                f,
                " usage={{prompt_tokens: {}, completion_tokens: {}, total_tokens: {}}}",
                fmt_count(usage.prompt_tokens),
                fmt_count(usage.completion_tokens),
                fmt_count(usage.total_tokens)
            )?;
        }
        Ok(())
    }
}

fn fmt_count(value: Option<u32>) -> String {
    value.map_or_else(|| "?".to_string(), |count| count.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ai_message_display_includes_usage() {
        let message = AIMessage {
            content: "9".to_string(),
            usage: Some(Usage {
                prompt_tokens: Some(12),
                completion_tokens: Some(1),
                total_tokens: None,
            }),
            model: Some("gpt-4o".to_string()),
            ..AIMessage::default()
        };

        assert_eq!(
            message.to_string(),
            "content=\"9\" model=\"gpt-4o\" usage={prompt_tokens: 12, completion_tokens: 1, total_tokens: ?}"
        );
    }

    #[test]
    fn tool_result_keeps_call_id() {
        let message = Message::tool_result("call_1", "42");
        assert_eq!(message.role, Role::Tool);
        assert_eq!(message.tool_call_id.as_deref(), Some("call_1"));
    }
}
