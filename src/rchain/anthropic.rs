use reqwest::Client;
use serde_json::{Map, Value, json};

use crate::rchain::chat_models::{ChatRequest, map_failure};
use crate::rchain::chat_runtime::{Auth, post_json_with_retry};
use crate::rchain::messages::{AIMessage, Role, Usage};
use crate::rchain::openai::as_u32;
use crate::rchain::provider::{self, Provider, ProviderError};
use crate::rchain::tools::ToolCall;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1024;

pub(crate) async fn chat(
    client: &Client,
    base_url: Option<&str>,
    api_key: &str,
    request: &ChatRequest<'_>,
) -> Result<AIMessage, ProviderError> {
    let provider = Provider::Anthropic;
    let url = base_url.unwrap_or_else(|| provider::endpoint(provider));
    let payload = build_payload(request);

    let response = post_json_with_retry(
        client,
        url,
        Auth::Header("x-api-key", api_key),
        &[("anthropic-version", ANTHROPIC_VERSION)],
        &payload,
        request.options.retry.into(),
    )
    .await
    .map_err(|failure| map_failure(provider, failure))?;

    let body: Value = response
        .json()
        .await
        .map_err(|source| ProviderError::Request { provider, source })?;
    parse_response(&body)
}

/// System turns are hoisted into `system`; consecutive same-role turns merge
/// because the Messages API requires alternating roles.
pub(crate) fn build_payload(request: &ChatRequest<'_>) -> Value {
    let mut system = Vec::new();
    let mut turns: Vec<(&'static str, Vec<Value>)> = Vec::new();

    for message in request.messages {
        let (role, blocks) = match message.role {
            Role::System => {
                system.push(message.content.clone());
                continue;
            }
            Role::Human => ("user", vec![json!({"type": "text", "text": message.content})]),
            Role::Ai => {
                let mut blocks = Vec::new();
                if !message.content.is_empty() {
                    blocks.push(json!({"type": "text", "text": message.content}));
                }
                for call in &message.tool_calls {
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": call.id,
                        "name": call.name,
                        "input": call.args,
                    }));
                }
                ("assistant", blocks)
            }
            Role::Tool => (
                "user",
                vec![json!({
                    "type": "tool_result",
                    "tool_use_id": message.tool_call_id.clone().unwrap_or_default(),
                    "content": message.content,
                })],
            ),
        };
        match turns.last_mut() {
            Some((last_role, last_blocks)) if *last_role == role => last_blocks.extend(blocks),
            _ => turns.push((role, blocks)),
        }
    }

    let mut payload = Map::new();
    payload.insert("model".to_string(), Value::String(request.model.to_string()));
    payload.insert(
        "max_tokens".to_string(),
        json!(request.options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)),
    );
    if !system.is_empty() {
        payload.insert("system".to_string(), Value::String(system.join("\n\n")));
    }
    payload.insert(
        "messages".to_string(),
        Value::Array(
            turns
                .into_iter()
                .map(|(role, content)| json!({"role": role, "content": content}))
                .collect(),
        ),
    );
    if let Some(temperature) = request.options.temperature {
        payload.insert("temperature".to_string(), json!(temperature));
    }
    if !request.options.stop.is_empty() {
        payload.insert("stop_sequences".to_string(), json!(request.options.stop));
    }
    if !request.tools.is_empty() {
        payload.insert(
            "tools".to_string(),
            Value::Array(
                request
                    .tools
                    .iter()
                    .map(|tool| {
                        json!({
                            "name": tool.function.name,
                            "description": tool.function.description,
                            "input_schema": tool.function.to_schema(),
                        })
                    })
                    .collect(),
            ),
        );
    }
    Value::Object(payload)
}

pub(crate) fn parse_response(body: &Value) -> Result<AIMessage, ProviderError> {
    let provider = Provider::Anthropic;
    let blocks = body["content"]
        .as_array()
        .ok_or_else(|| ProviderError::Malformed {
            provider,
            reason: "missing content blocks".to_string(),
        })?;

    let mut content = String::new();
    let mut tool_calls = Vec::new();
    for block in blocks {
        match block["type"].as_str() {
            Some("text") => content.push_str(block["text"].as_str().unwrap_or_default()),
            Some("tool_use") => tool_calls.push(ToolCall {
                id: block["id"].as_str().unwrap_or_default().to_string(),
                name: block["name"].as_str().unwrap_or_default().to_string(),
                args: block["input"].clone(),
            }),
            _ => {}
        }
    }
    if content.is_empty() && tool_calls.is_empty() {
        return Err(ProviderError::EmptyResponse { provider });
    }

    let usage = body.get("usage").filter(|usage| usage.is_object()).map(|usage| {
        let prompt_tokens = as_u32(&usage["input_tokens"]);
        let completion_tokens = as_u32(&usage["output_tokens"]);
        Usage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.zip(completion_tokens).map(|(a, b)| a + b),
        }
    });

    Ok(AIMessage {
        content,
        tool_calls,
        usage,
        model: body["model"].as_str().map(str::to_string),
        finish_reason: body["stop_reason"].as_str().map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rchain::chat_models::ChatOptions;
    use crate::rchain::messages::Message;

    #[test]
    fn hoists_system_and_merges_tool_results() {
        let mut assistant = Message::ai("Let me check.");
        assistant.tool_calls.push(ToolCall {
            id: "toolu_1".to_string(),
            name: "Time".to_string(),
            args: json!({"input": ""}),
        });
        let messages = vec![
            Message::system("You are an all-purpose AI assistant"),
            Message::human("What time is it?"),
            assistant,
            Message::tool_result("toolu_1", "09:15 AM"),
            Message::human("Thanks"),
        ];
        let payload = build_payload(&ChatRequest {
            model: "claude-3-opus-20240229",
            messages: &messages,
            options: &ChatOptions::default(),
            tools: &[],
        });

        assert_eq!(payload["system"], "You are an all-purpose AI assistant");
        assert_eq!(payload["max_tokens"], 1024);
        let turns = payload["messages"].as_array().unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1]["content"][1]["type"], "tool_use");
        assert_eq!(turns[2]["role"], "user");
        assert_eq!(turns[2]["content"][0]["type"], "tool_result");
        assert_eq!(turns[2]["content"][1]["text"], "Thanks");
    }

    #[test]
    fn parses_text_and_usage() {
        let body = json!({
            "model": "claude-3-opus-20240229",
            "stop_reason": "end_turn",
            "content": [{"type": "text", "text": "81 divided by 9 is 9."}],
            "usage": {"input_tokens": 14, "output_tokens": 10}
        });

        let message = parse_response(&body).unwrap();
        assert_eq!(message.content, "81 divided by 9 is 9.");
        assert_eq!(message.usage.unwrap().total_tokens, Some(24));
    }
}
