use reqwest::Client;
use serde_json::{Map, Value, json};

use crate::rchain::chat_models::{ChatRequest, map_failure};
use crate::rchain::chat_runtime::{Auth, post_json_with_retry};
use crate::rchain::messages::{AIMessage, Message, Role, Usage};
use crate::rchain::provider::{self, Provider, ProviderError};
use crate::rchain::tools::ToolCall;

/// Chat-completions call shared by OpenAI and OpenAI-compatible providers.
pub(crate) async fn chat(
    client: &Client,
    provider: Provider,
    base_url: Option<&str>,
    api_key: &str,
    request: &ChatRequest<'_>,
) -> Result<AIMessage, ProviderError> {
    let url = base_url.unwrap_or_else(|| provider::endpoint(provider));
    let payload = build_payload(request);

    let response = post_json_with_retry(
        client,
        url,
        Auth::Bearer(api_key),
        &[],
        &payload,
        request.options.retry.into(),
    )
    .await
    .map_err(|failure| map_failure(provider, failure))?;

    let body: Value = response
        .json()
        .await
        .map_err(|source| ProviderError::Request { provider, source })?;
    parse_response(provider, &body)
}

pub(crate) fn build_payload(request: &ChatRequest<'_>) -> Value {
    let mut payload = Map::new();
    payload.insert("model".to_string(), Value::String(request.model.to_string()));
    payload.insert(
        "messages".to_string(),
        Value::Array(request.messages.iter().map(message_to_json).collect()),
    );
    if let Some(temperature) = request.options.temperature {
        payload.insert("temperature".to_string(), json!(temperature));
    }
    if let Some(max_tokens) = request.options.max_tokens {
        payload.insert("max_tokens".to_string(), json!(max_tokens));
    }
    if !request.options.stop.is_empty() {
        payload.insert("stop".to_string(), json!(request.options.stop));
    }
    if !request.tools.is_empty() {
        payload.insert(
            "tools".to_string(),
            Value::Array(request.tools.iter().map(|tool| tool.to_json()).collect()),
        );
    }
    Value::Object(payload)
}

fn message_to_json(message: &Message) -> Value {
    let role = match message.role {
        Role::System => "system",
        Role::Human => "user",
        Role::Ai => "assistant",
        Role::Tool => "tool",
    };
    let mut map = Map::new();
    map.insert("role".to_string(), Value::String(role.to_string()));
    let content = if message.content.is_empty() && !message.tool_calls.is_empty() {
        Value::Null
    } else {
        Value::String(message.content.clone())
    };
    map.insert("content".to_string(), content);
    if let Some(tool_call_id) = &message.tool_call_id {
        map.insert(
            "tool_call_id".to_string(),
            Value::String(tool_call_id.clone()),
        );
    }
    if !message.tool_calls.is_empty() {
        map.insert(
            "tool_calls".to_string(),
            Value::Array(message.tool_calls.iter().map(tool_call_to_json).collect()),
        );
    }
    Value::Object(map)
}

fn tool_call_to_json(call: &ToolCall) -> Value {
    json!({
        "id": call.id,
        "type": "function",
        "function": {
            "name": call.name,
            "arguments": call.args_as_string(),
        }
    })
}

pub(crate) fn parse_response(provider: Provider, body: &Value) -> Result<AIMessage, ProviderError> {
    let choice = body["choices"]
        .get(0)
        .ok_or_else(|| ProviderError::Malformed {
            provider,
            reason: "missing choices".to_string(),
        })?;
    let message = &choice["message"];
    let content = message["content"].as_str().unwrap_or_default().to_string();
    let tool_calls = parse_tool_calls(message);
    if content.is_empty() && tool_calls.is_empty() {
        return Err(ProviderError::EmptyResponse { provider });
    }

    let usage = body.get("usage").filter(|usage| usage.is_object()).map(|usage| Usage {
        prompt_tokens: as_u32(&usage["prompt_tokens"]),
        completion_tokens: as_u32(&usage["completion_tokens"]),
        total_tokens: as_u32(&usage["total_tokens"]),
    });

    Ok(AIMessage {
        content,
        tool_calls,
        usage,
        model: body["model"].as_str().map(str::to_string),
        finish_reason: choice["finish_reason"].as_str().map(str::to_string),
    })
}

fn parse_tool_calls(message: &Value) -> Vec<ToolCall> {
    let mut tool_calls = Vec::new();
    if let Some(calls) = message["tool_calls"].as_array() {
        for call in calls {
            let id = call["id"].as_str().unwrap_or("").to_string();
            let name = call["function"]["name"].as_str().unwrap_or("").to_string();
            let args = match &call["function"]["arguments"] {
                Value::String(raw) => {
                    serde_json::from_str(raw).unwrap_or(Value::String(raw.clone()))
                }
                other => other.clone(),
            };
            if !name.is_empty() {
                tool_calls.push(ToolCall { id, name, args });
            }
        }
    }
    tool_calls
}

pub(crate) fn as_u32(value: &Value) -> Option<u32> {
    value.as_u64().and_then(|number| u32::try_from(number).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rchain::chat_models::ChatOptions;
    use crate::rchain::tools::{ToolDefinition, ToolFunction, ToolParam};

    #[test]
    fn payload_maps_roles_and_options() {
        let messages = vec![
            Message::system("Solve the following math problems"),
            Message::human("What is 81 divided by 9?"),
            Message::ai("81 divided by 9 is 9."),
        ];
        let options = ChatOptions {
            temperature: Some(0.0),
            stop: vec!["\nObservation".to_string()],
            ..ChatOptions::default()
        };
        let tools = vec![ToolDefinition::from_function(
            ToolFunction::new("multiply_numbers", "Multiply").with_param(ToolParam::number("x", "x")),
        )];
        let payload = build_payload(&ChatRequest {
            model: "gpt-4o",
            messages: &messages,
            options: &options,
            tools: &tools,
        });

        assert_eq!(payload["model"], "gpt-4o");
        assert_eq!(payload["messages"][0]["role"], "system");
        assert_eq!(payload["messages"][1]["role"], "user");
        assert_eq!(payload["messages"][2]["role"], "assistant");
        assert_eq!(payload["stop"], json!(["\nObservation"]));
        assert_eq!(payload["temperature"], json!(0.0));
        assert_eq!(payload["tools"][0]["function"]["name"], "multiply_numbers");
        assert!(payload.get("max_tokens").is_none());
    }

    #[test]
    fn assistant_tool_calls_round_into_payload() {
        let mut assistant = Message::ai("");
        assistant.tool_calls.push(ToolCall {
            id: "call_1".to_string(),
            name: "reverse_string".to_string(),
            args: json!({"text": "hello"}),
        });
        let messages = vec![assistant, Message::tool_result("call_1", "olleh")];
        let payload = build_payload(&ChatRequest {
            model: "gpt-4o",
            messages: &messages,
            options: &ChatOptions::default(),
            tools: &[],
        });

        assert_eq!(payload["messages"][0]["content"], Value::Null);
        assert_eq!(
            payload["messages"][0]["tool_calls"][0]["function"]["arguments"],
            "{\"text\":\"hello\"}"
        );
        assert_eq!(payload["messages"][1]["tool_call_id"], "call_1");
    }

    #[test]
    fn parses_content_usage_and_tool_calls() {
        let body = json!({
            "model": "gpt-4o-2024-08-06",
            "choices": [{
                "finish_reason": "tool_calls",
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "greet_user", "arguments": "{\"name\":\"Alice\"}"}
                    }]
                }
            }],
            "usage": {"prompt_tokens": 20, "completion_tokens": 5, "total_tokens": 25}
        });

        let message = parse_response(Provider::Openai, &body).unwrap();
        assert_eq!(message.content, "");
        assert_eq!(message.tool_calls[0].name, "greet_user");
        assert_eq!(message.tool_calls[0].args, json!({"name": "Alice"}));
        assert_eq!(message.usage.unwrap().total_tokens, Some(25));
        assert_eq!(message.finish_reason.as_deref(), Some("tool_calls"));
    }

    #[test]
    fn empty_choice_is_an_error() {
        let body = json!({"choices": [{"message": {"content": ""}}]});
        assert!(matches!(
            parse_response(Provider::Fireworks, &body),
            Err(ProviderError::EmptyResponse { provider: Provider::Fireworks })
        ));
    }
}
