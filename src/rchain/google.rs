use std::collections::HashMap;

use reqwest::Client;
use serde_json::{Map, Value, json};

use crate::rchain::chat_models::{ChatRequest, map_failure};
use crate::rchain::chat_runtime::{Auth, post_json_with_retry};
use crate::rchain::messages::{AIMessage, Role, Usage};
use crate::rchain::openai::as_u32;
use crate::rchain::provider::{self, Provider, ProviderError};
use crate::rchain::tools::ToolCall;

pub(crate) async fn chat(
    client: &Client,
    base_url: Option<&str>,
    api_key: &str,
    request: &ChatRequest<'_>,
) -> Result<AIMessage, ProviderError> {
    let provider = Provider::Google;
    let base = base_url.unwrap_or_else(|| provider::endpoint(provider));
    let url = format!("{}/{}:generateContent", base.trim_end_matches('/'), request.model);
    let payload = build_payload(request);

    let response = post_json_with_retry(
        client,
        &url,
        Auth::Query("key", api_key),
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
    parse_response(&body)
}

pub(crate) fn build_payload(request: &ChatRequest<'_>) -> Value {
    // Gemini has no call ids; tool results are matched back by function name.
    let call_names: HashMap<&str, &str> = request
        .messages
        .iter()
        .flat_map(|message| message.tool_calls.iter())
        .map(|call| (call.id.as_str(), call.name.as_str()))
        .collect();

    let mut system = Vec::new();
    let mut contents = Vec::new();
    for message in request.messages {
        match message.role {
            Role::System => system.push(json!({"text": message.content})),
            Role::Human => contents.push(json!({
                "role": "user",
                "parts": [{"text": message.content}],
            })),
            Role::Ai => {
                let mut parts = Vec::new();
                if !message.content.is_empty() {
                    parts.push(json!({"text": message.content}));
                }
                for call in &message.tool_calls {
                    parts.push(json!({"functionCall": {"name": call.name, "args": call.args}}));
                }
                contents.push(json!({"role": "model", "parts": parts}));
            }
            Role::Tool => {
                let id = message.tool_call_id.as_deref().unwrap_or_default();
                let name = call_names.get(id).copied().unwrap_or(id);
                contents.push(json!({
                    "role": "function",
                    "parts": [{
                        "functionResponse": {
                            "name": name,
                            "response": {"content": message.content},
                        }
                    }],
                }));
            }
        }
    }

    let mut generation = Map::new();
    if let Some(temperature) = request.options.temperature {
        generation.insert("temperature".to_string(), json!(temperature));
    }
    if let Some(max_tokens) = request.options.max_tokens {
        generation.insert("maxOutputTokens".to_string(), json!(max_tokens));
    }
    if !request.options.stop.is_empty() {
        generation.insert("stopSequences".to_string(), json!(request.options.stop));
    }

    let mut payload = Map::new();
    payload.insert("contents".to_string(), Value::Array(contents));
    if !system.is_empty() {
        payload.insert("systemInstruction".to_string(), json!({"parts": system}));
    }
    if !generation.is_empty() {
        payload.insert("generationConfig".to_string(), Value::Object(generation));
    }
    if !request.tools.is_empty() {
        let declarations = request
            .tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.function.name,
                    "description": tool.function.description,
                    "parameters": tool.function.to_schema(),
                })
            })
            .collect::<Vec<_>>();
        payload.insert(
            "tools".to_string(),
            json!([{"functionDeclarations": declarations}]),
        );
    }
    Value::Object(payload)
}

pub(crate) fn parse_response(body: &Value) -> Result<AIMessage, ProviderError> {
    let provider = Provider::Google;
    let candidate = body["candidates"]
        .get(0)
        .ok_or_else(|| ProviderError::Malformed {
            provider,
            reason: "missing candidates".to_string(),
        })?;

    let mut content = String::new();
    let mut tool_calls = Vec::new();
    if let Some(parts) = candidate["content"]["parts"].as_array() {
        for part in parts {
            if let Some(text) = part["text"].as_str() {
                content.push_str(text);
            }
            if let Some(call) = part.get("functionCall") {
                let name = call["name"].as_str().unwrap_or_default().to_string();
                tool_calls.push(ToolCall {
                    id: format!("call_{}", tool_calls.len()),
                    name,
                    args: call["args"].clone(),
                });
            }
        }
    }
    if content.is_empty() && tool_calls.is_empty() {
        return Err(ProviderError::EmptyResponse { provider });
    }

    let usage = body
        .get("usageMetadata")
        .filter(|usage| usage.is_object())
        .map(|usage| Usage {
            prompt_tokens: as_u32(&usage["promptTokenCount"]),
            completion_tokens: as_u32(&usage["candidatesTokenCount"]),
            total_tokens: as_u32(&usage["totalTokenCount"]),
        });

    Ok(AIMessage {
        content,
        tool_calls,
        usage,
        model: body["modelVersion"].as_str().map(str::to_string),
        finish_reason: candidate["finishReason"].as_str().map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rchain::chat_models::ChatOptions;
    use crate::rchain::messages::Message;

    #[test]
    fn system_goes_to_instruction_and_ai_to_model_role() {
        let messages = vec![
            Message::system("Solve the following math problems"),
            Message::human("What is 81 divided by 9?"),
            Message::ai("9"),
        ];
        let options = ChatOptions {
            stop: vec!["\nObservation".to_string()],
            ..ChatOptions::default()
        };
        let payload = build_payload(&ChatRequest {
            model: "gemini-1.5-flash",
            messages: &messages,
            options: &options,
            tools: &[],
        });

        assert_eq!(
            payload["systemInstruction"]["parts"][0]["text"],
            "Solve the following math problems"
        );
        assert_eq!(payload["contents"].as_array().unwrap().len(), 2);
        assert_eq!(payload["contents"][1]["role"], "model");
        assert_eq!(
            payload["generationConfig"]["stopSequences"],
            json!(["\nObservation"])
        );
    }

    #[test]
    fn tool_results_resolve_function_name_from_call_id() {
        let mut assistant = Message::ai("");
        assistant.tool_calls.push(ToolCall {
            id: "call_0".to_string(),
            name: "multiply_numbers".to_string(),
            args: json!({"x": 10, "y": 20}),
        });
        let messages = vec![assistant, Message::tool_result("call_0", "200")];
        let payload = build_payload(&ChatRequest {
            model: "gemini-1.5-flash",
            messages: &messages,
            options: &ChatOptions::default(),
            tools: &[],
        });

        assert_eq!(
            payload["contents"][1]["parts"][0]["functionResponse"]["name"],
            "multiply_numbers"
        );
    }

    #[test]
    fn parses_candidate_text_and_calls() {
        let body = json!({
            "candidates": [{
                "finishReason": "STOP",
                "content": {"parts": [
                    {"text": "Checking. "},
                    {"functionCall": {"name": "simple_search", "args": {"query": "Apple Intelligence"}}}
                ]}
            }],
            "usageMetadata": {"promptTokenCount": 8, "candidatesTokenCount": 4, "totalTokenCount": 12}
        });

        let message = parse_response(&body).unwrap();
        assert_eq!(message.content, "Checking. ");
        assert_eq!(message.tool_calls[0].id, "call_0");
        assert_eq!(message.tool_calls[0].args["query"], "Apple Intelligence");
        assert_eq!(message.usage.unwrap().prompt_tokens, Some(8));
    }
}
