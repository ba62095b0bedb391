use httpmock::prelude::*;
use invoice_extractor::domain::chat::{ChatMessage, ChatRequest, Role};
use invoice_extractor::domain::ports::ChatModel;
use invoice_extractor::llm::tools::tool_definitions;
use invoice_extractor::{ExtractorError, OpenAiChatClient};
use serde_json::json;
use std::time::Duration;

fn client(server: &MockServer, api_key: Option<&str>) -> OpenAiChatClient {
    OpenAiChatClient::new(
        server.url("/v1/"),
        "gpt-4o-mini",
        api_key.map(str::to_string),
        Duration::from_secs(5),
    )
    .unwrap()
}

fn tool_request() -> ChatRequest {
    ChatRequest {
        messages: vec![
            ChatMessage::system("You extract invoices."),
            ChatMessage::user("Total due $42.00"),
        ],
        tools: tool_definitions(),
        temperature: Some(0.0),
        max_tokens: Some(1024),
        json_response: false,
    }
}

#[tokio::test]
async fn test_tool_call_response_is_parsed() {
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .header("authorization", "Bearer sk-test")
            .body_contains("\"tool_choice\":\"auto\"")
            .body_contains("\"model\":\"gpt-4o-mini\"");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({
                "id": "chatcmpl-1",
                "object": "chat.completion",
                "choices": [{
                    "index": 0,
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": {
                                "name": "search_text",
                                "arguments": "{\"query\": \"total\"}"
                            }
                        }]
                    },
                    "finish_reason": "tool_calls"
                }],
                "usage": {"prompt_tokens": 120, "completion_tokens": 18, "total_tokens": 138}
            }));
    });

    let response = client(&server, Some("sk-test"))
        .complete(&tool_request())
        .await
        .unwrap();

    api_mock.assert();
    assert_eq!(response.message.role, Role::Assistant);
    assert_eq!(response.message.tool_calls.len(), 1);
    assert_eq!(response.message.tool_calls[0].function.name, "search_text");
    assert_eq!(response.finish_reason.as_deref(), Some("tool_calls"));
    assert_eq!(response.usage.unwrap().total_tokens, 138);
}

#[tokio::test]
async fn test_json_mode_request_without_tools() {
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .body_contains("\"response_format\":{\"type\":\"json_object\"}");
        then.status(200).json_body(json!({
            "choices": [{
                "message": {"role": "assistant", "content": "{\"corrections\": []}", "tool_calls": null},
                "finish_reason": "stop"
            }]
        }));
    });

    let request = ChatRequest {
        messages: vec![ChatMessage::user("verify this")],
        json_response: true,
        ..Default::default()
    };
    let response = client(&server, None).complete(&request).await.unwrap();

    api_mock.assert();
    assert!(response.message.tool_calls.is_empty());
    assert_eq!(response.message.content.as_deref(), Some("{\"corrections\": []}"));
    assert!(response.usage.is_none());
}

#[tokio::test]
async fn test_error_status_is_not_retried() {
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(429).body("{\"error\": {\"message\": \"Rate limit reached\"}}");
    });

    let err = client(&server, Some("sk-test"))
        .complete(&tool_request())
        .await
        .unwrap_err();

    api_mock.assert_hits(1);
    match err {
        ExtractorError::LlmApiError { status, body } => {
            assert_eq!(status, 429);
            assert!(body.contains("Rate limit"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_empty_choices_is_an_llm_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(200).json_body(json!({"choices": []}));
    });

    let err = client(&server, None)
        .complete(&tool_request())
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractorError::LlmError { .. }));
}
