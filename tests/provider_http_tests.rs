/// 集成测试：各提供商的 HTTP 协议
/// 用 wiremock 模拟 OpenAI、Azure OpenAI、Gemini 与 Ollama 的接口

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ai_review::ai::functions::{code_explanation_function, code_review_function};
use ai_review::ai::manager::{AIProvider, AIRequest};
use ai_review::ai::providers::{GeminiProvider, OllamaProvider, OpenAIProvider};
use ai_review::infrastructure::error::{ErrorCategory, ReviewError};
use ai_review::report::Report;
use ai_review::review::result::ReviewApproach;

fn client() -> Arc<reqwest::Client> {
    Arc::new(reqwest::Client::new())
}

fn review_arguments() -> serde_json::Value {
    json!({
        "codeIssues": [
            {"issueType": "Logic", "description": "Index based loop", "criticalityLevel": 2}
        ],
        "securityVulnerabilityIssues": [],
        "engineeringPracticesIssues": [],
        "documentationIssues": [{"issueDescription": "Missing docstring"}],
        "reviewScore": 80,
        "refactoredCode": "def calculate_sum(numbers):\n    return sum(numbers)"
    })
}

fn review_request() -> AIRequest {
    AIRequest::function_review("You are a code reviewer", "Review this".to_string(), code_review_function())
}

#[tokio::test]
async fn test_openai_tool_call_request_and_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "tool_choice": {"type": "function", "function": {"name": "code_review"}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o-mini-2024-07-18",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "code_review",
                            "arguments": review_arguments().to_string()
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 120, "completion_tokens": 80, "total_tokens": 200}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = OpenAIProvider::new(
        client(),
        "openai",
        "sk-test".to_string(),
        format!("{}/v1", mock_server.uri()),
        "gpt-4o-mini".to_string(),
    );

    let response = provider.chat(&review_request()).await.unwrap();
    assert_eq!(response.provider, "openai");
    assert_eq!(response.model, "gpt-4o-mini-2024-07-18");
    assert_eq!(response.metadata.get("finish_reason").map(String::as_str), Some("tool_calls"));
    assert_eq!(response.token_usage.map(|u| u.total_tokens), Some(200));

    let call = response.function_call("code_review").unwrap();
    assert_eq!(call.arguments["reviewScore"], 80);
    assert_eq!(call.arguments["codeIssues"][0]["criticalityLevel"], 2);
}

#[tokio::test]
async fn test_openai_plain_text_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {"role": "assistant", "content": "  {\"reviewScore\": 90}  "},
                "finish_reason": "stop"
            }]
        })))
        .mount(&mock_server)
        .await;

    let provider = OpenAIProvider::new(
        client(),
        "deepseek",
        "sk-test".to_string(),
        mock_server.uri(),
        "deepseek-chat".to_string(),
    );
    let request = AIRequest::prompt_review("You are a code reviewer", "Review this".to_string());

    let response = provider.chat(&request).await.unwrap();
    assert_eq!(response.text(), Some("{\"reviewScore\": 90}"));
    assert!(response.function_calls.is_empty());
    // 响应里没有 model 时使用请求的默认模型
    assert_eq!(response.model, "deepseek-chat");
    assert_eq!(response.provider, "deepseek");
}

#[tokio::test]
async fn test_azure_deployment_url_and_api_key_header() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/openai/deployments/reviewer/chat/completions"))
        .and(query_param("api-version", "2024-06-01"))
        .and(header("api-key", "azure-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "tool_calls": [{
                        "type": "function",
                        "function": {"name": "code_review", "arguments": review_arguments().to_string()}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = OpenAIProvider::azure(
        client(),
        "azure-secret".to_string(),
        mock_server.uri(),
        "reviewer".to_string(),
        "2024-06-01".to_string(),
    );

    let response = provider.chat(&review_request()).await.unwrap();
    assert_eq!(response.provider, "azure");
    assert_eq!(response.model, "reviewer");
    assert!(response.function_call("code_review").is_some());
}

#[tokio::test]
async fn test_gemini_generate_content() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
        .and(header("x-goog-api-key", "gemini-key"))
        .and(body_partial_json(json!({
            "toolConfig": {"functionCallingConfig": {"mode": "ANY"}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"functionCall": {"name": "code_review", "args": review_arguments()}},
                        {"functionCall": {"name": "code_explanation", "args": {"purpose": "Sum numbers"}}}
                    ]
                },
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 50, "candidatesTokenCount": 40, "totalTokenCount": 90},
            "modelVersion": "gemini-1.5-flash-002"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = GeminiProvider::new(
        client(),
        "gemini-key".to_string(),
        format!("{}/v1beta", mock_server.uri()),
        "gemini-1.5-flash".to_string(),
    );
    let request = AIRequest::auto_analysis(
        "You are a code analyst",
        "Review and explain".to_string(),
        vec![code_review_function(), code_explanation_function()],
    );

    let response = provider.chat(&request).await.unwrap();
    assert_eq!(response.provider, "gemini");
    assert_eq!(response.function_calls.len(), 2);
    assert_eq!(response.function_call("code_explanation").unwrap().arguments["purpose"], "Sum numbers");
    assert_eq!(response.token_usage.map(|u| u.total_tokens), Some(90));
}

#[tokio::test]
async fn test_ollama_chat_with_object_arguments() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"model": "qwen2.5-coder:7b", "stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "qwen2.5-coder:7b",
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [{
                    "function": {"name": "code_review", "arguments": review_arguments()}
                }]
            },
            "done": true
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = OllamaProvider::new(client(), mock_server.uri(), "qwen2.5-coder:7b".to_string());

    let response = provider.chat(&review_request()).await.unwrap();
    assert_eq!(response.provider, "ollama");
    assert_eq!(response.text(), None);
    assert_eq!(response.function_call("code_review").unwrap().arguments["reviewScore"], 80);
}

#[tokio::test]
async fn test_http_error_maps_to_ai_service_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {
                "message": "Incorrect API key provided",
                "type": "invalid_request_error",
                "code": "invalid_api_key"
            }
        })))
        .mount(&mock_server)
        .await;

    let provider = OpenAIProvider::new(
        client(),
        "openai",
        "wrong".to_string(),
        mock_server.uri(),
        "gpt-4o-mini".to_string(),
    );

    let error = provider.chat(&review_request()).await.unwrap_err();
    match &error {
        ReviewError::AIService { provider, message, status } => {
            assert_eq!(provider, "openai");
            assert_eq!(*status, Some(401));
            assert!(message.contains("Incorrect API key provided"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!error.is_parsing_failure());
    assert!(!matches!(error.category(), ErrorCategory::Data));
}

#[tokio::test]
async fn test_undecodable_body_is_parsing_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&mock_server)
        .await;

    let provider = OllamaProvider::new(client(), mock_server.uri(), "llama3.1".to_string());
    let request = AIRequest::prompt_review("system", "prompt".to_string());

    let error = provider.chat(&request).await.unwrap_err();
    assert!(error.is_parsing_failure());
    assert_eq!(error.raw_response(), Some("<html>gateway</html>"));
}

#[tokio::test]
async fn test_gemini_transport_error_does_not_leak_api_key() {
    // 9 号端口没有服务，请求在传输层失败
    let provider = GeminiProvider::new(
        client(),
        "SECRET-GEMINI-KEY".to_string(),
        "http://127.0.0.1:9/v1beta".to_string(),
        "gemini-1.5-flash".to_string(),
    )
    .with_timeout(5);

    let error = provider.chat(&review_request()).await.unwrap_err();
    assert!(matches!(error, ReviewError::Network { .. } | ReviewError::Timeout { .. }));
    assert!(!error.to_string().contains("SECRET-GEMINI-KEY"));
    assert!(!format!("{error:?}").contains("SECRET-GEMINI-KEY"));

    let envelope = Report::failure(ReviewApproach::FunctionCalling, error).envelope();
    assert!(!envelope.to_string().contains("SECRET-GEMINI-KEY"));
}
