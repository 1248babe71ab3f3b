use citybrief::error::failure_kind;
use citybrief::llm::remote::RemoteLlmProvider;
use citybrief::llm::{LlmProvider, LlmRequest};

const CHAT_PATH: &str = "/v1/chat/completions";

fn provider(server: &mockito::ServerGuard, api_key: Option<&str>) -> RemoteLlmProvider {
    RemoteLlmProvider::new(
        format!("{}{}", server.url(), CHAT_PATH),
        api_key.map(str::to_string),
        "qwen2.5:7b",
    )
}

#[tokio::test]
async fn test_remote_provider_with_mock() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", CHAT_PATH)
        .match_header("authorization", "Bearer fake-api-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r###"{
                "model": "qwen2.5:7b",
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": "## 今日天气概况\n北京晴。"
                    },
                    "finish_reason": "stop"
                }],
                "usage": {
                    "prompt_tokens": 10,
                    "completion_tokens": 5,
                    "total_tokens": 15
                }
            }"###,
        )
        .create_async()
        .await;

    let request = LlmRequest {
        prompt: "Test prompt".to_string(),
        max_tokens: Some(100),
        temperature: Some(0.7),
        timeout_seconds: Some(10),
    };

    let response = provider(&server, Some("fake-api-key"))
        .generate(request)
        .await
        .expect("completion");

    assert_eq!(response.content, "## 今日天气概况\n北京晴。");
    assert_eq!(response.usage.prompt_tokens, 10);
    assert_eq!(response.usage.completion_tokens, 5);
    assert_eq!(response.usage.total_tokens, 15);
    assert_eq!(response.model, "qwen2.5:7b");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_remote_provider_without_usage_or_key() {
    let mut server = mockito::Server::new_async().await;

    // Ollama-style reply: no usage block, no key expected
    let mock = server
        .mock("POST", CHAT_PATH)
        .match_header("authorization", mockito::Matcher::Missing)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices": [{"message": {"role": "assistant", "content": "ok"}}]}"#)
        .create_async()
        .await;

    let response = provider(&server, None)
        .generate(LlmRequest::new("Test"))
        .await
        .expect("completion");

    assert_eq!(response.content, "ok");
    assert_eq!(response.usage.total_tokens, 0);
    assert_eq!(response.model, "qwen2.5:7b");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_remote_provider_error_handling() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", CHAT_PATH)
        .with_status(429)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error": {"message": "Rate limit exceeded"}}"#)
        .create_async()
        .await;

    let err = provider(&server, Some("fake-api-key"))
        .generate(LlmRequest::new("Test"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("429"));
    assert_eq!(failure_kind(&err), "status");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_remote_provider_empty_choices_is_payload_error() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("POST", CHAT_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices": []}"#)
        .create_async()
        .await;

    let err = provider(&server, None)
        .generate(LlmRequest::new("Test"))
        .await
        .unwrap_err();

    assert_eq!(failure_kind(&err), "payload");
}

#[tokio::test]
async fn test_remote_provider_timeout() {
    let mut server = mockito::Server::new_async().await;

    // Mock slow response
    let _mock = server
        .mock("POST", CHAT_PATH)
        .with_status(200)
        .with_chunked_body(|w| {
            std::thread::sleep(std::time::Duration::from_secs(3));
            w.write_all(b"too late")
        })
        .create_async()
        .await;

    let request = LlmRequest {
        timeout_seconds: Some(1),
        ..LlmRequest::new("Test")
    };

    let err = provider(&server, None).generate(request).await.unwrap_err();

    assert!(err.to_string().contains("timed out"));
    assert_eq!(failure_kind(&err), "timeout");
}

#[tokio::test]
async fn test_list_models() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/v1/models")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"object": "list", "data": [{"id": "qwen2.5:7b"}, {"id": "llama3"}]}"#)
        .create_async()
        .await;

    let models = provider(&server, None).list_models().await.expect("models");

    assert_eq!(models, vec!["qwen2.5:7b".to_string(), "llama3".to_string()]);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_set_model_switches_to_offered_model() {
    let mut server = mockito::Server::new_async().await;

    let _models = server
        .mock("GET", "/v1/models")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"data": [{"id": "qwen2.5:7b"}, {"id": "llama3"}]}"#)
        .create_async()
        .await;
    let chat = server
        .mock("POST", CHAT_PATH)
        .match_body(mockito::Matcher::PartialJsonString(r#"{"model": "llama3"}"#.into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices": [{"message": {"role": "assistant", "content": "ok"}}]}"#)
        .create_async()
        .await;

    let provider = provider(&server, None);
    assert!(!provider.set_model("mistral").await.expect("listing"));
    assert_eq!(provider.model_name(), "qwen2.5:7b");

    assert!(provider.set_model("llama3").await.expect("listing"));
    assert_eq!(provider.model_name(), "llama3");

    let response = provider
        .generate(LlmRequest::new("hi"))
        .await
        .expect("completion");
    assert_eq!(response.model, "llama3");
    chat.assert_async().await;
}

#[tokio::test]
async fn test_set_model_listing_failure_is_error() {
    let mut server = mockito::Server::new_async().await;

    let _models = server
        .mock("GET", "/v1/models")
        .with_status(500)
        .create_async()
        .await;

    let provider = provider(&server, None);
    let err = provider.set_model("llama3").await.unwrap_err();
    assert_eq!(failure_kind(&err), "status");
    assert_eq!(provider.model_name(), "qwen2.5:7b");
}
