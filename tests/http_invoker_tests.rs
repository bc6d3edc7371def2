mod common;

use serde_json::json;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use allm_contingency::config::Provider;
use allm_contingency::providers::http::{Endpoints, HttpInvoker};
use allm_contingency::{Error, GenerationRequest, ProviderInvoker, ProviderKey};

fn provider(key: ProviderKey, model: &str) -> Provider
{   Provider
    {   key
      , display_name: key.display_name().to_string()
      , active: true
      , credential: "test-secret".to_string()
      , model: model.to_string()
    }
}

async fn invoker() -> (MockServer, HttpInvoker)
{   common::init_logging();
    let server = MockServer::start().await;
    let invoker = HttpInvoker::with_endpoints(Endpoints::all(&server.uri()));
    (server, invoker)
}

#[tokio::test]
async fn test_openai_chat_completion()
{   let (server, invoker) = invoker().await;
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .and(header("Authorization", "Bearer test-secret"))
      .and(body_partial_json(json!({
        "model": "gpt-4",
        "max_tokens": 1000,
        "messages": [{"role": "user", "content": "Say hi"}]
      })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"message": {"role": "assistant", "content": "hi"}}],
        "usage": {"total_tokens": 12}
      })))
      .expect(1)
      .mount(&server)
      .await;

    let completion = assert_ok!(
      invoker
        .invoke(&provider(ProviderKey::OpenAI, "gpt-4"), &GenerationRequest::new("Say hi"))
        .await
    );
    assert_eq!(completion.content, "hi");
    assert_eq!(completion.tokens_used, 12);
}

#[tokio::test]
async fn test_openrouter_sends_title_header()
{   let (server, invoker) = invoker().await;
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .and(header("X-Title", "allm-contingency"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"message": {"role": "assistant", "content": "routed"}}]
      })))
      .mount(&server)
      .await;

    let completion = assert_ok!(
      invoker
        .invoke(
          &provider(ProviderKey::OpenRouter, "openai/gpt-4"),
          &GenerationRequest::new("x")
        )
        .await
    );
    assert_eq!(completion.content, "routed");
    assert_eq!(completion.tokens_used, 0);
}

#[tokio::test]
async fn test_anthropic_messages()
{   let (server, invoker) = invoker().await;
    Mock::given(method("POST"))
      .and(path("/messages"))
      .and(header("x-api-key", "test-secret"))
      .and(header("anthropic-version", "2023-06-01"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "content": [{"type": "text", "text": "claude says hi"}],
        "usage": {"input_tokens": 4, "output_tokens": 7}
      })))
      .mount(&server)
      .await;

    let mut request = GenerationRequest::new("x");
    request.max_tokens = Some(50);
    let completion = assert_ok!(
      invoker
        .invoke(&provider(ProviderKey::Anthropic, "claude-3-sonnet-20240229"), &request)
        .await
    );
    assert_eq!(completion.content, "claude says hi");
    assert_eq!(completion.tokens_used, 7);
}

#[tokio::test]
async fn test_gemini_generate_content()
{   let (server, invoker) = invoker().await;
    Mock::given(method("POST"))
      .and(path("/models/gemini-2.0-flash-exp:generateContent"))
      .and(header("x-goog-api-key", "test-secret"))
      .and(body_partial_json(json!({
        "generationConfig": {"maxOutputTokens": 1000, "topK": 10}
      })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{"content": {"parts": [{"text": "gemini copy"}]}}],
        "usageMetadata": {"totalTokenCount": 33}
      })))
      .mount(&server)
      .await;

    let completion = assert_ok!(
      invoker
        .invoke(
          &provider(ProviderKey::Gemini, "gemini-2.0-flash-exp"),
          &GenerationRequest::new("x")
        )
        .await
    );
    assert_eq!(completion.content, "gemini copy");
    assert_eq!(completion.tokens_used, 33);
}

#[tokio::test]
async fn test_error_status_becomes_api_error()
{   let (server, invoker) = invoker().await;
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
      .mount(&server)
      .await;

    let err = assert_err!(
      invoker
        .invoke(&provider(ProviderKey::OpenAI, "gpt-4"), &GenerationRequest::new("x"))
        .await
    );
    match err
    {   Error::ApiError(message) => {
          assert!(message.contains("429"));
          assert!(message.contains("slow down"));
          assert!(!message.contains("test-secret"));
        }
      , other => panic!("unexpected error: {:?}", other)
    }
}

#[tokio::test]
async fn test_empty_choices_is_an_error()
{   let (server, invoker) = invoker().await;
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
      .mount(&server)
      .await;

    let err = assert_err!(
      invoker
        .invoke(&provider(ProviderKey::OpenAI, "gpt-4"), &GenerationRequest::new("x"))
        .await
    );
    assert_eq!(err, Error::NoChoicesInResponse);
}

#[tokio::test]
async fn test_kilocode_and_missing_key_fail_without_network()
{   let (server, invoker) = invoker().await;

    let err = assert_err!(
      invoker
        .invoke(&provider(ProviderKey::Kilocode, "kilocode-model"), &GenerationRequest::new("x"))
        .await
    );
    assert!(matches!(err, Error::ProviderNotImplemented(_)));

    let mut keyless = provider(ProviderKey::OpenAI, "gpt-4");
    keyless.credential = String::new();
    let err = assert_err!(invoker.invoke(&keyless, &GenerationRequest::new("x")).await);
    assert!(matches!(err, Error::MissingApiKey(_)));

    let received = server.received_requests().await.unwrap_or_default();
    assert!(received.is_empty());
}
