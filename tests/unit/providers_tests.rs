/*!
 * Provider adapter tests against a local HTTP stub
 */

use serde_json::json;
use vntl::app_config::TranslationCommonConfig;
use vntl::errors::ProviderError;
use vntl::providers::deepl::{self, DeepLProvider};
use vntl::providers::lingva::LingvaProvider;
use vntl::providers::llm::LlmProvider;
use vntl::providers::{BatchRequest, Credentials, Provider};
use vntl::translation::CancellationToken;
use crate::common::{init_logging, HttpStub, StubResponse};

fn request(payload: &[&str], target: &str, api_key: Option<&str>) -> BatchRequest {
    BatchRequest {
        payload: payload.iter().map(|s| s.to_string()).collect(),
        target_language: target.to_string(),
        source_language: None,
        credentials: api_key.map(Credentials::with_api_key).unwrap_or_default(),
    }
}

fn chat_reply(content: &str) -> StubResponse {
    StubResponse::ok(
        json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        })
        .to_string(),
    )
}

fn llm(stub: &HttpStub) -> LlmProvider {
    LlmProvider::new(
        format!("{}/v1/", stub.base_url),
        "test-model",
        &TranslationCommonConfig::default(),
        5,
    )
}

// LLM

#[tokio::test]
async fn test_llm_withFencedReply_shouldPostChatCompletion() {
    init_logging();
    let stub = HttpStub::start(vec![chat_reply("```json\n[\"Xin chào ⟦T0⟧!\", \"Tạm biệt.\"]\n```")]).await;

    let lines = llm(&stub)
        .translate_batch(
            &request(&["Hello ⟦T0⟧!", "Goodbye."], "vi", Some("sk-test")),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(lines, vec!["Xin chào ⟦T0⟧!", "Tạm biệt."]);

    let sent = stub.requests();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].method, "POST");
    assert_eq!(sent[0].path, "/v1/chat/completions");
    assert_eq!(sent[0].header("authorization"), Some("Bearer sk-test"));

    let body = sent[0].json();
    assert_eq!(body["model"], "test-model");
    assert_eq!(body["messages"][0]["role"], "system");
    assert!(body["messages"][0]["content"].as_str().unwrap().contains("to Vietnamese"));
    let user = body["messages"][1]["content"].as_str().unwrap();
    assert!(user.contains("into Vietnamese"));
    assert!(user.contains("exactly 2 strings"));
    assert!(user.contains(r#"["Hello ⟦T0⟧!","Goodbye."]"#));
}

#[tokio::test]
async fn test_llm_withShortReply_shouldFailWithLengthMismatch() {
    let stub = HttpStub::start(vec![chat_reply(r#"["Một", "Hai", "Ba"]"#)]).await;

    let err = llm(&stub)
        .translate_batch(
            &request(&["One", "Two", "Three", "Four"], "vi", Some("sk-test")),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::LengthMismatch { expected: 4, actual: 3 }));
}

#[tokio::test]
async fn test_llm_withoutApiKey_shouldFailBeforeAnyRequest() {
    let stub = HttpStub::start(vec![chat_reply("[]")]).await;

    let err = llm(&stub)
        .translate_batch(&request(&["Hi"], "vi", None), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::AuthenticationError(_)));
    assert!(stub.requests().is_empty());
}

#[tokio::test]
async fn test_llm_withRejectedKey_shouldReportAuthentication() {
    let stub = HttpStub::start(vec![StubResponse::status(401, r#"{"error":"bad key"}"#)]).await;

    let err = llm(&stub)
        .translate_batch(&request(&["Hi"], "vi", Some("sk-bad")), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::AuthenticationError(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_llm_withProseReply_shouldFailToParse() {
    let stub = HttpStub::start(vec![chat_reply("Sorry, I can't do that.")]).await;

    let err = llm(&stub)
        .translate_batch(&request(&["Hi"], "vi", Some("sk-test")), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::ParseError(_)));
}

// DeepL

#[tokio::test]
async fn test_deepl_shouldSendKeyHeaderAndTextArray() {
    let stub = HttpStub::start(vec![StubResponse::ok(
        json!({ "translations": [{ "text": "Hello ⟦T0⟧!" }, { "text": "Bye." }] }).to_string(),
    )])
    .await;
    let provider = DeepLProvider::new(stub.base_url.clone(), 5);
    let mut batch = request(&["こんにちは ⟦T0⟧!", "さようなら。"], "en", Some("key:fx"));
    batch.source_language = Some("ja-JP".to_string());

    let lines = provider
        .translate_batch(&batch, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(lines, vec!["Hello ⟦T0⟧!", "Bye."]);
    let sent = stub.requests();
    assert_eq!(sent[0].path, "/v2/translate");
    assert_eq!(sent[0].header("authorization"), Some("DeepL-Auth-Key key:fx"));
    let body = sent[0].json();
    assert_eq!(body["text"], json!(["こんにちは ⟦T0⟧!", "さようなら。"]));
    assert_eq!(body["target_lang"], "EN-US");
    assert_eq!(body["source_lang"], "JA");
    assert_eq!(body["model_type"], "prefer_quality_optimized");
}

#[tokio::test]
async fn test_deepl_withAutoSourceAndPlainTarget_shouldOmitOptionalFields() {
    let stub = HttpStub::start(vec![StubResponse::ok(
        json!({ "translations": [{ "text": "Chào." }] }).to_string(),
    )])
    .await;
    let provider = DeepLProvider::new(stub.base_url.clone(), 5);

    provider
        .translate_batch(&request(&["Hi."], "vi", Some("key")), &CancellationToken::new())
        .await
        .unwrap();

    let body = stub.requests()[0].json();
    assert_eq!(body["target_lang"], "VI");
    assert!(body.get("source_lang").is_none());
    assert!(body.get("model_type").is_none());
}

#[tokio::test]
async fn test_deepl_withServerError_shouldBeRetryable() {
    let stub = HttpStub::start(vec![StubResponse::status(503, "overloaded")]).await;
    let provider = DeepLProvider::new(stub.base_url.clone(), 5);

    let err = provider
        .translate_batch(&request(&["Hi."], "vi", Some("key")), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::ApiError { status_code: 503, .. }));
    assert!(err.is_retryable());
}

#[test]
fn test_deepl_baseUrl_shouldFollowKeyTierWithoutEndpoint() {
    let provider = DeepLProvider::new("", 5);
    assert_eq!(provider.base_url("abc:fx"), "https://api-free.deepl.com");
    assert_eq!(provider.base_url("abc"), "https://api.deepl.com");
    assert_eq!(
        DeepLProvider::new("http://localhost:9000/", 5).base_url("abc:fx"),
        "http://localhost:9000"
    );
}

#[test]
fn test_deepl_languageCodes_shouldMapRegionalVariants() {
    assert_eq!(deepl::target_code("pt"), "PT-BR");
    assert_eq!(deepl::target_code("zh_tw"), "ZH-HANT");
    assert_eq!(deepl::target_code("de"), "DE");
    assert_eq!(deepl::source_code(Some("auto")), None);
    assert_eq!(deepl::source_code(Some("en-GB")), Some("EN".to_string()));
}

// Lingva

#[tokio::test]
async fn test_lingva_shouldRequestEachLineAndKeepBlankLines() {
    let stub = HttpStub::start(vec![StubResponse::ok(json!({ "translation": "Xin chào" }).to_string())]).await;
    let provider = LingvaProvider::new(stub.base_url.clone(), vec![], 5).unwrap();

    let lines = provider
        .translate_batch(
            &request(&["Hi there", "  ", "Hello"], "vi", None),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(lines, vec!["Xin chào", "  ", "Xin chào"]);
    let sent = stub.requests();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].method, "GET");
    assert_eq!(sent[0].path, "/api/v1/auto/vi/Hi%20there");
    assert_eq!(sent[1].path, "/api/v1/auto/vi/Hello");
}

#[tokio::test]
async fn test_lingva_withFailingMirror_shouldRotateAndStayOnWorkingOne() {
    init_logging();
    let broken = HttpStub::start(vec![StubResponse::status(500, "down")]).await;
    let working = HttpStub::start(vec![StubResponse::ok(json!({ "translation": "ok" }).to_string())]).await;
    let provider =
        LingvaProvider::new(broken.base_url.clone(), vec![working.base_url.clone()], 5).unwrap();

    let lines = provider
        .translate_batch(&request(&["One", "Two"], "vi", None), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(lines, vec!["ok", "ok"]);
    assert_eq!(broken.requests().len(), 1);
    assert_eq!(working.requests().len(), 2);
}

#[tokio::test]
async fn test_lingva_withClientError_shouldNotTryOtherMirrors() {
    let stub = HttpStub::start(vec![StubResponse::status(400, "bad")]).await;
    let provider = LingvaProvider::new(stub.base_url.clone(), vec![], 5).unwrap();

    let err = provider
        .translate_batch(&request(&["One"], "vi", None), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::ApiError { status_code: 400, .. }));
    assert_eq!(stub.requests().len(), 1);
}

#[tokio::test]
async fn test_provider_whenCancelled_shouldNotSend() {
    let stub = HttpStub::start(vec![StubResponse::ok("{}")]).await;
    let provider = LingvaProvider::new(stub.base_url.clone(), vec![], 5).unwrap();
    let token = CancellationToken::new();
    token.cancel();

    let err = provider
        .translate_batch(&request(&["One"], "vi", None), &token)
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Cancelled));
    assert!(stub.requests().is_empty());
}
