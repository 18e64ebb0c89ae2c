mod common;

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::ScriptedService;
use parley::config::GenerationConfig;
use parley::generation::{ChatCompletionsService, GenerationService, Prompt, TurnGenerator};
use parley::types::{Persona, Scenario};
use parley::util::retry::RetryPolicy;

fn config(server: &MockServer) -> GenerationConfig {
    GenerationConfig {
        api_key: Some("sk-test".into()),
        url: format!("{}/chat/completions", server.uri()),
        ..GenerationConfig::default()
    }
}

#[tokio::test]
async fn chat_completions_returns_trimmed_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "deepseek-chat",
            "temperature": 0.6,
            "max_tokens": 150
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "  Which floor is the cloakroom on?  "}}]
        })))
        .mount(&server)
        .await;

    let service = ChatCompletionsService::new(config(&server)).unwrap();
    let text = service
        .generate(&Prompt::new("speak as a visitor").with_temperature(0.6))
        .await
        .unwrap();
    assert_eq!(text, "Which floor is the cloakroom on?");
}

#[tokio::test]
async fn empty_choices_are_a_generation_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let service = ChatCompletionsService::new(config(&server)).unwrap();
    let err = service.generate(&Prompt::new("hi")).await.unwrap_err();
    assert_eq!(err.category(), parley::error::ErrorCategory::Generation);
}

#[tokio::test]
async fn non_json_completion_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let service = ChatCompletionsService::new(config(&server)).unwrap();
    let err = service.generate(&Prompt::new("hi")).await.unwrap_err();
    assert!(matches!(err, parley::error::ParleyError::MalformedResponse(_)));
    assert_eq!(err.category(), parley::error::ErrorCategory::Malformed);
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn server_errors_are_retried_when_configured() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "Is the museum shop open late?"}}]
        })))
        .mount(&server)
        .await;

    let service = ChatCompletionsService::new(config(&server))
        .unwrap()
        .with_retry(RetryPolicy {
            initial_backoff: std::time::Duration::from_millis(5),
            ..RetryPolicy::default()
        });
    let text = service.generate(&Prompt::new("hi")).await.unwrap();
    assert_eq!(text, "Is the museum shop open late?");
}

#[tokio::test]
async fn turn_generator_uses_configured_temperatures() {
    let service = Arc::new(
        ScriptedService::new()
            .reply("\"Do you have audio guides?\"")
            .reply("What languages are they in?"),
    );
    let generator = TurnGenerator::new(service.clone()).with_config(&GenerationConfig {
        opening_temperature: 0.2,
        follow_up_temperature: 0.9,
        max_tokens: 80,
        ..GenerationConfig::default()
    });

    let scenario = Scenario::new("Museum visit");
    let persona = Persona::new("visitor");
    let opening = generator.opening(&scenario, &persona).await;
    assert_eq!(opening.text, "Do you have audio guides?");

    let next = generator
        .follow_up(&scenario, &persona, &[], "Yes, at the front desk.")
        .await;
    assert!(!next.verdict.should_end);

    let prompts = service.prompts();
    assert_eq!(prompts[0].temperature, Some(0.2));
    assert_eq!(prompts[1].temperature, Some(0.9));
    assert_eq!(prompts[1].max_tokens, Some(80));
    assert!(prompts[1].text.contains("Yes, at the front desk."));
}
