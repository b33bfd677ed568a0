use std::sync::Arc;

use serde_json::{Value, json};

use adducation_core::model::{
    Difficulty, EvaluationRequest, InterviewQuestionRequest, LearningRecommendations,
    LearningRequest, QuizRequest,
};
use services::http::{Method, StatusCode};
use services::llm::DEFAULT_MODEL;
use services::{AppSettingsService, LlmConfig, LlmError, LlmGateway, ParseStage, ScriptedTransport};
use storage::repository::InMemoryRepository;

const BASE: &str = "https://llm.test/api/v1";

fn gateway(default_key: Option<&str>) -> (LlmGateway, Arc<ScriptedTransport>, AppSettingsService) {
    let transport = Arc::new(ScriptedTransport::new());
    let settings = AppSettingsService::new(Arc::new(InMemoryRepository::new()));
    let mut config = LlmConfig::default().with_base_url(BASE);
    if let Some(key) = default_key {
        config = config.with_default_api_key(key);
    }
    let gateway = LlmGateway::new(config, transport.clone(), settings.clone());
    (gateway, transport, settings)
}

fn completion(content: &str) -> Value {
    json!({"choices": [{"message": {"role": "assistant", "content": content}}]})
}

fn quiz_request() -> QuizRequest {
    QuizRequest {
        topic: "Rust ownership".into(),
        difficulty: Difficulty::Beginner,
        question_count: 2,
    }
}

#[tokio::test]
async fn missing_key_never_touches_the_network() {
    let (gateway, transport, _) = gateway(None);

    let err = gateway.generate_quiz_questions(&quiz_request()).await.unwrap_err();
    assert!(matches!(err, LlmError::MissingApiKey));
    assert_eq!(err.to_string(), "API key not set");

    assert!(matches!(
        gateway.available_models().await,
        Err(LlmError::MissingApiKey)
    ));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn stored_key_wins_over_default() {
    let (gateway, transport, settings) = gateway(Some("sk-default"));
    assert_eq!(gateway.api_key().await.unwrap().as_deref(), Some("sk-default"));

    settings.set_api_key("sk-stored").await.unwrap();
    transport.push_json(StatusCode::OK, &completion("Tell me about a time you failed."));
    gateway
        .generate_interview_question(&InterviewQuestionRequest {
            job_role: "Backend Engineer".into(),
            difficulty: Difficulty::Advanced,
            skills: vec!["Rust".into(), "SQL".into()],
        })
        .await
        .unwrap();

    assert_eq!(transport.requests()[0].bearer.as_deref(), Some("sk-stored"));
}

#[tokio::test]
async fn quiz_request_shape_and_direct_parse() {
    let (gateway, transport, _) = gateway(Some("sk"));
    let content = json!({"questions": [
        {"question": "Who owns a moved value?", "options": ["The new binding", "Nobody", "The old binding", "The compiler"], "correct_answer": 0, "explanation": "Ownership moves."},
        {"question": "What does & create?", "options": ["A copy", "A borrow"], "correct_answer": 1, "explanation": "A shared reference."}
    ]})
    .to_string();
    transport.push_json(StatusCode::OK, &completion(&content));

    let parsed = gateway.generate_quiz_questions(&quiz_request()).await.unwrap();
    assert_eq!(parsed.stage, ParseStage::Direct);
    assert_eq!(parsed.questions.len(), 2);

    let request = &transport.requests()[0];
    assert_eq!(request.method, Method::POST);
    assert_eq!(request.url, format!("{BASE}/chat/completions"));
    assert!(request.headers.iter().any(|(k, v)| k == "X-Title" && v == "Adducation Learning Platform"));
    assert!(request.headers.iter().any(|(k, _)| k == "HTTP-Referer"));

    let body = request.body.as_ref().unwrap();
    assert_eq!(body["model"], DEFAULT_MODEL);
    assert_eq!(body["max_tokens"], 1000);
    assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    assert_eq!(body["messages"][0]["role"], "system");
    let prompt = body["messages"][1]["content"].as_str().unwrap();
    assert!(prompt.contains("Generate 2 multiple-choice quiz questions about Rust ownership at beginner level"));
}

#[tokio::test]
async fn quiz_in_prose_is_recovered() {
    let (gateway, transport, _) = gateway(Some("sk"));
    let content = "Sure! Here is your quiz:\n{\"questions\":[{\"question\":\"Q1\",\"options\":[\"a\",\"b\",\"c\",\"d\"],\"correct_answer\":2,\"explanation\":\"because\"}]}\nHave fun.";
    transport.push_json(StatusCode::OK, &completion(content));

    let parsed = gateway.generate_quiz_questions(&quiz_request()).await.unwrap();
    assert_eq!(parsed.stage, ParseStage::BalancedBraces);
    assert_eq!(parsed.questions[0].correct_answer, 2);
}

#[tokio::test]
async fn quiz_from_numbered_text_uses_manual_extraction() {
    let (gateway, transport, _) = gateway(Some("sk"));
    let content = "1. What is a lifetime?\nA) A scope for references\nB) A thread\nCorrect answer: A\n\n2. What is a trait?\nA) A struct\nB) Shared behaviour\nC) A macro\nCorrect answer: B";
    transport.push_json(StatusCode::OK, &completion(content));

    let parsed = gateway.generate_quiz_questions(&quiz_request()).await.unwrap();
    assert_eq!(parsed.stage, ParseStage::ManualExtraction);
    assert_eq!(parsed.questions.len(), 2);
    assert_eq!(parsed.questions[1].options.len(), 3);
    assert_eq!(parsed.questions[1].correct_answer, 1);
}

#[tokio::test]
async fn quiz_without_anything_usable_is_a_parse_failure() {
    let (gateway, transport, _) = gateway(Some("sk"));
    transport.push_json(StatusCode::OK, &completion("I cannot help with that."));

    let err = gateway.generate_quiz_questions(&quiz_request()).await.unwrap_err();
    assert!(matches!(err, LlmError::Unparseable(_)));
}

#[tokio::test]
async fn provider_error_status_is_surfaced() {
    let (gateway, transport, _) = gateway(Some("sk"));
    transport.push_text(StatusCode::TOO_MANY_REQUESTS, "rate limited");

    let err = gateway.generate_quiz_questions(&quiz_request()).await.unwrap_err();
    match err {
        LlmError::HttpStatus { status, body } => {
            assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
            assert_eq!(body, "rate limited");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn empty_choices_is_an_empty_response() {
    let (gateway, transport, _) = gateway(Some("sk"));
    transport.push_json(StatusCode::OK, &json!({"choices": []}));

    let err = gateway
        .generate_interview_question(&InterviewQuestionRequest {
            job_role: "Analyst".into(),
            difficulty: Difficulty::Intermediate,
            skills: vec![],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::EmptyResponse));
}

#[tokio::test]
async fn evaluation_extracts_embedded_json() {
    let (gateway, transport, _) = gateway(Some("sk"));
    transport.push_json(
        StatusCode::OK,
        &completion("Here you go: {\"score\": 8, \"strengths\": [\"clear\"], \"improvements\": [\"depth\"], \"overall_feedback\": \"Good answer\"} Thanks"),
    );

    let evaluation = gateway
        .evaluate_interview_response(&EvaluationRequest {
            question: "Why Rust?".into(),
            response: "Memory safety.".into(),
            job_role: "Engineer".into(),
            model_id: Some("openai/gpt-4o-mini".into()),
        })
        .await
        .unwrap();

    assert_eq!(evaluation.score, 8);
    assert_eq!(evaluation.strengths, vec!["clear"]);
    assert_eq!(evaluation.overall_feedback, "Good answer");
    let body = transport.requests()[0].body.clone().unwrap();
    assert_eq!(body["model"], "openai/gpt-4o-mini");
    assert_eq!(body["max_tokens"], 800);
    assert!(body.get("temperature").is_none());
}

#[tokio::test]
async fn unreadable_evaluation_falls_back_to_neutral_score() {
    let (gateway, transport, _) = gateway(Some("sk"));
    transport.push_json(StatusCode::OK, &completion("Solid answer, but add metrics."));

    let evaluation = gateway
        .evaluate_interview_response(&EvaluationRequest {
            question: "Q".into(),
            response: "A".into(),
            job_role: "Engineer".into(),
            model_id: None,
        })
        .await
        .unwrap();

    assert_eq!(evaluation.score, 7);
    assert_eq!(evaluation.strengths, vec!["Response provided"]);
    assert_eq!(evaluation.improvements, vec!["Could be more detailed"]);
    assert_eq!(evaluation.overall_feedback, "Solid answer, but add metrics.");
    assert_eq!(transport.requests()[0].body.as_ref().unwrap()["model"], DEFAULT_MODEL);
}

#[tokio::test]
async fn learning_content_parses_or_falls_back() {
    let (gateway, transport, _) = gateway(Some("sk"));
    let request = LearningRequest {
        topic: "Databases".into(),
        user_level: "beginner".into(),
        skills: vec!["SQL".into()],
        goal: "Become a data engineer".into(),
    };

    transport.push_json(
        StatusCode::OK,
        &completion("{\"recommendations\": [\"Learn indexing\", \"Build a small warehouse\"]}"),
    );
    let parsed = gateway.generate_learning_content(&request).await.unwrap();
    assert_eq!(parsed.recommendations, vec!["Learn indexing", "Build a small warehouse"]);

    transport.push_json(StatusCode::OK, &completion("{not json at all}"));
    let fallback = gateway.generate_learning_content(&request).await.unwrap();
    assert_eq!(fallback, LearningRecommendations::fallback());
    assert_eq!(fallback.recommendations.len(), 5);
}

#[tokio::test]
async fn model_catalog_marks_free_models() {
    let (gateway, transport, _) = gateway(Some("sk"));
    transport.push_json(
        StatusCode::OK,
        &json!({"data": [
            {"id": "meta/llama-3:free", "name": "Llama 3", "pricing": {"prompt": "0.0001"}},
            {"id": "openai/gpt-4o", "name": "GPT-4o", "context_length": 128000, "pricing": {"prompt": "0.000005"}},
            {"id": "mistral/tiny", "pricing": {"prompt": 0}},
            {"name": "no id"}
        ]}),
    );

    let models = gateway.available_models().await.unwrap();

    assert_eq!(models.len(), 3);
    assert!(models[0].is_free);
    assert!(!models[1].is_free);
    assert_eq!(models[1].context_length, Some(128_000));
    assert!(models[2].is_free);
    assert_eq!(models[2].name, "mistral/tiny");
    let request = &transport.requests()[0];
    assert_eq!(request.method, Method::GET);
    assert_eq!(request.url, format!("{BASE}/models"));
}

#[tokio::test]
async fn selected_model_persists_and_feeds_requests() {
    let (gateway, transport, _) = gateway(Some("sk"));
    assert_eq!(gateway.selected_model().await.unwrap(), DEFAULT_MODEL);

    gateway.set_selected_model("google/gemma-7b:free").await.unwrap();
    assert_eq!(gateway.selected_model().await.unwrap(), "google/gemma-7b:free");
    let info = gateway.model_info("").await.unwrap();
    assert_eq!(info.name, "gemma-7b:free");
    assert!(info.is_free);

    transport.push_json(StatusCode::OK, &completion("What is ownership?"));
    gateway
        .generate_interview_question(&InterviewQuestionRequest {
            job_role: "Engineer".into(),
            difficulty: Difficulty::Beginner,
            skills: vec!["Rust".into()],
        })
        .await
        .unwrap();
    let body = transport.requests()[0].body.clone().unwrap();
    assert_eq!(body["model"], "google/gemma-7b:free");
    assert_eq!(body["max_tokens"], 500);
}
