use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use quiz_core::model::{Question, QuestionSource, Subject};
use serde_json::{Value, json};
use services::{
    AiClient, AiConfig, AiQuestionGenerator, GenerationError, GenerationRequest,
    QuestionGenerator,
};

#[derive(Clone)]
struct Stub {
    status: StatusCode,
    content: String,
    last_request: Arc<Mutex<Option<Value>>>,
}

async fn completions(
    State(stub): State<Stub>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    assert_eq!(
        headers.get("authorization").and_then(|v| v.to_str().ok()),
        Some("Bearer test-key")
    );
    *stub.last_request.lock().unwrap() = Some(body);

    if stub.status == StatusCode::TOO_MANY_REQUESTS {
        return (stub.status, [("retry-after", "7")], "slow down").into_response();
    }
    if !stub.status.is_success() {
        return (
            stub.status,
            Json(json!({"error": {"message": stub.content}})),
        )
            .into_response();
    }
    Json(json!({
        "choices": [{"message": {"role": "assistant", "content": stub.content}}]
    }))
    .into_response()
}

async fn spawn_stub(status: StatusCode, content: &str) -> (SocketAddr, Arc<Mutex<Option<Value>>>) {
    let last_request = Arc::new(Mutex::new(None));
    let stub = Stub {
        status,
        content: content.to_owned(),
        last_request: Arc::clone(&last_request),
    };
    let app = Router::new()
        .route("/v1/chat/completions", post(completions))
        .with_state(stub);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, last_request)
}

fn generator(addr: SocketAddr) -> AiQuestionGenerator {
    let config = AiConfig::new(&format!("http://{addr}/v1"), "test-key", "stub-model")
        .unwrap()
        .with_rpm(0);
    AiQuestionGenerator::new(Arc::new(AiClient::new(Some(config))))
}

fn seeded_request() -> GenerationRequest {
    let seed = Question::new(
        "Tom has 3 apples and buys 4 more. How many now?",
        Some("7".into()),
        None,
        QuestionSource::Seed,
    )
    .unwrap();
    GenerationRequest::new(Subject::Math).with_seed(Some(seed))
}

#[tokio::test]
async fn standard_shape_returns_first_item() {
    let content = r#"[
        {"question": "What is 3 + 4?", "answer": "7"},
        {"question": "What is 5 + 2?", "answer": 7},
        {"question": "What is 6 + 1?", "answer": "7"}
    ]"#;
    let (addr, last_request) = spawn_stub(StatusCode::OK, content).await;

    let questions = generator(addr).generate(&seeded_request()).await.unwrap();
    assert_eq!(questions.len(), 3);
    assert_eq!(questions[0].text(), "What is 3 + 4?");
    assert_eq!(questions[0].answer(), Some("7"));
    assert_eq!(questions[1].answer(), Some("7"));

    let sent = last_request.lock().unwrap().clone().unwrap();
    assert_eq!(sent["model"], "stub-model");
    let prompt = sent["messages"][1]["content"].as_str().unwrap();
    assert!(prompt.contains("Tom has 3 apples"));
}

#[tokio::test]
async fn aliased_fields_in_fenced_wrapper() {
    let content = "Here you go:\n```json\n{\"questions\": [\
        {\"q\": \"Capital of France?\", \"correctAnswer\": \"Paris\"},\
        {\"prompt\": \"Capital of Japan?\", \"solution\": \"Tokyo\"},\
        {\"text\": \"Capital of Italy?\", \"correct_answer\": \"Rome\"}\
    ]}\n```";
    let (addr, _) = spawn_stub(StatusCode::OK, content).await;

    let questions = generator(addr)
        .generate(&GenerationRequest::new(Subject::English))
        .await
        .unwrap();
    assert_eq!(questions.len(), 3);
    assert_eq!(questions[0].text(), "Capital of France?");
    assert_eq!(questions[0].answer(), Some("Paris"));
}

#[tokio::test]
async fn degenerate_options_are_normalized() {
    let content = r#"[
        {"question": "Pick the even number", "choices": "A. 3\nB. 4\nC. 5", "answer": "B"},
        {"question": "Which is a fruit?", "options": [{"text": "Apple"}, {"label": "Brick"}], "answer": "Apple"},
        {"question": "Odd one out", "options": [], "answer": "9"},
        {"question": "Pick the vowel", "options": ["x | e | z"], "answer": "e"}
    ]"#;
    let (addr, _) = spawn_stub(StatusCode::OK, content).await;

    let questions = generator(addr).generate(&seeded_request()).await.unwrap();
    assert_eq!(questions.len(), 4);
    let first = &questions[0];
    assert_eq!(first.text(), "Pick the even number");
    assert_eq!(
        first.options().unwrap(),
        ["3".to_owned(), "4".to_owned(), "5".to_owned()]
    );
    assert_eq!(first.answer(), Some("4"));
    assert_eq!(questions[1].options().unwrap().len(), 2);
    assert!(questions[2].options().is_none());
    assert_eq!(
        questions[3].options().unwrap(),
        ["x".to_owned(), "e".to_owned(), "z".to_owned()]
    );
}

#[tokio::test]
async fn generate_truncates_to_requested_count() {
    let content = r#"[{"q": "1 + 1?", "answer": 2}, {"q": "2 + 2?", "answer": 4}]"#;
    let (addr, _) = spawn_stub(StatusCode::OK, content).await;

    let questions = generator(addr)
        .generate(&seeded_request().with_count(1))
        .await
        .unwrap();
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0].text(), "1 + 1?");
}

#[tokio::test]
async fn rate_limit_carries_retry_after() {
    let (addr, _) = spawn_stub(StatusCode::TOO_MANY_REQUESTS, "").await;
    let err = generator(addr).generate(&seeded_request()).await.unwrap_err();
    assert!(matches!(
        err,
        GenerationError::RateLimited { retry_after } if retry_after == Duration::from_secs(7)
    ));
}

#[tokio::test]
async fn provider_errors_keep_message() {
    let (addr, _) = spawn_stub(StatusCode::UNAUTHORIZED, "invalid api key").await;
    let err = generator(addr).generate(&seeded_request()).await.unwrap_err();
    match err {
        GenerationError::HttpStatus { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "invalid api key");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn unparseable_output_returns_raw_text() {
    let (addr, _) = spawn_stub(StatusCode::OK, "Sorry, I cannot help with that.").await;
    let err = generator(addr).generate(&seeded_request()).await.unwrap_err();
    match err {
        GenerationError::Parse { raw, .. } => assert_eq!(raw, "Sorry, I cannot help with that."),
        other => panic!("unexpected error: {other:?}"),
    }
}
