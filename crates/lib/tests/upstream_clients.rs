//! Real HTTP clients (answer API, LINE reply API, metadata tokens) against local mock servers.

mod common;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::routing::{get, post};
use axum::{Json, Router};
use relay::answer::{
    AnswerError, AnswerRequest, Answerer, DiscoveryEngineClient, MetadataTokenSource, TokenSource,
};
use relay::channels::{DeliveryError, LineChannel, ReplyChannel};
use relay::config::{AnswerConfig, LineConfig};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One captured request: path, Authorization header, JSON body.
type Captured = Arc<Mutex<Vec<(String, String, Value)>>>;

async fn spawn_mock(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}", addr)
}

fn auth_header(headers: &HeaderMap) -> String {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

fn answer_response(results: usize) -> Value {
    let search_results: Vec<Value> = (1..=results)
        .map(|i| json!({ "document": format!("doc{}", i), "title": format!("Tour {}", i), "uri": format!("https://trip.example/{}", i) }))
        .collect();
    json!({
        "answer": {
            "name": "projects/p/locations/global/collections/default_collection/engines/e/sessions/-/answers/1",
            "state": "SUCCEEDED",
            "answerText": "九份一日遊約 NT$1,500",
            "steps": [{
                "state": "SUCCEEDED",
                "actions": [{
                    "searchAction": { "query": "九份" },
                    "observation": { "searchResults": search_results }
                }]
            }]
        },
        "answerQueryToken": "token"
    })
}

async fn answer_mock(status: StatusCode, response: Value, delay: Duration) -> (String, Captured) {
    let captured: Captured = Arc::default();
    let app = Router::new()
        .route(
            "/*path",
            post(
                |State((captured, status, response, delay)): State<(Captured, StatusCode, Value, Duration)>,
                 uri: Uri,
                 headers: HeaderMap,
                 Json(body): Json<Value>| async move {
                    captured
                        .lock()
                        .unwrap()
                        .push((uri.path().to_string(), auth_header(&headers), body));
                    tokio::time::sleep(delay).await;
                    (status, Json(response))
                },
            ),
        )
        .with_state((captured.clone(), status, response, delay));
    (spawn_mock(app).await, captured)
}

fn answer_client(base: &str, timeout_secs: u64) -> DiscoveryEngineClient {
    let config = AnswerConfig {
        api_base: Some(base.to_string()),
        timeout_secs,
        ..AnswerConfig::default()
    };
    DiscoveryEngineClient::new(&config, TokenSource::Static("ya29.test".to_string())).unwrap()
}

fn request(query: &str) -> AnswerRequest {
    AnswerRequest {
        project_id: "proj".to_string(),
        location: "global".to_string(),
        engine_id: "eng".to_string(),
        query: query.to_string(),
    }
}

#[tokio::test]
async fn answer_query_round_trip() {
    let (base, captured) = answer_mock(StatusCode::OK, answer_response(4), Duration::ZERO).await;
    let client = answer_client(&base, 5);

    let result = client.answer(&request("九份")).await.unwrap();
    assert_eq!(result.answer_text, "九份一日遊約 NT$1,500");
    assert_eq!(result.cited_results.len(), 3);
    assert_eq!(result.cited_results[0].title, "Tour 1");
    assert_eq!(result.cited_results[2].uri, "https://trip.example/3");

    let captured = captured.lock().unwrap();
    assert_eq!(captured.len(), 1);
    let (path, auth, body) = &captured[0];
    assert_eq!(
        path,
        "/v1/projects/proj/locations/global/collections/default_collection/engines/eng/servingConfigs/default_serving_config:answer"
    );
    assert_eq!(auth, "Bearer ya29.test");
    assert_eq!(body["query"]["text"], "九份");
    assert!(body.get("session").is_none());
    assert_eq!(body["answerGenerationSpec"]["includeCitations"], true);
}

#[tokio::test]
async fn answer_with_fewer_results_is_not_an_error() {
    let (base, _) = answer_mock(StatusCode::OK, answer_response(1), Duration::ZERO).await;
    let result = answer_client(&base, 5).answer(&request("q")).await.unwrap();
    assert_eq!(result.cited_results.len(), 1);
}

#[tokio::test]
async fn answer_error_status_is_upstream_error() {
    let (base, _) = answer_mock(
        StatusCode::FORBIDDEN,
        json!({ "error": { "code": 403, "status": "PERMISSION_DENIED" } }),
        Duration::ZERO,
    )
    .await;
    let err = answer_client(&base, 5).answer(&request("q")).await.unwrap_err();
    assert!(err.is_upstream());
    match err {
        AnswerError::Api { status, body } => {
            assert_eq!(status.as_u16(), 403);
            assert!(body.contains("PERMISSION_DENIED"));
        }
        other => panic!("expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn answer_without_answer_field_is_malformed() {
    let (base, _) = answer_mock(StatusCode::OK, json!({ "answerQueryToken": "x" }), Duration::ZERO).await;
    let err = answer_client(&base, 5).answer(&request("q")).await.unwrap_err();
    assert!(matches!(err, AnswerError::Malformed(_)));
}

#[tokio::test]
async fn slow_answer_times_out() {
    let (base, _) = answer_mock(StatusCode::OK, answer_response(1), Duration::from_secs(3)).await;
    let err = answer_client(&base, 1).answer(&request("q")).await.unwrap_err();
    match err {
        AnswerError::Request(e) => assert!(e.is_timeout()),
        other => panic!("expected timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn unreachable_answer_api_is_upstream_error() {
    let base = format!("http://127.0.0.1:{}", common::free_port());
    let err = answer_client(&base, 1).answer(&request("q")).await.unwrap_err();
    assert!(matches!(err, AnswerError::Request(_)));
    assert!(err.is_upstream());
}

async fn line_mock() -> (String, Captured) {
    let captured: Captured = Arc::default();
    let app = Router::new()
        .route(
            "/v2/bot/message/reply",
            post(
                |State(captured): State<Captured>, uri: Uri, headers: HeaderMap, Json(body): Json<Value>| async move {
                    let expired = body["replyToken"] == "expired-token";
                    captured
                        .lock()
                        .unwrap()
                        .push((uri.path().to_string(), auth_header(&headers), body));
                    if expired {
                        (StatusCode::BAD_REQUEST, Json(json!({ "message": "Invalid reply token" })))
                    } else {
                        (StatusCode::OK, Json(json!({})))
                    }
                },
            ),
        )
        .with_state(captured.clone());
    (spawn_mock(app).await, captured)
}

fn line_channel(base: &str) -> LineChannel {
    let config = LineConfig {
        api_base: Some(base.to_string()),
        ..LineConfig::default()
    };
    LineChannel::new("line-access-token".to_string(), &config).unwrap()
}

#[tokio::test]
async fn reply_posts_single_text_message() {
    let (base, captured) = line_mock().await;
    line_channel(&base)
        .reply("reply-1", "hello\n以下是相關網址：")
        .await
        .unwrap();

    let captured = captured.lock().unwrap();
    assert_eq!(captured.len(), 1);
    let (_, auth, body) = &captured[0];
    assert_eq!(auth, "Bearer line-access-token");
    assert_eq!(
        body,
        &json!({
            "replyToken": "reply-1",
            "messages": [{ "type": "text", "text": "hello\n以下是相關網址：" }]
        })
    );
}

#[tokio::test]
async fn rejected_reply_token_is_delivery_error() {
    let (base, _) = line_mock().await;
    let err = line_channel(&base)
        .reply("expired-token", "late")
        .await
        .unwrap_err();
    match err {
        DeliveryError::Rejected { status, body } => {
            assert_eq!(status.as_u16(), 400);
            assert!(body.contains("Invalid reply token"));
        }
        other => panic!("expected Rejected, got {:?}", other),
    }
}

#[tokio::test]
async fn unreachable_line_api_is_delivery_error() {
    let base = format!("http://127.0.0.1:{}", common::free_port());
    let err = line_channel(&base).reply("t", "x").await.unwrap_err();
    assert!(matches!(err, DeliveryError::Request(_)));
}

#[tokio::test]
async fn metadata_token_is_fetched_once_and_cached() {
    let hits: Arc<Mutex<u32>> = Arc::default();
    let app = Router::new()
        .route(
            "/token",
            get(|State(hits): State<Arc<Mutex<u32>>>, headers: HeaderMap| async move {
                if headers.get("metadata-flavor").and_then(|v| v.to_str().ok()) != Some("Google") {
                    return (StatusCode::FORBIDDEN, Json(json!({})));
                }
                *hits.lock().unwrap() += 1;
                (
                    StatusCode::OK,
                    Json(json!({ "access_token": "meta-token", "expires_in": 3599, "token_type": "Bearer" })),
                )
            }),
        )
        .with_state(hits.clone());
    let base = spawn_mock(app).await;

    let source = MetadataTokenSource::with_url(&format!("{}/token", base), Duration::from_secs(2)).unwrap();
    assert_eq!(source.token().await.unwrap(), "meta-token");
    assert_eq!(source.token().await.unwrap(), "meta-token");
    assert_eq!(*hits.lock().unwrap(), 1);
}

#[tokio::test]
async fn metadata_error_status_surfaces() {
    let app = Router::new().route("/token", get(|| async { (StatusCode::NOT_FOUND, "no service account") }));
    let base = spawn_mock(app).await;
    let source = TokenSource::Metadata(
        MetadataTokenSource::with_url(&format!("{}/token", base), Duration::from_secs(2)).unwrap(),
    );
    let err = source.token().await.unwrap_err();
    assert!(err.to_string().contains("404"));
}
