//! Correction service integration tests
//!
//! Concurrency and scoping of correction requests, driven through the fake
//! transport. No network calls.

use prosefix::correction::{build_request, CorrectionService};
use prosefix::llm::{ApiError, FakeTransport, LlmApiClient};
use prosefix::{CorrectionError, CorrectionRequest, TextRange};
use prosefix_core::{default_prompts, ApiSettings};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Notify;

const EMPTY: &str = r#"{"corrections":[]}"#;

fn settings() -> ApiSettings {
    ApiSettings {
        api_key: "sk-test".to_string(),
        ..ApiSettings::default()
    }
}

fn request(text: &str, selection: Option<TextRange>) -> CorrectionRequest {
    let prompt = default_prompts().remove(0);
    build_request("doc", text, selection, &prompt, &settings()).unwrap()
}

fn chat_reply(payload: serde_json::Value) -> String {
    json!({
        "id": "chatcmpl-1",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": payload.to_string()}}]
    })
    .to_string()
}

async fn wait_for_requests(fake: &FakeTransport, count: usize) {
    while fake.request_count() < count {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_overlapping_request_refused_while_first_in_flight() {
    let gate = Arc::new(Notify::new());
    let fake = FakeTransport::new(EMPTY).with_gate(gate.clone());
    let service = Arc::new(CorrectionService::new(LlmApiClient::with_transport(
        settings(),
        fake.clone(),
    )));

    let first = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .correct(request("AAA BBB CCC", Some(TextRange::new(0, 7))))
                .await
        })
    };
    wait_for_requests(&fake, 1).await;
    assert_eq!(service.tasks().active_count(), 1);

    let err = service
        .correct(request("AAA BBB CCC", Some(TextRange::new(4, 11))))
        .await
        .unwrap_err();
    match err {
        CorrectionError::Overlap(overlap) => {
            assert_eq!(overlap.requested, TextRange::new(4, 11));
            assert_eq!(overlap.active, TextRange::new(0, 7));
        }
        other => panic!("expected overlap, got {:?}", other),
    }
    // The refused request never reached the endpoint
    assert_eq!(fake.request_count(), 1);

    gate.notify_one();
    assert!(first.await.unwrap().is_ok());
    assert_eq!(service.tasks().active_count(), 0);

    // Same range is free again
    gate.notify_one();
    assert!(service
        .correct(request("AAA BBB CCC", Some(TextRange::new(4, 11))))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_disjoint_selections_run_concurrently() {
    let gate = Arc::new(Notify::new());
    let fake = FakeTransport::new(EMPTY).with_gate(gate.clone());
    let service = Arc::new(CorrectionService::new(LlmApiClient::with_transport(
        settings(),
        fake.clone(),
    )));

    let handles: Vec<_> = [TextRange::new(0, 3), TextRange::new(4, 7), TextRange::new(8, 11)]
        .into_iter()
        .map(|range| {
            let service = service.clone();
            tokio::spawn(async move { service.correct(request("AAA BBB CCC", Some(range))).await })
        })
        .collect();

    wait_for_requests(&fake, 3).await;
    assert_eq!(service.tasks().active_count(), 3);

    for _ in 0..3 {
        gate.notify_one();
    }
    let results = futures::future::join_all(handles).await;
    assert!(results.into_iter().all(|r| r.unwrap().is_ok()));
    assert_eq!(service.tasks().active_count(), 0);
}

#[tokio::test]
async fn test_selection_sends_only_selected_text() {
    let fake = FakeTransport::new(&chat_reply(json!({
        "corrections": [{
            "original": "BBB",
            "corrected": "Bee",
            "reason": "spelling",
            "position": {"start": 0, "end": 3}
        }]
    })));
    let service = CorrectionService::new(LlmApiClient::with_transport(settings(), fake.clone()));

    let result = service
        .correct(request("AAA BBB CCC", Some(TextRange::new(4, 7))))
        .await
        .unwrap();

    let sent = &fake.requests()[0];
    let messages = sent.json()["messages"].clone();
    assert_eq!(messages[1]["role"], "user");
    assert_eq!(messages[1]["content"], "BBB");
    assert!(!sent.body.contains("AAA"));
    assert_eq!(sent.header("Authorization"), Some("Bearer sk-test"));

    assert_eq!(result.request.base_offset(), 4);
    assert_eq!(result.response.corrections[0].corrected, "Bee");
}

#[tokio::test]
async fn test_truncated_reply_is_schema_error_and_releases_lock() {
    let fake = FakeTransport::new(r#"{"choices":[{"message":{"content":"{\"corrections\":[{\"orig"#);
    let service = CorrectionService::new(LlmApiClient::with_transport(settings(), fake));

    let err = service.correct(request("Teh cat", None)).await.unwrap_err();
    assert_eq!(err.kind(), "schema");
    assert!(err.guidance().is_some());
    assert_eq!(service.tasks().active_count(), 0);
}

#[tokio::test]
async fn test_position_outside_submitted_text_rejected() {
    let fake = FakeTransport::new(&chat_reply(json!({
        "corrections": [{
            "original": "CCC",
            "corrected": "Sea",
            "reason": "spelling",
            "position": {"start": 8, "end": 11}
        }]
    })));
    let service = CorrectionService::new(LlmApiClient::with_transport(settings(), fake));

    let err = service
        .correct(request("AAA BBB CCC", Some(TextRange::new(4, 7))))
        .await
        .unwrap_err();
    assert!(matches!(err, CorrectionError::Api(ApiError::Schema(_))));
    assert_eq!(service.tasks().active_count(), 0);
}

#[tokio::test]
async fn test_http_error_status_maps_to_guidance() {
    let fake = FakeTransport::with_status(401, r#"{"error":{"message":"Incorrect API key provided"}}"#);
    let service = CorrectionService::new(LlmApiClient::with_transport(settings(), fake));

    let err = service.correct(request("Teh cat", None)).await.unwrap_err();
    assert_eq!(
        err,
        CorrectionError::Api(ApiError::Http {
            status: 401,
            message: "Incorrect API key provided".to_string()
        })
    );
    assert!(err.guidance().unwrap_or_default().contains("API key"));
}
