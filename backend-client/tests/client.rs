use futures::TryStreamExt;
use pretty_assertions::assert_eq;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::header;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::matchers::query_param;

use leadscout_backend_client::BackendClient;
use leadscout_backend_client::BackendError;
use leadscout_backend_client::ClientOptions;
use leadscout_protocol::JobStatus;
use leadscout_protocol::QualifyRequest;
use leadscout_protocol::SearchContext;
use leadscout_protocol::StreamEvent;

fn client(server: &MockServer) -> BackendClient {
    BackendClient::new(ClientOptions::new(server.uri()).with_bearer_token("tok-123"))
        .expect("client should build")
}

fn context() -> SearchContext {
    SearchContext {
        industry: "plumbing".to_string(),
        location: "Austin".to_string(),
        offering: None,
        notes: None,
    }
}

#[tokio::test]
async fn discover_sends_bearer_and_parses_candidates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/leads/discover"))
        .and(header("authorization", "Bearer tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"[{"name":"Acme Plumbing","website":"https://acme.test"}]"#,
            "application/json",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let candidates = client(&server).discover(&context()).await.unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].name, "Acme Plumbing");
}

#[tokio::test]
async fn missing_credentials_short_circuits_locally() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = BackendClient::new(ClientOptions::new(server.uri())).unwrap();
    let err = client.discover(&context()).await.unwrap_err();
    assert!(matches!(err, BackendError::MissingCredentials));
}

#[tokio::test]
async fn token_with_invalid_header_characters_is_rejected_locally() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = BackendClient::new(
        ClientOptions::new(server.uri()).with_bearer_token("tok\nwith newline"),
    )
    .unwrap();
    let err = client.discover(&context()).await.unwrap_err();
    assert!(matches!(err, BackendError::InvalidCredentials));
}

#[tokio::test]
async fn quota_rejection_carries_structured_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/leads/discover"))
        .respond_with(ResponseTemplate::new(429).set_body_raw(
            r#"{"error":"monthly lead quota exhausted","plan":"starter","used":500,"limit":500}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let err = client(&server).discover(&context()).await.unwrap_err();
    let BackendError::Quota(payload) = err else {
        panic!("expected quota error, got {err}");
    };
    assert_eq!(payload.error, "monthly lead quota exhausted");
    assert_eq!(payload.plan.as_deref(), Some("starter"));
    assert_eq!(payload.limit, Some(500));
}

#[tokio::test]
async fn non_success_without_quota_payload_is_a_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/leads/discover"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend exploded"))
        .mount(&server)
        .await;

    let err = client(&server).discover(&context()).await.unwrap_err();
    let BackendError::Status { status, body } = err else {
        panic!("expected status error, got {err}");
    };
    assert_eq!(status.as_u16(), 500);
    assert_eq!(body, "backend exploded");
    assert!(
        BackendError::Status {
            status,
            body: body.clone()
        }
        .is_transport()
    );
}

#[tokio::test]
async fn qualify_stream_decodes_frames() {
    let server = MockServer::start().await;
    let wire = "data: {\"type\":\"init\",\"total\":2}\n\n\
data: {\"type\":\"result\",\"company\":{\"name\":\"Acme\",\"tier\":\"hot\"}}\n\n\
data: {\"type\":\"complete\",\"summary\":{\"hot\":1,\"review\":0,\"rejected\":0,\"failed\":0},\"search_id\":\"run-9\"}\n\n";
    Mock::given(method("POST"))
        .and(path("/v1/leads/qualify"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(wire, "text/event-stream"))
        .mount(&server)
        .await;

    let request = QualifyRequest {
        candidates: Vec::new(),
        context: context(),
        transcript: Vec::new(),
        prior_results: Vec::new(),
    };
    let stream = client(&server).qualify_stream(&request).await.unwrap();
    let events: Vec<StreamEvent> = stream.try_collect().await.unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0], StreamEvent::Init { total: 2 });
    let StreamEvent::Complete { search_id, .. } = &events[2] else {
        panic!("expected complete event");
    };
    assert_eq!(search_id.as_deref(), Some("run-9"));
}

#[tokio::test]
async fn job_status_and_resume_offset() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/jobs/job-7"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"id":"job-7","status":"running","total":10,"processed":4,"succeeded":3,"failed":1}"#,
            "application/json",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/jobs/job-7/events"))
        .and(query_param("after", "4"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("data: {\"type\":\"init\",\"total\":10}\n\n", "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let snapshot = client.job_status("job-7").await.unwrap();
    assert_eq!(snapshot.status, JobStatus::Running);
    assert_eq!(snapshot.processed, 4);

    let stream = client.job_events("job-7", Some(4)).await.unwrap();
    let events: Vec<StreamEvent> = stream.try_collect().await.unwrap();
    assert_eq!(events, vec![StreamEvent::Init { total: 10 }]);
}
