use std::collections::HashSet;

use belt::concurrency::shutdown::create_shutdown_channel;
use belt::error::ErrorKind;
use belt::executor::execute_all;
use belt::processor::{ElementProcessor, HttpPostProcessor, json_request_payload};
use belt::sink::MemorySink;
use belt::source::SliceSource;
use belt_config::shared::JobConfig;
use belt_telemetry::tracing::init_test_tracing;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn server_host(server: &MockServer) -> String {
    server
        .uri()
        .trim_start_matches("http://")
        .to_owned()
}

#[tokio::test]
async fn transforms_a_batch_through_the_endpoint() {
    init_test_tracing();

    let server = MockServer::start().await;
    let request = vec![json!({"v": 1}), json!({"v": 2})];
    let response = vec![json!({"Id": "t-1", "v": 10}), json!({"Id": "t-2", "v": 20})];
    Mock::given(method("POST"))
        .and(path("/transform"))
        .and(body_json(&request))
        .respond_with(ResponseTemplate::new(200).set_body_json(&response))
        .expect(1)
        .mount(&server)
        .await;

    let processor =
        HttpPostProcessor::new(&server_host(&server), "transform", json_request_payload())
            .unwrap();
    let outputs = processor.process_batch(&request).await.unwrap();

    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs[0].id.as_ref().map(|id| id.as_str()), Some("t-1"));
    assert_eq!(outputs[1].id.as_ref().map(|id| id.as_str()), Some("t-2"));
    assert!(outputs.iter().all(|output| !output.is_failed()));
}

#[tokio::test]
async fn non_ok_status_fails_the_whole_batch() {
    init_test_tracing();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transform"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let processor: HttpPostProcessor<serde_json::Value> =
        HttpPostProcessor::new(&server_host(&server), "transform", json_request_payload())
            .unwrap();
    let err = processor
        .process_batch(&[json!({"v": 1})])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnexpectedStatusCode);
}

#[tokio::test]
async fn invalid_response_body_fails_the_whole_batch() {
    init_test_tracing();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transform"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let processor: HttpPostProcessor<serde_json::Value> =
        HttpPostProcessor::new(&server_host(&server), "transform", json_request_payload())
            .unwrap();
    let err = processor
        .process_batch(&[json!({"v": 1})])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransformResponseInvalid);
}

#[tokio::test]
async fn empty_batch_skips_the_endpoint() {
    init_test_tracing();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let processor: HttpPostProcessor<serde_json::Value> =
        HttpPostProcessor::new(&server_host(&server), "transform", json_request_payload())
            .unwrap();
    let outputs = processor.process_batch(&[]).await.unwrap();
    assert!(outputs.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn end_to_end_http_job_writes_transformed_records() {
    init_test_tracing();

    let server = MockServer::start().await;
    let response = vec![
        json!({"Id": "t-0", "upper": "A"}),
        json!({"Id": "t-1", "upper": "B"}),
        json!({"Id": "t-2", "upper": "C"}),
    ];
    Mock::given(method("POST"))
        .and(path("/transform"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&response))
        .mount(&server)
        .await;

    let source = SliceSource::new(vec![json!({"v": "a"}), json!({"v": "b"}), json!({"v": "c"})], 1);
    let sink = MemorySink::new();
    let (_, shutdown_rx) = create_shutdown_channel();

    let processor =
        HttpPostProcessor::new(&server_host(&server), "transform", json_request_payload())
            .unwrap();
    let config = JobConfig {
        read_batch_size: 10,
        ..JobConfig::default()
    };
    execute_all(&source, processor, sink.clone(), &config, shutdown_rx)
        .await
        .unwrap();

    let records = sink.records().await;
    assert_eq!(records.len(), 3);
    let ids: HashSet<String> = records.iter().map(|record| record.id.to_string()).collect();
    assert_eq!(
        ids,
        HashSet::from(["t-0".to_owned(), "t-1".to_owned(), "t-2".to_owned()])
    );
    assert!(sink.failures().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn end_to_end_http_failure_marks_every_record_failed() {
    init_test_tracing();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transform"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let source = SliceSource::new(vec![json!({"v": 1}), json!({"v": 2})], 1);
    let sink = MemorySink::new();
    let (_, shutdown_rx) = create_shutdown_channel();

    let processor =
        HttpPostProcessor::new(&server_host(&server), "transform", json_request_payload())
            .unwrap();
    let config = JobConfig {
        read_batch_size: 10,
        ..JobConfig::default()
    };
    execute_all(&source, processor, sink.clone(), &config, shutdown_rx)
        .await
        .unwrap();

    assert!(sink.records().await.is_empty());
    let failures = sink.failures().await;
    assert_eq!(failures.len(), 2);
    assert!(
        failures
            .iter()
            .all(|failure| failure.error.contains("non-OK status"))
    );
}
