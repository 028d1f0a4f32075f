use super::*;
use sicei_contract::client::ContractClient;
use sicei_contract::config::HarnessConfig;
use sicei_contract::testing::MockSiceiServer;
use sicei_contract::errors::{FailureKind, HarnessError, TransportError, EXIT_TRANSPORT_ERROR};
use sicei_contract::suite::OutcomeStatus;

#[tokio::test]
async fn test_slow_service_is_a_transport_timeout() {
    let server = MockSiceiServer::builder()
        .with_latency(1_500)
        .build()
        .await
        .unwrap();
    let mut config = config_for(&server);
    config.http.timeout_secs = 1;
    let report = run_suite(config, &["teachers.list"]).await;

    let outcome = &report.outcomes[0];
    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert_eq!(outcome.failure_kind(), Some(FailureKind::Transport));
    assert!(outcome.failure.as_ref().unwrap().message.contains("timed out"));
    assert_eq!(report.exit_code(), EXIT_TRANSPORT_ERROR);

    server.stop().await;
}

#[tokio::test]
async fn test_refused_connection_is_retried_then_reported() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let mut config = HarnessConfig::for_base_url(&format!("http://127.0.0.1:{}", port));
    config.retry.max_retries = 2;
    config.retry.base_delay_ms = 10;
    config.retry.max_delay_ms = 20;
    let config = config.validate().unwrap();

    let client = ContractClient::new(&config).unwrap();
    let err = client.get("/alumnos").await.unwrap_err();
    match err {
        HarnessError::Transport(TransportError::Connect { attempts, .. }) => {
            assert_eq!(attempts, 3)
        }
        other => panic!("expected a connect failure, got {:?}", other),
    }

    let transcript = client.transcript();
    assert_eq!(transcript.len(), 1);
    assert_eq!(transcript[0].attempts, 3);
    assert!(transcript[0].status.is_none());

    let report = run_suite(config, &["students.list"]).await;
    assert_eq!(report.exit_code(), EXIT_TRANSPORT_ERROR);
}

#[tokio::test]
async fn test_http_errors_are_not_retried() {
    let server = mock_with(&[]).await;
    let mut config = config_for(&server);
    config.retry.max_retries = 3;
    let client = ContractClient::new(&config).unwrap();

    let resp = client.get("/alumnos/999999").await.unwrap();
    assert_eq!(resp.status, 404);
    assert_eq!(server.request_count(), 1);

    server.stop().await;
}
