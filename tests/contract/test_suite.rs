use super::*;
use sicei_contract::errors::EXIT_SUCCESS;
use sicei_contract::suite::{catalog, OutcomeStatus};

#[tokio::test]
async fn test_conforming_service_passes_every_scenario() {
    let server = mock_with(&[]).await;
    let report = run_suite(config_for(&server), &[]).await;

    let failures: Vec<String> = report
        .outcomes
        .iter()
        .filter(|o| o.status != OutcomeStatus::Passed)
        .map(|o| format!("{}: {:?}", o.name, o.failure))
        .collect();
    assert!(failures.is_empty(), "unexpected failures: {:#?}", failures);
    assert_eq!(report.outcomes.len(), catalog().len());
    assert_eq!(report.exit_code(), EXIT_SUCCESS);
    assert!(!report.aborted);

    server.stop().await;
}

#[tokio::test]
async fn test_report_keeps_catalog_order_and_seed() {
    let server = mock_with(&[]).await;
    let report = run_suite(config_for(&server), &["teachers."]).await;

    let names: Vec<&str> = report.outcomes.iter().map(|o| o.name.as_str()).collect();
    let expected: Vec<String> = catalog()
        .into_iter()
        .map(|s| s.name)
        .filter(|n| n.contains("teachers."))
        .collect();
    assert_eq!(names, expected);
    assert_eq!(report.seed, 4242);
    assert_eq!(report.base_url, server.url());

    server.stop().await;
}

#[tokio::test]
async fn test_serial_run_matches_concurrent_run() {
    let server = mock_with(&[]).await;
    let mut config = config_for(&server);
    config.run.concurrency = 1;
    let report = run_suite(config, &["session."]).await;

    assert!(report
        .outcomes
        .iter()
        .all(|o| o.status == OutcomeStatus::Passed));
    assert_eq!(report.count(OutcomeStatus::Passed), 6);

    server.stop().await;
}

#[tokio::test]
async fn test_json_report_of_a_run() {
    let server = mock_with(&[]).await;
    let report = run_suite(config_for(&server), &["students.list"]).await;

    let json: serde_json::Value = serde_json::from_str(&report.render_json().unwrap()).unwrap();
    assert_eq!(json["outcomes"][0]["name"], "students.list");
    assert_eq!(json["outcomes"][0]["status"], "passed");
    assert_eq!(json["aborted"], false);

    server.stop().await;
}
