use super::*;
use sicei_contract::errors::{FailureKind, EXIT_CONTRACT_VIOLATION};
use sicei_contract::suite::{OutcomeStatus, ScenarioOutcome};
use std::collections::HashMap;
use sicei_contract::testing::Fault;

fn assert_contract_failure(outcomes: &HashMap<String, ScenarioOutcome>, name: &str) {
    let outcome = outcomes
        .get(name)
        .unwrap_or_else(|| panic!("scenario {} not in report", name));
    assert_eq!(outcome.status, OutcomeStatus::Failed, "{} should fail", name);
    assert_eq!(outcome.failure_kind(), Some(FailureKind::Contract));
    assert!(!outcome.transcript.is_empty());
}

#[tokio::test]
async fn test_logout_that_keeps_session_alive_is_detected() {
    let server = mock_with(&[Fault::LogoutIgnored]).await;
    let report = run_suite(config_for(&server), &["session."]).await;
    let outcomes = by_name(&report);

    assert_contract_failure(&outcomes, "session.logout_terminal");
    assert_contract_failure(&outcomes, "session.independent");
    assert_eq!(outcomes["session.login"].status, OutcomeStatus::Passed);
    assert_eq!(outcomes["session.forged"].status, OutcomeStatus::Passed);
    assert_eq!(report.exit_code(), EXIT_CONTRACT_VIOLATION);

    server.stop().await;
}

#[tokio::test]
async fn test_service_accepting_any_session_is_detected() {
    let server = mock_with(&[Fault::AcceptAnySession]).await;
    let report = run_suite(config_for(&server), &["session."]).await;
    let outcomes = by_name(&report);

    assert_contract_failure(&outcomes, "session.forged");
    assert_contract_failure(&outcomes, "session.logout_terminal");
    assert_eq!(outcomes["session.verify"].status, OutcomeStatus::Passed);

    let message = &outcomes["session.forged"].failure.as_ref().unwrap().message;
    assert!(message.contains("/session/verify"), "{}", message);
    assert!(message.contains("expected 400"), "{}", message);

    server.stop().await;
}

#[tokio::test]
async fn test_update_without_validation_is_detected() {
    let server = mock_with(&[Fault::UpdateIgnoresValidation]).await;
    let report = run_suite(config_for(&server), &["update"]).await;
    let outcomes = by_name(&report);

    assert_contract_failure(&outcomes, "students.update_invalid");
    assert_contract_failure(&outcomes, "teachers.update_invalid");
    assert_eq!(outcomes["students.update"].status, OutcomeStatus::Passed);
    assert_eq!(outcomes["teachers.update"].status, OutcomeStatus::Passed);

    server.stop().await;
}

#[tokio::test]
async fn test_create_answering_200_is_detected() {
    let server = mock_with(&[Fault::CreateReturns200]).await;
    let report = run_suite(config_for(&server), &["students.create", "teachers.list"]).await;
    let outcomes = by_name(&report);

    assert_contract_failure(&outcomes, "students.create");
    assert_eq!(outcomes["students.create_invalid"].status, OutcomeStatus::Passed);
    assert_eq!(outcomes["teachers.list"].status, OutcomeStatus::Passed);

    let message = &outcomes["students.create"].failure.as_ref().unwrap().message;
    assert!(message.contains("POST /alumnos"), "{}", message);
    assert!(message.contains("expected 201"), "{}", message);

    server.stop().await;
}
