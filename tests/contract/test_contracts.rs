use super::*;
use serde_json::json;
use sicei_contract::client::ContractClient;
use sicei_contract::contracts::{
    NotificationContract, ResourceContractRunner, SessionLifecycleVerifier, SessionState,
    UploadContractVerifier,
};
use sicei_contract::contracts::upload::{EMBEDDED_IMAGE, EMBEDDED_IMAGE_NAME};
use sicei_contract::errors::{FailureKind, HarnessError};
use sicei_contract::fixtures::{FixtureGenerator, IdRegistry, ResourceKind};
use sicei_contract::suite::catalog::update_violations;

fn generator() -> FixtureGenerator {
    FixtureGenerator::new(7, std::sync::Arc::new(IdRegistry::new()))
}

async fn created_student(
    client: &ContractClient,
    gen: &mut FixtureGenerator,
) -> (i64, String) {
    let fixture = gen.valid(ResourceKind::Student).unwrap();
    let runner = ResourceContractRunner::new(client.clone(), ResourceKind::Student);
    let id = runner.create(&fixture).await.unwrap();
    (id, fixture.password().unwrap().to_string())
}

#[tokio::test]
async fn test_teacher_crud_round_trip() {
    let server = mock_with(&[]).await;
    let client = client_for(&server);
    let mut gen = generator();
    let runner = ResourceContractRunner::new(client.clone(), ResourceKind::Teacher);

    let fixture = gen.valid(ResourceKind::Teacher).unwrap();
    let id = runner.create(&fixture).await.unwrap();
    let stored = runner.fetch(id).await.unwrap();
    assert_eq!(stored.get("id"), Some(&json!(id)));
    for (field, value) in fixture.echoed_fields() {
        assert_eq!(stored.get(field), Some(value), "{}", field);
    }
    runner.fetch_matches(id, &fixture).await.unwrap();
    assert_eq!(runner.list().await.unwrap(), Some(1));

    let revised = gen.revise(&fixture).unwrap();
    runner.update(id, &revised).await.unwrap();
    runner.fetch_matches(id, &revised).await.unwrap();

    // The old values no longer match
    let stale = runner.fetch_matches(id, &fixture).await.unwrap_err();
    assert_eq!(stale.kind(), FailureKind::Contract);

    runner.delete(id).await.unwrap();
    runner.fetch_missing(id).await.unwrap();
    runner.delete_missing(id).await.unwrap();

    server.stop().await;
}

#[tokio::test]
async fn test_invalid_fixture_is_refused_by_create() {
    let server = mock_with(&[]).await;
    let client = client_for(&server);
    let mut gen = generator();
    let runner = ResourceContractRunner::new(client, ResourceKind::Student);

    let invalid = gen.invalid(ResourceKind::Student, &["promedio"]).unwrap();
    runner.create_rejected(&invalid).await.unwrap();

    // Passing an invalid fixture where a valid one is needed is harness misuse
    let err = runner.create(&invalid).await.unwrap_err();
    assert!(matches!(err, HarnessError::Internal(_)));

    server.stop().await;
}

#[tokio::test]
async fn test_student_update_invalid_sends_null_name_and_negative_matricula() {
    let server = mock_with(&[]).await;
    let client = client_for(&server);
    let runner = ResourceContractRunner::new(client, ResourceKind::Student);
    let registry = std::sync::Arc::new(IdRegistry::new());

    for seed in 0..20 {
        let mut gen =
            FixtureGenerator::for_scenario(seed, "students.update_invalid", registry.clone());
        let stored = gen.valid(ResourceKind::Student).unwrap();
        let invalid = gen
            .corrupt(&stored, update_violations(ResourceKind::Student))
            .unwrap();

        let body = invalid.body();
        assert_eq!(body["nombres"], json!(null), "seed {}", seed);
        assert_eq!(body["matricula"], json!(-1.223), "seed {}", seed);

        let id = runner.create(&stored).await.unwrap();
        runner.update_rejected(id, &invalid, &stored).await.unwrap();
    }

    server.stop().await;
}

#[tokio::test]
async fn test_notification_contract() {
    let server = mock_with(&[]).await;
    let client = client_for(&server);
    let mut gen = generator();
    let (id, _) = created_student(&client, &mut gen).await;

    let notify = NotificationContract::new(client);
    notify.notify(id).await.unwrap();
    notify.notify_missing(gen.absent_id()).await.unwrap();

    server.stop().await;
}

#[tokio::test]
async fn test_session_lifecycle_states() {
    let server = mock_with(&[]).await;
    let client = client_for(&server);
    let mut gen = generator();
    let (id, password) = created_student(&client, &mut gen).await;

    let mut session = SessionLifecycleVerifier::new(client, id);
    assert_eq!(session.state(), SessionState::NoSession);

    session.login_rejected("not-the-password").await.unwrap();
    assert_eq!(session.state(), SessionState::NoSession);

    let issued = session.login(&password).await.unwrap();
    assert_eq!(issued.len(), 128);
    assert_eq!(session.state(), SessionState::Active);
    session.verify().await.unwrap();

    session.logout().await.unwrap();
    assert_eq!(session.state(), SessionState::Expired);
    session.verify_expired().await.unwrap();

    // Expired is terminal for this verifier
    let err = session.login(&password).await.unwrap_err();
    assert!(matches!(err, HarnessError::Internal(_)));

    server.stop().await;
}

#[tokio::test]
async fn test_session_of_another_student_does_not_verify() {
    let server = mock_with(&[]).await;
    let client = client_for(&server);
    let mut gen = generator();
    let (first_id, first_pw) = created_student(&client, &mut gen).await;
    let (second_id, _) = created_student(&client, &mut gen).await;

    let mut first = SessionLifecycleVerifier::new(client.clone(), first_id);
    let issued = first.login(&first_pw).await.unwrap();

    let second = SessionLifecycleVerifier::new(client, second_id);
    second.verify_foreign(&issued).await.unwrap();

    server.stop().await;
}

#[tokio::test]
async fn test_upload_round_trip() {
    let server = mock_with(&[]).await;
    let client = client_for(&server);
    let mut gen = generator();
    let (id, _) = created_student(&client, &mut gen).await;

    let upload = UploadContractVerifier::new(client.clone(), server.storage_domain());
    let url = upload
        .verify(id, EMBEDDED_IMAGE_NAME, EMBEDDED_IMAGE.to_vec())
        .await
        .unwrap();
    assert!(url.starts_with(server.url()));
    assert!(url.contains(&format!("/alumnos/{}/perfil_", id)));

    let resp = client.get(&format!("/alumnos/{}", id)).await.unwrap();
    assert_eq!(resp.json_path("fotoPerfilUrl"), Some(&json!(url)));

    server.stop().await;
}

#[tokio::test]
async fn test_upload_to_foreign_storage_domain_is_a_violation() {
    let server = mock_with(&[]).await;
    let client = client_for(&server);
    let mut gen = generator();
    let (id, _) = created_student(&client, &mut gen).await;

    let upload = UploadContractVerifier::new(client, "s3.amazonaws.com");
    let err = upload
        .upload(id, EMBEDDED_IMAGE_NAME, EMBEDDED_IMAGE.to_vec())
        .await
        .unwrap_err();
    match err {
        HarnessError::Contract(violation) => {
            assert_eq!(violation.path, "fotoPerfilUrl");
            assert!(violation.expected.contains("s3.amazonaws.com"));
        }
        other => panic!("expected a contract violation, got {:?}", other),
    }

    server.stop().await;
}

#[tokio::test]
async fn test_upload_with_rejected_extension_fails_contract() {
    let server = mock_with(&[]).await;
    let client = client_for(&server);
    let mut gen = generator();
    let (id, _) = created_student(&client, &mut gen).await;

    let upload = UploadContractVerifier::new(client, server.storage_domain());
    let err = upload
        .upload(id, "notes.txt", b"plain text".to_vec())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), FailureKind::Contract);

    server.stop().await;
}
