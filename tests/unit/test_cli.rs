use assert_cmd::Command;
use predicates::prelude::*;
use sicei_contract::testing::MockSiceiServer;

#[allow(deprecated)]
fn harness() -> Command {
    let mut cmd = Command::cargo_bin("sicei-contract").unwrap();
    cmd.env_remove("SICEI_BASE_URL")
        .env_remove("SICEI_SEED")
        .env_remove("SICEI_CONCURRENCY")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_cli_version() {
    harness().arg("--version").assert().success();
}

#[test]
fn test_cli_help_lists_commands() {
    harness()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("fixture"));
}

#[test]
fn test_cli_list_prints_catalog() {
    harness()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("students.create"))
        .stdout(predicate::str::contains("teachers.update_invalid"))
        .stdout(predicate::str::contains("session.logout_terminal"))
        .stdout(predicate::str::contains("upload.retrievable"));
}

#[test]
fn test_cli_fixture_prints_json() {
    harness()
        .args(["fixture", "teachers", "--seed", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"numeroEmpleado\""))
        .stdout(predicate::str::contains("\"horasClase\""));
}

#[test]
fn test_cli_fixture_unknown_field_exits_5() {
    harness()
        .args(["fixture", "students", "--invalid", "edad"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("edad"));
}

#[test]
fn test_cli_fixture_unknown_resource_is_usage_error() {
    harness().args(["fixture", "courses"]).assert().failure();
}

#[test]
fn test_cli_run_without_base_url_exits_2() {
    let dir = tempfile::tempdir().unwrap();
    harness()
        .current_dir(dir.path())
        .arg("run")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("base URL"));
}

#[test]
fn test_cli_run_unknown_scenario_exits_2() {
    let dir = tempfile::tempdir().unwrap();
    harness()
        .current_dir(dir.path())
        .args(["run", "--base-url", "http://127.0.0.1:1", "--only", "nothing.matches"])
        .assert()
        .code(2);
}

#[test]
fn test_cli_run_unreachable_service_exits_4() {
    let dir = tempfile::tempdir().unwrap();
    harness()
        .current_dir(dir.path())
        .args([
            "run",
            "--base-url",
            "http://127.0.0.1:1",
            "--only",
            "students.list",
            "--output-format",
            "json",
        ])
        .assert()
        .code(4)
        .stdout(predicate::str::contains("\"transport\""));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cli_run_against_mock_service_passes() {
    let server = MockSiceiServer::builder().build().await.unwrap();
    let url = server.url().to_string();
    let domain = server.storage_domain().to_string();

    let output = tokio::task::spawn_blocking(move || {
        let dir = tempfile::tempdir().unwrap();
        harness()
            .current_dir(dir.path())
            .args([
                "--base-url",
                url.as_str(),
                "--storage-domain",
                domain.as_str(),
                "--seed",
                "17",
                "run",
            ])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(output.status.code(), Some(0), "{}", stdout);
    assert!(stdout.contains("0 failed"));
    assert!(stdout.contains("seed 17"));

    server.stop().await;
}
