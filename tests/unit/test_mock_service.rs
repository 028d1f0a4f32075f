//! Raw HTTP behavior of the mock service, independent of the harness client

use serde_json::{json, Value};
use sicei_contract::testing::{Fault, MockSiceiServer};

fn student() -> Value {
    json!({
        "nombres": "Eduardo",
        "apellidos": "Rodriguez",
        "matricula": "A123456",
        "promedio": 9.5,
        "password": "contrasena1"
    })
}

#[tokio::test]
async fn test_mock_student_lifecycle() {
    let server = MockSiceiServer::builder().build().await.unwrap();
    let http = reqwest::Client::new();
    let base = server.url();

    let created = http
        .post(format!("{}/alumnos", base))
        .json(&student())
        .send()
        .await
        .unwrap();
    assert_eq!(created.status().as_u16(), 201);
    let body: Value = created.json().await.unwrap();
    let id = body["id"].as_i64().unwrap();
    assert!(body.get("password").is_none());

    let update = http
        .put(format!("{}/alumnos/{}", base, id))
        .json(&json!({ "promedio": 7.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(update.status().as_u16(), 200);

    let fetched: Value = http
        .get(format!("{}/alumnos/{}", base, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["promedio"], 7.0);
    assert_eq!(fetched["matricula"], "A123456");

    let deleted = http
        .delete(format!("{}/alumnos/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status().as_u16(), 200);
    assert_eq!(server.request_count(), 4);

    server.stop().await;
}

#[tokio::test]
async fn test_mock_rejects_unknown_update_keys() {
    let server = MockSiceiServer::builder().build().await.unwrap();
    let http = reqwest::Client::new();
    let base = server.url();

    let body: Value = http
        .post(format!("{}/alumnos", base))
        .json(&student())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let resp = http
        .put(format!("{}/alumnos/{}", base, body["id"]))
        .json(&json!({ "edad": 20 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    assert!(resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json")));

    server.stop().await;
}

#[tokio::test]
async fn test_mock_multipart_upload_and_storage_head() {
    let server = MockSiceiServer::builder().build().await.unwrap();
    let http = reqwest::Client::new();
    let base = server.url();

    let body: Value = http
        .post(format!("{}/alumnos", base))
        .json(&student())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = body["id"].as_i64().unwrap();

    let part = reqwest::multipart::Part::bytes(vec![0xFF, 0xD8, 0xFF, 0xD9])
        .file_name("cat.jpg")
        .mime_str("image/jpeg")
        .unwrap();
    let form = reqwest::multipart::Form::new().part("foto", part);
    let resp = http
        .post(format!("{}/alumnos/{}/fotoPerfil", base, id))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let uploaded: Value = resp.json().await.unwrap();
    let url = uploaded["fotoPerfilUrl"].as_str().unwrap().to_string();
    assert!(url.ends_with(".jpg"));

    let head = http.head(&url).send().await.unwrap();
    assert_eq!(head.status().as_u16(), 200);

    let missing = http
        .head(format!("{}/storage/alumnos/{}/perfil_00000000.jpg", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status().as_u16(), 404);

    server.stop().await;
}

#[tokio::test]
async fn test_mock_logout_ignored_fault() {
    let server = MockSiceiServer::builder()
        .with_fault(Fault::LogoutIgnored)
        .build()
        .await
        .unwrap();
    let http = reqwest::Client::new();
    let base = server.url();

    let body: Value = http
        .post(format!("{}/alumnos", base))
        .json(&student())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = body["id"].as_i64().unwrap();

    let login: Value = http
        .post(format!("{}/alumnos/{}/session/login", base, id))
        .json(&json!({ "password": "contrasena1" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let session = login["sessionString"].as_str().unwrap().to_string();
    assert_eq!(session.len(), 128);
    assert!(session.chars().all(|c| c.is_ascii_hexdigit()));

    let logout = http
        .post(format!("{}/alumnos/{}/session/logout", base, id))
        .json(&json!({ "sessionString": session }))
        .send()
        .await
        .unwrap();
    assert_eq!(logout.status().as_u16(), 200);

    let verify = http
        .post(format!("{}/alumnos/{}/session/verify", base, id))
        .json(&json!({ "sessionString": session }))
        .send()
        .await
        .unwrap();
    assert_eq!(verify.status().as_u16(), 200);

    server.stop().await;
}
