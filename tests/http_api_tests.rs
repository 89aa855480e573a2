//! HTTP API integration tests: the real router on an ephemeral port, backed by the
//! in-memory record store and a temp upload root, driven through `HttpClient`.

use std::sync::Arc;

use serde_json::json;
use tempfile::{tempdir, TempDir};
use tokio::net::TcpListener;

use docvault::client::HttpClient;
use docvault::config::ServerConfig;
use docvault::file_store::FileStore;
use docvault::model::{ClientStatus, DocumentSlot};
use docvault::record_store::{MemoryRecordStore, SharedRecordStore};
use docvault::server::{serve_with_shutdown, AppState};

struct TestServer {
    client: HttpClient,
    base: String,
    tmp: TempDir,
}

impl TestServer {
    fn upload_root(&self) -> std::path::PathBuf { self.tmp.path().join("uploads") }

    fn stored_file_count(&self) -> usize {
        let Ok(rd) = std::fs::read_dir(self.upload_root()) else { return 0 };
        rd.flatten().map(|d| std::fs::read_dir(d.path()).map(|r| r.count()).unwrap_or(0)).sum()
    }
}

async fn start_server() -> TestServer {
    start_server_with(|_| {}).await
}

async fn start_server_with(tweak: impl FnOnce(&mut ServerConfig)) -> TestServer {
    let tmp = tempdir().unwrap();
    let mut config = ServerConfig { upload_dir: tmp.path().join("uploads"), ..ServerConfig::default() };
    tweak(&mut config);
    let files = FileStore::new(&config.upload_dir, &config.uploads_url_prefix).unwrap();
    let records: SharedRecordStore = Arc::new(MemoryRecordStore::new());
    let state = AppState::new(records, files, config);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve_with_shutdown(listener, state, std::future::pending()));

    let base = format!("http://{}", addr);
    TestServer { client: HttpClient::new(&base).unwrap(), base, tmp }
}

#[tokio::test]
async fn liveness_route_answers() {
    let server = start_server().await;
    let body = reqwest::get(format!("{}/", server.base)).await.unwrap().text().await.unwrap();
    assert_eq!(body, "docvault ok");
}

#[tokio::test]
async fn created_client_has_six_empty_slots() {
    let server = start_server().await;
    let id = server.client.create_client(&json!({"name": "Amina Said", "idNumber": "30112233", "phone": "0700"})).await.unwrap();
    assert_eq!(id.len(), 24);

    let all = server.client.list_clients(None).await.unwrap();
    assert_eq!(all.len(), 1);
    let rec = &all[0];
    assert_eq!(rec.id, id);
    assert_eq!(rec.fields.name, "Amina Said");
    assert_eq!(rec.fields.status, ClientStatus::Available);
    assert_eq!(rec.fields.extra.get("phone"), Some(&json!("0700")));
    assert_eq!(rec.fields.documents.iter().count(), 6);
    assert!(rec.fields.documents.iter().all(|(_, info)| !info.uploaded));

    // Raw JSON keeps the wire names
    let raw: serde_json::Value = reqwest::get(format!("{}/clients", server.base)).await.unwrap().json().await.unwrap();
    assert_eq!(raw[0]["_id"], json!(id));
    for slot in DocumentSlot::ALL {
        assert_eq!(raw[0]["documents"][slot.as_str()]["uploaded"], json!(false));
    }
}

#[tokio::test]
async fn create_rejects_non_object_body() {
    let server = start_server().await;
    let err = server.client.create_client(&json!(["not", "an", "object"])).await.unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert_eq!(err.code(), Some("invalid_body"));
}

#[tokio::test]
async fn invalid_slot_is_rejected_without_writing() {
    let server = start_server().await;
    let id = server.client.create_client(&json!({"name": "A", "idNumber": "1"})).await.unwrap();

    let err = server.client.upload_document(&id, "passport", "p.pdf", b"data".to_vec()).await.unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert_eq!(err.code(), Some("invalid_doc_type"));
    assert_eq!(server.stored_file_count(), 0);
}

#[tokio::test]
async fn upload_is_reachable_and_marks_slot() {
    let server = start_server().await;
    let id = server.client.create_client(&json!({"name": "A", "idNumber": "1"})).await.unwrap();

    let url = server.client.upload_document(&id, "annexIII", "annex.pdf", b"%PDF annex".to_vec()).await.unwrap();
    assert!(url.starts_with(&format!("/uploads/{}/", id)));
    assert!(url.ends_with(".pdf"));

    let served = server.client.fetch(&url).await.unwrap();
    assert_eq!(served.as_deref(), Some(&b"%PDF annex"[..]));

    let filename = url.rsplit('/').next().unwrap();
    let verified = server.client.verify_file(&id, filename).await.unwrap().expect("file should exist");
    assert!(verified.exists);
    assert!(verified.path.ends_with(filename));

    let rec = server.client.list_clients(None).await.unwrap().remove(0);
    let slot = rec.fields.documents.get(DocumentSlot::AnnexIii);
    assert!(slot.uploaded);
    assert_eq!(slot.url.as_deref(), Some(url.as_str()));
    assert_eq!(slot.original_name.as_deref(), Some("annex.pdf"));
    assert!(!rec.fields.documents.get(DocumentSlot::Id).uploaded);
}

#[tokio::test]
async fn reupload_overwrites_slot_metadata() {
    let server = start_server().await;
    let id = server.client.create_client(&json!({"name": "A", "idNumber": "1"})).await.unwrap();

    let first = server.client.upload_document(&id, "id", "front.jpg", b"one".to_vec()).await.unwrap();
    let second = server.client.upload_document(&id, "id", "front-v2.jpg", b"two".to_vec()).await.unwrap();
    assert_ne!(first, second);

    let rec = server.client.list_clients(None).await.unwrap().remove(0);
    let slot = rec.fields.documents.get(DocumentSlot::Id);
    assert_eq!(slot.url.as_deref(), Some(second.as_str()));
    assert_eq!(slot.original_name.as_deref(), Some("front-v2.jpg"));
    // The earlier file is still served
    assert_eq!(server.client.fetch(&first).await.unwrap().as_deref(), Some(&b"one"[..]));
    assert_eq!(server.stored_file_count(), 2);
}

#[tokio::test]
async fn upload_to_unknown_client_is_not_found() {
    let server = start_server().await;
    let err = server.client.upload_document("65f0c0ffee00000000000001", "id", "x.jpg", b"x".to_vec()).await.unwrap_err();
    assert_eq!(err.status(), Some(404));

    let err = server.client.upload_document("not-an-object-id", "id", "x.jpg", b"x".to_vec()).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn upload_without_file_part_is_rejected() {
    let server = start_server().await;
    let id = server.client.create_client(&json!({"name": "A", "idNumber": "1"})).await.unwrap();

    let form = reqwest::multipart::Form::new().text("doc_type", "id");
    let resp = reqwest::Client::new()
        .post(format!("{}/documents/upload/{}", server.base, id))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], json!("missing_field"));
}

#[tokio::test]
async fn oversized_upload_is_payload_too_large() {
    let server = start_server_with(|cfg| cfg.max_upload_bytes = 1024).await;
    let id = server.client.create_client(&json!({"name": "A", "idNumber": "1"})).await.unwrap();

    let err = server.client.upload_document(&id, "id", "big.pdf", vec![b'x'; 4096]).await.unwrap_err();
    assert_eq!(err.status(), Some(413));
    assert_eq!(err.code(), Some("payload_too_large"));

    let rec = server.client.list_clients(None).await.unwrap().remove(0);
    assert!(!rec.fields.documents.get(DocumentSlot::Id).uploaded);
}

#[tokio::test]
async fn search_filters_by_name_or_id_number() {
    let server = start_server().await;
    for (name, id_number) in [("Grace Wanjiru", "2244"), ("Peter Kamau", "9911"), ("Wanjiku Njeri", "PK-77")] {
        server.client.create_client(&json!({"name": name, "idNumber": id_number})).await.unwrap();
    }

    assert_eq!(server.client.list_clients(Some("")).await.unwrap().len(), 3);
    assert_eq!(server.client.list_clients(None).await.unwrap().len(), 3);

    let mut names: Vec<String> = server.client.list_clients(Some("WANJ")).await.unwrap().into_iter().map(|r| r.fields.name).collect();
    names.sort();
    assert_eq!(names, vec!["Grace Wanjiru".to_string(), "Wanjiku Njeri".to_string()]);

    let by_id = server.client.list_clients(Some("pk-")).await.unwrap();
    assert_eq!(by_id.len(), 1);
    assert_eq!(by_id[0].fields.name, "Wanjiku Njeri");

    // Regex metacharacters are matched literally
    assert!(server.client.list_clients(Some(".*")).await.unwrap().is_empty());
}

#[tokio::test]
async fn checkout_and_checkin_toggle_status() {
    let server = start_server().await;
    let id = server.client.create_client(&json!({"name": "A", "idNumber": "1"})).await.unwrap();

    for _ in 0..2 {
        server.client.checkout(&id, "Records Office", Some("Valuation"), Some("2026-11-30")).await.unwrap();
        let rec = server.client.list_clients(None).await.unwrap().remove(0);
        assert_eq!(rec.fields.status, ClientStatus::CheckedOut);
        assert_eq!(rec.fields.checkout.checked_out_to.as_deref(), Some("Records Office"));
        assert_eq!(rec.fields.checkout.checked_out_purpose.as_deref(), Some("Valuation"));
        assert_eq!(rec.fields.checkout.expected_return.as_deref(), Some("2026-11-30"));
        assert!(rec.fields.checkout.checked_out_date.is_some());

        server.client.checkin(&id).await.unwrap();
        let rec = server.client.list_clients(None).await.unwrap().remove(0);
        assert_eq!(rec.fields.status, ClientStatus::Available);
        assert!(rec.fields.checkout.is_empty());
    }

    // Checking in an already available record still succeeds
    server.client.checkin(&id).await.unwrap();
}

#[tokio::test]
async fn checkout_without_recipient_is_rejected() {
    let server = start_server().await;
    let id = server.client.create_client(&json!({"name": "A", "idNumber": "1"})).await.unwrap();
    let resp = reqwest::Client::new()
        .post(format!("{}/clients/checkout/{}", server.base, id))
        .form(&[("purpose", "audit")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn checkout_and_checkin_on_missing_client_are_not_found() {
    let server = start_server().await;
    let err = server.client.checkout("65f0c0ffee00000000000001", "X", None, None).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.code(), Some("client_not_found"));

    let err = server.client.checkin("65f0c0ffee00000000000001").await.unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn verify_missing_file_is_not_found() {
    let server = start_server().await;
    let id = server.client.create_client(&json!({"name": "A", "idNumber": "1"})).await.unwrap();
    assert!(server.client.verify_file(&id, "nothing.pdf").await.unwrap().is_none());
    assert!(server.client.fetch(&format!("/uploads/{}/nothing.pdf", id)).await.unwrap().is_none());
}
