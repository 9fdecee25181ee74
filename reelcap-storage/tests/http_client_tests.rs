use bytes::Bytes;
use reelcap_core::{RecordId, UploadProgress};
use reelcap_storage::{
    AirtableClient, AirtableConfig, ObjectStorage, RecordStore, StorageError, SupabaseConfig,
    SupabaseStorage,
};
use serde_json::{json, Map, Value};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn supabase(server: &MockServer) -> SupabaseStorage {
    SupabaseStorage::new(SupabaseConfig::new(server.uri(), "service-key")).unwrap()
}

#[tokio::test]
async fn test_signed_url_is_made_absolute() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/storage/v1/object/upload/sign/video/video-rec1-1.webm"))
        .and(header("apikey", "service-key"))
        .and(header("authorization", "Bearer service-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "url": "/object/upload/sign/video/video-rec1-1.webm?token=abc123"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let signed = supabase(&server)
        .create_signed_upload_url("video-rec1-1.webm")
        .await
        .unwrap();

    assert_eq!(signed.path, "video-rec1-1.webm");
    assert_eq!(signed.token.as_deref(), Some("abc123"));
    assert_eq!(
        signed.url,
        format!(
            "{}/storage/v1/object/upload/sign/video/video-rec1-1.webm?token=abc123",
            server.uri()
        )
    );
}

#[tokio::test]
async fn test_signing_rejection_carries_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("Bucket not found"))
        .mount(&server)
        .await;

    let err = supabase(&server)
        .create_signed_upload_url("x.webm")
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(400));
    assert!(err.to_string().contains("Bucket not found"));
}

#[tokio::test]
async fn test_signing_response_without_url_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "signedUrl": 1 })))
        .mount(&server)
        .await;

    let err = supabase(&server)
        .create_signed_upload_url("x.webm")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::MalformedResponse { .. }));
}

#[tokio::test]
async fn test_transfer_streams_whole_body_with_progress() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "url": "/object/upload/sign/video/clip.webm?token=t1"
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/storage/v1/object/upload/sign/video/clip.webm"))
        .and(query_param("token", "t1"))
        .and(header("content-type", "video/webm"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Key": "video/clip.webm" })))
        .expect(1)
        .mount(&server)
        .await;

    let storage = supabase(&server);
    let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    let progress = UploadProgress::new();
    let mut observed = progress.subscribe();

    let signed = storage.create_signed_upload_url("clip.webm").await.unwrap();
    storage
        .upload_to_signed_url(
            &signed,
            Bytes::from(payload.clone()),
            "video/webm",
            progress.clone(),
        )
        .await
        .unwrap();

    // Confirmation belongs to the caller
    assert_eq!(progress.current(), 99);
    assert!(observed.has_changed().unwrap());
    assert_eq!(*observed.borrow_and_update(), 99);

    let requests = server.received_requests().await.unwrap();
    let put = requests
        .iter()
        .find(|r| r.method.as_str() == "PUT")
        .unwrap();
    assert_eq!(put.body, payload);
}

#[tokio::test]
async fn test_transfer_failure_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(413).set_body_string("Payload too large"))
        .mount(&server)
        .await;

    let storage = supabase(&server);
    let signed = reelcap_storage::SignedUpload {
        path: "big.webm".to_string(),
        url: format!("{}/storage/v1/object/upload/sign/video/big.webm?token=t", server.uri()),
        token: Some("t".to_string()),
    };
    let err = storage
        .upload_to_signed_url(
            &signed,
            Bytes::from_static(b"0123456789"),
            "video/webm",
            UploadProgress::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(413));
}

#[tokio::test]
async fn test_remove_sends_prefixes() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/storage/v1/object/video"))
        .and(body_json(json!({ "prefixes": ["video-rec1-1.webm"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    supabase(&server)
        .remove(&["video-rec1-1.webm".to_string()])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_record_update_patches_single_field() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/v0/appBase/SFF%20Candidate%20Database/rec42"))
        .and(header("authorization", "Bearer pat-123"))
        .and(body_json(json!({
            "fields": { "Video Instruction": [{ "url": "https://cdn/x.webm" }] }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "rec42" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = AirtableClient::new(
        AirtableConfig::new("pat-123", "appBase").with_api_root(format!("{}/v0", server.uri())),
    )
    .unwrap();

    let mut fields = Map::new();
    fields.insert(
        "Video Instruction".to_string(),
        json!([{ "url": "https://cdn/x.webm" }]),
    );
    client
        .update_record(&RecordId::new("rec42").unwrap(), fields)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_record_update_failure_carries_status() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(422).set_body_string("INVALID_VALUE_FOR_COLUMN"))
        .mount(&server)
        .await;

    let client = AirtableClient::new(
        AirtableConfig::new("pat", "appBase").with_api_root(format!("{}/v0", server.uri())),
    )
    .unwrap();

    let err = client
        .update_record(&RecordId::new("rec1").unwrap(), Map::<String, Value>::new())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(422));
    assert!(err.to_string().contains("INVALID_VALUE_FOR_COLUMN"));
}
