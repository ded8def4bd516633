//! Content creation, update and deletion through the managed API.

use std::path::Path;

use reqwest::multipart::{Form, Part};
use serde_json::{Map, Value};
use sha1::{Digest, Sha1};

use super::client::{read_json, ApiClient};
use super::error::ApiError;
use super::types::{ApiResponse, Payload, Record, Request, RequestType, ResultEntry};

/// Placeholder shortname for submitted records; the backend assigns the real one.
const SUBMIT_SHORTNAME: &str = "dummy";

const DEFAULT_UPLOAD_MIME: &str = "application/octet-stream";

/// Binary file sent alongside a media record.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl MediaUpload {
    pub fn new(file_name: &str, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.to_string(),
            content_type: None,
            bytes,
        }
    }

    /// Read an upload from disk, named after the file.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(&file_name, bytes))
    }

    fn into_part(self) -> Result<Part, ApiError> {
        let mime = self.content_type.as_deref().unwrap_or(DEFAULT_UPLOAD_MIME);
        Ok(Part::bytes(self.bytes)
            .file_name(self.file_name)
            .mime_str(mime)?)
    }
}

/// Submit an interaction record (comment, reaction, ...) under `subpath`.
///
/// POST /submit as multipart; the envelope travels in the `request` field.
pub async fn submit(
    client: &ApiClient,
    interaction_type: &str,
    subpath: &str,
    parent_shortname: Option<&str>,
    attributes: Map<String, Value>,
) -> Result<ApiResponse, ApiError> {
    let endpoint = client.endpoint();
    let mut record = Record::new(interaction_type, subpath, SUBMIT_SHORTNAME);
    record.attributes = attributes;
    record.parent_shortname = parent_shortname.map(str::to_string);

    let request = Request::single(&endpoint.space_name, RequestType::Submit, record);
    let form = Form::new().text("request", serde_json::to_string(&request)?);

    let resp = client
        .authenticated_multipart_post(&endpoint, "/submit", form)
        .await?;
    read_json(resp).await
}

/// Create a media record together with its file.
///
/// POST /media as multipart with `request` and `file` fields.
pub async fn post_media(
    client: &ApiClient,
    record: Record,
    upload: MediaUpload,
) -> Result<ApiResponse, ApiError> {
    let endpoint = client.endpoint();
    log::info!(
        "Uploading {} ({} bytes) to {}/{}",
        upload.file_name,
        upload.bytes.len(),
        record.subpath,
        record.shortname
    );
    let request = Request::single(&endpoint.space_name, RequestType::Create, record);
    let form = Form::new()
        .text("request", serde_json::to_string(&request)?)
        .part("file", upload.into_part()?);

    let resp = client
        .authenticated_multipart_post(&endpoint, "/media", form)
        .await?;
    read_json(resp).await
}

/// Send a one-record `action` request.
///
/// POST /managed/request with session credentials.
pub async fn content(
    client: &ApiClient,
    action: RequestType,
    record: Record,
) -> Result<ApiResponse, ApiError> {
    let endpoint = client.endpoint();
    log::debug!(
        "{} {} {}/{}",
        action,
        record.resource_type,
        record.subpath,
        record.shortname
    );
    let request = Request::single(&endpoint.space_name, action, record);
    let resp = client
        .authenticated_post(&endpoint, "/managed/request", &request)
        .await?;
    read_json(resp).await
}

/// Delete one record. Returns the first result entry.
pub async fn delete_content(
    client: &ApiClient,
    resource_type: &str,
    subpath: &str,
    shortname: &str,
    parent_shortname: Option<&str>,
) -> Result<ResultEntry, ApiError> {
    let mut record = Record::new(resource_type, subpath, shortname);
    record.parent_shortname = parent_shortname.map(str::to_string);
    content(client, RequestType::Delete, record)
        .await?
        .into_first_result()
}

/// Apply `action` to a folder. Returns the first result entry.
pub async fn folder(
    client: &ApiClient,
    action: RequestType,
    subpath: &str,
    shortname: &str,
) -> Result<ResultEntry, ApiError> {
    let record = Record::new("folder", subpath, shortname);
    content(client, action, record).await?.into_first_result()
}

/// `sha1:<hex digest>` of `embedded`.
pub fn embedded_checksum(embedded: &str) -> String {
    format!("sha1:{}", hex::encode(Sha1::digest(embedded.as_bytes())))
}

/// Replace the embedded payload of a record. Returns the first result entry.
pub async fn update_embedded(
    client: &ApiClient,
    content_type: &str,
    embedded: &str,
    subpath: &str,
    shortname: &str,
    resource_type: &str,
) -> Result<ResultEntry, ApiError> {
    let payload = Payload {
        checksum: Some(embedded_checksum(embedded)),
        embedded: Some(Value::String(embedded.to_string())),
        content_type: Some(content_type.to_string()),
        bytesize: Some(embedded.len() as u64),
        ..Default::default()
    };
    let mut record = Record::new(resource_type, subpath, shortname);
    record
        .attributes
        .insert("payload".to_string(), serde_json::to_value(payload)?);

    content(client, RequestType::Update, record)
        .await?
        .into_first_result()
}

pub async fn update_content(_client: &ApiClient, _record: Record) -> Result<ApiResponse, ApiError> {
    Err(ApiError::NotImplemented("update_content"))
}

pub async fn move_content(
    _client: &ApiClient,
    _subpath: &str,
    _shortname: &str,
    _new_subpath: &str,
    _new_shortname: &str,
) -> Result<ApiResponse, ApiError> {
    Err(ApiError::NotImplemented("move"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{client_for, SPACE};
    use crate::api::types::Status;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn two_results() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "results": [
                {"status": "success", "uuid": "first"},
                {"status": "success", "uuid": "second"}
            ]
        }))
    }

    fn multipart_body(server_requests: &[wiremock::Request]) -> String {
        String::from_utf8_lossy(&server_requests[0].body).into_owned()
    }

    #[test]
    fn test_embedded_checksum_is_sha1_hex() {
        assert_eq!(
            embedded_checksum("hello"),
            "sha1:aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d"
        );
    }

    #[tokio::test]
    async fn test_content_posts_envelope_with_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/managed/request"))
            .and(header("authorization", "Bearer tok"))
            .and(body_json(json!({
                "space_name": SPACE,
                "request_type": "create",
                "records": [{
                    "resource_type": "content",
                    "subpath": "posts",
                    "shortname": "hello",
                    "attributes": {"tags": ["x"]}
                }]
            })))
            .respond_with(two_results())
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.set_access_token("tok".into()).await;
        let mut record = Record::new("content", "posts", "hello");
        record.attributes.insert("tags".into(), json!(["x"]));
        let resp = content(&client, RequestType::Create, record).await.unwrap();
        assert_eq!(resp.results.map(|r| r.len()), Some(2));
    }

    #[tokio::test]
    async fn test_delete_content_returns_first_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/managed/request"))
            .and(body_json(json!({
                "space_name": SPACE,
                "request_type": "delete",
                "records": [{
                    "resource_type": "comment",
                    "subpath": "posts/hello",
                    "shortname": "c1",
                    "parent_shortname": "hello",
                    "attributes": {}
                }]
            })))
            .respond_with(two_results())
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result = delete_content(&client, "comment", "posts/hello", "c1", Some("hello"))
            .await
            .unwrap();
        assert_eq!(result.status, Some(Status::Success));
        assert_eq!(result.extra.get("uuid"), Some(&json!("first")));
    }

    #[tokio::test]
    async fn test_delete_content_without_results_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/managed/request"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result = delete_content(&client, "content", "posts", "x", None).await;
        assert!(matches!(result, Err(ApiError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_folder_fixes_resource_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/managed/request"))
            .and(body_json(json!({
                "space_name": SPACE,
                "request_type": "create",
                "records": [{
                    "resource_type": "folder",
                    "subpath": "posts",
                    "shortname": "drafts",
                    "attributes": {}
                }]
            })))
            .respond_with(two_results())
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result = folder(&client, RequestType::Create, "posts", "drafts")
            .await
            .unwrap();
        assert_eq!(result.extra.get("uuid"), Some(&json!("first")));
    }

    #[tokio::test]
    async fn test_update_embedded_sends_checksum_and_size() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/managed/request"))
            .and(body_json(json!({
                "space_name": SPACE,
                "request_type": "update",
                "records": [{
                    "resource_type": "content",
                    "subpath": "posts",
                    "shortname": "hello",
                    "attributes": {"payload": {
                        "checksum": "sha1:aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d",
                        "embedded": "hello",
                        "content_type": "text/html; charset=utf8",
                        "bytesize": 5
                    }}
                }]
            })))
            .respond_with(two_results())
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result = update_embedded(
            &client,
            "text/html; charset=utf8",
            "hello",
            "posts",
            "hello",
            "content",
        )
        .await
        .unwrap();
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_update_embedded_bytesize_counts_utf8_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(two_results())
            .mount(&server)
            .await;

        let client = client_for(&server);
        update_embedded(&client, "text/plain", "héllo", "p", "s", "content")
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(sent["records"][0]["attributes"]["payload"]["bytesize"], json!(6));
    }

    #[tokio::test]
    async fn test_submit_sends_multipart_request_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/submit"))
            .and(header_exists("content-type"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let mut attributes = Map::new();
        attributes.insert("body".into(), json!("nice post"));
        submit(&client, "comment", "posts/hello", Some("hello"), attributes)
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let content_type = requests[0].headers.get("content-type").unwrap();
        assert!(content_type
            .to_str()
            .unwrap()
            .starts_with("multipart/form-data"));
        let body = multipart_body(&requests);
        assert!(body.contains("name=\"request\""));
        assert!(body.contains("\"request_type\":\"submit\""));
        assert!(body.contains("\"shortname\":\"dummy\""));
        assert!(body.contains("\"parent_shortname\":\"hello\""));
        assert!(body.contains("\"space_name\":\"products\""));
    }

    #[tokio::test]
    async fn test_submit_omits_parent_when_absent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/submit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        submit(&client, "reaction", "posts/hello", None, Map::new())
            .await
            .unwrap();

        let body = multipart_body(&server.received_requests().await.unwrap());
        assert!(!body.contains("parent_shortname"));
    }

    #[tokio::test]
    async fn test_post_media_sends_request_and_file() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/media"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let record = Record::new("media", "posts/hello", "pic");
        let mut upload = MediaUpload::new("pic.png", b"PNGDATA".to_vec());
        upload.content_type = Some("image/png".into());
        post_media(&client, record, upload).await.unwrap();

        let body = multipart_body(&server.received_requests().await.unwrap());
        assert!(body.contains("name=\"request\""));
        assert!(body.contains("\"request_type\":\"create\""));
        assert!(body.contains("name=\"file\""));
        assert!(body.contains("filename=\"pic.png\""));
        assert!(body.contains("Content-Type: image/png"));
        assert!(body.contains("PNGDATA"));
    }

    #[tokio::test]
    async fn test_media_upload_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("photo.jpg");
        std::fs::write(&file, b"jpeg").unwrap();

        let upload = MediaUpload::from_path(&file).await.unwrap();
        assert_eq!(upload.file_name, "photo.jpg");
        assert_eq!(upload.bytes, b"jpeg".to_vec());
    }

    #[tokio::test]
    async fn test_unimplemented_operations() {
        let server = MockServer::start().await;
        let client = client_for(&server);
        assert!(matches!(
            move_content(&client, "a", "b", "c", "d").await,
            Err(ApiError::NotImplemented("move"))
        ));
        assert!(matches!(
            update_content(&client, Record::default()).await,
            Err(ApiError::NotImplemented("update_content"))
        ));
    }
}
