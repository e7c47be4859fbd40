use actix_web::web::Data;
use actix_web::{delete, get, post, web, HttpRequest, HttpResponse};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;
use crate::auth::verify_token;
use crate::errors::BlobServiceErr;
use crate::metadata::BlobMetadata;
use crate::services::blob_service::BlobService;

pub const APP_TYPE_JSON: &str = "application/json";

/// Room for the JSON envelope and the id around the base64 payload.
const ENVELOPE_OVERHEAD: usize = 64 * 1024;

pub struct AppState {
    pub(crate) blobs: BlobService,
    pub(crate) auth_token: String,
}

#[derive(Serialize, Deserialize, Validate)]
struct CreateBlobRequest {
    #[validate(length(min = 1, max = 1024))]
    id: String,
    data: String,
}

#[derive(Serialize, Deserialize)]
struct BlobCreateResponse {
    id: String,
    size: u64,
    created_at: DateTime<Utc>,
    storage_type: String,
}

impl From<BlobMetadata> for BlobCreateResponse {
    fn from(metadata: BlobMetadata) -> Self {
        Self {
            id: metadata.id,
            size: metadata.size,
            created_at: metadata.created_at,
            storage_type: metadata.storage_type,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct BlobResponse {
    id: String,
    data: String,
    size: u64,
    created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct HealthResponse {
    status: String,
    storage_type: String,
}

/// Largest request body accepted for a given decoded payload limit, so an
/// oversize payload reaches the service and gets a proper 413 from it.
pub fn request_body_limit(max_upload_bytes: usize) -> usize {
    max_upload_bytes.div_ceil(3) * 4 + ENVELOPE_OVERHEAD
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(create_blob)
        .service(get_blob)
        .service(delete_blob)
        .service(health);
}

#[post("/v1/blobs")]
async fn create_blob(
    http_req: HttpRequest,
    request_json_bytes: web::Bytes,
    shared_state: Data<AppState>,
) -> Result<HttpResponse, BlobServiceErr> {
    verify_token(&http_req, &shared_state.auth_token)?;

    let req: CreateBlobRequest = serde_json::from_slice(&request_json_bytes)?;
    req.validate()
        .map_err(|e| BlobServiceErr::InvalidRequest(e.to_string()))?;

    let created = shared_state.blobs.create_blob(&req.id, &req.data).await?;
    Ok(HttpResponse::Created()
        .content_type(APP_TYPE_JSON)
        .json(BlobCreateResponse::from(created)))
}

#[get("/v1/blobs/{blob_id}")]
async fn get_blob(
    http_req: HttpRequest,
    blob_id: web::Path<String>,
    shared_state: Data<AppState>,
) -> Result<HttpResponse, BlobServiceErr> {
    verify_token(&http_req, &shared_state.auth_token)?;

    let blob = shared_state.blobs.read_blob(&blob_id).await?;
    let resp = BlobResponse {
        id: blob.metadata.id,
        data: STANDARD.encode(&blob.data),
        size: blob.metadata.size,
        created_at: blob.metadata.created_at,
    };
    Ok(HttpResponse::Ok().content_type(APP_TYPE_JSON).json(resp))
}

#[delete("/v1/blobs/{blob_id}")]
async fn delete_blob(
    http_req: HttpRequest,
    blob_id: web::Path<String>,
    shared_state: Data<AppState>,
) -> Result<HttpResponse, BlobServiceErr> {
    verify_token(&http_req, &shared_state.auth_token)?;

    shared_state.blobs.delete_blob(&blob_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[get("/health")]
async fn health(shared_state: Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().content_type(APP_TYPE_JSON).json(HealthResponse {
        status: "ok".to_string(),
        storage_type: shared_state.blobs.backend().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use actix_web::http::header::AUTHORIZATION;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use blob_store::LocalFileBlobStore;
    use serde_json::{json, Value};
    use tempfile::{tempdir, TempDir};
    use crate::metadata::SqliteMetadataStore;
    use crate::services::blob_service::tests::FlakyMetadata;

    const TOKEN: &str = "secret-token";
    const MAX: usize = 64;

    fn state(dir: &TempDir, metadata: Arc<dyn crate::metadata::MetadataStore>) -> Data<AppState> {
        let store = Arc::new(LocalFileBlobStore::new(dir.path()).unwrap());
        Data::new(AppState {
            blobs: BlobService::new(store, metadata, MAX),
            auth_token: TOKEN.to_string(),
        })
    }

    fn sqlite_state(dir: &TempDir) -> Data<AppState> {
        state(dir, Arc::new(SqliteMetadataStore::open_in_memory().unwrap()))
    }

    fn bearer() -> (actix_web::http::header::HeaderName, String) {
        (AUTHORIZATION, format!("Bearer {TOKEN}"))
    }

    fn post_blob(id: &str, data: &str) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/v1/blobs")
            .insert_header(bearer())
            .set_json(json!({ "id": id, "data": data }))
    }

    #[actix_web::test]
    async fn test_post_and_get_blob() {
        let dir = tempdir().unwrap();
        let app = test::init_service(App::new().app_data(sqlite_state(&dir)).configure(configure)).await;

        let resp = test::call_service(&app, post_blob("test-1", &STANDARD.encode(b"hello world")).to_request()).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["id"], "test-1");
        assert_eq!(body["size"], 11);
        assert_eq!(body["storage_type"], "local");

        let req = test::TestRequest::get().uri("/v1/blobs/test-1").insert_header(bearer()).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["id"], "test-1");
        assert_eq!(body["size"], 11);
        let data = STANDARD.decode(body["data"].as_str().unwrap()).unwrap();
        assert_eq!(data, b"hello world");
    }

    #[actix_web::test]
    async fn test_invalid_base64_rejected() {
        let dir = tempdir().unwrap();
        let app = test::init_service(App::new().app_data(sqlite_state(&dir)).configure(configure)).await;

        let resp = test::call_service(&app, post_blob("test-invalid", "not-base64!!!").to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["detail"], "Invalid Base64 data");
    }

    #[actix_web::test]
    async fn test_duplicate_id_rejected() {
        let dir = tempdir().unwrap();
        let app = test::init_service(App::new().app_data(sqlite_state(&dir)).configure(configure)).await;
        let data = STANDARD.encode(b"a");

        let resp = test::call_service(&app, post_blob("test-dup", &data).to_request()).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let resp = test::call_service(&app, post_blob("test-dup", &data).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_payload_too_large() {
        let dir = tempdir().unwrap();
        let app = test::init_service(App::new().app_data(sqlite_state(&dir)).configure(configure)).await;

        let resp = test::call_service(&app, post_blob("big", &STANDARD.encode(vec![0u8; MAX + 1])).to_request()).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let resp = test::call_service(&app, post_blob("fits", &STANDARD.encode(vec![0u8; MAX])).to_request()).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    #[actix_web::test]
    async fn test_atomic_cleanup_on_metadata_failure() {
        let dir = tempdir().unwrap();
        let metadata = FlakyMetadata::failing_inserts();
        let app = test::init_service(App::new().app_data(state(&dir, Arc::new(metadata))).configure(configure)).await;

        let resp = test::call_service(&app, post_blob("will-cleanup", &STANDARD.encode(b"cleanup")).to_request()).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!dir.path().join(blob_store::name_for("will-cleanup")).exists());
    }

    #[actix_web::test]
    async fn test_auth_required() {
        let dir = tempdir().unwrap();
        let app = test::init_service(App::new().app_data(sqlite_state(&dir)).configure(configure)).await;

        let req = test::TestRequest::get().uri("/v1/blobs/anything").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::post()
            .uri("/v1/blobs")
            .insert_header((AUTHORIZATION, "Bearer nope"))
            .set_json(json!({ "id": "x", "data": "" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_bad_requests() {
        let dir = tempdir().unwrap();
        let app = test::init_service(App::new().app_data(sqlite_state(&dir)).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/v1/blobs")
            .insert_header(bearer())
            .set_payload("{not json")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let resp = test::call_service(&app, post_blob("", "").to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_missing_and_drifted_blobs() {
        let dir = tempdir().unwrap();
        let app_state = sqlite_state(&dir);
        let app = test::init_service(App::new().app_data(app_state.clone()).configure(configure)).await;

        let req = test::TestRequest::get().uri("/v1/blobs/nope").insert_header(bearer()).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["detail"], "Blob not found");

        test::call_service(&app, post_blob("drift", &STANDARD.encode(b"x")).to_request()).await;
        std::fs::remove_file(dir.path().join(blob_store::name_for("drift"))).unwrap();

        let req = test::TestRequest::get().uri("/v1/blobs/drift").insert_header(bearer()).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["detail"], "Data missing from storage backend");
    }

    #[actix_web::test]
    async fn test_delete_blob() {
        let dir = tempdir().unwrap();
        let app = test::init_service(App::new().app_data(sqlite_state(&dir)).configure(configure)).await;
        test::call_service(&app, post_blob("gone", &STANDARD.encode(b"x")).to_request()).await;

        let req = test::TestRequest::delete().uri("/v1/blobs/gone").insert_header(bearer()).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

        let req = test::TestRequest::delete().uri("/v1/blobs/gone").insert_header(bearer()).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_health() {
        let dir = tempdir().unwrap();
        let app = test::init_service(App::new().app_data(sqlite_state(&dir)).configure(configure)).await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["storage_type"], "local");
    }

    #[core::prelude::v1::test]
    fn test_body_limit_covers_base64_expansion() {
        let max = 10 * 1024 * 1024;
        let encoded_len = STANDARD.encode(vec![0u8; max + 1]).len();
        assert!(request_body_limit(max) >= encoded_len);
    }
}
