use std::collections::HashMap;

use anyhow::Result;
use axum::{
    extract::{Multipart, Query},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::json;
use shared::{
    domain::{FieldId, SeasonId},
    protocol::{FieldSeasonImagesRequest, NewUavFlight},
};
use tokio::net::TcpListener;

use super::*;
use crate::endpoints::{self, commands};

async fn echo_request(
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    Json(json!({"auth": auth, "query": query}))
}

async fn echo_body(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    (StatusCode::CREATED, Json(body))
}

async fn missing() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"detail": "Season not found or you are not the owner."})),
    )
}

async fn invalid() -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"name": ["This field is required."]})),
    )
}

async fn no_content() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn plain_text() -> &'static str {
    "queued"
}

/// Reports the text fields and file parts it received.
async fn describe_upload(mut multipart: Multipart) -> (StatusCode, Json<Value>) {
    let mut fields = serde_json::Map::new();
    let mut files = Vec::new();
    while let Ok(Some(part)) = multipart.next_field().await {
        let name = part.name().unwrap_or_default().to_string();
        match part.file_name().map(str::to_string) {
            Some(file_name) => {
                let len = part.bytes().await.map(|b| b.len()).unwrap_or_default();
                files.push(json!({"part": name, "file_name": file_name, "len": len}));
            }
            None => {
                let text = part.text().await.unwrap_or_default();
                fields.insert(name, Value::String(text));
            }
        }
    }
    (
        StatusCode::CREATED,
        Json(json!({"fields": fields, "files": files})),
    )
}

async fn spawn_api_server() -> Result<String> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new()
        .route("/api/echo/", get(echo_request))
        .route("/api/body/", post(echo_body))
        .route("/api/missing/", get(missing))
        .route("/api/invalid/", post(invalid))
        .route("/api/empty/", delete(no_content))
        .route("/api/text/", get(plain_text))
        .route(&format!("/{}", endpoints::CREATE_UAV_FLIGHT), post(describe_upload))
        .route(
            &format!("/{}", endpoints::ADD_IMAGE_TO_FIELD_SEASON),
            post(describe_upload),
        );
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}/"))
}

fn transport_for(base_url: String, token: Option<&str>) -> HttpTransport {
    let settings = ClientSettings {
        api_base_url: base_url,
        ..ClientSettings::default()
    };
    HttpTransport::new(
        &settings,
        Arc::new(StaticCredentials(token.map(str::to_string))),
    )
    .expect("transport")
}

#[tokio::test]
async fn forwards_query_pairs_and_authorization() {
    let base_url = spawn_api_server().await.expect("spawn server");
    let transport = transport_for(base_url, Some("secret"));

    let response = transport
        .send(
            ApiRequest::new(HttpMethod::Get, "api/echo/")
                .with_query(vec![("user_id".into(), "7".into())]),
        )
        .await
        .expect("send");

    assert_eq!(response.status, 200);
    assert_eq!(response.body["auth"], "Bearer secret");
    assert_eq!(response.body["query"]["user_id"], "7");
}

#[tokio::test]
async fn anonymous_requests_carry_no_authorization() {
    let base_url = spawn_api_server().await.expect("spawn server");
    let transport = transport_for(base_url, None);
    let response = transport
        .send(ApiRequest::new(HttpMethod::Get, "/api/echo/"))
        .await
        .expect("send");
    assert!(response.body["auth"].is_null());
}

#[tokio::test]
async fn shared_credentials_are_read_per_request() {
    let base_url = spawn_api_server().await.expect("spawn server");
    let credentials = Arc::new(SharedCredentials::default());
    let settings = ClientSettings {
        api_base_url: base_url,
        auth_scheme: "Token".into(),
        ..ClientSettings::default()
    };
    let transport = HttpTransport::new(&settings, credentials.clone()).expect("transport");

    let before = transport
        .send(ApiRequest::new(HttpMethod::Get, "api/echo/"))
        .await
        .expect("send");
    assert!(before.body["auth"].is_null());

    credentials.set_token(Some("abc".into()));
    let after = transport
        .send(ApiRequest::new(HttpMethod::Get, "api/echo/"))
        .await
        .expect("send");
    assert_eq!(after.body["auth"], "Token abc");
}

#[tokio::test]
async fn json_bodies_round_trip() {
    let base_url = spawn_api_server().await.expect("spawn server");
    let transport = transport_for(base_url, Some("secret"));
    let response = transport
        .send(ApiRequest::new(HttpMethod::Post, "api/body/").with_body(json!({"season_id": 4})))
        .await
        .expect("send");
    assert_eq!(response.status, 201);
    assert_eq!(response.body, json!({"season_id": 4}));
}

#[tokio::test]
async fn not_found_uses_the_server_detail() {
    let base_url = spawn_api_server().await.expect("spawn server");
    let transport = transport_for(base_url, Some("secret"));
    let err = transport
        .send(ApiRequest::new(HttpMethod::Get, "api/missing/"))
        .await
        .expect_err("404");
    match err {
        CacheError::NotFound(message) => {
            assert_eq!(message, "Season not found or you are not the owner.")
        }
        other => panic!("expected not found, got {other:?}"),
    }
}

#[tokio::test]
async fn rejected_requests_keep_status_and_body() {
    let base_url = spawn_api_server().await.expect("spawn server");
    let transport = transport_for(base_url, Some("secret"));
    let err = transport
        .send(ApiRequest::new(HttpMethod::Post, "api/invalid/").with_body(json!({})))
        .await
        .expect_err("400");
    assert_eq!(err.status(), Some(400));
    assert!(err.to_string().contains("This field is required."));
}

#[tokio::test]
async fn empty_and_plain_text_bodies_are_tolerated() {
    let base_url = spawn_api_server().await.expect("spawn server");
    let transport = transport_for(base_url, Some("secret"));

    let empty = transport
        .send(ApiRequest::new(HttpMethod::Delete, "api/empty/"))
        .await
        .expect("204");
    assert_eq!(empty.status, 204);
    assert!(empty.body.is_null());

    let text = transport
        .send(ApiRequest::new(HttpMethod::Get, "api/text/"))
        .await
        .expect("text");
    assert_eq!(text.body, Value::String("queued".into()));
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let transport = transport_for(format!("http://{addr}/"), None);
    let err = transport
        .send(ApiRequest::new(HttpMethod::Get, "api/echo/"))
        .await
        .expect_err("connection refused");
    assert!(matches!(err, CacheError::Transport { status: None, .. }));
}

#[tokio::test]
async fn flight_images_are_sent_as_multipart_form_data() {
    let base_url = spawn_api_server().await.expect("spawn server");
    let transport = transport_for(base_url, Some("secret"));
    let command = commands::create_uav_flight(
        NewUavFlight {
            flight_date: "2024-06-01T10:00:00Z".parse().expect("timestamp"),
            description: Some("north pass".into()),
        },
        vec![
            FileUpload::new("images", "DJI_0001.JPG", vec![7; 32]),
            FileUpload::new("images", "DJI_0002.JPG", vec![7; 8]),
        ],
    )
    .expect("command");

    let response = transport
        .send(command.request().clone())
        .await
        .expect("send");

    assert_eq!(response.status, 201);
    assert_eq!(response.body["fields"]["description"], "north pass");
    assert!(response.body["fields"]["flight_date"]
        .as_str()
        .is_some_and(|date| date.starts_with("2024-06-01")));
    assert_eq!(
        response.body["files"],
        json!([
            {"part": "images", "file_name": "DJI_0001.JPG", "len": 32},
            {"part": "images", "file_name": "DJI_0002.JPG", "len": 8},
        ])
    );
}

#[tokio::test]
async fn field_season_images_carry_ids_as_text_fields() {
    let base_url = spawn_api_server().await.expect("spawn server");
    let transport = transport_for(base_url, Some("secret"));
    let path = std::env::temp_dir().join(format!("plot-{}.tif", std::process::id()));
    std::fs::write(&path, [1_u8, 2, 3, 4]).expect("write image");
    let upload = FileUpload::read("ignored", &path).await;
    let _ = std::fs::remove_file(&path);
    let upload = upload.expect("read image");

    let command = commands::add_images_to_field_season(
        FieldSeasonImagesRequest {
            season_id: SeasonId(4),
            field_id: FieldId(9),
        },
        vec![upload],
    )
    .expect("command");
    let response = transport
        .send(command.request().clone())
        .await
        .expect("send");

    assert_eq!(response.body["fields"], json!({"season_id": "4", "field_id": "9"}));
    assert_eq!(response.body["files"][0]["part"], "image");
    assert_eq!(response.body["files"][0]["len"], 4);
    assert!(response.body["files"][0]["file_name"]
        .as_str()
        .is_some_and(|name| name.ends_with(".tif")));
}

#[tokio::test]
async fn unreadable_upload_is_a_validation_error() {
    let missing = std::env::temp_dir().join("no-such-image-for-upload.jpg");
    let err = FileUpload::read("images", &missing)
        .await
        .expect_err("missing file");
    assert!(matches!(err, CacheError::Validation(_)));
}
