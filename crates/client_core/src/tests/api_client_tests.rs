use super::*;
use crate::auth::InMemoryAuthenticator;
use axum::{
    extract::Path,
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

const VALID_TOKEN: &str = "valid-token";

fn authorized(headers: &HeaderMap) -> bool {
    let expected = format!("Bearer {VALID_TOKEN}");
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        == Some(expected.as_str())
}

async fn companies(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "code": "unauthorized", "message": "Missing or invalid token" })),
        );
    }
    if headers.get(TEST_EXCEPTION_HEADER).is_some() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "code": "server_error", "message": "Simulated exception" })),
        );
    }
    if headers.get(SESSION_ID_HEADER).is_none() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "code": "general", "message": "missing session id" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!([{
            "id": 1,
            "name": "Cool Company",
            "region": "Asia",
            "targetUsd": 800000,
            "investmentUsd": 650000,
            "noInvestors": 45
        }])),
    )
}

async fn transactions(Path(id): Path<i64>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "code": "company_not_found",
            "message": format!("Company {id} was not found for this user")
        })),
    )
}

async fn userinfo() -> &'static str {
    "not json"
}

async fn spawn_api_server() -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new()
        .route("/api/companies", get(companies))
        .route("/api/companies/:id/transactions", get(transactions))
        .route("/api/userinfo", get(userinfo));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}/api")
}

fn client_for(base_url: &str, token: Option<&str>) -> HttpApiClient {
    HttpApiClient::new(
        base_url,
        Duration::from_secs(5),
        Arc::new(InMemoryAuthenticator::new(token.map(str::to_string))),
    )
    .expect("client")
}

#[tokio::test]
async fn fetches_companies_with_bearer_and_session_headers() {
    let base_url = spawn_api_server().await;
    let client = client_for(&base_url, Some(VALID_TOKEN));

    let companies = client
        .get_companies(ApiRequestOptions::default())
        .await
        .expect("companies");

    assert_eq!(companies.len(), 1);
    assert_eq!(companies[0].name, "Cool Company");
    assert!(!client.session_id().is_empty());
}

#[tokio::test]
async fn rejected_token_maps_to_login_required() {
    let base_url = spawn_api_server().await;
    let client = client_for(&base_url, Some("stale"));

    let err = client
        .get_companies(ApiRequestOptions::default())
        .await
        .expect_err("unauthorized");

    assert!(err.requires_login());
    assert_eq!(err.status_code, Some(401));
}

#[tokio::test]
async fn cause_error_option_yields_server_error() {
    let base_url = spawn_api_server().await;
    let client = client_for(&base_url, Some(VALID_TOKEN));

    let err = client
        .get_companies(ApiRequestOptions { cause_error: true })
        .await
        .expect_err("simulated exception");

    assert_eq!(err.code, ErrorCode::ServerError);
    assert!(!err.requires_login());
}

#[tokio::test]
async fn unknown_company_is_an_expected_business_error() {
    let base_url = spawn_api_server().await;
    let client = client_for(&base_url, Some(VALID_TOKEN));

    let err = client
        .get_company_transactions(CompanyId(3), ApiRequestOptions::default())
        .await
        .expect_err("not found");

    assert_eq!(err.code, ErrorCode::CompanyNotFound);
    assert!(err.is_expected_business_error());
}

#[tokio::test]
async fn malformed_payload_is_a_data_format_error() {
    let base_url = spawn_api_server().await;
    let client = client_for(&base_url, Some(VALID_TOKEN));

    let err = client
        .get_user_info(ApiRequestOptions::default())
        .await
        .expect_err("bad json");

    assert_eq!(err.code, ErrorCode::DataFormatError);
}

#[tokio::test]
async fn missing_token_requires_login_without_calling_the_api() {
    let client = client_for("http://127.0.0.1:9/api", None);

    let err = client
        .get_companies(ApiRequestOptions::default())
        .await
        .expect_err("no token");

    assert!(err.requires_login());
    assert_eq!(err.status_code, None);
}

#[tokio::test]
async fn unreachable_api_is_a_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let client = client_for(&format!("http://{addr}/api"), Some(VALID_TOKEN));

    let err = client
        .get_companies(ApiRequestOptions::default())
        .await
        .expect_err("connection refused");

    assert_eq!(err.code, ErrorCode::NetworkError);
    assert!(!err.requires_login());
}

#[test]
fn base_url_keeps_its_last_segment_when_joined() {
    let base = normalize_base_url("https://api.example.com/investments").expect("url");
    assert_eq!(
        base.join("companies").expect("join").as_str(),
        "https://api.example.com/investments/companies"
    );
    assert!(normalize_base_url("not a url").is_err());
}
