use std::time::Duration;

use axum::{
    Extension, Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::IntoResponse,
};
use http_body_util::BodyExt;
use model_vault::{Role, UserContext};
use serde_json::{Value, json};
use tower::util::ServiceExt;
use uuid::Uuid;
use vault_auth::{jwt::JwtArgs, password::PasswordHasher};

use super::*;
use crate::outbound::memory::{MemoryBlobStorage, MemoryVault};

const PASSWORD: &str = "correct-horse-9";
const BOUNDARY: &str = "docvault-test-boundary";

fn jwt_args() -> JwtArgs {
    JwtArgs::new(
        "test-secret",
        "docvault",
        "docvault-api",
        Duration::from_secs(3600),
    )
    .unwrap()
}

fn state() -> VaultRouterState<MemoryVault, MemoryBlobStorage> {
    VaultRouterState::new(VaultServices::new(
        MemoryVault::new(),
        MemoryBlobStorage::new(),
        jwt_args(),
        PasswordHasher::with_cost(4),
        64 * 1024,
    ))
}

/// The routers wired the way the binary wires them, jwt middleware included
fn app(state: VaultRouterState<MemoryVault, MemoryBlobStorage>) -> Router {
    public_router(state.clone()).merge(protected_router(state).layer(
        axum::middleware::from_fn_with_state(
            jwt_args(),
            vault_auth::middleware::decode_jwt::handler,
        ),
    ))
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let res = router.clone().oneshot(request).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

fn upload_request(token: &str, filename: &str, bytes: &[u8], tags: &str) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"tags\"\r\n\r\n{tags}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/documents")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Registers an organization over http and returns the admin's token
async fn register(router: &Router, organization: &str, email: &str) -> String {
    let (status, body) = send(
        router,
        json_request(
            "POST",
            "/auth/register",
            None,
            json!({
                "organization_name": organization,
                "email": email,
                "password": PASSWORD,
                "full_name": "Ada Admin",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["token"].as_str().unwrap().to_string()
}

async fn login(router: &Router, email: &str) -> String {
    let (status, body) = send(
        router,
        json_request(
            "POST",
            "/auth/login",
            None,
            json!({ "email": email, "password": PASSWORD }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["token"].as_str().unwrap().to_string()
}

async fn create_user(router: &Router, admin_token: &str, email: &str, role: &str) -> Uuid {
    let (status, body) = send(
        router,
        json_request(
            "POST",
            "/users",
            Some(admin_token),
            json!({
                "email": email,
                "full_name": email,
                "role": role,
                "password": PASSWORD,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn register_login_and_me() {
    let router = app(state());
    let token = register(&router, "Acme", "Ada@Acme.test").await;

    let (status, body) = send(&router, get("/auth/me", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "ada@acme.test");
    assert_eq!(body["role"], "admin");

    let token = login(&router, "ada@acme.test").await;
    let (status, _) = send(&router, get("/auth/me", &token)).await;
    assert_eq!(status, StatusCode::OK);

    let res = router
        .clone()
        .oneshot(Request::builder().uri("/auth/me").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn errors_map_to_status_codes() {
    let router = app(state());
    let token = register(&router, "Acme", "ada@acme.test").await;

    let (status, body) = send(
        &router,
        json_request(
            "POST",
            "/auth/register",
            None,
            json!({
                "organization_name": "Other",
                "email": "ada@acme.test",
                "password": PASSWORD,
                "full_name": "Someone",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["message"].is_string());

    let (status, body) = send(
        &router,
        json_request(
            "POST",
            "/auth/login",
            None,
            json!({ "email": "ada@acme.test", "password": "wrong-password-1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "message": "invalid email or password" }));

    let (status, _) = send(
        &router,
        json_request(
            "POST",
            "/auth/password",
            Some(&token),
            json!({ "current_password": PASSWORD, "new_password": "short" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&router, get(&format!("/documents/{}", Uuid::now_v7()), &token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "message": "document not found" }));
}

#[tokio::test]
async fn role_gates_use_the_current_role() {
    let router = app(state());
    let admin = register(&router, "Acme", "ada@acme.test").await;
    let member_id = create_user(&router, &admin, "bob@acme.test", "member").await;
    let second_admin_id = create_user(&router, &admin, "cy@acme.test", "admin").await;

    let member = login(&router, "bob@acme.test").await;
    let (status, body) = send(&router, get("/users", &member)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({ "message": "insufficient role" }));
    let (status, _) = send(&router, get("/analytics/usage", &member)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let second_admin = login(&router, "cy@acme.test").await;
    let (status, _) = send(&router, get("/audit-logs", &second_admin)).await;
    assert_eq!(status, StatusCode::OK);

    // the token still says admin, the account no longer does
    let (status, body) = send(
        &router,
        json_request(
            "PATCH",
            &format!("/users/{second_admin_id}"),
            Some(&admin),
            json!({ "role": "manager" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let (status, _) = send(&router, get("/audit-logs", &second_admin)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&router, get("/analytics/usage", &second_admin)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &router,
        json_request(
            "PATCH",
            &format!("/users/{member_id}"),
            Some(&admin),
            json!({ "is_active": false }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&router, get("/auth/me", &member)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({ "message": "account is deactivated" }));
}

#[tokio::test]
async fn upload_search_and_download() {
    let router = app(state());
    let token = register(&router, "Acme", "ada@acme.test").await;

    let res = router
        .clone()
        .oneshot(upload_request(&token, "notes.txt", b"hello docvault", "Work, todo"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let document: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(document["mime_type"], "text/plain");
    assert_eq!(document["size_bytes"], 14);
    let mut tags: Vec<&str> = document["tags"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    tags.sort();
    assert_eq!(tags, ["todo", "work"]);
    assert!(document.get("storage_key").is_none());
    let id = document["id"].as_str().unwrap().to_string();

    let (status, page) = send(&router, get("/documents?query=notes&tag=work", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["id"], id.as_str());

    let res = router
        .clone()
        .oneshot(get(&format!("/documents/{id}/download"), &token))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[header::CONTENT_TYPE], "text/plain");
    assert_eq!(
        res.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"notes.txt\""
    );
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"hello docvault");

    let (status, tags) = send(&router, get("/tags", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tags.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn empty_uploads_and_missing_files_are_rejected() {
    let router = app(state());
    let token = register(&router, "Acme", "ada@acme.test").await;

    let (status, body) = send(&router, upload_request(&token, "empty.txt", b"", "")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "message": "file is empty" }));

    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nno file\r\n--{BOUNDARY}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/documents")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    let (status, body) = send(&router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "message": "missing multipart field `file`" }));
}

#[tokio::test]
async fn trash_restore_and_purge() {
    let router = app(state());
    let token = register(&router, "Acme", "ada@acme.test").await;
    let (_, document) = send(&router, upload_request(&token, "a.txt", b"abc", "")).await;
    let id = document["id"].as_str().unwrap().to_string();

    let delete = |uri: String| {
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    };

    let (status, _) = send(&router, delete(format!("/documents/{id}"))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, trash) = send(&router, get("/documents/trash", &token)).await;
    assert_eq!(trash["total"], 1);

    let (status, restored) = send(
        &router,
        json_request("POST", &format!("/documents/{id}/restore"), Some(&token), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(restored["deleted_at"].is_null());

    let (status, _) = send(&router, delete(format!("/documents/{id}/purge"))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&router, get(&format!("/documents/{id}"), &token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn folders_and_share_codes() {
    let router = app(state());
    let admin = register(&router, "Acme", "ada@acme.test").await;
    create_user(&router, &admin, "bob@acme.test", "member").await;
    let bob = login(&router, "bob@acme.test").await;

    let (status, folder) = send(
        &router,
        json_request("POST", "/folders", Some(&admin), json!({ "name": "Reports" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let folder_id = folder["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &router,
        json_request("POST", "/folders", Some(&admin), json!({ "name": "reports" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&router, get(&format!("/folders/{folder_id}"), &bob)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, share) = send(
        &router,
        json_request(
            "POST",
            "/shares",
            Some(&admin),
            json!({
                "resource_type": "folder",
                "resource_id": folder_id,
                "access_level": "view",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{share}");
    let code = share["code"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 6);

    let (status, redeemed) = send(
        &router,
        json_request("POST", "/shares/redeem", Some(&bob), json!({ "code": code.to_lowercase() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{redeemed}");
    assert_eq!(redeemed["resource_id"], folder_id.as_str());
    assert_eq!(redeemed["access_level"], "view");

    let (status, details) = send(&router, get(&format!("/folders/{folder_id}"), &bob)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(details["name"], "Reports");

    let (_, received) = send(&router, get("/shares/received", &bob)).await;
    assert_eq!(received.as_array().unwrap().len(), 1);

    let (status, codes) = send(
        &router,
        get(
            &format!("/shares?resource_type=folder&resource_id={folder_id}"),
            &admin,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(codes.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn extension_user_context_reaches_handlers() {
    let state = state();
    let admin = state
        .services()
        .auth
        .register(crate::domain::models::RegisterRequest {
            organization_name: "Acme".to_string(),
            email: "ada@acme.test".to_string(),
            password: PASSWORD.to_string(),
            full_name: "Ada".to_string(),
        })
        .await
        .unwrap()
        .user;

    let router: Router = protected_router(state).layer(Extension(UserContext {
        // a stale role is replaced by the stored one
        role: Role::Member,
        ..admin.context()
    }));

    let res = router
        .oneshot(Request::builder().uri("/users").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let page: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(page["total"], 1);
}

#[tokio::test]
async fn internal_errors_hide_details() {
    let res = HttpError(VaultError::Internal(anyhow::anyhow!("connection refused")))
        .into_response();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(bytes.as_ref()).unwrap();
    assert_eq!(
        json,
        json!({ "message": "an internal server error has occurred" })
    );
}
