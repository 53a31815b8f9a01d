//! End-to-end session flow against an in-process API over real HTTP.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use gallery_client::auth::{AUTH_STORAGE_KEY, RenderMode, auth_guard};
use gallery_client::config::ClientConfig;
use gallery_client::models::LoginCredentials;
use gallery_client::navigation::{Location, MemoryNavigator};
use gallery_client::storage::{FileStorage, Storage};
use gallery_client::{AppState, ReqwestTransport, Transport};
use serde_json::{Value, json};

// =============================================================================
// MOCK API
// =============================================================================

#[derive(Default)]
struct Tokens {
    generation: usize,
    access: Option<String>,
    refresh: Option<String>,
}

#[derive(Clone, Default)]
struct MockApi {
    tokens: Arc<Mutex<Tokens>>,
    refresh_calls: Arc<AtomicUsize>,
}

impl MockApi {
    fn issue(&self) -> Value {
        let mut tokens = self.tokens.lock().unwrap();
        tokens.generation += 1;
        let access = format!("access-{}", tokens.generation);
        let refresh = format!("refresh-{}", tokens.generation);
        tokens.access = Some(access.clone());
        tokens.refresh = Some(refresh.clone());
        json!({ "accessToken": access, "refreshToken": refresh, "user": { "id": "u-1", "email": "ada@gallery.test", "role": "ADMIN" } })
    }

    /// Invalidate the current access token; the refresh token stays valid.
    fn expire_access(&self) {
        self.tokens.lock().unwrap().access = None;
    }

    fn revoke_all(&self) {
        let mut tokens = self.tokens.lock().unwrap();
        tokens.access = None;
        tokens.refresh = None;
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let tokens = self.tokens.lock().unwrap();
        let presented = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        presented.is_some() && presented == tokens.access.as_deref()
    }
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Unauthorized", "statusCode": 401 }))).into_response()
}

async fn login(State(api): State<MockApi>, Json(body): Json<Value>) -> Response {
    if body["password"] == "secret" {
        Json(api.issue()).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Invalid email or password" }))).into_response()
    }
}

async fn refresh(State(api): State<MockApi>, Json(body): Json<Value>) -> Response {
    api.refresh_calls.fetch_add(1, Ordering::SeqCst);
    // Wide enough that concurrent 401s pile up behind one refresh.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let current = api.tokens.lock().unwrap().refresh.clone();
    if current.is_some() && body["refreshToken"].as_str() == current.as_deref() {
        Json(api.issue()).into_response()
    } else {
        unauthorized()
    }
}

async fn logout() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn me(State(api): State<MockApi>, headers: HeaderMap) -> Response {
    if !api.authorized(&headers) {
        return unauthorized();
    }
    Json(json!({
        "id": "u-1",
        "email": "ada@gallery.test",
        "role": "ADMIN",
        "status": "ACTIVE",
        "emailVerified": true,
        "profile": { "firstName": "Ada", "lastName": "Lovelace" }
    }))
    .into_response()
}

async fn my_artworks(State(api): State<MockApi>, headers: HeaderMap) -> Response {
    if !api.authorized(&headers) {
        return unauthorized();
    }
    Json(json!({ "data": [], "total": 0, "page": 1, "limit": 20, "totalPages": 0 })).into_response()
}

async fn spawn_api() -> (MockApi, String) {
    let api = MockApi::default();
    let app = Router::new()
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/refresh", post(refresh))
        .route("/api/v1/auth/logout", post(logout))
        .route("/api/v1/users/me", get(me))
        .route("/api/v1/artworks/mine", get(my_artworks))
        .with_state(api.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (api, format!("http://{addr}/api/v1"))
}

// =============================================================================
// CLIENT
// =============================================================================

struct Client {
    state: AppState,
    navigator: Arc<MemoryNavigator>,
    storage: Arc<FileStorage>,
}

fn state_dir() -> PathBuf {
    std::env::temp_dir().join(format!("gallery-client-it-{}", uuid::Uuid::new_v4()))
}

fn client(base_url: &str, dir: &Path, current_path: &str) -> Client {
    let config = ClientConfig::new(base_url).unwrap();
    let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new(&config).unwrap());
    let storage = Arc::new(FileStorage::open(dir).unwrap());
    let navigator = Arc::new(MemoryNavigator::new(current_path));
    let state = AppState::new(transport, storage.clone(), navigator.clone());
    Client { state, navigator, storage }
}

// =============================================================================
// TESTS
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn login_persists_and_restores_across_instances() {
    let (_api, base) = spawn_api().await;
    let dir = state_dir();

    let first = client(&base, &dir, "/");
    first
        .state
        .credentials
        .login(&LoginCredentials::new("ada@gallery.test", "secret"))
        .await
        .unwrap();
    assert_eq!(first.state.credentials.full_name(), "Ada Lovelace");
    assert!(first.storage.get(AUTH_STORAGE_KEY).unwrap().is_some());

    let second = client(&base, &dir, "/account");
    assert!(second.state.credentials.is_authenticated());
    assert!(second.state.credentials.is_admin());
    assert!(auth_guard(RenderMode::Client, &second.state.credentials, "/account").await.is_proceed());

    second.state.credentials.logout().await;
    assert_eq!(second.storage.get(AUTH_STORAGE_KEY).unwrap(), None);
    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn wrong_password_reports_server_message() {
    let (_api, base) = spawn_api().await;
    let dir = state_dir();
    let c = client(&base, &dir, "/auth/login");

    let err = c
        .state
        .credentials
        .login(&LoginCredentials::new("ada@gallery.test", "nope"))
        .await
        .unwrap_err();

    assert_eq!(err.message, "Invalid email or password");
    assert!(!c.state.credentials.is_authenticated());
    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_expiry_is_recovered_with_one_refresh() {
    let (api, base) = spawn_api().await;
    let dir = state_dir();
    let c = client(&base, &dir, "/gallery/mine");
    c.state
        .credentials
        .login(&LoginCredentials::new("ada@gallery.test", "secret"))
        .await
        .unwrap();
    api.expire_access();

    let requests: Vec<_> = (0..6)
        .map(|_| {
            let api_client = c.state.api.clone();
            tokio::spawn(async move { api_client.get::<Value>("/artworks/mine").await })
        })
        .collect();
    for request in requests {
        request.await.unwrap().unwrap();
    }

    assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(c.state.credentials.access_token().as_deref(), Some("access-2"));
    assert!(c.navigator.history().is_empty());
    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn revoked_session_logs_out_and_redirects_once() {
    let (api, base) = spawn_api().await;
    let dir = state_dir();
    let c = client(&base, &dir, "/gallery/mine");
    c.state
        .credentials
        .login(&LoginCredentials::new("ada@gallery.test", "secret"))
        .await
        .unwrap();
    api.revoke_all();

    let requests: Vec<_> = (0..4)
        .map(|_| {
            let api_client = c.state.api.clone();
            tokio::spawn(async move { api_client.get::<Value>("/artworks/mine").await })
        })
        .collect();
    for request in requests {
        assert_eq!(request.await.unwrap().unwrap_err().status(), Some(401));
    }

    assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 1);
    assert!(!c.state.credentials.is_authenticated());
    assert_eq!(c.navigator.history(), vec![Location::session_expired("/gallery/mine")]);
    assert_eq!(c.storage.get(AUTH_STORAGE_KEY).unwrap(), None);
    let _ = std::fs::remove_dir_all(dir);
}
