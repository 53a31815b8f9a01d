use super::*;
use crate::auth::Session;
use crate::navigation::MemoryNavigator;
use crate::test_helpers::*;
use serde_json::json;

const PRIVATE_VIEW: &str = "/account/orders";

/// `/artworks/mine` and `/users/me` accept only the `new` token; refresh
/// rotates `r1` → `new`.
fn rotating_api() -> Arc<MockTransport> {
    Arc::new(MockTransport::new(|req| match req.path.as_str() {
        "/auth/refresh" => {
            if req.body.as_ref().is_some_and(|b| b["refreshToken"] == "r1") {
                ok(auth_json("new", "r2", "SUBSCRIBER"))
            } else {
                unauthorized()
            }
        }
        "/auth/login" => unauthorized(),
        "/artworks/mine" if req.bearer.as_deref() == Some("new") => ok(json!({ "ok": true })),
        "/artworks/mine" => unauthorized(),
        "/users/me" if req.bearer.as_deref() == Some("new") => ok(user_json("u-1", "SUBSCRIBER")),
        "/users/me" => unauthorized(),
        "/broken" => status(500, json!({ "message": "boom" })),
        _ => ok(json!({})),
    }))
}

fn setup(access: &str, refresh: Option<&str>) -> (Arc<MockTransport>, Arc<CredentialStore>, Arc<MemoryNavigator>, Arc<AuthenticatedClient>) {
    let transport = rotating_api();
    let store = signed_in_store(&transport, access, refresh, "SUBSCRIBER");
    let navigator = Arc::new(MemoryNavigator::new(PRIVATE_VIEW));
    let client = client_with(&transport, &store, &navigator);
    (transport, store, navigator, client)
}

/// Let spawned tasks run until every one has sent its first request.
async fn until_sent(transport: &MockTransport, path: &str, n: usize) {
    while transport.calls_to(path) < n {
        tokio::task::yield_now().await;
    }
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

// =============================================================================
// pass-through
// =============================================================================

#[tokio::test]
async fn attaches_current_bearer_token() {
    let (transport, _, _, client) = setup("new", Some("r1"));

    client.execute(ApiRequest::get("/artworks/mine")).await.unwrap();

    assert_eq!(transport.last_call_to("/artworks/mine").unwrap().bearer.as_deref(), Some("new"));
    assert_eq!(transport.calls_to("/auth/refresh"), 0);
}

#[tokio::test]
async fn non_auth_errors_pass_through() {
    let (transport, store, navigator, client) = setup("old", Some("r1"));

    let err = client.execute(ApiRequest::get("/broken")).await.unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert_eq!(transport.calls_to("/auth/refresh"), 0);
    assert!(store.is_authenticated());
    assert!(navigator.history().is_empty());
}

#[tokio::test]
async fn unauthorized_without_session_surfaces() {
    let transport = rotating_api();
    let storage = Arc::new(crate::storage::MemoryStorage::new());
    let store = store_with(&transport, &storage);
    let navigator = Arc::new(MemoryNavigator::new(PRIVATE_VIEW));
    let client = client_with(&transport, &store, &navigator);

    let err = client.execute(ApiRequest::get("/artworks/mine")).await.unwrap_err();

    assert!(err.is_unauthorized());
    assert!(transport.last_call_to("/artworks/mine").unwrap().bearer.is_none());
    assert_eq!(transport.calls_to("/auth/refresh"), 0);
    assert!(navigator.history().is_empty());
}

// =============================================================================
// recovery
// =============================================================================

#[tokio::test]
async fn single_expired_request_refreshes_and_retries() {
    let (transport, store, navigator, client) = setup("old", Some("r1"));

    let resp = client.execute(ApiRequest::get("/artworks/mine")).await.unwrap();

    assert_eq!(resp.status, 200);
    assert_eq!(transport.calls_to("/auth/refresh"), 1);
    assert_eq!(transport.calls_to("/artworks/mine"), 2);
    assert_eq!(store.access_token().as_deref(), Some("new"));
    assert!(navigator.history().is_empty());
    assert!(!client.is_refreshing());
}

#[tokio::test]
async fn concurrent_expired_requests_share_one_refresh() {
    const N: usize = 5;
    let (transport, store, navigator, client) = setup("old", Some("r1"));
    transport.gate("/auth/refresh");

    let handles: Vec<_> = (0..N)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.execute(ApiRequest::get("/artworks/mine")).await })
        })
        .collect();
    until_sent(&transport, "/artworks/mine", N).await;
    assert!(client.is_refreshing());
    assert_eq!(transport.calls_to("/auth/refresh"), 1);

    transport.release("/auth/refresh");
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().status, 200);
    }

    assert_eq!(transport.calls_to("/auth/refresh"), 1);
    assert_eq!(transport.calls_to("/artworks/mine"), 2 * N);
    assert_eq!(store.access_token().as_deref(), Some("new"));
    assert!(navigator.history().is_empty());
    assert!(!client.is_refreshing());
}

#[tokio::test]
async fn failed_shared_refresh_fails_all_and_redirects_once() {
    const N: usize = 4;
    let (transport, store, navigator, client) = setup("old", Some("revoked"));
    transport.gate("/auth/refresh");

    let handles: Vec<_> = (0..N)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.execute(ApiRequest::get("/artworks/mine")).await })
        })
        .collect();
    until_sent(&transport, "/artworks/mine", N).await;
    transport.release("/auth/refresh");

    for handle in handles {
        assert!(handle.await.unwrap().unwrap_err().is_unauthorized());
    }

    assert_eq!(transport.calls_to("/auth/refresh"), 1);
    assert_eq!(transport.calls_to("/artworks/mine"), N, "no retries after a failed refresh");
    assert_eq!(store.snapshot(), Session::default());
    assert_eq!(navigator.history(), vec![Location::session_expired(PRIVATE_VIEW)]);
}

#[tokio::test]
async fn store_and_client_share_one_refresh() {
    let (transport, store, navigator, client) = setup("old", Some("r1"));
    transport.gate("/auth/refresh");

    let request = {
        let client = client.clone();
        tokio::spawn(async move { client.execute(ApiRequest::get("/artworks/mine")).await })
    };
    until_sent(&transport, "/auth/refresh", 1).await;
    let user_fetch = {
        let store = store.clone();
        tokio::spawn(async move { store.fetch_current_user().await })
    };
    until_sent(&transport, "/users/me", 1).await;
    assert_eq!(transport.calls_to("/auth/refresh"), 1);

    transport.release("/auth/refresh");
    assert_eq!(request.await.unwrap().unwrap().status, 200);
    assert!(user_fetch.await.unwrap());

    assert_eq!(transport.calls_to("/auth/refresh"), 1);
    assert_eq!(transport.calls_to("/users/me"), 2);
    assert_eq!(store.access_token().as_deref(), Some("new"));
    assert!(navigator.history().is_empty());
}

#[tokio::test]
async fn logout_during_refresh_stays_logged_out() {
    let (transport, store, navigator, client) = setup("old", Some("r1"));
    transport.gate("/auth/refresh");

    let pending = {
        let client = client.clone();
        tokio::spawn(async move { client.execute(ApiRequest::get("/artworks/mine")).await })
    };
    until_sent(&transport, "/auth/refresh", 1).await;
    store.logout().await;
    transport.release("/auth/refresh");

    assert!(pending.await.unwrap().unwrap_err().is_unauthorized());
    assert_eq!(store.snapshot(), Session::default());
    assert_eq!(transport.calls_to("/artworks/mine"), 1, "no retry with discarded tokens");
    assert!(navigator.history().is_empty(), "explicit logout is not an expiry");
}

#[tokio::test]
async fn failed_refresh_redirects_even_if_its_starter_is_dropped() {
    let (transport, store, navigator, client) = setup("old", Some("revoked"));
    transport.gate("/auth/refresh");

    let starter = {
        let client = client.clone();
        tokio::spawn(async move { client.execute(ApiRequest::get("/artworks/mine")).await })
    };
    until_sent(&transport, "/auth/refresh", 1).await;
    let joiner = {
        let client = client.clone();
        tokio::spawn(async move { client.execute(ApiRequest::get("/artworks/mine")).await })
    };
    until_sent(&transport, "/artworks/mine", 2).await;

    starter.abort();
    assert!(starter.await.unwrap_err().is_cancelled());
    transport.release("/auth/refresh");

    assert!(joiner.await.unwrap().unwrap_err().is_unauthorized());
    assert_eq!(transport.calls_to("/auth/refresh"), 1);
    assert!(!store.is_authenticated());
    assert_eq!(navigator.history(), vec![Location::session_expired(PRIVATE_VIEW)]);
}

#[tokio::test]
async fn request_rejected_with_stale_token_retries_without_refreshing() {
    let (transport, store, _, client) = setup("old", Some("r1"));
    transport.gate("/artworks/mine");

    let pending = {
        let client = client.clone();
        tokio::spawn(async move { client.execute(ApiRequest::get("/artworks/mine")).await })
    };
    until_sent(&transport, "/artworks/mine", 1).await;

    // Someone else rotates the token while the request is in flight.
    assert!(store.refresh_access_token().await);
    transport.release("/artworks/mine");

    assert_eq!(pending.await.unwrap().unwrap().status, 200);
    assert_eq!(transport.calls_to("/auth/refresh"), 1);
    assert_eq!(transport.last_call_to("/artworks/mine").unwrap().bearer.as_deref(), Some("new"));
}

#[tokio::test]
async fn retry_rejected_again_surfaces_without_looping() {
    let transport = Arc::new(MockTransport::new(|req| match req.path.as_str() {
        "/auth/refresh" => ok(auth_json("new", "r2", "SUBSCRIBER")),
        _ => unauthorized(),
    }));
    let store = signed_in_store(&transport, "old", Some("r1"), "SUBSCRIBER");
    let navigator = Arc::new(MemoryNavigator::new(PRIVATE_VIEW));
    let client = client_with(&transport, &store, &navigator);

    let err = client.execute(ApiRequest::get("/artworks/mine")).await.unwrap_err();

    assert!(err.is_unauthorized());
    assert_eq!(transport.calls_to("/auth/refresh"), 1);
    assert_eq!(transport.calls_to("/artworks/mine"), 2);
}

#[tokio::test]
async fn next_expiry_after_settlement_starts_new_refresh() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    // The 1st and 3rd protected calls are rejected regardless of token.
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    let transport = Arc::new(MockTransport::new(move |req| match req.path.as_str() {
        "/auth/refresh" => ok(auth_json("new", "r2", "SUBSCRIBER")),
        _ => match counter.fetch_add(1, Ordering::SeqCst) {
            0 | 2 => unauthorized(),
            _ => ok(json!({})),
        },
    }));
    let store = signed_in_store(&transport, "old", Some("r1"), "SUBSCRIBER");
    let navigator = Arc::new(MemoryNavigator::new(PRIVATE_VIEW));
    let client = client_with(&transport, &store, &navigator);

    client.execute(ApiRequest::get("/artworks/mine")).await.unwrap();
    assert!(!client.is_refreshing());
    client.execute(ApiRequest::get("/artworks/mine")).await.unwrap();

    assert_eq!(transport.calls_to("/auth/refresh"), 2);
    assert_eq!(seen.load(Ordering::SeqCst), 4);
}

// =============================================================================
// forced logout
// =============================================================================

#[tokio::test]
async fn missing_refresh_token_logs_out_and_redirects() {
    let (transport, store, navigator, client) = setup("old", None);

    let err = client.execute(ApiRequest::get("/artworks/mine")).await.unwrap_err();

    assert!(err.is_unauthorized());
    assert_eq!(transport.calls_to("/auth/refresh"), 0);
    assert!(!store.is_authenticated());
    let to = navigator.last().unwrap();
    assert_eq!(to.path, "/auth/login");
    assert_eq!(to.query_value("expired"), Some("true"));
    assert_eq!(to.query_value("redirect"), Some(PRIVATE_VIEW));
}

#[tokio::test]
async fn no_redirect_while_on_auth_view() {
    let (_, store, navigator, client) = setup("old", Some("revoked"));
    navigator.set_current("/auth/register");

    client.execute(ApiRequest::get("/artworks/mine")).await.unwrap_err();

    assert!(!store.is_authenticated());
    assert!(navigator.history().is_empty());
}

// =============================================================================
// auth endpoints
// =============================================================================

#[tokio::test]
async fn refresh_endpoint_is_never_recovered() {
    let (transport, store, navigator, client) = setup("old", Some("stale"));

    let err = client
        .execute(ApiRequest::post("/auth/refresh").with_body(json!({ "refreshToken": "stale" })))
        .await
        .unwrap_err();

    assert!(err.is_unauthorized());
    assert_eq!(transport.calls_to("/auth/refresh"), 1);
    assert!(store.is_authenticated());
    assert!(navigator.history().is_empty());
}

#[tokio::test]
async fn login_rejection_surfaces() {
    let (transport, store, navigator, client) = setup("old", Some("r1"));

    let err = client.execute(ApiRequest::post("/auth/login")).await.unwrap_err();

    assert!(err.is_unauthorized());
    assert_eq!(transport.calls_to("/auth/refresh"), 0);
    assert!(store.is_authenticated());
    assert!(navigator.history().is_empty());
}

#[test]
fn auth_endpoint_matching() {
    assert!(is_auth_endpoint("/auth/login"));
    assert!(is_auth_endpoint("/auth/register"));
    assert!(is_auth_endpoint("/auth/refresh"));
    assert!(!is_auth_endpoint("/auth/logout"));
    assert!(!is_auth_endpoint("/users/me"));
}
