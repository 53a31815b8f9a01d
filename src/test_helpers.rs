//! Shared fixtures for unit tests: a scripted transport and session builders.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use tokio::sync::Semaphore;

use crate::auth::{AuthenticatedClient, CredentialStore};
use crate::http::{ApiError, ApiRequest, ApiResponse, Transport};
use crate::navigation::MemoryNavigator;
use crate::storage::{MemoryStorage, Storage};

type Handler = dyn Fn(&ApiRequest) -> Result<ApiResponse, ApiError> + Send + Sync;

// =============================================================================
// MockTransport
// =============================================================================

/// Transport whose responses come from a closure.
///
/// Every request is recorded. Requests to a gated path block until the test
/// releases the gate, which lets concurrency tests pin an in-flight refresh.
pub struct MockTransport {
    handler: Box<Handler>,
    calls: Mutex<Vec<ApiRequest>>,
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl MockTransport {
    pub fn new(handler: impl Fn(&ApiRequest) -> Result<ApiResponse, ApiError> + Send + Sync + 'static) -> Self {
        Self { handler: Box::new(handler), calls: Mutex::new(Vec::new()), gates: Mutex::new(HashMap::new()) }
    }

    /// Block requests to `path` until [`Self::release`] is called.
    pub fn gate(&self, path: &str) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.gates.lock().unwrap().insert(path.to_owned(), gate.clone());
        gate
    }

    pub fn release(&self, path: &str) {
        if let Some(gate) = self.gates.lock().unwrap().get(path) {
            gate.add_permits(1024);
        }
    }

    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|r| r.path == path).count()
    }

    pub fn last_call_to(&self, path: &str) -> Option<ApiRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.path == path)
            .cloned()
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        self.calls.lock().unwrap().push(request.clone());
        let gate = self.gates.lock().unwrap().get(&request.path).cloned();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await.unwrap();
        }
        (self.handler)(&request)
    }
}

// =============================================================================
// Response builders
// =============================================================================

pub fn ok(body: Value) -> Result<ApiResponse, ApiError> {
    Ok(ApiResponse { status: 200, body: body.to_string() })
}

pub fn no_content() -> Result<ApiResponse, ApiError> {
    Ok(ApiResponse { status: 204, body: String::new() })
}

pub fn status(code: u16, body: Value) -> Result<ApiResponse, ApiError> {
    Err(ApiError::from_status(code, body.to_string()))
}

pub fn unauthorized() -> Result<ApiResponse, ApiError> {
    status(401, json!({ "message": "Unauthorized", "statusCode": 401 }))
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn user_json(id: &str, role: &str) -> Value {
    json!({
        "id": id,
        "email": format!("{id}@gallery.test"),
        "role": role,
        "status": "ACTIVE",
        "emailVerified": true,
        "profile": { "firstName": "Test", "lastName": "User" }
    })
}

pub fn auth_json(access: &str, refresh: &str, role: &str) -> Value {
    json!({
        "accessToken": access,
        "refreshToken": refresh,
        "user": { "id": "u-1", "email": "u-1@gallery.test", "role": role }
    })
}

/// Persisted session JSON as the credential store writes it.
pub fn persisted(access: Option<&str>, refresh: Option<&str>, user: Option<Value>) -> String {
    json!({ "accessToken": access, "refreshToken": refresh, "user": user }).to_string()
}

pub fn store_with(transport: &Arc<MockTransport>, storage: &Arc<MemoryStorage>) -> Arc<CredentialStore> {
    let transport: Arc<dyn Transport> = transport.clone();
    let storage: Arc<dyn Storage> = storage.clone();
    Arc::new(CredentialStore::new(transport, storage))
}

/// A store already holding tokens `access`/`refresh` and a loaded user.
pub fn signed_in_store(transport: &Arc<MockTransport>, access: &str, refresh: Option<&str>, role: &str) -> Arc<CredentialStore> {
    let storage = Arc::new(MemoryStorage::new());
    storage
        .set(
            crate::auth::AUTH_STORAGE_KEY,
            &persisted(Some(access), refresh, Some(user_json("u-1", role))),
        )
        .unwrap();
    store_with(transport, &storage)
}

pub fn client_with(
    transport: &Arc<MockTransport>,
    store: &Arc<CredentialStore>,
    navigator: &Arc<MemoryNavigator>,
) -> Arc<AuthenticatedClient> {
    let transport: Arc<dyn Transport> = transport.clone();
    Arc::new(AuthenticatedClient::new(transport, store.clone(), navigator.clone()))
}
