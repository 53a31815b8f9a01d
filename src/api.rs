//! Typed JSON client over the intercepting transport.
//!
//! Services build paths and bodies; this layer serializes, sends through
//! `AuthenticatedClient` (so every call gets bearer injection and 401
//! recovery) and decodes the response.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::auth::{AuthenticatedClient, CredentialStore};
use crate::http::{ApiError, ApiRequest, ApiResponse};

#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<AuthenticatedClient>,
}

impl ApiClient {
    #[must_use]
    pub fn new(inner: Arc<AuthenticatedClient>) -> Self {
        Self { inner }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<CredentialStore> {
        self.inner.store()
    }

    /// Send a prepared request and return the raw response.
    ///
    /// # Errors
    ///
    /// Whatever the interceptor could not recover from.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        self.inner.execute(request).await
    }

    /// Send and decode the body; an empty body decodes as JSON `null`.
    ///
    /// # Errors
    ///
    /// Transport, status or decode failures.
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        self.send(request).await?.json_or_null()
    }

    /// # Errors
    ///
    /// Transport, status or decode failures.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send_json(ApiRequest::get(path)).await
    }

    /// # Errors
    ///
    /// Transport, status or decode failures.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(ApiRequest::post(path).json(body)?).await
    }

    /// # Errors
    ///
    /// Transport, status or decode failures.
    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(ApiRequest::put(path).json(body)?).await
    }

    /// # Errors
    ///
    /// Transport, status or decode failures.
    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(ApiRequest::patch(path).json(body)?).await
    }

    /// # Errors
    ///
    /// Transport or status failures. The response body is discarded.
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(ApiRequest::delete(path)).await.map(drop)
    }
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
