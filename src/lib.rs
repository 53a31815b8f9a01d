//! Client library for the art-gallery REST API.
//!
//! ARCHITECTURE
//! ============
//! - `http`: request/response types, the `Transport` seam, `ApiError`
//! - `auth`: credential store, 401-recovering interceptor, route guards
//! - `api`: typed JSON calls through the interceptor
//! - `services`: endpoint wrappers; `stores`: client state built on them
//! - `storage`, `navigation`: seams for persistence and the host router
//! - `state`: wiring of all of the above for one session

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod navigation;
pub mod services;
pub mod state;
pub mod storage;
pub mod stores;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use api::ApiClient;
pub use auth::{AuthenticatedClient, CredentialStore, Session};
pub use config::ClientConfig;
pub use error::{ActionError, ActionResult};
pub use http::{ApiError, ApiRequest, ApiResponse, ReqwestTransport, Transport};
pub use state::AppState;
