//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` wires one session's worth of collaborators: a transport, a
//! storage backend, the credential store, the intercepting client and the
//! stores built on it. Everything is `Arc`-wrapped so the state is cheap to
//! clone into tasks, and every part shares the same credential store.

use std::sync::Arc;

use tracing::info;

use crate::api::ApiClient;
use crate::auth::{AuthBootstrap, AuthenticatedClient, CredentialStore};
use crate::config::ClientConfig;
use crate::error::ActionResult;
use crate::http::{ApiError, ReqwestTransport, Transport};
use crate::models::{LoginCredentials, RegisterData};
use crate::navigation::Navigator;
use crate::services::{CartService, NotificationService, UserService};
use crate::storage::{FileStorage, MemoryStorage, Storage, StorageError};
use crate::stores::{CartStore, NotificationStore, UserAdminStore};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Http(#[from] ApiError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Clone)]
pub struct AppState {
    pub credentials: Arc<CredentialStore>,
    pub client: Arc<AuthenticatedClient>,
    pub api: ApiClient,
    pub bootstrap: Arc<AuthBootstrap>,
    pub notifications: Arc<NotificationStore>,
    pub cart: Arc<CartStore>,
    pub users: Arc<UserAdminStore>,
}

impl AppState {
    /// Wire state over the real HTTP transport, with file-backed storage
    /// when `config.state_dir` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the state
    /// directory cannot be created.
    pub fn connect(config: &ClientConfig, navigator: Arc<dyn Navigator>) -> Result<Self, StartupError> {
        let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new(config)?);
        let storage: Arc<dyn Storage> = match &config.state_dir {
            Some(dir) => Arc::new(FileStorage::open(dir)?),
            None => Arc::new(MemoryStorage::new()),
        };
        info!(base_url = %config.base_url, persistent = config.state_dir.is_some(), "client state ready");
        Ok(Self::new(transport, storage, navigator))
    }

    /// Wire state over arbitrary transport and storage.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, storage: Arc<dyn Storage>, navigator: Arc<dyn Navigator>) -> Self {
        let credentials = Arc::new(CredentialStore::new(transport.clone(), storage.clone()));
        let client = Arc::new(AuthenticatedClient::new(transport, credentials.clone(), navigator));
        let api = ApiClient::new(client.clone());
        let notifications = Arc::new(NotificationStore::new(NotificationService::new(api.clone())));
        let cart = Arc::new(CartStore::new(CartService::new(api.clone()), credentials.clone(), storage));
        let users = Arc::new(UserAdminStore::new(UserService::new(api.clone())));
        Self {
            credentials,
            client,
            api,
            bootstrap: Arc::new(AuthBootstrap::new()),
            notifications,
            cart,
            users,
        }
    }

    /// Sign in, then move any guest cart onto the account.
    ///
    /// # Errors
    ///
    /// Returns the login failure; the guest cart is left untouched.
    pub async fn login(&self, credentials: &LoginCredentials) -> ActionResult {
        self.credentials.login(credentials).await?;
        self.cart.merge_guest_cart().await;
        Ok(())
    }

    /// Create an account, then move any guest cart onto it.
    ///
    /// # Errors
    ///
    /// Returns the registration failure; the guest cart is left untouched.
    pub async fn register(&self, data: &RegisterData) -> ActionResult {
        self.credentials.register(data).await?;
        self.cart.merge_guest_cart().await;
        Ok(())
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
