//! Shopping cart state for guests and signed-in users.
//!
//! DESIGN
//! ======
//! Whether a request targets the user cart or the guest cart is decided per
//! call from the credential store. A guest is identified by a session id
//! (`guest-<uuid>`) created on first use and persisted under
//! `art-gallery-cart` so it survives restarts. After login the guest cart
//! is merged into the user's cart and the session id is dropped.
//!
//! Reads (`fetch`, `merge_guest_cart`) log and swallow failures. Mutations
//! return the `ApiError` so callers can react to stock or validation
//! problems.

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::CredentialStore;
use crate::http::ApiError;
use crate::models::cart::{AddToCartData, Cart, CartItem, CartSummary, CartValidationResult};
use crate::services::{CartOwner, CartService};
use crate::storage::{self, Storage};

pub const CART_STORAGE_KEY: &str = "art-gallery-cart";
const DEFAULT_CURRENCY: &str = "USD";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedCart {
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartState {
    pub cart: Option<Cart>,
    pub session_id: Option<String>,
    pub is_open: bool,
    pub loading: bool,
}

pub struct CartStore {
    service: CartService,
    credentials: Arc<CredentialStore>,
    storage: Arc<dyn Storage>,
    state: RwLock<CartState>,
}

impl CartStore {
    /// Build a cart store, restoring a persisted guest session id.
    #[must_use]
    pub fn new(service: CartService, credentials: Arc<CredentialStore>, storage: Arc<dyn Storage>) -> Self {
        let session_id = match storage::load_json::<PersistedCart>(storage.as_ref(), CART_STORAGE_KEY) {
            Ok(persisted) => persisted.and_then(|p| p.session_id),
            Err(e) => {
                warn!(error = %e, "ignoring unreadable cart session");
                None
            }
        };
        Self {
            service,
            credentials,
            storage,
            state: RwLock::new(CartState { session_id, ..CartState::default() }),
        }
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn snapshot(&self) -> CartState {
        self.read(Clone::clone)
    }

    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.read(|s| s.session_id.clone())
    }

    #[must_use]
    pub fn items(&self) -> Vec<CartItem> {
        self.read(|s| s.cart.as_ref().map(|c| c.items.clone()).unwrap_or_default())
    }

    #[must_use]
    pub fn summary(&self) -> Option<CartSummary> {
        self.read(|s| s.cart.as_ref().map(|c| c.summary.clone()))
    }

    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.summary().map_or(0, |s| s.item_count)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read(|s| s.cart.as_ref().is_none_or(|c| c.items.is_empty()))
    }

    #[must_use]
    pub fn subtotal(&self) -> f64 {
        self.summary().map_or(0.0, |s| s.subtotal)
    }

    #[must_use]
    pub fn currency(&self) -> String {
        self.summary()
            .map_or_else(|| DEFAULT_CURRENCY.to_owned(), |s| s.currency)
    }

    #[must_use]
    pub fn all_items_in_stock(&self) -> bool {
        self.summary().is_none_or(|s| s.all_items_in_stock)
    }

    #[must_use]
    pub fn has_digital_items(&self) -> bool {
        self.summary().is_some_and(|s| s.has_digital_items)
    }

    #[must_use]
    pub fn has_physical_items(&self) -> bool {
        self.summary().is_some_and(|s| s.has_physical_items)
    }

    /// Quantity of the exact product/variant line, 0 when absent.
    #[must_use]
    pub fn item_quantity(&self, product_id: &str, variant_id: Option<&str>) -> u32 {
        self.find_item(product_id, variant_id).map_or(0, |i| i.quantity)
    }

    #[must_use]
    pub fn has_item(&self, product_id: &str, variant_id: Option<&str>) -> bool {
        self.find_item(product_id, variant_id).is_some()
    }

    fn find_item(&self, product_id: &str, variant_id: Option<&str>) -> Option<CartItem> {
        self.read(|s| {
            s.cart
                .as_ref()?
                .items
                .iter()
                .find(|i| i.matches(product_id, variant_id))
                .cloned()
        })
    }

    // -------------------------------------------------------------------------
    // Guest session
    // -------------------------------------------------------------------------

    /// Return the guest session id, creating and persisting one if needed.
    pub fn ensure_session_id(&self) -> String {
        let (id, created) = self.mutate(|s| match &s.session_id {
            Some(id) => (id.clone(), false),
            None => {
                let id = format!("guest-{}", Uuid::new_v4());
                s.session_id = Some(id.clone());
                (id, true)
            }
        });
        if created {
            debug!(session_id = %id, "created guest cart session");
            self.persist(Some(&id));
        }
        id
    }

    pub fn clear_session_id(&self) {
        self.mutate(|s| s.session_id = None);
        self.persist(None);
    }

    // -------------------------------------------------------------------------
    // Server actions
    // -------------------------------------------------------------------------

    /// Load the current cart. Failures are logged and leave the cart as is.
    pub async fn fetch(&self) {
        let session_id = self.guest_session(true);
        self.set_loading(true);
        match self.service.get(owner(session_id.as_deref())).await {
            Ok(cart) => self.mutate(|s| s.cart = Some(cart)),
            Err(e) => warn!(error = %e, status = ?e.status(), "failed to fetch cart"),
        }
        self.set_loading(false);
    }

    /// # Errors
    ///
    /// Propagates the API error (out of stock, unknown product, ...).
    pub async fn add_item(&self, data: &AddToCartData) -> Result<(), ApiError> {
        let session_id = self.guest_session(true);
        self.set_loading(true);
        let result = self.service.add_item(owner(session_id.as_deref()), data).await;
        self.apply_cart(result, "add item to cart")
    }

    /// Set a line's quantity. A guest without a session has nothing to update.
    ///
    /// # Errors
    ///
    /// Propagates the API error.
    pub async fn update_quantity(&self, item_id: &str, quantity: u32) -> Result<(), ApiError> {
        let Some(owner) = self.existing_owner() else {
            return Ok(());
        };
        self.set_loading(true);
        let result = self.service.update_item(owner.as_owner(), item_id, quantity).await;
        self.apply_cart(result, "update cart item")
    }

    /// # Errors
    ///
    /// Propagates the API error.
    pub async fn increment(&self, item_id: &str) -> Result<(), ApiError> {
        match self.quantity_of(item_id) {
            Some(quantity) => self.update_quantity(item_id, quantity + 1).await,
            None => Ok(()),
        }
    }

    /// Never drops a line below one; use [`Self::remove_item`] for that.
    ///
    /// # Errors
    ///
    /// Propagates the API error.
    pub async fn decrement(&self, item_id: &str) -> Result<(), ApiError> {
        match self.quantity_of(item_id) {
            Some(quantity) if quantity > 1 => self.update_quantity(item_id, quantity - 1).await,
            _ => Ok(()),
        }
    }

    /// # Errors
    ///
    /// Propagates the API error.
    pub async fn remove_item(&self, item_id: &str) -> Result<(), ApiError> {
        let Some(owner) = self.existing_owner() else {
            return Ok(());
        };
        self.set_loading(true);
        let result = self.service.remove_item(owner.as_owner(), item_id).await;
        self.apply_cart(result, "remove cart item")
    }

    /// # Errors
    ///
    /// Propagates the API error.
    pub async fn clear(&self) -> Result<(), ApiError> {
        let Some(owner) = self.existing_owner() else {
            self.mutate(|s| s.cart = None);
            return Ok(());
        };
        self.set_loading(true);
        let result = self.service.clear(owner.as_owner()).await;
        self.set_loading(false);
        match result {
            Ok(()) => {
                self.mutate(|s| s.cart = None);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "failed to clear cart");
                Err(e)
            }
        }
    }

    /// A guest without a session has an empty, trivially valid cart.
    ///
    /// # Errors
    ///
    /// Propagates the API error.
    pub async fn validate(&self) -> Result<CartValidationResult, ApiError> {
        match self.existing_owner() {
            Some(owner) => self.service.validate(owner.as_owner()).await,
            None => Ok(CartValidationResult::ok()),
        }
    }

    /// After login: fold the guest cart into the user's cart.
    ///
    /// Only drops the guest session id once the merge succeeded; failures
    /// are logged so a later attempt can retry.
    pub async fn merge_guest_cart(&self) {
        let Some(session_id) = self.session_id() else {
            return;
        };
        self.set_loading(true);
        match self.service.merge(&session_id).await {
            Ok(cart) => {
                self.mutate(|s| s.cart = Some(cart));
                self.clear_session_id();
                debug!(%session_id, "merged guest cart");
            }
            Err(e) => warn!(error = %e, "failed to merge guest cart"),
        }
        self.set_loading(false);
    }

    // -------------------------------------------------------------------------
    // Drawer
    // -------------------------------------------------------------------------

    pub fn open(&self) {
        self.mutate(|s| s.is_open = true);
    }

    pub fn close(&self) {
        self.mutate(|s| s.is_open = false);
    }

    pub fn toggle(&self) {
        self.mutate(|s| s.is_open = !s.is_open);
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn read<R>(&self, f: impl FnOnce(&CartState) -> R) -> R {
        f(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut CartState) -> R) -> R {
        f(&mut self.state.write().unwrap_or_else(PoisonError::into_inner))
    }

    fn set_loading(&self, loading: bool) {
        self.mutate(|s| s.loading = loading);
    }

    fn persist(&self, session_id: Option<&str>) {
        let outcome = match session_id {
            Some(id) => storage::save_json(
                self.storage.as_ref(),
                CART_STORAGE_KEY,
                &PersistedCart { session_id: Some(id.to_owned()) },
            ),
            None => self.storage.remove(CART_STORAGE_KEY),
        };
        if let Err(e) = outcome {
            warn!(error = %e, "failed to persist cart session");
        }
    }

    /// `None` for a signed-in user; the guest session id otherwise.
    fn guest_session(&self, create: bool) -> Option<String> {
        if self.credentials.is_authenticated() {
            None
        } else if create {
            Some(self.ensure_session_id())
        } else {
            self.session_id()
        }
    }

    /// The cart owner, without creating a guest session.
    fn existing_owner(&self) -> Option<OwnedCartOwner> {
        if self.credentials.is_authenticated() {
            return Some(OwnedCartOwner::User);
        }
        self.guest_session(false).map(OwnedCartOwner::Guest)
    }

    fn quantity_of(&self, item_id: &str) -> Option<u32> {
        self.read(|s| {
            s.cart
                .as_ref()?
                .items
                .iter()
                .find(|i| i.id == item_id)
                .map(|i| i.quantity)
        })
    }

    fn apply_cart(&self, result: Result<Cart, ApiError>, action: &str) -> Result<(), ApiError> {
        self.set_loading(false);
        match result {
            Ok(cart) => {
                self.mutate(|s| s.cart = Some(cart));
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, status = ?e.status(), "failed to {action}");
                Err(e)
            }
        }
    }
}

/// `CartOwner` that owns its session id, so it can outlive a state read.
enum OwnedCartOwner {
    User,
    Guest(String),
}

impl OwnedCartOwner {
    fn as_owner(&self) -> CartOwner<'_> {
        match self {
            Self::User => CartOwner::User,
            Self::Guest(id) => CartOwner::Guest(id),
        }
    }
}

fn owner(session_id: Option<&str>) -> CartOwner<'_> {
    session_id.map_or(CartOwner::User, CartOwner::Guest)
}

#[cfg(test)]
#[path = "cart_test.rs"]
mod tests;
