//! Cart endpoints.
//!
//! Every operation exists twice: `/cart/...` for a signed-in user, and
//! `/cart/guest/...` for an anonymous visitor identified by an
//! `x-session-id` header. `CartOwner` picks the variant.

use crate::api::ApiClient;
use crate::http::{ApiError, ApiRequest};
use crate::models::cart::{AddToCartData, Cart, CartValidationResult, MergeCartData, UpdateCartItemData};

pub const SESSION_HEADER: &str = "x-session-id";

/// Who a cart request is made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartOwner<'a> {
    User,
    Guest(&'a str),
}

impl CartOwner<'_> {
    fn base(self) -> &'static str {
        match self {
            Self::User => "/cart",
            Self::Guest(_) => "/cart/guest",
        }
    }

    fn request(self, request: ApiRequest) -> ApiRequest {
        match self {
            Self::User => request,
            Self::Guest(session_id) => request.header(SESSION_HEADER, session_id),
        }
    }
}

#[derive(Clone)]
pub struct CartService {
    api: ApiClient,
}

impl CartService {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// # Errors
    ///
    /// Propagates the API error.
    pub async fn get(&self, owner: CartOwner<'_>) -> Result<Cart, ApiError> {
        self.api
            .send_json(owner.request(ApiRequest::get(owner.base())))
            .await
    }

    /// # Errors
    ///
    /// Propagates the API error.
    pub async fn add_item(&self, owner: CartOwner<'_>, data: &AddToCartData) -> Result<Cart, ApiError> {
        let request = ApiRequest::post(format!("{}/items", owner.base())).json(data)?;
        self.api.send_json(owner.request(request)).await
    }

    /// # Errors
    ///
    /// Propagates the API error.
    pub async fn update_item(&self, owner: CartOwner<'_>, item_id: &str, quantity: u32) -> Result<Cart, ApiError> {
        let request = ApiRequest::put(format!("{}/items/{item_id}", owner.base()))
            .json(&UpdateCartItemData { quantity })?;
        self.api.send_json(owner.request(request)).await
    }

    /// # Errors
    ///
    /// Propagates the API error.
    pub async fn remove_item(&self, owner: CartOwner<'_>, item_id: &str) -> Result<Cart, ApiError> {
        let request = ApiRequest::delete(format!("{}/items/{item_id}", owner.base()));
        self.api.send_json(owner.request(request)).await
    }

    /// # Errors
    ///
    /// Propagates the API error.
    pub async fn clear(&self, owner: CartOwner<'_>) -> Result<(), ApiError> {
        self.api
            .send(owner.request(ApiRequest::delete(owner.base())))
            .await
            .map(drop)
    }

    /// # Errors
    ///
    /// Propagates the API error.
    pub async fn validate(&self, owner: CartOwner<'_>) -> Result<CartValidationResult, ApiError> {
        let request = ApiRequest::get(format!("{}/validate", owner.base()));
        self.api.send_json(owner.request(request)).await
    }

    /// Move a guest cart into the signed-in user's cart.
    ///
    /// # Errors
    ///
    /// Propagates the API error.
    pub async fn merge(&self, session_id: &str) -> Result<Cart, ApiError> {
        self.api
            .post("/cart/merge", &MergeCartData { session_id: session_id.to_owned() })
            .await
    }
}
