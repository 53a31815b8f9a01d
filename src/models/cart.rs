//! Cart DTOs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemProduct {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub sku: String,
    pub price: f64,
    pub currency: String,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub is_digital: bool,
    #[serde(default)]
    pub is_limited_edition: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemVariant {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sku: String,
    pub price: f64,
    #[serde(default)]
    pub stock: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: String,
    pub product_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<String>,
    pub quantity: u32,
    pub unit_price: f64,
    pub line_total: f64,
    pub currency: String,
    #[serde(default = "default_true")]
    pub in_stock: bool,
    #[serde(default)]
    pub available_stock: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<CartItemProduct>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<CartItemVariant>,
}

impl CartItem {
    /// Whether this line is for `product_id` and exactly `variant_id`.
    #[must_use]
    pub fn matches(&self, product_id: &str, variant_id: Option<&str>) -> bool {
        self.product_id == product_id && self.variant_id.as_deref() == variant_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    pub subtotal: f64,
    pub item_count: u32,
    #[serde(default)]
    pub unique_item_count: u32,
    pub currency: String,
    #[serde(default)]
    pub total_weight: f64,
    #[serde(default = "default_true")]
    pub all_items_in_stock: bool,
    #[serde(default)]
    pub has_digital_items: bool,
    #[serde(default)]
    pub has_physical_items: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub items: Vec<CartItem>,
    pub summary: CartSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartData {
    pub product_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCartItemData {
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeCartData {
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartValidationIssue {
    pub item_id: String,
    pub product_id: String,
    pub issue: String,
    #[serde(default)]
    pub available_stock: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartValidationResult {
    pub valid: bool,
    #[serde(default)]
    pub issues: Vec<CartValidationIssue>,
}

impl CartValidationResult {
    #[must_use]
    pub fn ok() -> Self {
        Self { valid: true, issues: Vec::new() }
    }
}

fn default_true() -> bool {
    true
}
