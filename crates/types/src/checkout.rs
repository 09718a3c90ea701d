//! Wire schema for the financing provider's interactive checkout.
//!
//! Field names follow the provider's documented checkout object; this module
//! is serialization-only and carries no behavior beyond the contract.

use serde::{Deserialize, Serialize};

/// One line item in the provider's item schema. Prices are minor units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutItem {
    pub display_name: String,
    pub sku: String,
    pub unit_price: i64,
    pub qty: i64,
    /// Absolute URL; the provider rejects relative URLs.
    pub item_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantBlock {
    pub user_confirmation_url: String,
    pub user_cancel_url: String,
    pub user_confirmation_url_action: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonName {
    pub first: String,
    pub last: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactAddress {
    pub line1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub zipcode: String,
    pub country: String,
}

/// Billing or shipping block: name + address, optionally email and phone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactBlock {
    pub name: PersonName,
    pub address: ContactAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutMetadata {
    pub mode: String,
}

/// The complete checkout object handed to the provider's widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub merchant: MerchantBlock,
    pub billing: ContactBlock,
    pub shipping: ContactBlock,
    pub items: Vec<CheckoutItem>,
    pub currency: String,
    pub shipping_amount: i64,
    pub tax_amount: i64,
    /// Recomputed from `items` + shipping + tax, never caller-supplied.
    pub total: i64,
    /// Unique per attempt; never reused across retries of the same purchase.
    pub order_id: String,
    pub metadata: CheckoutMetadata,
}
