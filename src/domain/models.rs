use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Claim set decoded from a bearer credential's payload segment.
///
/// Only the claims this client reads are typed. Everything else, including
/// the several spellings of the subject identifier, lands in `extra` and is
/// resolved by the token module.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    // ---
    /// Expiry, seconds since epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Issued-at, seconds since epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One line of the cart.
///
/// The line total is never stored; it is always derived from price and
/// quantity so the two cannot drift apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    // ---
    pub id: u64,
    pub title: String,
    pub price: Decimal,
    pub quantity: u32,
    #[serde(default)]
    pub thumbnail: String,
}

impl CartLineItem {
    // ---
    pub fn new(id: u64, title: impl Into<String>, price: Decimal, quantity: u32) -> Self {
        // ---
        Self {
            id,
            title: title.into(),
            price,
            quantity,
            thumbnail: String::new(),
        }
    }

    /// Price times quantity.
    pub fn line_total(&self) -> Decimal {
        // ---
        self.price * Decimal::from(self.quantity)
    }
}

/// The remote cart resource (`GET /carts/{userId}`, `PUT /carts/{cartId}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    // ---
    /// Server-assigned cart identifier.
    pub id: u64,
    #[serde(default)]
    pub products: Vec<CartLineItem>,
    #[serde(default)]
    pub total: Decimal,
    #[serde(default)]
    pub discounted_total: Decimal,
    #[serde(default)]
    pub user_id: u64,
    #[serde(default)]
    pub total_products: u32,
    #[serde(default)]
    pub total_quantity: u32,
}

/// `(productId, quantity)` pair as sent in cart write payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartProductRef {
    // ---
    pub id: u64,
    pub quantity: u32,
}

impl From<&CartLineItem> for CartProductRef {
    fn from(item: &CartLineItem) -> Self {
        // ---
        Self {
            id: item.id,
            quantity: item.quantity,
        }
    }
}

/// Acknowledgment returned by `DELETE /carts/{cartId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteCartAck {
    // ---
    pub id: u64,
    #[serde(default)]
    pub is_deleted: bool,
}

/// Catalog product as returned by the product endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    // ---
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub price: Decimal,
    #[serde(default)]
    pub discount_percentage: f64,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub images: Vec<String>,
}

/// One page of a `skip`/`limit` paginated product listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductsPage {
    // ---
    pub products: Vec<Product>,
    pub total: u32,
    pub skip: u32,
    pub limit: u32,
}

impl ProductsPage {
    // ---
    /// The `skip` of the following page, or `None` once the listing is exhausted.
    pub fn next_skip(&self) -> Option<u32> {
        // ---
        let next = self.skip.saturating_add(self.limit);
        (next < self.total).then_some(next)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    // ---
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
}

/// Partial profile update sent with `PUT /users/{id}` at checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfileUpdate {
    // ---
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<ShippingAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// The subset of the user resource this client reads back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    // ---
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<ShippingAddress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    // ---
    pub username: String,
    pub password: String,
    pub expires_in_mins: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    // ---
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub id: u64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}
