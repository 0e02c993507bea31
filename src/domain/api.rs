use super::models::{
    Cart, CartProductRef, DeleteCartAck, LoginRequest, LoginResponse, Product, ProductsPage,
    UserProfile, UserProfileUpdate,
};
use anyhow::Result;
use std::sync::Arc;

/// Abstraction over the storefront REST collaborator.
///
/// Every method is a suspension point. Failures are returned as-is; callers
/// decide whether they become a rollback, a notification, or both.
#[async_trait::async_trait]
pub trait StorefrontApi: Send + Sync {
    // ---
    /// `POST /auth/login`
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse>;

    /// `GET /carts/{userId}`
    async fn get_cart_by_user(&self, user_id: u64) -> Result<Cart>;

    /// `PUT /carts/{cartId}` with full-replace semantics.
    async fn update_cart(&self, cart_id: u64, products: &[CartProductRef]) -> Result<Cart>;

    /// `POST /carts/add`
    async fn add_to_cart(&self, user_id: u64, products: &[CartProductRef]) -> Result<Cart>;

    /// `DELETE /carts/{cartId}`
    async fn delete_cart(&self, cart_id: u64) -> Result<DeleteCartAck>;

    /// `PUT /users/{id}` with a partial profile.
    async fn update_user(&self, user_id: u64, update: &UserProfileUpdate) -> Result<UserProfile>;

    /// `GET /products?limit&skip`
    async fn list_products(&self, skip: u32, limit: u32) -> Result<ProductsPage>;

    /// `GET /products/{id}`
    async fn get_product(&self, product_id: u64) -> Result<Product>;

    /// `GET /products/search?q=`
    async fn search_products(&self, query: &str) -> Result<ProductsPage>;

    /// `GET /products/categories`
    async fn list_categories(&self) -> Result<Vec<String>>;

    /// `GET /products/category/{name}`
    async fn products_by_category(&self, category: &str) -> Result<ProductsPage>;
}

/// Type alias for any backend that implements StorefrontApi.
pub type ApiPtr = Arc<dyn StorefrontApi>;
