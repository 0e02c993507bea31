//! reqwest implementation of the storefront REST collaborator.

use crate::config::ApiConfig;
use crate::domain::{
    Cart, CartProductRef, DeleteCartAck, LoginRequest, LoginResponse, Product, ProductsPage,
    StorefrontApi, UserProfile, UserProfileUpdate,
};
use anyhow::{Context, Result};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Serialize)]
struct UpdateCartBody<'a> {
    // ---
    products: &'a [CartProductRef],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddToCartBody<'a> {
    // ---
    user_id: u64,
    products: &'a [CartProductRef],
}

pub struct RestApi {
    // ---
    client: Client,
    base_url: String,
}

impl RestApi {
    // ---
    pub fn new(config: &ApiConfig) -> Result<Self> {
        // ---
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("building HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        // ---
        self.client
            .request(method, format!("{}{}", self.base_url, path))
    }

    /// Sends the request and decodes a JSON body, treating any non-2xx status
    /// as a failure.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        // ---
        let response = request
            .send()
            .await
            .with_context(|| format!("{what}: request failed"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("{} returned {}: {}", what, status, body);
            anyhow::bail!("{what}: server returned {status}");
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("{what}: invalid response body"))
    }
}

#[async_trait::async_trait]
impl StorefrontApi for RestApi {
    // ---
    #[tracing::instrument(skip(self, request), fields(username = %request.username))]
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse> {
        // ---
        let req = self.request(Method::POST, "/auth/login").json(request);
        self.send(req, "POST /auth/login").await
    }

    #[tracing::instrument(skip(self))]
    async fn get_cart_by_user(&self, user_id: u64) -> Result<Cart> {
        // ---
        let req = self.request(Method::GET, &format!("/carts/{user_id}"));
        self.send(req, "GET /carts/{userId}").await
    }

    #[tracing::instrument(skip(self, products), fields(lines = products.len()))]
    async fn update_cart(&self, cart_id: u64, products: &[CartProductRef]) -> Result<Cart> {
        // ---
        let req = self
            .request(Method::PUT, &format!("/carts/{cart_id}"))
            .json(&UpdateCartBody { products });
        self.send(req, "PUT /carts/{cartId}").await
    }

    #[tracing::instrument(skip(self, products), fields(lines = products.len()))]
    async fn add_to_cart(&self, user_id: u64, products: &[CartProductRef]) -> Result<Cart> {
        // ---
        let req = self
            .request(Method::POST, "/carts/add")
            .json(&AddToCartBody { user_id, products });
        self.send(req, "POST /carts/add").await
    }

    #[tracing::instrument(skip(self))]
    async fn delete_cart(&self, cart_id: u64) -> Result<DeleteCartAck> {
        // ---
        let req = self.request(Method::DELETE, &format!("/carts/{cart_id}"));
        self.send(req, "DELETE /carts/{cartId}").await
    }

    #[tracing::instrument(skip(self, update))]
    async fn update_user(&self, user_id: u64, update: &UserProfileUpdate) -> Result<UserProfile> {
        // ---
        let req = self
            .request(Method::PUT, &format!("/users/{user_id}"))
            .json(update);
        self.send(req, "PUT /users/{id}").await
    }

    #[tracing::instrument(skip(self))]
    async fn list_products(&self, skip: u32, limit: u32) -> Result<ProductsPage> {
        // ---
        let req = self
            .request(Method::GET, "/products")
            .query(&[("limit", limit), ("skip", skip)]);
        self.send(req, "GET /products").await
    }

    #[tracing::instrument(skip(self))]
    async fn get_product(&self, product_id: u64) -> Result<Product> {
        // ---
        let req = self.request(Method::GET, &format!("/products/{product_id}"));
        self.send(req, "GET /products/{id}").await
    }

    #[tracing::instrument(skip(self))]
    async fn search_products(&self, query: &str) -> Result<ProductsPage> {
        // ---
        let req = self
            .request(Method::GET, "/products/search")
            .query(&[("q", query)]);
        self.send(req, "GET /products/search").await
    }

    #[tracing::instrument(skip(self))]
    async fn list_categories(&self) -> Result<Vec<String>> {
        // ---
        let req = self.request(Method::GET, "/products/categories");
        self.send(req, "GET /products/categories").await
    }

    #[tracing::instrument(skip(self))]
    async fn products_by_category(&self, category: &str) -> Result<ProductsPage> {
        // ---
        let req = self.request(Method::GET, &format!("/products/category/{category}"));
        self.send(req, "GET /products/category/{name}").await
    }
}
