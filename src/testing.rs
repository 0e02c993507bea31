//! In-process `StorefrontApi` double shared by the unit tests.

use crate::domain::{
    Cart, CartLineItem, CartProductRef, DeleteCartAck, LoginRequest, LoginResponse, Product,
    ProductsPage, StorefrontApi, UserProfile, UserProfileUpdate,
};
use anyhow::{bail, Result};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Default)]
struct Recorded {
    cart: Option<Cart>,
    login: Option<LoginResponse>,
    add_response: Option<Vec<CartLineItem>>,
    products: Vec<Product>,
    cart_writes: Vec<(u64, Vec<CartProductRef>)>,
    cart_adds: Vec<(u64, Vec<CartProductRef>)>,
    cart_deletes: Vec<u64>,
    user_updates: Vec<(u64, UserProfileUpdate)>,
    product_queries: Vec<(u32, u32)>,
}

#[derive(Default)]
pub(crate) struct MockApi {
    // ---
    state: Mutex<Recorded>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_user_update: AtomicBool,
    fail_delete: AtomicBool,
}

impl MockApi {
    // ---
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.state.lock().unwrap()
    }

    pub(crate) fn set_cart(&self, cart: Cart) {
        self.state().cart = Some(cart);
    }

    pub(crate) fn set_login(&self, response: LoginResponse) {
        self.state().login = Some(response);
    }

    /// Lines returned by `add_to_cart` instead of echoing the request.
    pub(crate) fn set_add_response(&self, lines: Vec<CartLineItem>) {
        self.state().add_response = Some(lines);
    }

    /// Seeds `count` catalog products with ids `1..=count`.
    pub(crate) fn seed_products(&self, count: u64) {
        // ---
        self.state().products = (1..=count).map(product).collect();
    }

    pub(crate) fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_user_update(&self, fail: bool) {
        self.fail_user_update.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn cart_writes(&self) -> Vec<(u64, Vec<CartProductRef>)> {
        self.state().cart_writes.clone()
    }

    pub(crate) fn cart_adds(&self) -> Vec<(u64, Vec<CartProductRef>)> {
        self.state().cart_adds.clone()
    }

    pub(crate) fn cart_deletes(&self) -> Vec<u64> {
        self.state().cart_deletes.clone()
    }

    pub(crate) fn user_updates(&self) -> Vec<(u64, UserProfileUpdate)> {
        self.state().user_updates.clone()
    }

    pub(crate) fn product_queries(&self) -> Vec<(u32, u32)> {
        self.state().product_queries.clone()
    }

    fn page(products: Vec<Product>, skip: u32, limit: u32, total: u32) -> ProductsPage {
        // ---
        ProductsPage {
            products,
            total,
            skip,
            limit,
        }
    }
}

pub(crate) fn product(id: u64) -> Product {
    // ---
    Product {
        id,
        title: format!("Product {id}"),
        description: String::new(),
        category: if id % 2 == 0 { "beauty" } else { "groceries" }.to_string(),
        price: Decimal::new(999 + id as i64, 2),
        discount_percentage: 0.0,
        rating: 4.5,
        stock: 10,
        tags: Vec::new(),
        brand: None,
        thumbnail: format!("https://cdn.example/{id}.png"),
        images: Vec::new(),
    }
}

#[async_trait::async_trait]
impl StorefrontApi for MockApi {
    // ---
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse> {
        // ---
        match self.state().login.clone() {
            Some(response) if request.password == "emilyspass" => Ok(response),
            _ => bail!("POST /auth/login: server returned 400 Bad Request"),
        }
    }

    async fn get_cart_by_user(&self, user_id: u64) -> Result<Cart> {
        // ---
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("GET /carts/{user_id}: connection refused");
        }
        match self.state().cart.clone() {
            Some(cart) => Ok(cart),
            None => bail!("GET /carts/{user_id}: server returned 404 Not Found"),
        }
    }

    async fn update_cart(&self, cart_id: u64, products: &[CartProductRef]) -> Result<Cart> {
        // ---
        let mut state = self.state();
        state.cart_writes.push((cart_id, products.to_vec()));
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("PUT /carts/{cart_id}: server returned 500 Internal Server Error");
        }
        let mut cart = state.cart.clone().unwrap_or(Cart {
            id: cart_id,
            products: Vec::new(),
            total: Decimal::ZERO,
            discounted_total: Decimal::ZERO,
            user_id: 0,
            total_products: 0,
            total_quantity: 0,
        });
        cart.total_products = products.len() as u32;
        cart.total_quantity = products.iter().map(|p| p.quantity).sum();
        Ok(cart)
    }

    async fn add_to_cart(&self, user_id: u64, products: &[CartProductRef]) -> Result<Cart> {
        // ---
        let mut state = self.state();
        state.cart_adds.push((user_id, products.to_vec()));
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("POST /carts/add: server returned 500 Internal Server Error");
        }
        let lines = match state.add_response.clone() {
            Some(lines) => lines,
            None => products
                .iter()
                .map(|p| CartLineItem::new(p.id, format!("Product {}", p.id), product(p.id).price, p.quantity))
                .collect(),
        };
        Ok(Cart {
            id: 51,
            products: lines,
            total: Decimal::ZERO,
            discounted_total: Decimal::ZERO,
            user_id,
            total_products: products.len() as u32,
            total_quantity: products.iter().map(|p| p.quantity).sum(),
        })
    }

    async fn delete_cart(&self, cart_id: u64) -> Result<DeleteCartAck> {
        // ---
        self.state().cart_deletes.push(cart_id);
        if self.fail_delete.load(Ordering::SeqCst) {
            bail!("DELETE /carts/{cart_id}: server returned 404 Not Found");
        }
        Ok(DeleteCartAck {
            id: cart_id,
            is_deleted: true,
        })
    }

    async fn update_user(&self, user_id: u64, update: &UserProfileUpdate) -> Result<UserProfile> {
        // ---
        self.state().user_updates.push((user_id, update.clone()));
        if self.fail_user_update.load(Ordering::SeqCst) {
            bail!("PUT /users/{user_id}: server returned 500 Internal Server Error");
        }
        Ok(UserProfile {
            id: Some(user_id),
            phone: update.phone.clone(),
            address: update.address.clone(),
            ..UserProfile::default()
        })
    }

    async fn list_products(&self, skip: u32, limit: u32) -> Result<ProductsPage> {
        // ---
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("GET /products: connection refused");
        }
        let mut state = self.state();
        state.product_queries.push((skip, limit));
        let total = state.products.len() as u32;
        let products = state
            .products
            .iter()
            .skip(skip as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        Ok(Self::page(products, skip, limit, total))
    }

    async fn get_product(&self, product_id: u64) -> Result<Product> {
        // ---
        match self.state().products.iter().find(|p| p.id == product_id) {
            Some(p) => Ok(p.clone()),
            None => bail!("GET /products/{product_id}: server returned 404 Not Found"),
        }
    }

    async fn search_products(&self, query: &str) -> Result<ProductsPage> {
        // ---
        let needle = query.to_lowercase();
        let found: Vec<Product> = self
            .state()
            .products
            .iter()
            .filter(|p| p.title.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        let total = found.len() as u32;
        Ok(Self::page(found, 0, total, total))
    }

    async fn list_categories(&self) -> Result<Vec<String>> {
        Ok(vec!["beauty".to_string(), "groceries".to_string()])
    }

    async fn products_by_category(&self, category: &str) -> Result<ProductsPage> {
        // ---
        let found: Vec<Product> = self
            .state()
            .products
            .iter()
            .filter(|p| p.category == category)
            .cloned()
            .collect();
        let total = found.len() as u32;
        Ok(Self::page(found, 0, total, total))
    }
}
