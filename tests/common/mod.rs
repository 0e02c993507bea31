// Test helpers are intentionally partially used
#![allow(dead_code)]

//! In-process stand-in for the storefront REST API, served by axum on an
//! ephemeral port, plus helpers to build an `AppState` pointed at it.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use storefront_client::{
    create_app_state_from_config, create_channel_notifier, domain::Notification, ApiConfig,
    AppConfig, AppState, CatalogConfig, MetricsKind, SessionConfig, SyncConfig,
};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedReceiver;

pub const USERNAME: &str = "emilys";
pub const PASSWORD: &str = "emilyspass";
pub const USER_ID: u64 = 1;
pub const CART_ID: u64 = 17;

// ============================================================================
// Recorded server state
// ============================================================================

#[derive(Default)]
pub struct ServerState {
    pub cart_lines: Vec<Value>,
    pub product_count: u64,
    pub token_ttl_secs: i64,
    pub cart_puts: Vec<Value>,
    pub cart_adds: Vec<Value>,
    pub cart_deletes: Vec<u64>,
    pub user_puts: Vec<(u64, Value)>,
    pub fail_cart_writes: bool,
    pub fail_user_writes: bool,
    pub hits: HashMap<String, usize>,
}

#[derive(Clone, Default)]
pub struct MockStorefront {
    state: Arc<Mutex<ServerState>>,
}

impl MockStorefront {
    // ---
    pub fn state(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap()
    }

    fn hit(&self, route: &str) {
        *self.state().hits.entry(route.to_string()).or_default() += 1;
    }

    pub fn hits(&self, route: &str) -> usize {
        self.state().hits.get(route).copied().unwrap_or(0)
    }

    pub fn cart_puts(&self) -> Vec<Value> {
        self.state().cart_puts.clone()
    }
}

pub fn line(id: u64, price: f64, quantity: u32) -> Value {
    // ---
    json!({
        "id": id,
        "title": format!("Product {id}"),
        "price": price,
        "quantity": quantity,
        "total": price * quantity as f64,
        "discountPercentage": 0.0,
        "discountedTotal": price * quantity as f64,
        "thumbnail": format!("https://cdn.example/{id}.png"),
    })
}

fn product(id: u64) -> Value {
    // ---
    json!({
        "id": id,
        "title": format!("Product {id}"),
        "description": "",
        "category": if id % 2 == 0 { "beauty" } else { "groceries" },
        "price": 9.99,
        "rating": 4.5,
        "stock": 10,
        "tags": [],
        "thumbnail": format!("https://cdn.example/{id}.png"),
        "images": [],
    })
}

/// Unsigned credential for `user_id`, expiring `ttl_secs` from now.
pub fn make_token(user_id: u64, ttl_secs: i64) -> String {
    // ---
    let now = chrono::Utc::now().timestamp();
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = json!({
        "id": user_id,
        "username": USERNAME,
        "email": "emily.johnson@x.dummyjson.com",
        "iat": now,
        "exp": now + ttl_secs,
    });
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.signature")
}

// ============================================================================
// Handlers
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginBody {
    username: String,
    password: String,
    expires_in_mins: u32,
}

async fn login(
    State(server): State<MockStorefront>,
    Json(body): Json<LoginBody>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    // ---
    server.hit("login");
    if body.username != USERNAME || body.password != PASSWORD {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "Invalid credentials"})),
        ));
    }
    assert!(body.expires_in_mins > 0);

    let ttl = server.state().token_ttl_secs;
    Ok(Json(json!({
        "id": USER_ID,
        "username": USERNAME,
        "email": "emily.johnson@x.dummyjson.com",
        "accessToken": make_token(USER_ID, ttl),
        "refreshToken": "refresh",
    })))
}

fn cart_body(lines: &[Value], user_id: u64) -> Value {
    // ---
    json!({
        "id": CART_ID,
        "products": lines,
        "total": 0,
        "discountedTotal": 0,
        "userId": user_id,
        "totalProducts": lines.len(),
        "totalQuantity": lines.iter().filter_map(|l| l["quantity"].as_u64()).sum::<u64>(),
    })
}

/// Expands a `{products: [{id, quantity}]}` body into full cart lines.
fn lines_from(body: &Value) -> Vec<Value> {
    // ---
    body["products"]
        .as_array()
        .map(|products| {
            products
                .iter()
                .map(|p| {
                    let id = p["id"].as_u64().unwrap_or(0);
                    let quantity = p["quantity"].as_u64().unwrap_or(1) as u32;
                    line(id, 9.99, quantity)
                })
                .collect()
        })
        .unwrap_or_default()
}

async fn get_cart(State(server): State<MockStorefront>, Path(user_id): Path<u64>) -> Json<Value> {
    // ---
    server.hit("get_cart");
    let lines = server.state().cart_lines.clone();
    Json(cart_body(&lines, user_id))
}

async fn put_cart(
    State(server): State<MockStorefront>,
    Path(cart_id): Path<u64>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    // ---
    server.hit("put_cart");
    let mut state = server.state();
    state.cart_puts.push(body.clone());
    if state.fail_cart_writes || cart_id != CART_ID {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    let lines = lines_from(&body);
    Ok(Json(cart_body(&lines, USER_ID)))
}

async fn add_cart(
    State(server): State<MockStorefront>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    // ---
    server.hit("add_cart");
    let mut state = server.state();
    state.cart_adds.push(body.clone());
    if state.fail_cart_writes {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    let lines = lines_from(&body);
    Ok(Json(cart_body(&lines, body["userId"].as_u64().unwrap_or(0))))
}

async fn delete_cart(State(server): State<MockStorefront>, Path(cart_id): Path<u64>) -> Json<Value> {
    // ---
    server.hit("delete_cart");
    server.state().cart_deletes.push(cart_id);
    Json(json!({"id": cart_id, "isDeleted": true, "deletedOn": "2025-01-01T00:00:00Z"}))
}

async fn put_user(
    State(server): State<MockStorefront>,
    Path(user_id): Path<u64>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    // ---
    server.hit("put_user");
    let mut state = server.state();
    state.user_puts.push((user_id, body.clone()));
    if state.fail_user_writes {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    Ok(Json(json!({"id": user_id, "phone": body["phone"], "address": body["address"]})))
}

#[derive(Deserialize)]
struct Paging {
    limit: u64,
    skip: u64,
}

async fn list_products(
    State(server): State<MockStorefront>,
    Query(paging): Query<Paging>,
) -> Json<Value> {
    // ---
    server.hit("list_products");
    let total = server.state().product_count;
    let products: Vec<Value> = (paging.skip + 1..=total)
        .take(paging.limit as usize)
        .map(product)
        .collect();
    Json(json!({"products": products, "total": total, "skip": paging.skip, "limit": paging.limit}))
}

async fn search_products(
    State(server): State<MockStorefront>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    // ---
    server.hit("search");
    let q = query.get("q").cloned().unwrap_or_default().to_lowercase();
    let total = server.state().product_count;
    let products: Vec<Value> = (1..=total)
        .map(product)
        .filter(|p| p["title"].as_str().unwrap_or("").to_lowercase().contains(&q))
        .collect();
    let count = products.len();
    Json(json!({"products": products, "total": count, "skip": 0, "limit": count}))
}

async fn categories() -> Json<Value> {
    Json(json!(["beauty", "groceries"]))
}

async fn by_category(
    State(server): State<MockStorefront>,
    Path(name): Path<String>,
) -> Json<Value> {
    // ---
    let total = server.state().product_count;
    let products: Vec<Value> = (1..=total)
        .map(product)
        .filter(|p| p["category"] == name.as_str())
        .collect();
    let count = products.len();
    Json(json!({"products": products, "total": count, "skip": 0, "limit": count}))
}

async fn get_product(
    State(server): State<MockStorefront>,
    Path(id): Path<u64>,
) -> Result<Json<Value>, StatusCode> {
    // ---
    if id == 0 || id > server.state().product_count {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(product(id)))
}

// ============================================================================
// Test server
// ============================================================================

pub struct TestServer {
    pub addr: std::net::SocketAddr,
    pub mock: MockStorefront,
}

impl TestServer {
    // ---
    pub async fn new() -> Self {
        // --
        init_tracing();

        let mock = MockStorefront::default();
        {
            let mut state = mock.state();
            state.product_count = 45;
            state.token_ttl_secs = 1800;
        }

        let app = Router::new()
            .route("/auth/login", post(login))
            .route("/carts/add", post(add_cart))
            .route("/carts/{id}", get(get_cart).put(put_cart).delete(delete_cart))
            .route("/users/{id}", put(put_user))
            .route("/products", get(list_products))
            .route("/products/search", get(search_products))
            .route("/products/categories", get(categories))
            .route("/products/category/{name}", get(by_category))
            .route("/products/{id}", get(get_product))
            .with_state(mock.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Spawn the server in the background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, mock }
    }

    pub fn url(&self, path: &str) -> String {
        // ---
        format!("http://{}{}", self.addr, path)
    }

    pub fn api_config(&self) -> ApiConfig {
        // ---
        ApiConfig {
            base_url: self.url("/"),
            request_timeout: Duration::from_secs(5),
        }
    }

    /// Application state wired to this server, with durable storage in `dir`.
    pub fn app(&self, dir: &TempDir, debounce: Duration) -> (AppState, UnboundedReceiver<Notification>) {
        // ---
        let config = AppConfig {
            api: self.api_config(),
            sync: SyncConfig { debounce },
            session: SessionConfig {
                check_interval: Duration::from_secs(60),
                storage_dir: dir.path().to_path_buf(),
            },
            catalog: CatalogConfig { page_size: 20 },
            metrics: MetricsKind::Noop,
        };
        let (notifier, rx) = create_channel_notifier();
        let state = create_app_state_from_config(config, notifier).expect("app state");
        (state, rx)
    }
}

pub fn drain(rx: &mut UnboundedReceiver<Notification>) -> Vec<String> {
    // ---
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push(n.to_string());
    }
    out
}

fn init_tracing() {
    // ---
    if std::env::var("TEST_DEBUG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    }
}
