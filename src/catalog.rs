//! Product browsing and adding to the cart from outside the cart view.

use crate::cart::SharedCart;
use crate::config::CatalogConfig;
use crate::domain::{ApiPtr, Cart, CartLineItem, CartProductRef, Notification, NotifierPtr, Product};
use crate::error::{StorefrontError, StorefrontResult};

const ADDED: &str = "Product added to cart successfully!";
const ADD_FAILED: &str = "Failed to add product to cart!";

/// Infinite-scroll product listing, one `skip`/`limit` page at a time.
pub struct ProductFeed {
    // ---
    api: ApiPtr,
    page_size: u32,
    products: Vec<Product>,
    next_skip: Option<u32>,
    total: Option<u32>,
}

impl ProductFeed {
    // ---
    pub fn new(api: ApiPtr, page_size: u32) -> Self {
        // ---
        Self {
            api,
            page_size: page_size.max(1),
            products: Vec::new(),
            next_skip: Some(0),
            total: None,
        }
    }

    /// Every product loaded so far, in page order.
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// Total reported by the last page, once one has been loaded.
    pub fn total(&self) -> Option<u32> {
        self.total
    }

    /// False once a page reported `skip + limit >= total`.
    pub fn has_next_page(&self) -> bool {
        self.next_skip.is_some()
    }

    /// Loads the next page and returns how many products it added.
    ///
    /// Returns `Ok(0)` without a request once the listing is exhausted. A
    /// failed request leaves the feed where it was, so it can be retried.
    pub async fn fetch_next_page(&mut self) -> StorefrontResult<usize> {
        // ---
        let Some(skip) = self.next_skip else {
            return Ok(0);
        };

        let page = self
            .api
            .list_products(skip, self.page_size)
            .await
            .map_err(StorefrontError::remote)?;

        let added = page.products.len();
        self.next_skip = page.next_skip();
        self.total = Some(page.total);
        self.products.extend(page.products);

        tracing::debug!(
            "Loaded {} products at skip {} ({} of {})",
            added,
            skip,
            self.products.len(),
            page.total
        );
        Ok(added)
    }

    /// Drops everything loaded and starts over from the first page.
    pub fn reset(&mut self) {
        // ---
        self.products.clear();
        self.next_skip = Some(0);
        self.total = None;
    }
}

/// Read access to the catalog plus the "add to cart" action.
#[derive(Clone)]
pub struct Catalog {
    // ---
    api: ApiPtr,
    cart: SharedCart,
    notifier: NotifierPtr,
    config: CatalogConfig,
}

impl Catalog {
    // ---
    pub fn new(api: ApiPtr, cart: SharedCart, notifier: NotifierPtr, config: CatalogConfig) -> Self {
        // ---
        Self {
            api,
            cart,
            notifier,
            config,
        }
    }

    /// A fresh feed using the configured page size.
    pub fn feed(&self) -> ProductFeed {
        ProductFeed::new(self.api.clone(), self.config.page_size)
    }

    pub async fn product(&self, product_id: u64) -> StorefrontResult<Product> {
        // ---
        self.api
            .get_product(product_id)
            .await
            .map_err(StorefrontError::remote)
    }

    /// Full-text search. A blank query returns nothing without a request.
    pub async fn search(&self, query: &str) -> StorefrontResult<Vec<Product>> {
        // ---
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let page = self
            .api
            .search_products(query)
            .await
            .map_err(StorefrontError::remote)?;
        Ok(page.products)
    }

    pub async fn categories(&self) -> StorefrontResult<Vec<String>> {
        // ---
        self.api
            .list_categories()
            .await
            .map_err(StorefrontError::remote)
    }

    /// Products in one category. A blank name returns nothing without a request.
    pub async fn by_category(&self, category: &str) -> StorefrontResult<Vec<Product>> {
        // ---
        if category.trim().is_empty() {
            return Ok(Vec::new());
        }

        let page = self
            .api
            .products_by_category(category)
            .await
            .map_err(StorefrontError::remote)?;
        Ok(page.products)
    }

    /// Adds one unit of a product to the user's remote cart and merges the
    /// added line into the local cart.
    ///
    /// # Errors
    /// - [`StorefrontError::NotAuthenticated`] without a user id; nothing is sent.
    /// - [`StorefrontError::RemoteUnavailable`] if the server rejected the add.
    /// - [`StorefrontError::Storage`] if the merged cart could not be cached.
    #[tracing::instrument(skip(self))]
    pub async fn add_to_cart(&self, user_id: Option<u64>, product_id: u64) -> StorefrontResult<Cart> {
        // ---
        let Some(user_id) = user_id else {
            self.notifier.notify(Notification::error(ADD_FAILED));
            return Err(StorefrontError::NotAuthenticated);
        };

        let products = [CartProductRef {
            id: product_id,
            quantity: 1,
        }];

        let cart = match self.api.add_to_cart(user_id, &products).await {
            Ok(cart) => cart,
            Err(e) => {
                tracing::warn!("Add to cart failed: {:#}", e);
                self.notifier.notify(Notification::error(ADD_FAILED));
                return Err(StorefrontError::remote(e));
            }
        };

        let added = match cart.products.iter().find(|p| p.id == product_id) {
            Some(line) => Some(CartLineItem {
                quantity: 1,
                ..line.clone()
            }),
            // Build the line from the catalog entry instead.
            None => match self.api.get_product(product_id).await {
                Ok(product) => Some(CartLineItem {
                    thumbnail: product.thumbnail,
                    ..CartLineItem::new(product.id, product.title, product.price, 1)
                }),
                Err(e) => {
                    tracing::warn!(
                        "Add to cart response lacks product {} and lookup failed: {:#}",
                        product_id,
                        e
                    );
                    None
                }
            },
        };

        if let Some(line) = added {
            self.cart.lock().add_line(line)?;
        }

        self.notifier.notify(Notification::success(ADDED));
        Ok(cart)
    }
}
