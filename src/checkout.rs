//! Checkout form validation and order placement.

use crate::cart::{CheckoutSelection, SharedCart};
use crate::domain::{ApiPtr, Notification, NotifierPtr, ShippingAddress, UserProfileUpdate};
use crate::error::{FieldError, StorefrontError, StorefrontResult};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{10,11}$").expect("Invalid phone regex"));
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid email regex"));
static CARD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{4}-[0-9]{4}-[0-9]{4}$").expect("Invalid card regex")
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PaymentMethod {
    #[default]
    Card,
    Cod,
}

impl FromStr for PaymentMethod {
    type Err = StorefrontError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        match s {
            "card" => Ok(PaymentMethod::Card),
            "cod" => Ok(PaymentMethod::Cod),
            _ => Err(StorefrontError::ValidationFailure(vec![FieldError {
                field: "payment_method",
                message: "Invalid payment method",
            }])),
        }
    }
}

/// What the shopper typed into the checkout form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutForm {
    // ---
    pub name: String,
    pub phone: String,
    pub email: String,
    pub postal_code: String,
    pub address: String,
    pub city: Option<String>,
    pub note: Option<String>,
    pub payment_method: PaymentMethod,
    /// Only checked when paying by card; blank is accepted.
    pub card_number: Option<String>,
    pub expiry: Option<String>,
    pub cvv: Option<String>,
}

impl CheckoutForm {
    // ---
    /// Checks every field and reports all failures at once.
    pub fn validate(&self) -> StorefrontResult<()> {
        // ---
        let mut errors = Vec::new();
        let mut check = |ok: bool, field: &'static str, message: &'static str| {
            if !ok {
                errors.push(FieldError { field, message });
            }
        };

        check(!self.name.trim().is_empty(), "name", "Recipient name is required");
        check(PHONE_RE.is_match(&self.phone), "phone", "Invalid phone");
        check(EMAIL_RE.is_match(&self.email), "email", "Invalid email");
        check(!self.postal_code.trim().is_empty(), "postal_code", "Postal code required");
        check(!self.address.trim().is_empty(), "address", "Street address required");

        if self.payment_method == PaymentMethod::Card {
            let card = self.card_number.as_deref().unwrap_or("");
            check(
                card.is_empty() || CARD_RE.is_match(card),
                "card_number",
                "Card number must be in format 1234-5678-9012-3456",
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(StorefrontError::ValidationFailure(errors))
        }
    }

    /// The partial profile written back to the user at checkout.
    pub fn profile_update(&self) -> UserProfileUpdate {
        // ---
        UserProfileUpdate {
            address: Some(ShippingAddress {
                address: Some(self.address.clone()),
                city: self.city.clone().filter(|c| !c.is_empty()),
                postal_code: Some(self.postal_code.clone()),
            }),
            phone: Some(self.phone.clone()),
        }
    }
}

/// Strips non-digits and groups the rest in fours: `"4242424242424242"` ->
/// `"4242-4242-4242-4242"`.
pub fn format_card_number(raw: &str) -> String {
    // ---
    let digits: Vec<char> = raw.chars().filter(char::is_ascii_digit).collect();
    digits
        .chunks(4)
        .map(|group| group.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("-")
}

/// Outcome of a placed order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderReceipt {
    // ---
    pub user_id: u64,
    pub line_count: usize,
    pub total: Decimal,
    pub profile_updated: bool,
    /// False if there was no remote cart to delete or the delete failed.
    pub remote_cart_cleared: bool,
}

pub struct Checkout {
    // ---
    api: ApiPtr,
    cart: SharedCart,
    notifier: NotifierPtr,
}

impl Checkout {
    // ---
    pub fn new(api: ApiPtr, cart: SharedCart, notifier: NotifierPtr) -> Self {
        Self { api, cart, notifier }
    }

    /// Places the order for the selected lines.
    ///
    /// Preconditions are checked before anything is sent, in this order:
    /// a user id, a non-empty selection, a valid form. After that the
    /// profile update and remote cart delete are best effort; their failures
    /// are reported but do not stop the order.
    ///
    /// # Errors
    /// [`StorefrontError::NotAuthenticated`], [`StorefrontError::EmptySelection`]
    /// or [`StorefrontError::ValidationFailure`]; no request is made in any
    /// of these cases.
    #[tracing::instrument(skip(self, selection, form), fields(lines = selection.items.len()))]
    pub async fn place_order(
        &self,
        user_id: Option<u64>,
        selection: &CheckoutSelection,
        form: &CheckoutForm,
    ) -> StorefrontResult<OrderReceipt> {
        // ---
        let Some(user_id) = user_id else {
            self.notifier.notify(Notification::error("User not logged in!"));
            return Err(StorefrontError::NotAuthenticated);
        };
        if selection.items.is_empty() {
            return Err(StorefrontError::EmptySelection);
        }
        form.validate()?;

        let profile_updated = match self.api.update_user(user_id, &form.profile_update()).await {
            Ok(_) => {
                self.notifier.notify(Notification::success("User info updated!"));
                true
            }
            Err(e) => {
                tracing::warn!("Profile update for user {} failed: {:#}", user_id, e);
                self.notifier.notify(Notification::error("Failed to update user"));
                false
            }
        };

        let remote_cart_cleared = match selection.cart_id {
            Some(cart_id) => match self.api.delete_cart(cart_id).await {
                Ok(_) => {
                    self.notifier
                        .notify(Notification::success("Order placed and cart cleared!"));
                    true
                }
                Err(e) => {
                    tracing::warn!("Deleting cart {} failed: {:#}", cart_id, e);
                    self.notifier.notify(Notification::error("Failed to clear cart!"));
                    false
                }
            },
            None => false,
        };

        if let Err(e) = self.cart.lock().reset() {
            tracing::error!("Failed to clear cart cache after order: {}", e);
        }

        self.notifier
            .notify(Notification::success("Order placed successfully!"));
        tracing::info!("Order placed for user {} ({} lines)", user_id, selection.items.len());

        Ok(OrderReceipt {
            user_id,
            line_count: selection.items.len(),
            total: selection.total,
            profile_updated,
            remote_cart_cleared,
        })
    }
}
