use anyhow::Result;
use std::env;
use storefront_client::{create_app_state, create_log_notifier, GateDecision, SessionState};
use tracing::info;

/// Headless driver: restores or opens a session, mounts the cart and logs a
/// summary. With `STOREFRONT_WATCH=1` it keeps the session alive until Ctrl-C
/// or until the credential expires.
#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present; real environment variables take precedence.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt::try_init().ok();
    info!("Starting storefront client v{}...", env!("CARGO_PKG_VERSION"));

    let state = create_app_state(create_log_notifier())?;
    let session = state.session();

    if session.initialize() == SessionState::Inactive {
        if let (Ok(username), Ok(password)) = (
            env::var("STOREFRONT_USERNAME"),
            env::var("STOREFRONT_PASSWORD"),
        ) {
            session.login(&username, &password).await?;
        }
    }

    if session.gate() != Some(GateDecision::Allow) {
        info!("Not signed in; set STOREFRONT_USERNAME and STOREFRONT_PASSWORD to log in");
        return Ok(());
    }

    let user = session.user();
    info!(
        "Signed in as {} (user {:?}, expires at {:?})",
        user.username.as_deref().unwrap_or("<unknown>"),
        user.user_id,
        user.token_expiry
    );

    let mut feed = state.catalog().feed();
    feed.fetch_next_page().await?;
    info!(
        "Catalog: {} of {} products loaded",
        feed.products().len(),
        feed.total().unwrap_or(0)
    );

    let cart = state.mount_cart().await?;
    let items = cart.items();
    let total: rust_decimal::Decimal = items.iter().map(|i| i.line_total()).sum();
    info!(
        "Cart {:?} ({:?}): {} lines, {} items, total {}",
        cart.cart_id(),
        cart.init_source(),
        items.len(),
        state.cart_counter().get(),
        total
    );
    for item in &items {
        info!("  {} x{} @ {} = {}", item.title, item.quantity, item.price, item.line_total());
    }

    if env::var("STOREFRONT_WATCH").as_deref() == Ok("1") {
        let mut states = session.subscribe();
        info!("Watching session; press Ctrl-C to exit");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Interrupted"),
            _ = states.wait_for(|s| *s == SessionState::Inactive) => info!("Session expired"),
        }
    }

    cart.flush().await.ok();
    Ok(())
}
