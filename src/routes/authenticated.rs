use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch, post},
};

/// Authenticated Router Module
///
/// Customer pages. Every path here falls under a prefix the navigation gate classifies as
/// protected, so anonymous visitors never reach these handlers; the `AuthSession` extractor
/// in each handler is the second check.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /dashboard?search=...
        .route("/dashboard", get(handlers::dashboard))
        // --- Catalog ---
        .route("/categories", get(handlers::categories))
        .route("/categories/{id}", get(handlers::category_product))
        // --- Cart ---
        // The basket lives in the `cart` cookie; every mutation rewrites it.
        .route("/cart", get(handlers::view_cart).delete(handlers::clear_cart))
        .route("/cart/items", post(handlers::add_to_cart))
        .route(
            "/cart/items/{id}",
            patch(handlers::update_cart_item).delete(handlers::remove_cart_item),
        )
        // --- Checkout & Orders ---
        .route(
            "/orderDetail",
            get(handlers::checkout_page).post(handlers::checkout),
        )
        .route("/orders", get(handlers::my_orders))
        // --- Profile ---
        // GET refreshes the stored user record from the backend.
        .route(
            "/user/profile",
            get(handlers::profile).put(handlers::update_profile),
        )
}
