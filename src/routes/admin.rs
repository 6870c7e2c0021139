use crate::{AppState, handlers, upload::MAX_UPLOAD_BYTES};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, put},
};

/// Admin Router Module
///
/// The admin console. The navigation gate only lets admin identities into `/admin`;
/// each handler additionally calls `AuthSession::require_admin` before touching the backend.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin
        // Overview counters (accounts by role, catalog size, pending orders).
        .route("/admin", get(handlers::admin_overview))
        .route("/admin/dashboard", get(handlers::admin_overview))
        // --- Accounts ---
        // GET /admin/users?page=&size=&search=
        .route(
            "/admin/users",
            get(handlers::list_users).post(handlers::create_user),
        )
        .route(
            "/admin/users/{id}",
            get(handlers::get_user)
                .put(handlers::update_user)
                .delete(handlers::delete_user),
        )
        // --- Catalog ---
        .route(
            "/admin/products",
            get(handlers::list_products).post(handlers::create_product),
        )
        .route(
            "/admin/products/{id}",
            get(handlers::get_product)
                .put(handlers::update_product)
                .delete(handlers::delete_product),
        )
        // --- Orders ---
        .route("/admin/orders", get(handlers::list_orders))
        .route("/admin/orders/{id}/confirm", put(handlers::confirm_order))
        // User and product forms may carry an image.
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}
