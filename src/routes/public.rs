use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Pages reachable without a session. The sign-in, registration and password-reset pages
/// are classified public-only by the navigation gate, so signed-in visitors are sent to
/// their landing instead. The storefront landing, logout and health check are unclassified
/// and open to everyone.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for load balancers. Returns "ok" without touching the backend.
        .route("/health", get(|| async { "ok" }))
        // GET / and GET /home
        // Storefront landing with featured products.
        .route("/", get(handlers::home))
        .route("/home", get(handlers::home))
        // GET/POST /login
        // On success the credential pair is written and the visitor is redirected to the
        // landing of their role.
        .route("/login", get(handlers::login_page).post(handlers::login))
        // GET/POST /register
        .route(
            "/register",
            get(handlers::register_page).post(handlers::register),
        )
        // GET/POST /forget-password
        .route(
            "/forget-password",
            get(handlers::forgot_password_page).post(handlers::request_password_reset),
        )
        // GET/POST /reset-password/{token}
        // The token is the one-time value from the reset email.
        .route(
            "/reset-password/{token}",
            get(handlers::reset_password_page).post(handlers::reset_password),
        )
        // POST /logout
        // Clears the session and cart cookies.
        .route("/logout", post(handlers::logout))
}
