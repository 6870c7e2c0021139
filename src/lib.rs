use std::sync::Arc;

use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Navigation gate: session resolution, route classification, access decision.
pub mod gate;
pub mod session;

// Page handlers and their collaborators.
pub mod auth;
pub mod backend;
pub mod cart;
pub mod config;
pub mod error;
pub mod handlers;
pub mod mock_backend;
pub mod models;
pub mod upload;
pub mod validation;

// Module for routing segregation (Public, Authenticated, Admin).
pub mod routes;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use backend::{BackendApi, BackendState, HttpBackend};
pub use config::AppConfig;
pub use gate::NavigationGate;
pub use mock_backend::MockBackend;

/// ApiDoc
///
/// Aggregates every page handler decorated with `#[utoipa::path]` and the view models
/// deriving `ToSchema`. Served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login_page, handlers::login, handlers::register_page, handlers::register,
        handlers::forgot_password_page, handlers::request_password_reset,
        handlers::reset_password_page, handlers::reset_password, handlers::home,
        handlers::logout, handlers::dashboard, handlers::categories,
        handlers::category_product, handlers::view_cart, handlers::add_to_cart,
        handlers::update_cart_item, handlers::remove_cart_item, handlers::clear_cart,
        handlers::checkout_page, handlers::checkout, handlers::my_orders, handlers::profile,
        handlers::update_profile, handlers::admin_overview, handlers::list_users,
        handlers::create_user, handlers::get_user, handlers::update_user,
        handlers::delete_user, handlers::list_products, handlers::create_product,
        handlers::get_product, handlers::update_product, handlers::delete_product,
        handlers::list_orders, handlers::confirm_order
    ),
    components(
        schemas(
            models::ApiMessage, models::Pagination, models::ProductView,
            models::CreateProductRequest, models::UpdateProductRequest, models::CategoryGroup,
            models::ShippingAddress, models::NewOrderLine, models::NewOrder,
            models::OrderProduct, models::OrderLine, models::OrderCustomer, models::Order,
            models::OrderPlaced, models::LoginRequest, models::RegisterRequest,
            models::ForgotPasswordRequest, models::ResetPasswordRequest, models::ProfileUpdate,
            models::AdminUser, models::CreateUserRequest, models::UpdateUserRequest,
            models::UserPage, models::FormView, models::LandingView, models::DashboardView,
            models::ProfileView, models::AdminOverview, models::AddToCartRequest,
            models::QuantityChange, cart::CartLine, cart::CartTotals, cart::CartView,
            session::Role,
        )
    ),
    tags(
        (name = "freshpicks-storefront", description = "FreshPicks grocery storefront")
    )
)]
struct ApiDoc;

/// AppState
///
/// Implements the **Unified State Pattern**: the backend client, the navigation gate and
/// the configuration, shared immutably by every request.
#[derive(Clone)]
pub struct AppState {
    /// Backend Layer: REST client (or the in-process mock).
    pub backend: BackendState,
    /// Gate: resolver, route table and landings; shared with the middleware.
    pub gate: Arc<NavigationGate>,
    /// Configuration: The loaded, immutable environment configuration.
    pub config: AppConfig,
}

impl AppState {
    /// Assembles the state, deriving the gate from the configuration.
    pub fn new(config: AppConfig, backend: BackendState) -> Self {
        Self {
            backend,
            gate: Arc::new(NavigationGate::from_config(&config)),
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for BackendState {
    fn from_ref(app_state: &AppState) -> BackendState {
        app_state.backend.clone()
    }
}

impl FromRef<AppState> for Arc<NavigationGate> {
    fn from_ref(app_state: &AppState) -> Arc<NavigationGate> {
        app_state.gate.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the application's routing structure. The navigation gate wraps every route
/// (including the fallback), so each request is classified and decided exactly once
/// before its handler runs.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    let gate = state.gate.clone();

    // 2. Base Router Assembly
    let base_router = Router::new()
        // Documentation: Serve the auto-generated Swagger UI (unclassified, always open).
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes())
        .merge(admin::admin_routes())
        // Registered before the gate layer so unknown paths are gated too.
        .fallback(handlers::not_found)
        // Navigation gate: redirects disallowed navigations with a single 303.
        .layer(middleware::from_fn_with_state(gate, gate::navigation_gate))
        // Apply the Unified State to all routes.
        .with_state(state);

    // 3. Observability and Correlation Layers (Applied outermost/first)
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID Generation: a UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request Tracing: wraps the request/response lifecycle in a span.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID Propagation: echoes x-request-id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: method, URI and the request id, so every log line of a
/// request (including gate redirects) is correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
