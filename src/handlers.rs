use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};

use crate::{
    AppState,
    auth::{AuthSession, cart_cookie, clear_session_cookies, session_cookies, user_cookie},
    cart::{Cart, CartView},
    error::{BackendError, PageError},
    models::{
        AddToCartRequest, AdminOverview, AdminUser, ApiMessage, CategoryGroup,
        CreateProductRequest, CreateUserRequest, DashboardView, ForgotPasswordRequest, FormView,
        LandingView, LoginRequest, NewOrder, ORDER_CONFIRMED, Order, OrderPlaced, Product,
        ProductSearch, ProductView, ProfileUpdate, ProfileView, QuantityChange, RegisterRequest,
        ResetPasswordRequest, ShippingAddress, UpdateProductRequest, UpdateUserRequest,
        UserListQuery, UserPage,
    },
    session::{CredentialStore, RequestCookies, Role},
    upload::AdminForm,
    validation::{
        valid_email, validate_login, validate_new_user, validate_password_reset,
        validate_product, validate_registration, validate_reset_request, validate_shipping,
    },
};

/// Products shown on the public landing page.
const FEATURED_PRODUCTS: usize = 8;
/// Page size used when the admin console lists the whole catalog.
const ADMIN_PRODUCT_PAGE_SIZE: u32 = 200;
/// Upper bound of accounts fetched for the admin overview counters.
const OVERVIEW_USER_LIMIT: u32 = 1000;

fn product_views(products: Vec<Product>, api_base_url: &str) -> Vec<ProductView> {
    products
        .into_iter()
        .map(|product| ProductView::from_product(product, api_base_url))
        .collect()
}

fn load_cart(state: &AppState, headers: &HeaderMap) -> Cart {
    Cart::load(&RequestCookies::new(headers), &state.config.cookies.cart_name)
}

/// hydrate_cart
///
/// Catalog entries for every basket line: one listing call, then a direct lookup for ids
/// the listing did not include. Lines whose product no longer exists are dropped.
async fn hydrate_cart(
    state: &AppState,
    token: &str,
    cart: &mut Cart,
) -> Result<Vec<Product>, PageError> {
    if cart.is_empty() {
        return Ok(Vec::new());
    }

    let mut catalog = state.backend.list_products(None, None).await?;
    let unlisted: Vec<String> = cart
        .items()
        .iter()
        .filter(|item| !catalog.iter().any(|product| product.id == item.id))
        .map(|item| item.id.clone())
        .collect();

    for id in unlisted {
        match state.backend.get_product(Some(token), &id).await {
            Ok(product) => catalog.push(product),
            Err(BackendError::Rejected { status, .. }) if status == StatusCode::NOT_FOUND => {
                tracing::debug!(product_id = %id, "dropping unavailable product from cart");
            }
            Err(e) => return Err(e.into()),
        }
    }

    cart.retain_available(&catalog);
    Ok(catalog)
}

/// Responds with the hydrated cart view and the rewritten `cart` cookie.
async fn cart_response(
    state: &AppState,
    token: &str,
    mut cart: Cart,
) -> Result<Response, PageError> {
    let catalog = hydrate_cart(state, token, &mut cart).await?;
    let cookie = cart_cookie(&state.config.cookies, &cart)?;
    Ok((AppendHeaders([cookie]), Json(cart.view(&catalog))).into_response())
}

/// Expires every session cookie and sends the visitor to the login landing.
fn sign_out(state: &AppState) -> Result<Response, PageError> {
    let cookies = clear_session_cookies(&state.config.cookies)?;
    Ok((AppendHeaders(cookies), Redirect::to(&state.config.landings.login)).into_response())
}

// --- Public Pages ---

/// login_page
///
/// [Public Route] Describes the sign-in form. A credential pair that no longer resolves
/// to a session (token without a readable record, or the reverse) is expired here, so
/// the visitor starts from clean cookies.
#[utoipa::path(
    get,
    path = "/login",
    responses((status = 200, description = "Login form", body = FormView))
)]
pub async fn login_page(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, PageError> {
    let form = Json(FormView::new("login", "/login", &["email", "password"]));

    let cookies = RequestCookies::new(&headers);
    let names = &state.config.cookies;
    let leftover = [&names.token_name, &names.user_name]
        .into_iter()
        .any(|name| cookies.get(name).is_some());
    if leftover && state.gate.resolver.resolve_session(&cookies).is_none() {
        tracing::info!("expiring an unusable credential pair on the login page");
        let cleared = clear_session_cookies(names)?;
        return Ok((AppendHeaders(cleared), form).into_response());
    }

    Ok(form.into_response())
}

/// login
///
/// [Public Route] Authenticates against the backend and writes the credential pair.
/// On success the visitor is redirected to the landing of their role.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 303, description = "Signed in; redirect to the role landing"),
        (status = 400, description = "Invalid form", body = ApiMessage),
        (status = 401, description = "Invalid credentials", body = ApiMessage)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, PageError> {
    validate_login(&payload)?;
    let outcome = state.backend.login(&payload).await?;

    let cookies = session_cookies(&state.config.cookies, &outcome.token, &outcome.user)?;
    let target = state.config.landings.for_role(outcome.user.role);
    tracing::info!(
        user_id = ?outcome.user.id,
        role = outcome.user.role.as_str(),
        "login succeeded"
    );
    Ok((AppendHeaders(cookies), Redirect::to(target)).into_response())
}

/// register_page
///
/// [Public Route] Describes the customer registration form.
#[utoipa::path(
    get,
    path = "/register",
    responses((status = 200, description = "Registration form", body = FormView))
)]
pub async fn register_page() -> Json<FormView> {
    Json(FormView::new(
        "register",
        "/register",
        &[
            "fullName",
            "username",
            "email",
            "phoneNumber",
            "password",
            "confirmPassword",
        ],
    ))
}

/// register
///
/// [Public Route] Creates a customer account. The visitor stays signed out and is expected
/// to log in afterwards.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = ApiMessage),
        (status = 400, description = "Invalid form", body = ApiMessage),
        (status = 409, description = "Email already registered", body = ApiMessage)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiMessage>), PageError> {
    validate_registration(&payload)?;
    let message = state.backend.register(&payload).await?;
    Ok((StatusCode::CREATED, Json(ApiMessage::ok(message))))
}

/// forgot_password_page
///
/// [Public Route] Describes the password-reset request form.
#[utoipa::path(
    get,
    path = "/forget-password",
    responses((status = 200, description = "Reset request form", body = FormView))
)]
pub async fn forgot_password_page() -> Json<FormView> {
    Json(FormView::new("forget-password", "/forget-password", &["email"]))
}

/// request_password_reset
///
/// [Public Route] Asks the backend to email a reset link.
#[utoipa::path(
    post,
    path = "/forget-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset email requested", body = ApiMessage),
        (status = 400, description = "Invalid email", body = ApiMessage)
    )
)]
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<ApiMessage>, PageError> {
    validate_reset_request(&payload)?;
    let message = state
        .backend
        .request_password_reset(payload.email.trim())
        .await?;
    Ok(Json(ApiMessage::ok(message)))
}

/// reset_password_page
///
/// [Public Route] Describes the new-password form for a reset token.
#[utoipa::path(
    get,
    path = "/reset-password/{token}",
    params(("token" = String, Path, description = "One-time reset token from the email")),
    responses((status = 200, description = "New password form", body = FormView))
)]
pub async fn reset_password_page(Path(token): Path<String>) -> Json<FormView> {
    let action = format!("/reset-password/{}", urlencoding::encode(&token));
    Json(FormView::new(
        "reset-password",
        &action,
        &["password", "confirmPassword"],
    ))
}

/// reset_password
///
/// [Public Route] Sets a new password using the one-time token.
#[utoipa::path(
    post,
    path = "/reset-password/{token}",
    params(("token" = String, Path, description = "One-time reset token from the email")),
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = ApiMessage),
        (status = 400, description = "Invalid form or token", body = ApiMessage)
    )
)]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<ApiMessage>, PageError> {
    validate_password_reset(&payload)?;
    let message = state
        .backend
        .reset_password(&token, &payload.password)
        .await?;
    Ok(Json(ApiMessage::ok(message)))
}

// --- Unclassified Pages ---

/// home
///
/// [Open Route] Storefront landing with a selection of featured products.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Landing page", body = LandingView))
)]
pub async fn home(State(state): State<AppState>) -> Result<Json<LandingView>, PageError> {
    let products = state.backend.list_products(None, None).await?;
    let mut featured = product_views(products, &state.config.api_base_url);
    featured.truncate(FEATURED_PRODUCTS);
    Ok(Json(LandingView { featured }))
}

/// logout
///
/// [Open Route] Clears the session and cart cookies, then redirects to the login page.
#[utoipa::path(
    post,
    path = "/logout",
    responses((status = 303, description = "Signed out; redirect to login"))
)]
pub async fn logout(State(state): State<AppState>) -> Result<Response, PageError> {
    tracing::debug!("clearing session cookies");
    sign_out(&state)
}

/// not_found
///
/// Fallback for paths no route matches.
pub async fn not_found() -> PageError {
    PageError::NotFound("Page not found".to_string())
}

// --- Customer Pages ---

/// dashboard
///
/// [Authenticated Route] Greeting plus the product grid, optionally filtered by name.
#[utoipa::path(
    get,
    path = "/dashboard",
    params(ProductSearch),
    responses((status = 200, description = "Customer dashboard", body = DashboardView))
)]
pub async fn dashboard(
    session: AuthSession,
    State(state): State<AppState>,
    Query(query): Query<ProductSearch>,
) -> Result<Json<DashboardView>, PageError> {
    let products = state.backend.list_products(None, None).await?;
    let mut products = product_views(products, &state.config.api_base_url);

    if let Some(term) = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|term| !term.is_empty())
    {
        let term = term.to_lowercase();
        products.retain(|product| product.name.to_lowercase().contains(&term));
    }

    Ok(Json(DashboardView {
        greeting: format!("Welcome back, {}", session.user.display_name()),
        products,
    }))
}

/// categories
///
/// [Authenticated Route] Products grouped by category, groups sorted by name.
#[utoipa::path(
    get,
    path = "/categories",
    responses((status = 200, description = "Catalog by category", body = [CategoryGroup]))
)]
pub async fn categories(
    _session: AuthSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryGroup>>, PageError> {
    let products = state.backend.list_products(None, None).await?;

    let mut groups: BTreeMap<String, Vec<ProductView>> = BTreeMap::new();
    for view in product_views(products, &state.config.api_base_url) {
        groups.entry(view.category.clone()).or_default().push(view);
    }

    Ok(Json(
        groups
            .into_iter()
            .map(|(category, products)| CategoryGroup { category, products })
            .collect(),
    ))
}

/// category_product
///
/// [Authenticated Route] Detail page of a single product.
#[utoipa::path(
    get,
    path = "/categories/{id}",
    params(("id" = String, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product", body = ProductView),
        (status = 404, description = "Unknown product", body = ApiMessage)
    )
)]
pub async fn category_product(
    session: AuthSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProductView>, PageError> {
    let product = state.backend.get_product(Some(&session.token), &id).await?;
    Ok(Json(ProductView::from_product(
        product,
        &state.config.api_base_url,
    )))
}

/// view_cart
///
/// [Authenticated Route] Basket contents and totals, read from the `cart` cookie.
#[utoipa::path(
    get,
    path = "/cart",
    responses((status = 200, description = "Cart", body = CartView))
)]
pub async fn view_cart(
    session: AuthSession,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, PageError> {
    cart_response(&state, &session.token, load_cart(&state, &headers)).await
}

/// add_to_cart
///
/// [Authenticated Route] Adds one unit of a product, merging with an existing line.
#[utoipa::path(
    post,
    path = "/cart/items",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Updated cart", body = CartView),
        (status = 404, description = "Unknown product", body = ApiMessage)
    )
)]
pub async fn add_to_cart(
    session: AuthSession,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<AddToCartRequest>,
) -> Result<Response, PageError> {
    let product = state
        .backend
        .get_product(Some(&session.token), &payload.product_id)
        .await?;

    let mut cart = load_cart(&state, &headers);
    cart.add(&product.id);
    cart_response(&state, &session.token, cart).await
}

/// update_cart_item
///
/// [Authenticated Route] Changes a line's quantity by `delta`; never below one unit.
#[utoipa::path(
    patch,
    path = "/cart/items/{id}",
    params(("id" = String, Path, description = "Product id")),
    request_body = QuantityChange,
    responses(
        (status = 200, description = "Updated cart", body = CartView),
        (status = 404, description = "Not in cart", body = ApiMessage)
    )
)]
pub async fn update_cart_item(
    session: AuthSession,
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<QuantityChange>,
) -> Result<Response, PageError> {
    let mut cart = load_cart(&state, &headers);
    if !cart.change_quantity(&id, payload.delta) {
        return Err(PageError::NotFound("Item is not in your cart".to_string()));
    }
    cart_response(&state, &session.token, cart).await
}

/// remove_cart_item
///
/// [Authenticated Route] Drops a line from the basket.
#[utoipa::path(
    delete,
    path = "/cart/items/{id}",
    params(("id" = String, Path, description = "Product id")),
    responses(
        (status = 200, description = "Updated cart", body = CartView),
        (status = 404, description = "Not in cart", body = ApiMessage)
    )
)]
pub async fn remove_cart_item(
    session: AuthSession,
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, PageError> {
    let mut cart = load_cart(&state, &headers);
    if !cart.remove(&id) {
        return Err(PageError::NotFound("Item is not in your cart".to_string()));
    }
    cart_response(&state, &session.token, cart).await
}

/// clear_cart
///
/// [Authenticated Route] Empties the basket.
#[utoipa::path(
    delete,
    path = "/cart",
    responses((status = 200, description = "Empty cart", body = CartView))
)]
pub async fn clear_cart(
    session: AuthSession,
    State(state): State<AppState>,
) -> Result<Response, PageError> {
    cart_response(&state, &session.token, Cart::default()).await
}

/// checkout_page
///
/// [Authenticated Route] Order summary shown next to the shipping form.
#[utoipa::path(
    get,
    path = "/orderDetail",
    responses((status = 200, description = "Checkout summary", body = CartView))
)]
pub async fn checkout_page(
    session: AuthSession,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, PageError> {
    cart_response(&state, &session.token, load_cart(&state, &headers)).await
}

/// checkout
///
/// [Authenticated Route] Places the order for the current basket and empties it.
/// Prices are recomputed by the backend; only ids and quantities are sent.
#[utoipa::path(
    post,
    path = "/orderDetail",
    request_body = ShippingAddress,
    responses(
        (status = 201, description = "Order placed", body = OrderPlaced),
        (status = 400, description = "Empty cart or incomplete address", body = ApiMessage)
    )
)]
pub async fn checkout(
    session: AuthSession,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(address): Json<ShippingAddress>,
) -> Result<Response, PageError> {
    let mut cart = load_cart(&state, &headers);
    hydrate_cart(&state, &session.token, &mut cart).await?;
    if cart.is_empty() {
        return Err(PageError::Validation("Your cart is empty".to_string()));
    }
    validate_shipping(&address)?;

    let order = NewOrder {
        products: cart.order_lines(),
        shipping_address: address,
    };
    let placed = state.backend.create_order(&session.token, &order).await?;
    tracing::info!(order_id = %placed.order.id, lines = order.products.len(), "order placed");

    cart.clear();
    let cookie = cart_cookie(&state.config.cookies, &cart)?;
    Ok((StatusCode::CREATED, AppendHeaders([cookie]), Json(placed)).into_response())
}

/// my_orders
///
/// [Authenticated Route] The signed-in customer's order history.
#[utoipa::path(
    get,
    path = "/orders",
    responses((status = 200, description = "My orders", body = [Order]))
)]
pub async fn my_orders(
    session: AuthSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<Order>>, PageError> {
    Ok(Json(state.backend.my_orders(&session.token).await?))
}

/// profile
///
/// [Authenticated Route] Refreshes the user record from the backend and rewrites the
/// `user_data` cookie. An unreadable stored record or a token the backend no longer
/// accepts signs the visitor out.
#[utoipa::path(
    get,
    path = "/user/profile",
    responses(
        (status = 200, description = "Profile", body = ProfileView),
        (status = 303, description = "Session unusable; cookies cleared, redirect to login")
    )
)]
pub async fn profile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, PageError> {
    let session = state
        .gate
        .resolver
        .resolve_session(&RequestCookies::new(&headers))
        .filter(|session| session.user.id.is_some() || session.user.email.is_some());
    let Some(session) = session else {
        tracing::warn!("stored user record is unreadable; signing out");
        return sign_out(&state);
    };

    match state.backend.whoami(&session.token).await {
        Ok(user) => {
            let cookie = user_cookie(&state.config.cookies, &user)?;
            let view = ProfileView {
                display_name: user.display_name().to_string(),
                user,
            };
            Ok((AppendHeaders([cookie]), Json(view)).into_response())
        }
        Err(BackendError::Rejected { status, .. }) if status == StatusCode::UNAUTHORIZED => {
            tracing::info!("backend rejected the stored token; signing out");
            sign_out(&state)
        }
        Err(e) => Err(e.into()),
    }
}

/// update_profile
///
/// [Authenticated Route] Saves profile edits and rewrites the `user_data` cookie.
#[utoipa::path(
    put,
    path = "/user/profile",
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Updated profile", body = ProfileView),
        (status = 400, description = "Invalid form", body = ApiMessage)
    )
)]
pub async fn update_profile(
    session: AuthSession,
    State(state): State<AppState>,
    Json(payload): Json<ProfileUpdate>,
) -> Result<Response, PageError> {
    if payload.email.as_deref().is_some_and(|email| !valid_email(email)) {
        return Err(PageError::Validation("Enter a valid email".to_string()));
    }

    let user = state
        .backend
        .update_profile(&session.token, &payload)
        .await?;
    let cookie = user_cookie(&state.config.cookies, &user)?;
    let view = ProfileView {
        display_name: user.display_name().to_string(),
        user,
    };
    Ok((AppendHeaders([cookie]), Json(view)).into_response())
}

// --- Admin Console ---

/// admin_overview
///
/// [Admin Route] Counters for the admin landing page: accounts by role, catalog size and
/// order backlog.
#[utoipa::path(
    get,
    path = "/admin",
    responses(
        (status = 200, description = "Admin overview", body = AdminOverview),
        (status = 403, description = "Forbidden", body = ApiMessage)
    )
)]
pub async fn admin_overview(
    session: AuthSession,
    State(state): State<AppState>,
) -> Result<Json<AdminOverview>, PageError> {
    session.require_admin()?;
    let token = session.token.as_str();

    let (users, orders, products) = tokio::try_join!(
        state.backend.list_users(token, 1, OVERVIEW_USER_LIMIT, None),
        state.backend.all_orders(token),
        state.backend.list_products(None, None),
    )?;

    let total_users = users.pagination.total_items.max(users.users.len() as u64);
    let admin_count = users
        .users
        .iter()
        .filter(|user| user.role == Role::Admin)
        .count() as u64;

    Ok(Json(AdminOverview {
        total_users,
        admin_count,
        customer_count: total_users.saturating_sub(admin_count),
        total_products: products.len() as u64,
        total_orders: orders.len() as u64,
        pending_orders: orders
            .iter()
            .filter(|order| order.status.eq_ignore_ascii_case("pending"))
            .count() as u64,
    }))
}

/// list_users
///
/// [Admin Route] Paged, searchable account table (defaults: page 1, 7 rows).
#[utoipa::path(
    get,
    path = "/admin/users",
    params(UserListQuery),
    responses(
        (status = 200, description = "Accounts", body = UserPage),
        (status = 403, description = "Forbidden", body = ApiMessage)
    )
)]
pub async fn list_users(
    session: AuthSession,
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<UserPage>, PageError> {
    session.require_admin()?;
    let page = state
        .backend
        .list_users(&session.token, query.page(), query.size(), query.search())
        .await?;
    Ok(Json(page))
}

/// create_user
///
/// [Admin Route] Creates an account with an explicit role.
#[utoipa::path(
    post,
    path = "/admin/users",
    request_body(content(
        (CreateUserRequest = "application/json"),
        (CreateUserRequest = "multipart/form-data")
    )),
    responses(
        (status = 201, description = "Account created", body = AdminUser),
        (status = 400, description = "Invalid form", body = ApiMessage),
        (status = 403, description = "Forbidden", body = ApiMessage)
    )
)]
pub async fn create_user(
    session: AuthSession,
    State(state): State<AppState>,
    form: AdminForm<CreateUserRequest>,
) -> Result<(StatusCode, Json<AdminUser>), PageError> {
    session.require_admin()?;
    validate_new_user(&form.payload)?;
    let user = state
        .backend
        .create_user(&session.token, &form.payload, form.image.as_ref())
        .await?;
    tracing::info!(user_id = %user.id, role = user.role.as_str(), "account created by admin");
    Ok((StatusCode::CREATED, Json(user)))
}

/// get_user
///
/// [Admin Route] A single account.
#[utoipa::path(
    get,
    path = "/admin/users/{id}",
    params(("id" = String, Path, description = "Account id")),
    responses(
        (status = 200, description = "Account", body = AdminUser),
        (status = 404, description = "Unknown account", body = ApiMessage)
    )
)]
pub async fn get_user(
    session: AuthSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AdminUser>, PageError> {
    session.require_admin()?;
    Ok(Json(state.backend.get_user(&session.token, &id).await?))
}

/// update_user
///
/// [Admin Route] Edits an account, including its role.
#[utoipa::path(
    put,
    path = "/admin/users/{id}",
    params(("id" = String, Path, description = "Account id")),
    request_body(content(
        (UpdateUserRequest = "application/json"),
        (UpdateUserRequest = "multipart/form-data")
    )),
    responses(
        (status = 200, description = "Updated account", body = AdminUser),
        (status = 400, description = "Invalid form", body = ApiMessage)
    )
)]
pub async fn update_user(
    session: AuthSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
    form: AdminForm<UpdateUserRequest>,
) -> Result<Json<AdminUser>, PageError> {
    session.require_admin()?;
    let payload = &form.payload;
    if payload.email.as_deref().is_some_and(|email| !valid_email(email)) {
        return Err(PageError::Validation("Enter a valid email".to_string()));
    }
    Ok(Json(
        state
            .backend
            .update_user(&session.token, &id, payload, form.image.as_ref())
            .await?,
    ))
}

/// delete_user
///
/// [Admin Route] Removes an account.
#[utoipa::path(
    delete,
    path = "/admin/users/{id}",
    params(("id" = String, Path, description = "Account id")),
    responses(
        (status = 200, description = "Deleted", body = ApiMessage),
        (status = 404, description = "Unknown account", body = ApiMessage)
    )
)]
pub async fn delete_user(
    session: AuthSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiMessage>, PageError> {
    session.require_admin()?;
    let message = state.backend.delete_user(&session.token, &id).await?;
    tracing::info!(user_id = %id, "account deleted by admin");
    Ok(Json(ApiMessage::ok(message)))
}

/// list_products
///
/// [Admin Route] The full catalog for the product table.
#[utoipa::path(
    get,
    path = "/admin/products",
    responses((status = 200, description = "Catalog", body = [ProductView]))
)]
pub async fn list_products(
    session: AuthSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<ProductView>>, PageError> {
    session.require_admin()?;
    let products = state
        .backend
        .list_products(Some(1), Some(ADMIN_PRODUCT_PAGE_SIZE))
        .await?;
    Ok(Json(product_views(products, &state.config.api_base_url)))
}

/// create_product
///
/// [Admin Route] Adds a catalog entry.
#[utoipa::path(
    post,
    path = "/admin/products",
    request_body(content(
        (CreateProductRequest = "application/json"),
        (CreateProductRequest = "multipart/form-data")
    )),
    responses(
        (status = 201, description = "Product created", body = ProductView),
        (status = 400, description = "Invalid form", body = ApiMessage)
    )
)]
pub async fn create_product(
    session: AuthSession,
    State(state): State<AppState>,
    form: AdminForm<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductView>), PageError> {
    session.require_admin()?;
    validate_product(&form.payload)?;
    let product = state
        .backend
        .create_product(&session.token, &form.payload, form.image.as_ref())
        .await?;
    tracing::info!(product_id = %product.id, image = ?product.image, "product created by admin");
    Ok((
        StatusCode::CREATED,
        Json(ProductView::from_product(
            product,
            &state.config.api_base_url,
        )),
    ))
}

/// get_product
///
/// [Admin Route] A single catalog entry.
#[utoipa::path(
    get,
    path = "/admin/products/{id}",
    params(("id" = String, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product", body = ProductView),
        (status = 404, description = "Unknown product", body = ApiMessage)
    )
)]
pub async fn get_product(
    session: AuthSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProductView>, PageError> {
    session.require_admin()?;
    let product = state.backend.get_product(Some(&session.token), &id).await?;
    Ok(Json(ProductView::from_product(
        product,
        &state.config.api_base_url,
    )))
}

/// update_product
///
/// [Admin Route] Partial edit of a catalog entry.
#[utoipa::path(
    put,
    path = "/admin/products/{id}",
    params(("id" = String, Path, description = "Product id")),
    request_body(content(
        (UpdateProductRequest = "application/json"),
        (UpdateProductRequest = "multipart/form-data")
    )),
    responses(
        (status = 200, description = "Updated product", body = ProductView),
        (status = 400, description = "Invalid form", body = ApiMessage)
    )
)]
pub async fn update_product(
    session: AuthSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
    form: AdminForm<UpdateProductRequest>,
) -> Result<Json<ProductView>, PageError> {
    session.require_admin()?;
    let payload = &form.payload;
    if payload.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
        return Err(PageError::Validation("Product name is required".to_string()));
    }
    if payload
        .price
        .is_some_and(|price| !price.is_finite() || price < 0.0)
    {
        return Err(PageError::Validation(
            "Price must be a positive number".to_string(),
        ));
    }

    let product = state
        .backend
        .update_product(&session.token, &id, payload, form.image.as_ref())
        .await?;
    Ok(Json(ProductView::from_product(
        product,
        &state.config.api_base_url,
    )))
}

/// delete_product
///
/// [Admin Route] Removes a catalog entry.
#[utoipa::path(
    delete,
    path = "/admin/products/{id}",
    params(("id" = String, Path, description = "Product id")),
    responses(
        (status = 200, description = "Deleted", body = ApiMessage),
        (status = 404, description = "Unknown product", body = ApiMessage)
    )
)]
pub async fn delete_product(
    session: AuthSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiMessage>, PageError> {
    session.require_admin()?;
    let message = state.backend.delete_product(&session.token, &id).await?;
    Ok(Json(ApiMessage::ok(message)))
}

/// list_orders
///
/// [Admin Route] Every order in the store.
#[utoipa::path(
    get,
    path = "/admin/orders",
    responses((status = 200, description = "All orders", body = [Order]))
)]
pub async fn list_orders(
    session: AuthSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<Order>>, PageError> {
    session.require_admin()?;
    Ok(Json(state.backend.all_orders(&session.token).await?))
}

/// confirm_order
///
/// [Admin Route] Marks an order as confirmed.
#[utoipa::path(
    put,
    path = "/admin/orders/{id}/confirm",
    params(("id" = String, Path, description = "Order id")),
    responses(
        (status = 200, description = "Confirmed order", body = Order),
        (status = 404, description = "Unknown order", body = ApiMessage)
    )
)]
pub async fn confirm_order(
    session: AuthSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Order>, PageError> {
    session.require_admin()?;
    let order = state
        .backend
        .update_order_status(&session.token, &id, ORDER_CONFIRMED)
        .await?;
    tracing::info!(order_id = %order.id, "order confirmed");
    Ok(Json(order))
}
