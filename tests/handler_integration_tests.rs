use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Method, Request, StatusCode, header},
    response::{IntoResponse, Response},
};
use freshpicks_storefront::{
    AppConfig, AppState, BackendState, MockBackend,
    auth::{AuthSession, cart_cookie},
    backend::LoginOutcome,
    cart::{Cart, CartView},
    create_router,
    error::PageError,
    handlers,
    models::{
        AdminOverview, ApiMessage, CategoryGroup, DashboardView, FormView, LandingView,
        OrderPlaced, Product, ProfileView, UserPage,
    },
    session::Role,
};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use tracing_subscriber::fmt::MakeWriter;

// --- TEST UTILITIES ---

struct TestApp {
    router: Router,
    backend: Arc<MockBackend>,
}

impl TestApp {
    fn new() -> Self {
        Self::with_backend(MockBackend::new())
    }

    fn with_backend(backend: MockBackend) -> Self {
        let backend = Arc::new(backend);
        let state = create_test_state(backend.clone());
        Self {
            router: create_router(state),
            backend,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    fn customer(&self) -> LoginOutcome {
        self.backend
            .add_account("shopper@freshpicks.test", "shopper123", Role::User)
    }

    fn admin(&self) -> LoginOutcome {
        self.backend
            .add_account("admin@freshpicks.test", "admin123", Role::Admin)
    }

    fn apple(&self) -> Product {
        self.backend.add_product(Product {
            name: "Organic Apples".to_string(),
            category: Some("Fruits".to_string()),
            price: Some(180.0),
            quantity: Some(40),
            image: Some("apple.jpg".to_string()),
            ..Product::default()
        })
    }
}

fn create_test_state(backend: Arc<MockBackend>) -> AppState {
    AppState::new(AppConfig::default(), backend as BackendState)
}

/// Cookie header carrying a credential pair, encoded the way the login flow writes it.
fn session_cookie(outcome: &LoginOutcome) -> String {
    let user = serde_json::to_string(&outcome.user).unwrap();
    format!(
        "auth_token={}; user_data={}",
        urlencoding::encode(&outcome.token),
        urlencoding::encode(&user)
    )
}

fn get(path: &str, cookie: Option<&str>) -> Request<Body> {
    request(Method::GET, path, cookie, None)
}

fn request(method: Method, path: &str, cookie: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

const BOUNDARY: &str = "freshpicks-form-boundary";

/// A `multipart/form-data` request with text fields and an optional `image` file.
fn multipart_request(
    method: Method,
    path: &str,
    cookie: &str,
    fields: &[(&str, &str)],
    image: Option<(&str, &str, &[u8])>,
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, content_type, bytes)) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(method)
        .uri(path)
        .header(header::COOKIE, cookie)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_json<T: DeserializeOwned>(response: Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(str::to_string)
        .collect()
}

/// The `name=value` pair of a Set-Cookie header, ready to be sent back.
fn cookie_pair(response: &Response, name: &str) -> String {
    set_cookies(response)
        .into_iter()
        .find(|cookie| cookie.starts_with(&format!("{name}=")))
        .and_then(|cookie| cookie.split(';').next().map(str::to_string))
        .unwrap_or_default()
}

fn shipping() -> Value {
    json!({
        "fullName": "Asha Gurung",
        "phone": "9800000000",
        "street": "Lakeside 6",
        "city": "Pokhara"
    })
}

// --- NAVIGATION GATE THROUGH THE ROUTER ---

#[tokio::test]
async fn test_anonymous_visitor_is_redirected_from_protected_pages() {
    let app = TestApp::new();

    for path in ["/dashboard", "/cart", "/orders", "/user/profile", "/admin/users"] {
        let response = app.send(get(path, None)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{path}");
        assert_eq!(location(&response), "/login", "{path}");
    }
}

#[tokio::test]
async fn test_customer_is_kept_out_of_admin_console() {
    let app = TestApp::new();
    let cookie = session_cookie(&app.customer());

    let response = app.send(get("/admin/users", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard");
}

#[tokio::test]
async fn test_signed_in_visitors_are_sent_away_from_login() {
    let app = TestApp::new();

    let admin = session_cookie(&app.admin());
    let response = app.send(get("/login", Some(&admin))).await;
    assert_eq!(location(&response), "/admin");

    let customer = session_cookie(&app.customer());
    let response = app.send(get("/register", Some(&customer))).await;
    assert_eq!(location(&response), "/dashboard");
}

#[tokio::test]
async fn test_admin_can_open_customer_pages() {
    let app = TestApp::new();
    app.apple();
    let cookie = session_cookie(&app.admin());

    let response = app.send(get("/dashboard", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let view: DashboardView = body_json(response).await;
    assert_eq!(view.products.len(), 1);
}

#[tokio::test]
async fn test_corrupt_user_cookie_is_treated_as_signed_out() {
    let app = TestApp::new();
    let cookie = "auth_token=abc; user_data=undefined";

    let response = app.send(get("/dashboard", Some(cookie))).await;
    assert_eq!(location(&response), "/login");

    // The login page itself stays reachable: no redirect loop.
    let response = app.send(get("/login", Some(cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_page_expires_unusable_credential_pair() {
    let app = TestApp::new();

    for cookie in [
        "auth_token=abc; user_data=undefined",
        "auth_token=abc",
        "user_data=%7B%22_id%22%3A%22u1%22%7D",
    ] {
        let response = app.send(get("/dashboard", Some(cookie))).await;
        assert_eq!(location(&response), "/login", "{cookie}");

        let response = app.send(get("/login", Some(cookie))).await;
        assert_eq!(response.status(), StatusCode::OK, "{cookie}");
        let cleared = set_cookies(&response);
        assert_eq!(cleared.len(), 3, "{cookie}");
        assert!(
            cleared
                .iter()
                .any(|c| c.starts_with("auth_token=;") && c.contains("Max-Age=0"))
        );
        let form: FormView = body_json(response).await;
        assert_eq!(form.action, "/login");
    }

    // Visitors without any credential cookie get the plain form.
    let response = app.send(get("/login", Some("theme=dark"))).await;
    assert!(set_cookies(&response).is_empty());
}

/// Log sink for asserting on the gate's decision log.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[tokio::test]
async fn test_gate_logs_allowed_navigation() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(logs.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let app = TestApp::new();
    let cookie = session_cookie(&app.customer());
    let response = app.send(get("/dashboard", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let output = logs.contents();
    let allowed = output
        .lines()
        .find(|line| line.contains("navigation allowed"))
        .unwrap_or_default();
    assert!(allowed.contains("/dashboard"), "{output}");
    assert!(allowed.contains("User"), "{output}");
}

#[tokio::test]
async fn test_open_pages_need_no_session() {
    let app = TestApp::new();
    app.apple();

    let response = app.send(get("/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.send(get("/", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let landing: LandingView = body_json(response).await;
    assert_eq!(landing.featured.len(), 1);
    assert_eq!(
        landing.featured[0].image_url.as_deref(),
        Some("http://localhost:5000/uploads/products/apple.jpg")
    );
}

#[tokio::test]
async fn test_unknown_admin_path_is_still_gated() {
    let app = TestApp::new();

    let response = app.send(get("/admin/reports", None)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    let cookie = session_cookie(&app.admin());
    let response = app.send(get("/admin/reports", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// --- AUTHENTICATION FLOWS ---

#[tokio::test]
async fn test_login_writes_credential_pair_and_redirects_by_role() {
    let app = TestApp::new();
    app.customer();
    app.admin();

    let response = app
        .send(request(
            Method::POST,
            "/login",
            None,
            Some(json!({ "email": "shopper@freshpicks.test", "password": "shopper123" })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard");

    let cookies = set_cookies(&response);
    assert!(cookies.iter().any(|c| c.starts_with("auth_token=") && c.contains("HttpOnly")));
    assert!(cookies.iter().any(|c| c.starts_with("user_data=")));

    // The written pair is accepted by the gate on the next navigation.
    let cookie = format!(
        "{}; {}",
        cookie_pair(&response, "auth_token"),
        cookie_pair(&response, "user_data")
    );
    let next = app.send(get("/dashboard", Some(&cookie))).await;
    assert_eq!(next.status(), StatusCode::OK);

    let response = app
        .send(request(
            Method::POST,
            "/login",
            None,
            Some(json!({ "email": "ADMIN@freshpicks.test", "password": "admin123" })),
        ))
        .await;
    assert_eq!(location(&response), "/admin");
}

#[tokio::test]
async fn test_login_failures_report_a_message() {
    let app = TestApp::new();
    app.customer();

    let response = app
        .send(request(
            Method::POST,
            "/login",
            None,
            Some(json!({ "email": "shopper@freshpicks.test", "password": "wrong-pass" })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: ApiMessage = body_json(response).await;
    assert!(!body.success);
    assert_eq!(body.message, "Invalid credentials");

    let response = app
        .send(request(
            Method::POST,
            "/login",
            None,
            Some(json!({ "email": "not-an-email", "password": "shopper123" })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ApiMessage = body_json(response).await;
    assert_eq!(body.message, "Enter a valid email");
}

#[tokio::test]
async fn test_register_then_duplicate_email() {
    let app = TestApp::new();
    let payload = json!({
        "fullName": "Asha Gurung",
        "username": "asha",
        "email": "asha@freshpicks.test",
        "phoneNumber": "9800000000",
        "password": "secret1",
        "confirmPassword": "secret1"
    });

    let response = app
        .send(request(Method::POST, "/register", None, Some(payload.clone())))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .send(request(Method::POST, "/register", None, Some(payload)))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: ApiMessage = body_json(response).await;
    assert_eq!(body.message, "Email already exists");
}

#[tokio::test]
async fn test_password_reset_flow() {
    let app = TestApp::new();
    app.customer();

    let response = app
        .send(request(
            Method::POST,
            "/forget-password",
            None,
            Some(json!({ "email": "shopper@freshpicks.test" })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let token = app
        .backend
        .reset_token_for("shopper@freshpicks.test")
        .unwrap();
    let response = app
        .send(request(
            Method::POST,
            &format!("/reset-password/{token}"),
            None,
            Some(json!({ "password": "fresh-pass", "confirmPassword": "fresh-pass" })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .send(request(
            Method::POST,
            "/login",
            None,
            Some(json!({ "email": "shopper@freshpicks.test", "password": "fresh-pass" })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_logout_clears_every_cookie() {
    let app = TestApp::new();
    let cookie = session_cookie(&app.customer());

    let response = app
        .send(request(Method::POST, "/logout", Some(&cookie), None))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    let cookies = set_cookies(&response);
    for name in ["auth_token", "user_data", "cart"] {
        assert!(
            cookies
                .iter()
                .any(|c| c.starts_with(&format!("{name}=;")) && c.contains("Max-Age=0")),
            "{name} not cleared"
        );
    }
}

// --- CATALOG, CART AND CHECKOUT ---

#[tokio::test]
async fn test_dashboard_search_and_categories() {
    let app = TestApp::new();
    app.apple();
    app.backend.add_product(Product {
        name: "Whole Milk".to_string(),
        category: Some("Dairy".to_string()),
        price: Some(110.0),
        ..Product::default()
    });
    app.backend.add_product(Product {
        name: "Mystery Box".to_string(),
        ..Product::default()
    });
    let cookie = session_cookie(&app.customer());

    let response = app.send(get("/dashboard?search=MILK", Some(&cookie))).await;
    let view: DashboardView = body_json(response).await;
    assert_eq!(view.products.len(), 1);
    assert_eq!(view.products[0].name, "Whole Milk");
    assert_eq!(view.greeting, "Welcome back, shopper");

    let response = app.send(get("/categories", Some(&cookie))).await;
    let groups: Vec<CategoryGroup> = body_json(response).await;
    let names: Vec<&str> = groups.iter().map(|g| g.category.as_str()).collect();
    assert_eq!(names, ["Dairy", "Fruits", "Other"]);
}

#[tokio::test]
async fn test_cart_and_checkout_flow() {
    let app = TestApp::new();
    let apple = app.apple();
    let session = session_cookie(&app.customer());

    // Add twice: one line, quantity two.
    let response = app
        .send(request(
            Method::POST,
            "/cart/items",
            Some(&session),
            Some(json!({ "productId": apple.id })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cart = cookie_pair(&response, "cart");

    let response = app
        .send(request(
            Method::POST,
            "/cart/items",
            Some(&format!("{session}; {cart}")),
            Some(json!({ "productId": apple.id })),
        ))
        .await;
    let cart = cookie_pair(&response, "cart");
    let view: CartView = body_json(response).await;
    assert_eq!(view.lines.len(), 1);
    assert_eq!(view.item_count, 2);
    assert_eq!(view.totals.subtotal, 360.0);
    assert_eq!(view.totals.total, 400.0);

    // Quantity never drops below one.
    let response = app
        .send(request(
            Method::PATCH,
            &format!("/cart/items/{}", apple.id),
            Some(&format!("{session}; {cart}")),
            Some(json!({ "delta": -10 })),
        ))
        .await;
    let cart = cookie_pair(&response, "cart");
    let view: CartView = body_json(response).await;
    assert_eq!(view.lines[0].quantity, 1);

    // Checkout places the order and empties the basket.
    let response = app
        .send(request(
            Method::POST,
            "/orderDetail",
            Some(&format!("{session}; {cart}")),
            Some(shipping()),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(cookie_pair(&response, "cart"), "cart=%5B%5D");
    let placed: OrderPlaced = body_json(response).await;
    assert_eq!(placed.order.products.len(), 1);
    assert_eq!(placed.order.total_amount, 180.0);

    let orders = app.backend.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, "pending");
}

#[tokio::test]
async fn test_checkout_rejects_empty_cart_and_blank_address() {
    let app = TestApp::new();
    let apple = app.apple();
    let session = session_cookie(&app.customer());

    let response = app
        .send(request(Method::POST, "/orderDetail", Some(&session), Some(shipping())))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ApiMessage = body_json(response).await;
    assert_eq!(body.message, "Your cart is empty");

    let response = app
        .send(request(
            Method::POST,
            "/cart/items",
            Some(&session),
            Some(json!({ "productId": apple.id })),
        ))
        .await;
    let cart = cookie_pair(&response, "cart");

    let response = app
        .send(request(
            Method::POST,
            "/orderDetail",
            Some(&format!("{session}; {cart}")),
            Some(json!({ "fullName": "Asha", "phone": "", "street": "x", "city": "y" })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ApiMessage = body_json(response).await;
    assert_eq!(body.message, "Please fill all fields");
    assert!(app.backend.orders().is_empty());
}

#[tokio::test]
async fn test_removing_unknown_cart_line_is_not_found() {
    let app = TestApp::new();
    let session = session_cookie(&app.customer());

    let response = app
        .send(request(
            Method::DELETE,
            "/cart/items/missing",
            Some(&session),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_large_basket_cookie_stays_under_browser_limit() {
    let app = TestApp::new();
    let session = session_cookie(&app.customer());
    let mut cart = String::new();

    for i in 0..17 {
        let product = app.backend.add_product(Product {
            id: format!("65f1c0ffee{i:014x}"),
            name: format!("Hand-picked seasonal produce box number {i} with a long label"),
            description: Some("x".repeat(300)),
            price: Some(250.0),
            image: Some(format!("seasonal-produce-box-{i}-large-photo.jpg")),
            ..Product::default()
        });
        let cookie = if cart.is_empty() {
            session.clone()
        } else {
            format!("{session}; {cart}")
        };
        let response = app
            .send(request(
                Method::POST,
                "/cart/items",
                Some(&cookie),
                Some(json!({ "productId": product.id })),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK, "item {i}");
        let header = set_cookies(&response)
            .into_iter()
            .find(|c| c.starts_with("cart="))
            .unwrap();
        assert!(header.len() < 4096, "item {i}: {} bytes", header.len());
        cart = cookie_pair(&response, "cart");
    }

    let response = app.send(get("/cart", Some(&format!("{session}; {cart}")))).await;
    let view: CartView = body_json(response).await;
    assert_eq!(view.lines.len(), 17);
    assert_eq!(view.totals.subtotal, 17.0 * 250.0);
    assert!(view.lines[0].name.starts_with("Hand-picked"));
}

#[test]
fn test_oversized_basket_is_refused() {
    let mut cart = Cart::default();
    for i in 0..150 {
        cart.add(&format!("65f1c0ffee{i:014x}"));
    }

    let result = cart_cookie(&AppConfig::default().cookies, &cart);
    assert!(matches!(result, Err(PageError::Validation(_))));
}

#[tokio::test]
async fn test_vanished_products_drop_out_of_the_cart() {
    let app = TestApp::new();
    let apple = app.apple();
    let session = session_cookie(&app.customer());
    let cart = format!(
        "cart={}",
        urlencoding::encode(&format!(
            r#"[{{"_id":"{}","quantity":3}},{{"_id":"gone","quantity":1}}]"#,
            apple.id
        ))
    );

    let response = app.send(get("/cart", Some(&format!("{session}; {cart}")))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let rewritten = cookie_pair(&response, "cart");
    assert!(!rewritten.contains("gone"));
    let view: CartView = body_json(response).await;
    assert_eq!(view.lines.len(), 1);
    assert_eq!(view.item_count, 3);
    assert_eq!(view.totals.subtotal, 540.0);
}

// --- PROFILE ---

#[tokio::test]
async fn test_profile_refresh_rewrites_user_cookie() {
    let app = TestApp::new();
    let session = session_cookie(&app.customer());

    let response = app
        .send(request(
            Method::PUT,
            "/user/profile",
            Some(&session),
            Some(json!({ "fullName": "Asha Gurung" })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.send(get("/user/profile", Some(&session))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!cookie_pair(&response, "user_data").is_empty());
    let view: ProfileView = body_json(response).await;
    assert_eq!(view.display_name, "Asha Gurung");
}

#[tokio::test]
async fn test_profile_signs_out_when_backend_rejects_token() {
    let app = TestApp::new();
    let stale = LoginOutcome {
        token: "revoked-token".to_string(),
        ..app.customer()
    };

    let response = app
        .send(get("/user/profile", Some(&session_cookie(&stale))))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    assert!(
        set_cookies(&response)
            .iter()
            .any(|c| c.starts_with("auth_token=;") && c.contains("Max-Age=0"))
    );
}

#[tokio::test]
async fn test_profile_loader_clears_unreadable_user_record() {
    // Called directly: the stored record parses but identifies nobody.
    let app = TestApp::new();
    let state = create_test_state(app.backend.clone());
    let mut headers = HeaderMap::new();
    headers.insert(
        header::COOKIE,
        HeaderValue::from_static("auth_token=abc; user_data=%7B%7D"),
    );

    let response = handlers::profile(State(state), headers).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    assert_eq!(set_cookies(&response).len(), 3);
}

// --- ADMIN CONSOLE ---

#[tokio::test]
async fn test_user_table_defaults_to_seven_rows() {
    let app = TestApp::new();
    let admin = session_cookie(&app.admin());
    for i in 0..10 {
        app.backend
            .add_account(&format!("customer{i}@freshpicks.test"), "secret1", Role::User);
    }

    let response = app.send(get("/admin/users", Some(&admin))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let page: UserPage = body_json(response).await;
    assert_eq!(page.users.len(), 7);
    assert_eq!(page.pagination.page, 1);
    assert_eq!(page.pagination.total_items, 11);
    assert_eq!(page.pagination.total_pages, 2);

    let response = app
        .send(get("/admin/users?page=2&search=customer", Some(&admin)))
        .await;
    let page: UserPage = body_json(response).await;
    assert_eq!(page.users.len(), 3);
}

#[tokio::test]
async fn test_admin_overview_counts() {
    let app = TestApp::new();
    let apple = app.apple();
    let admin = session_cookie(&app.admin());
    let customer = session_cookie(&app.customer());

    let response = app
        .send(request(
            Method::POST,
            "/cart/items",
            Some(&customer),
            Some(json!({ "productId": apple.id })),
        ))
        .await;
    let cart = cookie_pair(&response, "cart");
    app.send(request(
        Method::POST,
        "/orderDetail",
        Some(&format!("{customer}; {cart}")),
        Some(shipping()),
    ))
    .await;

    let response = app.send(get("/admin", Some(&admin))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let overview: AdminOverview = body_json(response).await;
    assert_eq!(
        overview,
        AdminOverview {
            total_users: 2,
            admin_count: 1,
            customer_count: 1,
            total_products: 1,
            total_orders: 1,
            pending_orders: 1,
        }
    );
}

#[tokio::test]
async fn test_admin_creates_product_and_confirms_order() {
    let app = TestApp::new();
    let admin = session_cookie(&app.admin());
    let customer = session_cookie(&app.customer());

    let response = app
        .send(request(
            Method::POST,
            "/admin/products",
            Some(&admin),
            Some(json!({ "name": "Basil", "price": 30.0, "category": "Herbs", "quantity": 5 })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let product: Value = body_json(response).await;
    let product_id = product["id"].as_str().unwrap().to_string();

    let response = app
        .send(request(
            Method::POST,
            "/cart/items",
            Some(&customer),
            Some(json!({ "productId": product_id })),
        ))
        .await;
    let cart = cookie_pair(&response, "cart");
    let response = app
        .send(request(
            Method::POST,
            "/orderDetail",
            Some(&format!("{customer}; {cart}")),
            Some(shipping()),
        ))
        .await;
    let placed: OrderPlaced = body_json(response).await;

    let response = app
        .send(request(
            Method::PUT,
            &format!("/admin/orders/{}/confirm", placed.order.id),
            Some(&admin),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.backend.orders()[0].status, "confirmed");
}

#[tokio::test]
async fn test_admin_form_validation() {
    let app = TestApp::new();
    let admin = session_cookie(&app.admin());

    let response = app
        .send(request(
            Method::POST,
            "/admin/users",
            Some(&admin),
            Some(json!({
                "username": "ab",
                "email": "ab@freshpicks.test",
                "password": "secret1",
                "confirmPassword": "secret1"
            })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ApiMessage = body_json(response).await;
    assert_eq!(body.message, "Username must be at least 3 characters");
}

#[tokio::test]
async fn test_admin_creates_user_from_multipart_form() {
    let app = TestApp::new();
    let admin = session_cookie(&app.admin());

    let response = app
        .send(multipart_request(
            Method::POST,
            "/admin/users",
            &admin,
            &[
                ("fullName", "Bikash Thapa"),
                ("username", "bikash"),
                ("email", "bikash@freshpicks.test"),
                ("phoneNumber", "9811111111"),
                ("password", "secret1"),
                ("confirmPassword", "secret1"),
                ("role", "admin"),
            ],
            Some(("bikash.png", "image/png", &b"\x89PNG-avatar"[..])),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let user: Value = body_json(response).await;
    assert_eq!(user["fullName"], "Bikash Thapa");
    assert_eq!(user["phoneNumber"], "9811111111");
    assert_eq!(user["role"], "admin");
    assert_eq!(user["image"], "bikash.png");

    // The edit form is multipart too; fields left out stay untouched.
    let id = user["_id"].as_str().unwrap().to_string();
    let response = app
        .send(multipart_request(
            Method::PUT,
            &format!("/admin/users/{id}"),
            &admin,
            &[("fullName", "Bikash K. Thapa"), ("role", "user")],
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let user: Value = body_json(response).await;
    assert_eq!(user["fullName"], "Bikash K. Thapa");
    assert_eq!(user["role"], "user");
    assert_eq!(user["phoneNumber"], "9811111111");
    assert_eq!(user["image"], "bikash.png");
}

#[tokio::test]
async fn test_admin_product_forms_accept_image_uploads() {
    let app = TestApp::new();
    let admin = session_cookie(&app.admin());

    let response = app
        .send(multipart_request(
            Method::POST,
            "/admin/products",
            &admin,
            &[("name", "Basil"), ("quantity", "5"), ("price", "30")],
            Some(("basil.jpg", "image/jpeg", &b"jpeg-bytes"[..])),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let product: Value = body_json(response).await;
    assert_eq!(
        product["imageUrl"],
        "http://localhost:5000/uploads/products/basil.jpg"
    );
    let id = product["id"].as_str().unwrap().to_string();

    let response = app
        .send(multipart_request(
            Method::PUT,
            &format!("/admin/products/{id}"),
            &admin,
            &[("price", "35")],
            Some(("basil-new.jpg", "image/jpeg", &b"newer-jpeg"[..])),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let product: Value = body_json(response).await;
    assert_eq!(product["price"], 35.0);
    assert_eq!(product["name"], "Basil");
    assert_eq!(
        product["imageUrl"],
        "http://localhost:5000/uploads/products/basil-new.jpg"
    );

    // A price that is not a number is a form error, not a backend call.
    let response = app
        .send(multipart_request(
            Method::POST,
            "/admin/products",
            &admin,
            &[("name", "Dill"), ("price", "cheap")],
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ApiMessage = body_json(response).await;
    assert_eq!(body.message, "price must be a number");
}

#[tokio::test]
async fn test_admin_handlers_check_role_themselves() {
    // Called directly, bypassing the gate.
    let app = TestApp::new();
    let customer = app.customer();
    let state = create_test_state(app.backend.clone());
    let session = AuthSession {
        token: customer.token,
        user: customer.user,
    };

    let result = handlers::list_orders(session, State(state)).await;
    assert!(matches!(result, Err(PageError::Forbidden)));
}

// --- BACKEND FAILURES ---

#[tokio::test]
async fn test_unreachable_backend_maps_to_bad_gateway() {
    let app = TestApp::with_backend(MockBackend::new_failing());

    let response = app.send(get("/", None)).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: ApiMessage = body_json(response).await;
    assert!(!body.success);
    assert_eq!(
        body.message,
        "The store is unreachable right now. Please try again later."
    );
}

#[tokio::test]
async fn test_page_error_renders_message_body() {
    let response = PageError::NotFound("Product not found".to_string()).into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: ApiMessage = body_json(response).await;
    assert_eq!(body.message, "Product not found");

    let state = create_test_state(Arc::new(MockBackend::new()));
    let response = handlers::login_page(State(state), HeaderMap::new())
        .await
        .unwrap();
    let form: FormView = body_json(response).await;
    assert_eq!(form.action, "/login");
}
