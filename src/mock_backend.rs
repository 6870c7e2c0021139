//! In-process stand-in for the REST backend.
//!
//! Used by the handler tests and, with `MOCK_BACKEND=1` in local development, by the
//! binary itself so the storefront can be clicked through without the real API.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use axum::http::StatusCode;
use chrono::Utc;
use serde_json::Map;

use crate::{
    backend::{BackendApi, LoginOutcome},
    error::BackendError,
    models::{
        AdminUser, CreateProductRequest, CreateUserRequest, LoginRequest, NewOrder, Order,
        OrderCustomer, OrderLine, OrderPlaced, OrderProduct, Pagination, ProfileUpdate, Product,
        RegisterRequest, UpdateProductRequest, UpdateUserRequest, UserPage,
    },
    session::{Role, UserRecord},
    upload::ImageUpload,
};

struct Account {
    user: AdminUser,
    password: String,
    token: String,
}

#[derive(Default)]
struct MockState {
    accounts: Vec<Account>,
    products: Vec<Product>,
    orders: Vec<Order>,
    // reset token -> account id
    reset_tokens: HashMap<String, String>,
    next_id: u64,
}

impl MockState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn account_by_token(&self, token: &str) -> Result<&Account, BackendError> {
        self.accounts
            .iter()
            .find(|account| account.token == token)
            .ok_or_else(|| rejected(StatusCode::UNAUTHORIZED, "Not authorized, token failed"))
    }

    fn require_admin(&self, token: &str) -> Result<(), BackendError> {
        match self.account_by_token(token)?.user.role {
            Role::Admin => Ok(()),
            Role::User => Err(rejected(StatusCode::FORBIDDEN, "Forbidden")),
        }
    }

    fn email_taken(&self, email: &str, except_id: Option<&str>) -> bool {
        self.accounts.iter().any(|account| {
            account.user.email.eq_ignore_ascii_case(email)
                && Some(account.user.id.as_str()) != except_id
        })
    }

    fn insert_account(&mut self, user: AdminUser, password: &str) -> &Account {
        let token = format!("mock-token-{}", user.id);
        self.accounts.push(Account {
            user,
            password: password.to_string(),
            token,
        });
        &self.accounts[self.accounts.len() - 1]
    }
}

fn rejected(status: StatusCode, message: &str) -> BackendError {
    BackendError::Rejected {
        status,
        message: message.to_string(),
    }
}

fn not_found(what: &str) -> BackendError {
    rejected(StatusCode::NOT_FOUND, &format!("{what} not found"))
}

/// File name the backend would keep: an uploaded file wins over a named one.
fn stored_image(upload: Option<&ImageUpload>, named: &Option<String>) -> Option<String> {
    upload
        .map(|upload| upload.file_name.clone())
        .or_else(|| named.clone())
}

fn to_record(user: &AdminUser) -> UserRecord {
    UserRecord {
        id: Some(user.id.clone()),
        email: Some(user.email.clone()),
        full_name: user.full_name.clone(),
        username: Some(user.username.clone()),
        phone_number: user.phone_number.clone(),
        role: user.role,
        extra: Map::new(),
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn paginate<T: Clone>(items: &[T], page: u32, size: u32) -> (Vec<T>, Pagination) {
    let size = size.max(1);
    let total_items = items.len() as u64;
    let total_pages = total_items.div_ceil(u64::from(size)).max(1) as u32;
    let skip = (page.max(1) as usize - 1) * size as usize;
    let slice = items.iter().skip(skip).take(size as usize).cloned().collect();
    (
        slice,
        Pagination {
            page,
            size,
            total_items,
            total_pages,
        },
    )
}

/// MockBackend
///
/// Stateful in-memory implementation of `BackendApi`. Tokens are opaque strings of the
/// form `mock-token-<id>`; admin endpoints answer `403 Forbidden` for customer tokens.
pub struct MockBackend {
    state: Mutex<MockState>,
    /// When true, every call fails as if the backend were down.
    pub should_fail: bool,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            should_fail: false,
        }
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::new()
        }
    }

    /// Demo data for local development: one admin, one customer and a small catalog.
    pub fn seeded() -> Self {
        let backend = Self::new();
        backend.add_account("admin@freshpicks.test", "admin123", Role::Admin);
        backend.add_account("shopper@freshpicks.test", "shopper123", Role::User);
        for (name, category, price, quantity) in [
            ("Organic Apples", "Fruits", 180.0, 40),
            ("Bananas", "Fruits", 90.0, 60),
            ("Fresh Spinach", "Vegetables", 45.0, 25),
            ("Whole Milk", "Dairy", 110.0, 30),
            ("Sourdough Bread", "Bakery", 150.0, 12),
        ] {
            backend.add_product(Product {
                name: name.to_string(),
                category: Some(category.to_string()),
                price: Some(price),
                quantity: Some(quantity),
                ..Product::default()
            });
        }
        backend
    }

    fn lock(&self) -> Result<MutexGuard<'_, MockState>, BackendError> {
        if self.should_fail {
            return Err(BackendError::Unreachable(
                "mock backend is offline".to_string(),
            ));
        }
        Ok(self.state.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Registers an account directly and returns its credential pair.
    pub fn add_account(&self, email: &str, password: &str, role: Role) -> LoginOutcome {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let id = state.next_id("user");
        let username = email.split('@').next().unwrap_or(email).to_string();
        let account = state.insert_account(
            AdminUser {
                id,
                email: email.to_string(),
                username,
                role,
                created_at: Some(Utc::now()),
                ..AdminUser::default()
            },
            password,
        );
        LoginOutcome {
            token: account.token.clone(),
            user: to_record(&account.user),
        }
    }

    /// Adds a catalog entry. An empty id is replaced by a generated one.
    pub fn add_product(&self, mut product: Product) -> Product {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if product.id.is_empty() {
            product.id = state.next_id("product");
        }
        state.products.push(product.clone());
        product
    }

    /// Every order placed so far, oldest first.
    pub fn orders(&self) -> Vec<Order> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.orders.clone()
    }

    /// The pending reset token issued for `email`, if any.
    pub fn reset_token_for(&self, email: &str) -> Option<String> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let account = state
            .accounts
            .iter()
            .find(|account| account.user.email.eq_ignore_ascii_case(email))?;
        state
            .reset_tokens
            .iter()
            .find(|(_, id)| **id == account.user.id)
            .map(|(token, _)| token.clone())
    }
}

#[async_trait]
impl BackendApi for MockBackend {
    async fn login(&self, credentials: &LoginRequest) -> Result<LoginOutcome, BackendError> {
        let state = self.lock()?;
        state
            .accounts
            .iter()
            .find(|account| {
                account.user.email.eq_ignore_ascii_case(credentials.email.trim())
                    && account.password == credentials.password
            })
            .map(|account| LoginOutcome {
                token: account.token.clone(),
                user: to_record(&account.user),
            })
            .ok_or_else(|| rejected(StatusCode::UNAUTHORIZED, "Invalid credentials"))
    }

    async fn register(&self, request: &RegisterRequest) -> Result<String, BackendError> {
        let mut state = self.lock()?;
        if state.email_taken(&request.email, None) {
            return Err(rejected(StatusCode::CONFLICT, "Email already exists"));
        }
        let id = state.next_id("user");
        state.insert_account(
            AdminUser {
                id,
                email: request.email.trim().to_string(),
                username: request.username.trim().to_string(),
                full_name: Some(request.full_name.trim().to_string()),
                phone_number: Some(request.phone_number.trim().to_string()),
                role: Role::User,
                created_at: Some(Utc::now()),
                ..AdminUser::default()
            },
            &request.password,
        );
        Ok("User registered successfully".to_string())
    }

    async fn whoami(&self, token: &str) -> Result<UserRecord, BackendError> {
        let state = self.lock()?;
        Ok(to_record(&state.account_by_token(token)?.user))
    }

    async fn update_profile(
        &self,
        token: &str,
        update: &ProfileUpdate,
    ) -> Result<UserRecord, BackendError> {
        let mut state = self.lock()?;
        let id = state.account_by_token(token)?.user.id.clone();
        if let Some(email) = &update.email {
            if state.email_taken(email, Some(&id)) {
                return Err(rejected(StatusCode::CONFLICT, "Email already exists"));
            }
        }
        let account = state
            .accounts
            .iter_mut()
            .find(|account| account.user.id == id)
            .ok_or_else(|| not_found("User"))?;
        let user = &mut account.user;
        if let Some(full_name) = &update.full_name {
            user.full_name = Some(full_name.clone());
        }
        if let Some(username) = &update.username {
            user.username = username.clone();
        }
        if let Some(email) = &update.email {
            user.email = email.clone();
        }
        if let Some(phone) = &update.phone_number {
            user.phone_number = Some(phone.clone());
        }
        Ok(to_record(user))
    }

    async fn request_password_reset(&self, email: &str) -> Result<String, BackendError> {
        let mut state = self.lock()?;
        let account_id = state
            .accounts
            .iter()
            .find(|account| account.user.email.eq_ignore_ascii_case(email.trim()))
            .map(|account| account.user.id.clone());
        // Unknown addresses get the same answer so accounts cannot be enumerated.
        if let Some(id) = account_id {
            let token = state.next_id("reset");
            state.reset_tokens.insert(token, id);
        }
        Ok("If the email is registered, a reset link has been sent.".to_string())
    }

    async fn reset_password(
        &self,
        reset_token: &str,
        new_password: &str,
    ) -> Result<String, BackendError> {
        let mut state = self.lock()?;
        let id = state
            .reset_tokens
            .remove(reset_token)
            .ok_or_else(|| rejected(StatusCode::BAD_REQUEST, "Invalid or expired token"))?;
        let account = state
            .accounts
            .iter_mut()
            .find(|account| account.user.id == id)
            .ok_or_else(|| not_found("User"))?;
        account.password = new_password.to_string();
        Ok("Password has been reset".to_string())
    }

    async fn list_users(
        &self,
        token: &str,
        page: u32,
        size: u32,
        search: Option<&str>,
    ) -> Result<UserPage, BackendError> {
        let state = self.lock()?;
        state.require_admin(token)?;
        let matching: Vec<AdminUser> = state
            .accounts
            .iter()
            .map(|account| &account.user)
            .filter(|user| {
                search.is_none_or(|term| {
                    contains_ignore_case(&user.email, term)
                        || contains_ignore_case(&user.username, term)
                        || user
                            .full_name
                            .as_deref()
                            .is_some_and(|name| contains_ignore_case(name, term))
                })
            })
            .cloned()
            .collect();
        let (users, pagination) = paginate(&matching, page, size);
        Ok(UserPage { users, pagination })
    }

    async fn get_user(&self, token: &str, id: &str) -> Result<AdminUser, BackendError> {
        let state = self.lock()?;
        state.require_admin(token)?;
        state
            .accounts
            .iter()
            .find(|account| account.user.id == id)
            .map(|account| account.user.clone())
            .ok_or_else(|| not_found("User"))
    }

    async fn create_user(
        &self,
        token: &str,
        request: &CreateUserRequest,
        image: Option<&ImageUpload>,
    ) -> Result<AdminUser, BackendError> {
        let mut state = self.lock()?;
        state.require_admin(token)?;
        if state.email_taken(&request.email, None) {
            return Err(rejected(StatusCode::CONFLICT, "Email already exists"));
        }
        let id = state.next_id("user");
        let account = state.insert_account(
            AdminUser {
                id,
                email: request.email.trim().to_string(),
                username: request.username.trim().to_string(),
                full_name: request.full_name.clone(),
                phone_number: request.phone_number.clone(),
                role: request.role,
                image: stored_image(image, &request.image),
                created_at: Some(Utc::now()),
            },
            &request.password,
        );
        Ok(account.user.clone())
    }

    async fn update_user(
        &self,
        token: &str,
        id: &str,
        request: &UpdateUserRequest,
        image: Option<&ImageUpload>,
    ) -> Result<AdminUser, BackendError> {
        let mut state = self.lock()?;
        state.require_admin(token)?;
        if let Some(email) = &request.email {
            if state.email_taken(email, Some(id)) {
                return Err(rejected(StatusCode::CONFLICT, "Email already exists"));
            }
        }
        let user = state
            .accounts
            .iter_mut()
            .map(|account| &mut account.user)
            .find(|user| user.id == id)
            .ok_or_else(|| not_found("User"))?;
        if let Some(full_name) = &request.full_name {
            user.full_name = Some(full_name.clone());
        }
        if let Some(username) = &request.username {
            user.username = username.clone();
        }
        if let Some(email) = &request.email {
            user.email = email.clone();
        }
        if let Some(phone) = &request.phone_number {
            user.phone_number = Some(phone.clone());
        }
        if let Some(role) = request.role {
            user.role = role;
        }
        if let Some(image) = stored_image(image, &request.image) {
            user.image = Some(image);
        }
        Ok(user.clone())
    }

    async fn delete_user(&self, token: &str, id: &str) -> Result<String, BackendError> {
        let mut state = self.lock()?;
        state.require_admin(token)?;
        let before = state.accounts.len();
        state.accounts.retain(|account| account.user.id != id);
        if state.accounts.len() == before {
            return Err(not_found("User"));
        }
        Ok("User deleted successfully".to_string())
    }

    async fn list_products(
        &self,
        page: Option<u32>,
        size: Option<u32>,
    ) -> Result<Vec<Product>, BackendError> {
        let state = self.lock()?;
        Ok(match (page, size) {
            (Some(page), Some(size)) => paginate(&state.products, page, size).0,
            _ => state.products.clone(),
        })
    }

    async fn get_product(&self, _token: Option<&str>, id: &str) -> Result<Product, BackendError> {
        let state = self.lock()?;
        state
            .products
            .iter()
            .find(|product| product.id == id)
            .cloned()
            .ok_or_else(|| not_found("Product"))
    }

    async fn create_product(
        &self,
        token: &str,
        request: &CreateProductRequest,
        image: Option<&ImageUpload>,
    ) -> Result<Product, BackendError> {
        let mut state = self.lock()?;
        state.require_admin(token)?;
        let product = Product {
            id: state.next_id("product"),
            name: request.name.clone(),
            description: request.description.clone(),
            price: Some(request.price),
            category: request.category.clone(),
            quantity: Some(request.quantity),
            image: stored_image(image, &request.image),
        };
        state.products.push(product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        token: &str,
        id: &str,
        request: &UpdateProductRequest,
        image: Option<&ImageUpload>,
    ) -> Result<Product, BackendError> {
        let mut state = self.lock()?;
        state.require_admin(token)?;
        let product = state
            .products
            .iter_mut()
            .find(|product| product.id == id)
            .ok_or_else(|| not_found("Product"))?;
        if let Some(name) = &request.name {
            product.name = name.clone();
        }
        if request.description.is_some() {
            product.description = request.description.clone();
        }
        if request.price.is_some() {
            product.price = request.price;
        }
        if request.category.is_some() {
            product.category = request.category.clone();
        }
        if request.quantity.is_some() {
            product.quantity = request.quantity;
        }
        if let Some(image) = stored_image(image, &request.image) {
            product.image = Some(image);
        }
        Ok(product.clone())
    }

    async fn delete_product(&self, token: &str, id: &str) -> Result<String, BackendError> {
        let mut state = self.lock()?;
        state.require_admin(token)?;
        let before = state.products.len();
        state.products.retain(|product| product.id != id);
        if state.products.len() == before {
            return Err(not_found("Product"));
        }
        Ok("Product deleted successfully".to_string())
    }

    async fn create_order(
        &self,
        token: &str,
        order: &NewOrder,
    ) -> Result<OrderPlaced, BackendError> {
        let mut state = self.lock()?;
        let customer = state.account_by_token(token)?.user.clone();
        if order.products.is_empty() {
            return Err(rejected(StatusCode::BAD_REQUEST, "No products in order"));
        }

        let mut lines = Vec::with_capacity(order.products.len());
        let mut total_amount = 0.0;
        for line in &order.products {
            let product = state
                .products
                .iter()
                .find(|product| product.id == line.product)
                .ok_or_else(|| not_found("Product"))?;
            total_amount += product.price.unwrap_or(0.0) * f64::from(line.quantity);
            lines.push(OrderLine {
                product: OrderProduct {
                    id: product.id.clone(),
                    name: product.name.clone(),
                    image: product.image.clone(),
                    price: product.price,
                },
                quantity: line.quantity,
            });
        }

        let placed = Order {
            id: state.next_id("order"),
            user: Some(OrderCustomer {
                id: customer.id,
                full_name: customer.full_name,
            }),
            products: lines,
            total_amount,
            payment_method: Some("COD".to_string()),
            status: "pending".to_string(),
            shipping_address: Some(order.shipping_address.clone()),
            created_at: Some(Utc::now()),
        };
        state.orders.push(placed.clone());
        Ok(OrderPlaced {
            message: "Order placed successfully".to_string(),
            order: placed,
        })
    }

    async fn my_orders(&self, token: &str) -> Result<Vec<Order>, BackendError> {
        let state = self.lock()?;
        let id = state.account_by_token(token)?.user.id.clone();
        Ok(state
            .orders
            .iter()
            .filter(|order| order.user.as_ref().is_some_and(|user| user.id == id))
            .cloned()
            .collect())
    }

    async fn all_orders(&self, token: &str) -> Result<Vec<Order>, BackendError> {
        let state = self.lock()?;
        state.require_admin(token)?;
        Ok(state.orders.clone())
    }

    async fn update_order_status(
        &self,
        token: &str,
        id: &str,
        status: &str,
    ) -> Result<Order, BackendError> {
        let mut state = self.lock()?;
        state.require_admin(token)?;
        let order = state
            .orders
            .iter_mut()
            .find(|order| order.id == id)
            .ok_or_else(|| not_found("Order"))?;
        order.status = status.to_string();
        Ok(order.clone())
    }
}
