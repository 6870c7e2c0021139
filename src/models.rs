use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};

use crate::session::{Role, UserRecord};

// --- Backend Wire Format ---

/// ApiEnvelope
///
/// The shape every backend endpoint answers with. `success` is optional because some
/// endpoints (orders) only signal failure through the HTTP status.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiEnvelope {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub token: Option<String>,
    // Older login responses put the principal here instead of under `data`.
    #[serde(default)]
    pub user: Option<Value>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

/// ApiMessage
///
/// Outbound acknowledgement / error body: `{ success, message }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct ApiMessage {
    pub success: bool,
    pub message: String,
}

impl ApiMessage {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Pagination {
    pub page: u32,
    pub size: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

// --- Catalog ---

/// Product
///
/// Catalog entry as the backend returns it. `quantity` is stock on hand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub image: Option<String>,
}

/// ProductView
///
/// Product as rendered by the storefront, with the image resolved against the backend's
/// upload directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductView {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub category: String,
    pub stock: Option<i64>,
    pub image_url: Option<String>,
}

impl ProductView {
    pub fn from_product(product: Product, api_base_url: &str) -> Self {
        let image_url = product
            .image
            .as_deref()
            .filter(|image| !image.is_empty())
            .map(|image| format!("{api_base_url}/uploads/products/{image}"));

        Self {
            id: product.id,
            name: product.name,
            description: product.description,
            price: product.price,
            category: product
                .category
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| "Other".to_string()),
            stock: product.quantity,
            image_url,
        }
    }
}

/// CreateProductRequest
///
/// Admin payload for a new catalog entry (POST /admin/products). `image` names a file
/// already in the backend's storage; an image uploaded with the form replaces it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// UpdateProductRequest
///
/// Partial update; only provided fields are forwarded.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateProductRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct CategoryGroup {
    pub category: String,
    pub products: Vec<ProductView>,
}

// --- Orders ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ShippingAddress {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct NewOrderLine {
    /// Product id.
    pub product: String,
    pub quantity: u32,
}

/// NewOrder
///
/// Checkout payload forwarded to `POST /api/orders`. Prices and totals are computed by
/// the backend; the storefront only sends ids and quantities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewOrder {
    pub products: Vec<NewOrderLine>,
    pub shipping_address: ShippingAddress,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OrderProduct {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct OrderLine {
    pub product: OrderProduct,
    pub quantity: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OrderCustomer {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Order
///
/// An order as listed for the customer (`/orders`) or the admin console (`/admin/orders`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Order {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub user: Option<OrderCustomer>,
    #[serde(default)]
    pub products: Vec<OrderLine>,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub shipping_address: Option<ShippingAddress>,
    #[serde(default)]
    #[ts(type = "string | null")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Status the admin console sets when confirming an order.
pub const ORDER_CONFIRMED: &str = "confirmed";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderStatusUpdate {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct OrderPlaced {
    pub message: String,
    pub order: Order,
}

// --- Accounts ---

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// RegisterRequest
///
/// Customer self-registration. `confirmPassword` is checked locally and never forwarded.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RegisterRequest {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub phone_number: String,
    pub password: String,
    #[serde(skip_serializing)]
    pub confirm_password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ResetPasswordRequest {
    pub password: String,
    pub confirm_password: String,
}

/// ProfileUpdate
///
/// Self-service profile edit (PUT /user/profile); only provided fields are forwarded.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

/// AdminUser
///
/// Account record as listed in the admin console.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AdminUser {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    #[ts(type = "string | null")]
    pub created_at: Option<DateTime<Utc>>,
}

/// CreateUserRequest
///
/// Admin-side account creation (POST /admin/users).
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateUserRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    pub username: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub role: Role,
    /// File name of an avatar already stored by the backend; an uploaded file wins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateUserRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// UserListQuery
///
/// Query parameters of the admin user table (GET /admin/users).
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct UserListQuery {
    /// 1-based page number (default 1).
    pub page: Option<u32>,
    /// Rows per page (default 7).
    pub size: Option<u32>,
    /// Free-text filter applied by the backend.
    pub search: Option<String>,
}

pub const DEFAULT_USER_PAGE_SIZE: u32 = 7;

impl UserListQuery {
    pub fn page(&self) -> u32 {
        self.page.filter(|p| *p > 0).unwrap_or(1)
    }

    pub fn size(&self) -> u32 {
        self.size.filter(|s| *s > 0).unwrap_or(DEFAULT_USER_PAGE_SIZE)
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct UserPage {
    pub users: Vec<AdminUser>,
    pub pagination: Pagination,
}

// --- Page View Models ---

/// FormView
///
/// Descriptor for a form page: where it posts and which fields it expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct FormView {
    pub form: String,
    pub action: String,
    pub fields: Vec<String>,
}

impl FormView {
    pub fn new(form: &str, action: &str, fields: &[&str]) -> Self {
        Self {
            form: form.to_string(),
            action: action.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct LandingView {
    pub featured: Vec<ProductView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct DashboardView {
    pub greeting: String,
    pub products: Vec<ProductView>,
}

/// Query parameters of the customer dashboard.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ProductSearch {
    /// Case-insensitive substring of the product name.
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProfileView {
    #[schema(value_type = Object)]
    pub user: UserRecord,
    pub display_name: String,
}

/// AdminOverview
///
/// Counters shown on the admin landing page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AdminOverview {
    pub total_users: u64,
    pub admin_count: u64,
    pub customer_count: u64,
    pub total_products: u64,
    pub total_orders: u64,
    pub pending_orders: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AddToCartRequest {
    pub product_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct QuantityChange {
    pub delta: i32,
}
