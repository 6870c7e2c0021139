use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use reqwest::{
    RequestBuilder,
    multipart::{Form, Part},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};

use crate::{
    error::BackendError,
    models::{
        AdminUser, ApiEnvelope, CreateProductRequest, CreateUserRequest, LoginRequest, NewOrder,
        Order, OrderPlaced, OrderStatusUpdate, Pagination, ProfileUpdate, Product,
        RegisterRequest, UpdateProductRequest, UpdateUserRequest, UserPage,
    },
    session::UserRecord,
    upload::{IMAGE_FIELD, ImageUpload},
};

/// LoginOutcome
///
/// The credential pair handed out by a successful login. Both halves are written to the
/// browser together.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginOutcome {
    pub token: String,
    pub user: UserRecord,
}

/// BackendApi Trait
///
/// Contract for every call the storefront makes to the external REST backend. Handlers
/// only see this trait, so the real HTTP client and the in-process mock are interchangeable.
/// Authenticated calls take the bearer token read from the session cookie.
#[async_trait]
pub trait BackendApi: Send + Sync {
    // --- Authentication ---
    async fn login(&self, credentials: &LoginRequest) -> Result<LoginOutcome, BackendError>;
    // Returns the backend's confirmation message.
    async fn register(&self, request: &RegisterRequest) -> Result<String, BackendError>;
    async fn whoami(&self, token: &str) -> Result<UserRecord, BackendError>;
    async fn update_profile(
        &self,
        token: &str,
        update: &ProfileUpdate,
    ) -> Result<UserRecord, BackendError>;
    async fn request_password_reset(&self, email: &str) -> Result<String, BackendError>;
    // `reset_token` is the one-time token from the reset email, not a session token.
    async fn reset_password(
        &self,
        reset_token: &str,
        new_password: &str,
    ) -> Result<String, BackendError>;

    // --- Admin: Users ---
    async fn list_users(
        &self,
        token: &str,
        page: u32,
        size: u32,
        search: Option<&str>,
    ) -> Result<UserPage, BackendError>;
    async fn get_user(&self, token: &str, id: &str) -> Result<AdminUser, BackendError>;
    // Admin writes accept an optional image file next to the form fields.
    async fn create_user(
        &self,
        token: &str,
        request: &CreateUserRequest,
        image: Option<&ImageUpload>,
    ) -> Result<AdminUser, BackendError>;
    async fn update_user(
        &self,
        token: &str,
        id: &str,
        request: &UpdateUserRequest,
        image: Option<&ImageUpload>,
    ) -> Result<AdminUser, BackendError>;
    async fn delete_user(&self, token: &str, id: &str) -> Result<String, BackendError>;

    // --- Catalog ---
    // Public listing. Without paging the backend returns its default page.
    async fn list_products(
        &self,
        page: Option<u32>,
        size: Option<u32>,
    ) -> Result<Vec<Product>, BackendError>;
    async fn get_product(&self, token: Option<&str>, id: &str) -> Result<Product, BackendError>;
    async fn create_product(
        &self,
        token: &str,
        request: &CreateProductRequest,
        image: Option<&ImageUpload>,
    ) -> Result<Product, BackendError>;
    async fn update_product(
        &self,
        token: &str,
        id: &str,
        request: &UpdateProductRequest,
        image: Option<&ImageUpload>,
    ) -> Result<Product, BackendError>;
    async fn delete_product(&self, token: &str, id: &str) -> Result<String, BackendError>;

    // --- Orders ---
    async fn create_order(&self, token: &str, order: &NewOrder)
    -> Result<OrderPlaced, BackendError>;
    async fn my_orders(&self, token: &str) -> Result<Vec<Order>, BackendError>;
    // Admin: every order in the system.
    async fn all_orders(&self, token: &str) -> Result<Vec<Order>, BackendError>;
    async fn update_order_status(
        &self,
        token: &str,
        id: &str,
        status: &str,
    ) -> Result<Order, BackendError>;
}

/// BackendState
///
/// The concrete type used to share the backend client across the application state.
pub type BackendState = Arc<dyn BackendApi>;

/// HttpBackend
///
/// `BackendApi` over HTTP with a shared `reqwest::Client`. Every request is sent exactly once.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get(&self, path: &str, token: Option<&str>) -> RequestBuilder {
        authorize(self.client.get(self.url(path)), token)
    }

    fn post(&self, path: &str, token: Option<&str>) -> RequestBuilder {
        authorize(self.client.post(self.url(path)), token)
    }

    fn put(&self, path: &str, token: &str) -> RequestBuilder {
        authorize(self.client.put(self.url(path)), Some(token))
    }

    fn delete(&self, path: &str, token: &str) -> RequestBuilder {
        authorize(self.client.delete(self.url(path)), Some(token))
    }

    /// send
    ///
    /// Executes the request and unwraps the envelope. Non-2xx statuses and `success: false`
    /// become `Rejected` carrying the body's message, or `fallback` when there is none.
    async fn send(
        &self,
        request: RequestBuilder,
        fallback: &str,
    ) -> Result<ApiEnvelope, BackendError> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!(error = %e, "backend request failed before a response");
            BackendError::Unreachable(e.to_string())
        })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| BackendError::Unreachable(e.to_string()))?;

        let envelope = if body.is_empty() {
            ApiEnvelope::default()
        } else {
            match serde_json::from_slice::<ApiEnvelope>(&body) {
                Ok(envelope) => envelope,
                Err(e) if status.is_success() => {
                    return Err(BackendError::InvalidResponse(e.to_string()));
                }
                // Error pages (proxies, HTML) carry no usable message.
                Err(_) => ApiEnvelope::default(),
            }
        };

        if !status.is_success() || envelope.success == Some(false) {
            let status = if status.is_success() {
                StatusCode::BAD_REQUEST
            } else {
                status
            };
            let message = envelope
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| fallback.to_string());
            tracing::debug!(%status, %message, "backend rejected request");
            return Err(BackendError::Rejected { status, message });
        }

        Ok(envelope)
    }
}

fn authorize(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

/// Decodes the envelope's `data` member into `T`.
fn data<T: DeserializeOwned>(envelope: ApiEnvelope) -> Result<T, BackendError> {
    serde_json::from_value(envelope.data).map_err(|e| BackendError::InvalidResponse(e.to_string()))
}

fn message_or(envelope: &ApiEnvelope, default: &str) -> String {
    envelope
        .message
        .clone()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// multipart_form
///
/// Admin writes go out as `multipart/form-data`, the shape the backend's upload routes
/// expect: every non-null payload member as a text part, then the image file. An uploaded
/// file replaces a named `image`.
pub fn multipart_form<T: Serialize>(
    payload: &T,
    image: Option<&ImageUpload>,
) -> Result<Form, BackendError> {
    let members = match serde_json::to_value(payload) {
        Ok(Value::Object(members)) => members,
        Ok(_) => return Err(BackendError::Encode("form payload is not an object".to_string())),
        Err(e) => return Err(BackendError::Encode(e.to_string())),
    };

    let mut form = Form::new();
    for (name, member) in members {
        if image.is_some() && name == IMAGE_FIELD {
            continue;
        }
        let text = match member {
            Value::Null => continue,
            Value::String(text) => text,
            other => other.to_string(),
        };
        form = form.text(name, text);
    }

    if let Some(image) = image {
        let part = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.content_type)
            .map_err(|e| BackendError::Encode(e.to_string()))?;
        form = form.part(IMAGE_FIELD, part);
    }
    Ok(form)
}

/// Finds the user record in `data.user`, `data` or the top-level `user` member.
fn user_from(envelope: &ApiEnvelope) -> Option<UserRecord> {
    let candidates = [
        envelope.data.get("user"),
        Some(&envelope.data),
        envelope.user.as_ref(),
    ];
    candidates
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
        .map(|object| UserRecord::from_object(object.clone()))
        // `data` may hold only `{ token }`, which is not a user.
        .find(|user| user.id.is_some() || user.email.is_some())
}

/// extract_login
///
/// Login responses differ between backend versions: the token may sit at the top level or
/// inside `data`, the user inside `data.user`, `data` itself or a top-level `user`.
pub fn extract_login(envelope: &ApiEnvelope) -> Result<LoginOutcome, BackendError> {
    let token = envelope
        .token
        .clone()
        .or_else(|| {
            envelope
                .data
                .get("token")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .filter(|token| !token.is_empty());

    match (token, user_from(envelope)) {
        (Some(token), Some(user)) => Ok(LoginOutcome { token, user }),
        _ => Err(BackendError::InvalidResponse(
            "Invalid login response".to_string(),
        )),
    }
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn login(&self, credentials: &LoginRequest) -> Result<LoginOutcome, BackendError> {
        let envelope = self
            .send(
                self.post("/api/auth/login", None).json(credentials),
                "Login failed",
            )
            .await?;
        extract_login(&envelope)
    }

    async fn register(&self, request: &RegisterRequest) -> Result<String, BackendError> {
        let envelope = self
            .send(
                self.post("/api/auth/register", None).json(request),
                "Registration failed",
            )
            .await?;
        Ok(message_or(&envelope, "Registration successful"))
    }

    async fn whoami(&self, token: &str) -> Result<UserRecord, BackendError> {
        let envelope = self
            .send(
                self.get("/api/auth/whoami", Some(token)),
                "Failed to load profile",
            )
            .await?;
        user_from(&envelope)
            .ok_or_else(|| BackendError::InvalidResponse("Missing user in response".to_string()))
    }

    async fn update_profile(
        &self,
        token: &str,
        update: &ProfileUpdate,
    ) -> Result<UserRecord, BackendError> {
        let envelope = self
            .send(
                self.put("/api/auth/update-profile", token).json(update),
                "Update failed",
            )
            .await?;
        user_from(&envelope)
            .ok_or_else(|| BackendError::InvalidResponse("Missing user in response".to_string()))
    }

    async fn request_password_reset(&self, email: &str) -> Result<String, BackendError> {
        let envelope = self
            .send(
                self.post("/api/auth/request-password-reset", None)
                    .json(&json!({ "email": email })),
                "Failed to send reset email",
            )
            .await?;
        Ok(message_or(
            &envelope,
            "If the email is registered, a reset link has been sent.",
        ))
    }

    async fn reset_password(
        &self,
        reset_token: &str,
        new_password: &str,
    ) -> Result<String, BackendError> {
        let path = format!(
            "/api/auth/reset-password/{}",
            urlencoding::encode(reset_token)
        );
        let envelope = self
            .send(
                self.post(&path, None)
                    .json(&json!({ "newPassword": new_password })),
                "Failed to reset password",
            )
            .await?;
        Ok(message_or(&envelope, "Password has been reset"))
    }

    async fn list_users(
        &self,
        token: &str,
        page: u32,
        size: u32,
        search: Option<&str>,
    ) -> Result<UserPage, BackendError> {
        let mut query = vec![("page", page.to_string()), ("size", size.to_string())];
        if let Some(search) = search {
            query.push(("search", search.to_string()));
        }

        let mut envelope = self
            .send(
                self.get("/api/admin/users", Some(token)).query(&query),
                "Failed to fetch users",
            )
            .await?;
        let pagination = envelope.pagination.take();
        let users: Vec<AdminUser> = data(envelope)?;
        let pagination = pagination.unwrap_or_else(|| Pagination {
            page,
            size,
            total_items: users.len() as u64,
            total_pages: 1,
        });
        Ok(UserPage { users, pagination })
    }

    async fn get_user(&self, token: &str, id: &str) -> Result<AdminUser, BackendError> {
        let path = format!("/api/admin/users/{id}");
        data(
            self.send(self.get(&path, Some(token)), "Failed to fetch user")
                .await?,
        )
    }

    async fn create_user(
        &self,
        token: &str,
        request: &CreateUserRequest,
        image: Option<&ImageUpload>,
    ) -> Result<AdminUser, BackendError> {
        let form = multipart_form(request, image)?;
        data(
            self.send(
                self.post("/api/admin/users", Some(token)).multipart(form),
                "Failed to create user",
            )
            .await?,
        )
    }

    async fn update_user(
        &self,
        token: &str,
        id: &str,
        request: &UpdateUserRequest,
        image: Option<&ImageUpload>,
    ) -> Result<AdminUser, BackendError> {
        let path = format!("/api/admin/users/{id}");
        let form = multipart_form(request, image)?;
        data(
            self.send(self.put(&path, token).multipart(form), "Failed to update user")
                .await?,
        )
    }

    async fn delete_user(&self, token: &str, id: &str) -> Result<String, BackendError> {
        let path = format!("/api/admin/users/{id}");
        let envelope = self
            .send(self.delete(&path, token), "Failed to delete user")
            .await?;
        Ok(message_or(&envelope, "User deleted"))
    }

    async fn list_products(
        &self,
        page: Option<u32>,
        size: Option<u32>,
    ) -> Result<Vec<Product>, BackendError> {
        let query: Vec<(&str, u32)> = [("page", page), ("size", size)]
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key, v)))
            .collect();
        data(
            self.send(
                self.get("/api/products", None).query(&query),
                "Failed to fetch products",
            )
            .await?,
        )
    }

    async fn get_product(&self, token: Option<&str>, id: &str) -> Result<Product, BackendError> {
        let path = format!("/api/admin/products/{id}");
        data(
            self.send(self.get(&path, token), "Failed to fetch product")
                .await?,
        )
    }

    async fn create_product(
        &self,
        token: &str,
        request: &CreateProductRequest,
        image: Option<&ImageUpload>,
    ) -> Result<Product, BackendError> {
        let form = multipart_form(request, image)?;
        data(
            self.send(
                self.post("/api/admin/products", Some(token)).multipart(form),
                "Failed to create product",
            )
            .await?,
        )
    }

    async fn update_product(
        &self,
        token: &str,
        id: &str,
        request: &UpdateProductRequest,
        image: Option<&ImageUpload>,
    ) -> Result<Product, BackendError> {
        let path = format!("/api/admin/products/{id}");
        let form = multipart_form(request, image)?;
        data(
            self.send(
                self.put(&path, token).multipart(form),
                "Failed to update product",
            )
            .await?,
        )
    }

    async fn delete_product(&self, token: &str, id: &str) -> Result<String, BackendError> {
        let path = format!("/api/admin/products/{id}");
        let envelope = self
            .send(self.delete(&path, token), "Failed to delete product")
            .await?;
        Ok(message_or(&envelope, "Product deleted"))
    }

    async fn create_order(
        &self,
        token: &str,
        order: &NewOrder,
    ) -> Result<OrderPlaced, BackendError> {
        let envelope = self
            .send(
                self.post("/api/orders", Some(token)).json(order),
                "Failed to place order",
            )
            .await?;
        let message = message_or(&envelope, "Order placed successfully");
        let order = data(envelope)?;
        Ok(OrderPlaced { message, order })
    }

    async fn my_orders(&self, token: &str) -> Result<Vec<Order>, BackendError> {
        data(
            self.send(self.get("/api/orders/my", Some(token)), "Failed to fetch orders")
                .await?,
        )
    }

    async fn all_orders(&self, token: &str) -> Result<Vec<Order>, BackendError> {
        data(
            self.send(self.get("/api/orders", Some(token)), "Failed to fetch orders")
                .await?,
        )
    }

    async fn update_order_status(
        &self,
        token: &str,
        id: &str,
        status: &str,
    ) -> Result<Order, BackendError> {
        let path = format!("/api/orders/{id}");
        let body = OrderStatusUpdate {
            status: status.to_string(),
        };
        data(
            self.send(self.put(&path, token).json(&body), "Failed to confirm")
                .await?,
        )
    }
}
