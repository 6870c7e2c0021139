//! Admin form bodies.
//!
//! The admin console posts user and product forms either as JSON or as
//! `multipart/form-data` with an optional `image` file. Both shapes end up as the same
//! typed payload; the file travels next to it and is forwarded to the backend as is.

use std::{collections::HashMap, str::FromStr};

use axum::{
    Json,
    extract::{FromRequest, Multipart, Request},
    http::{HeaderMap, header},
};
use serde::de::DeserializeOwned;

use crate::{
    error::PageError,
    models::{CreateProductRequest, CreateUserRequest, UpdateProductRequest, UpdateUserRequest},
    session::Role,
};

/// Name of the file part on every admin form.
pub const IMAGE_FIELD: &str = "image";
/// Body limit of the admin routes, large enough for a product photo.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// ImageUpload
///
/// File part of an admin form.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// FormFields
///
/// Text parts of a multipart body by field name. The first occurrence of a name wins.
#[derive(Debug, Clone, Default)]
pub struct FormFields(HashMap<String, String>);

impl FormFields {
    pub fn insert(&mut self, name: &str, value: String) {
        self.0.entry(name.to_string()).or_insert(value);
    }

    /// Trimmed text of `name`. Blank values count as absent.
    pub fn text(&self, name: &str) -> Option<String> {
        self.0
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }

    /// Untrimmed value of `name` (passwords), empty when missing.
    pub fn raw(&self, name: &str) -> String {
        self.0.get(name).cloned().unwrap_or_default()
    }

    pub fn number<T: FromStr>(&self, name: &str) -> Result<Option<T>, PageError> {
        self.text(name)
            .map(|value| {
                value
                    .parse()
                    .map_err(|_| PageError::Validation(format!("{name} must be a number")))
            })
            .transpose()
    }
}

/// Payloads that can be read from the text parts of a multipart form.
pub trait FromFormFields: Sized {
    fn from_fields(fields: &FormFields) -> Result<Self, PageError>;
}

impl FromFormFields for CreateUserRequest {
    fn from_fields(fields: &FormFields) -> Result<Self, PageError> {
        Ok(Self {
            full_name: fields.text("fullName"),
            username: fields.text("username").unwrap_or_default(),
            email: fields.text("email").unwrap_or_default(),
            phone_number: fields.text("phoneNumber"),
            password: fields.raw("password"),
            confirm_password: fields.raw("confirmPassword"),
            role: fields
                .text("role")
                .map_or(Role::User, |role| Role::normalize(&role)),
            image: fields.text(IMAGE_FIELD),
        })
    }
}

impl FromFormFields for UpdateUserRequest {
    fn from_fields(fields: &FormFields) -> Result<Self, PageError> {
        Ok(Self {
            full_name: fields.text("fullName"),
            username: fields.text("username"),
            email: fields.text("email"),
            phone_number: fields.text("phoneNumber"),
            role: fields.text("role").map(|role| Role::normalize(&role)),
            image: fields.text(IMAGE_FIELD),
        })
    }
}

impl FromFormFields for CreateProductRequest {
    fn from_fields(fields: &FormFields) -> Result<Self, PageError> {
        let price = fields.number("price")?.ok_or_else(|| {
            PageError::Validation("Price must be a positive number".to_string())
        })?;
        Ok(Self {
            name: fields.text("name").unwrap_or_default(),
            description: fields.text("description"),
            price,
            category: fields.text("category"),
            quantity: fields.number("quantity")?.unwrap_or_default(),
            image: fields.text(IMAGE_FIELD),
        })
    }
}

impl FromFormFields for UpdateProductRequest {
    fn from_fields(fields: &FormFields) -> Result<Self, PageError> {
        Ok(Self {
            name: fields.text("name"),
            description: fields.text("description"),
            price: fields.number("price")?,
            category: fields.text("category"),
            quantity: fields.number("quantity")?,
            image: fields.text(IMAGE_FIELD),
        })
    }
}

/// AdminForm Extractor Result
///
/// Typed admin payload plus the uploaded image, if one was attached.
#[derive(Debug, Clone)]
pub struct AdminForm<T> {
    pub payload: T,
    pub image: Option<ImageUpload>,
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"))
}

/// AdminForm Extractor Implementation
///
/// `multipart/form-data` bodies are read part by part: an `image` part carrying a file
/// name becomes the `ImageUpload` (an empty file input is ignored), everything else is
/// text. Any other body is decoded as JSON.
///
/// Rejection: `PageError::Validation` with the extractor's message.
impl<S, T> FromRequest<S> for AdminForm<T>
where
    S: Send + Sync,
    T: FromFormFields + DeserializeOwned,
{
    type Rejection = PageError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !is_multipart(req.headers()) {
            let Json(payload) = Json::<T>::from_request(req, state)
                .await
                .map_err(|e| PageError::Validation(e.body_text()))?;
            return Ok(Self {
                payload,
                image: None,
            });
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| PageError::Validation(e.body_text()))?;
        let mut fields = FormFields::default();
        let mut image = None;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| PageError::Validation(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field
                .file_name()
                .filter(|_| name == IMAGE_FIELD)
                .map(str::to_string);

            match file_name {
                Some(file_name) => {
                    let content_type = field
                        .content_type()
                        .unwrap_or(DEFAULT_CONTENT_TYPE)
                        .to_string();
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| PageError::Validation(e.body_text()))?;
                    if !bytes.is_empty() && image.is_none() {
                        image = Some(ImageUpload {
                            file_name,
                            content_type,
                            bytes: bytes.to_vec(),
                        });
                    }
                }
                None => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| PageError::Validation(e.body_text()))?;
                    fields.insert(&name, value);
                }
            }
        }

        if let Some(image) = &image {
            tracing::debug!(
                file_name = %image.file_name,
                bytes = image.bytes.len(),
                "admin form carries an image"
            );
        }

        Ok(Self {
            payload: T::from_fields(&fields)?,
            image,
        })
    }
}
