//! Form rules checked before anything is forwarded to the backend.
//!
//! Each validator returns the first failing rule as a user-facing message.

use regex::Regex;

use crate::{
    error::PageError,
    models::{
        CreateProductRequest, CreateUserRequest, ForgotPasswordRequest, LoginRequest,
        RegisterRequest, ResetPasswordRequest, ShippingAddress,
    },
};

const MIN_PASSWORD: usize = 6;
const MIN_USERNAME: usize = 3;
const MIN_FULL_NAME: usize = 2;
const PHONE_LENGTH: std::ops::RangeInclusive<usize> = 7..=15;

/// Basic email shape check (something@domain.tld).
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email.trim()))
}

fn ensure(condition: bool, message: &str) -> Result<(), PageError> {
    if condition {
        Ok(())
    } else {
        Err(PageError::Validation(message.to_string()))
    }
}

fn char_len(value: &str) -> usize {
    value.trim().chars().count()
}

fn check_password_pair(password: &str, confirm: &str) -> Result<(), PageError> {
    ensure(password.chars().count() >= MIN_PASSWORD, "Minimum 6 characters")?;
    ensure(password == confirm, "Passwords do not match")
}

pub fn validate_login(request: &LoginRequest) -> Result<(), PageError> {
    ensure(valid_email(&request.email), "Enter a valid email")?;
    ensure(request.password.chars().count() >= MIN_PASSWORD, "Minimum 6 characters")
}

pub fn validate_registration(request: &RegisterRequest) -> Result<(), PageError> {
    ensure(char_len(&request.full_name) >= MIN_FULL_NAME, "Enter your full name")?;
    ensure(
        char_len(&request.username) >= MIN_USERNAME,
        "Username must be at least 3 characters",
    )?;
    ensure(valid_email(&request.email), "Enter a valid email")?;
    ensure(
        PHONE_LENGTH.contains(&char_len(&request.phone_number)),
        "Enter a valid phone number",
    )?;
    check_password_pair(&request.password, &request.confirm_password)
}

pub fn validate_reset_request(request: &ForgotPasswordRequest) -> Result<(), PageError> {
    ensure(valid_email(&request.email), "Enter a valid email")
}

pub fn validate_password_reset(request: &ResetPasswordRequest) -> Result<(), PageError> {
    check_password_pair(&request.password, &request.confirm_password)
}

pub fn validate_new_user(request: &CreateUserRequest) -> Result<(), PageError> {
    if let Some(full_name) = &request.full_name {
        ensure(char_len(full_name) >= MIN_FULL_NAME, "Enter your full name")?;
    }
    ensure(
        char_len(&request.username) >= MIN_USERNAME,
        "Username must be at least 3 characters",
    )?;
    ensure(valid_email(&request.email), "Enter a valid email")?;
    if let Some(phone) = &request.phone_number {
        ensure(
            PHONE_LENGTH.contains(&char_len(phone)),
            "Enter a valid phone number",
        )?;
    }
    check_password_pair(&request.password, &request.confirm_password)
}

pub fn validate_shipping(address: &ShippingAddress) -> Result<(), PageError> {
    let filled = [
        &address.full_name,
        &address.phone,
        &address.street,
        &address.city,
    ]
    .iter()
    .all(|field| !field.trim().is_empty());
    ensure(filled, "Please fill all fields")
}

pub fn validate_product(request: &CreateProductRequest) -> Result<(), PageError> {
    ensure(!request.name.trim().is_empty(), "Product name is required")?;
    ensure(
        request.price.is_finite() && request.price >= 0.0,
        "Price must be a positive number",
    )?;
    ensure(request.quantity >= 0, "Stock cannot be negative")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> RegisterRequest {
        RegisterRequest {
            full_name: "Asha Gurung".to_string(),
            username: "asha".to_string(),
            email: "asha@example.com".to_string(),
            phone_number: "9800000000".to_string(),
            password: "secret1".to_string(),
            confirm_password: "secret1".to_string(),
        }
    }

    fn message(result: Result<(), PageError>) -> String {
        result.err().map(|e| e.to_string()).unwrap_or_default()
    }

    #[test]
    fn email_shape() {
        assert!(valid_email("a@example.com"));
        assert!(valid_email(" padded@example.org "));
        assert!(!valid_email("no-at-sign.example.com"));
        assert!(!valid_email("missing@tld"));
    }

    #[test]
    fn login_requires_email_and_six_char_password() {
        let ok = LoginRequest {
            email: "a@example.com".to_string(),
            password: "123456".to_string(),
        };
        assert!(validate_login(&ok).is_ok());

        let short = LoginRequest {
            password: "12345".to_string(),
            ..ok.clone()
        };
        assert_eq!(message(validate_login(&short)), "Minimum 6 characters");
    }

    #[test]
    fn registration_rules_in_order() {
        assert!(validate_registration(&registration()).is_ok());

        let mut request = registration();
        request.full_name = "A".to_string();
        assert_eq!(message(validate_registration(&request)), "Enter your full name");

        let mut request = registration();
        request.phone_number = "123".to_string();
        assert_eq!(
            message(validate_registration(&request)),
            "Enter a valid phone number"
        );

        let mut request = registration();
        request.confirm_password = "different".to_string();
        assert_eq!(
            message(validate_registration(&request)),
            "Passwords do not match"
        );
    }

    #[test]
    fn shipping_rejects_blank_fields() {
        let address = ShippingAddress {
            full_name: "Asha".to_string(),
            phone: "98000".to_string(),
            street: "  ".to_string(),
            city: "Pokhara".to_string(),
        };
        assert_eq!(message(validate_shipping(&address)), "Please fill all fields");
    }

    #[test]
    fn admin_user_optional_fields_are_checked_when_present() {
        let user = CreateUserRequest {
            username: "asha".to_string(),
            email: "asha@example.com".to_string(),
            password: "secret1".to_string(),
            confirm_password: "secret1".to_string(),
            ..CreateUserRequest::default()
        };
        assert!(validate_new_user(&user).is_ok());

        let short_phone = CreateUserRequest {
            phone_number: Some("12".to_string()),
            ..user.clone()
        };
        assert_eq!(
            message(validate_new_user(&short_phone)),
            "Enter a valid phone number"
        );

        let named = CreateUserRequest {
            full_name: Some("Asha Gurung".to_string()),
            phone_number: Some("9800000000".to_string()),
            ..user
        };
        assert!(validate_new_user(&named).is_ok());
    }

    #[test]
    fn product_price_must_be_non_negative() {
        let product = CreateProductRequest {
            name: "Milk".to_string(),
            price: -1.0,
            category: Some("Dairy".to_string()),
            ..CreateProductRequest::default()
        };
        assert!(validate_product(&product).is_err());
    }
}
