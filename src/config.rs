use std::env;

use crate::{
    error::ConfigError,
    gate::{RouteClass, RouteTable},
    session::Role,
};

/// Fallback backend location used by local development (matches the backend's dev port).
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";

/// AppConfig
///
/// Holds the storefront's entire configuration state. It is loaded once at startup and
/// is immutable afterwards; handlers pull it out of the application state via FromRef.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and cookie hardening defaults.
    pub env: Env,
    // Base URL of the external backend REST API (no trailing slash).
    pub api_base_url: String,
    // Socket address the HTTP server binds to.
    pub bind_addr: String,
    // When true (local only), the in-process MockBackend replaces the HTTP client.
    pub use_mock_backend: bool,
    // Names and attributes of the cookies that make up the credential store.
    pub cookies: CookieSettings,
    // The single pair of landing paths every redirect is derived from.
    pub landings: Landings,
}

/// Env
///
/// Defines the runtime context: developer conveniences in Local, hardened defaults in Production.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// CookieSettings
///
/// Layout of the browser-side credential store. The token and user cookies are written
/// together by the login flow and read (never written) by the navigation gate.
#[derive(Clone, Debug, PartialEq)]
pub struct CookieSettings {
    pub token_name: String,
    pub user_name: String,
    pub cart_name: String,
    /// Adds the `Secure` attribute; only meaningful when served over HTTPS.
    pub secure: bool,
    pub max_age_days: u32,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            token_name: "auth_token".to_string(),
            user_name: "user_data".to_string(),
            cart_name: "cart".to_string(),
            secure: false,
            max_age_days: 7,
        }
    }
}

/// Landings
///
/// Fixed redirect targets of the access decision: where anonymous visitors are sent,
/// and where signed-in customers and admins land.
#[derive(Clone, Debug, PartialEq)]
pub struct Landings {
    pub login: String,
    pub user: String,
    pub admin: String,
}

impl Default for Landings {
    fn default() -> Self {
        Self {
            login: "/login".to_string(),
            user: "/dashboard".to_string(),
            admin: "/admin".to_string(),
        }
    }
}

impl Landings {
    /// The landing a freshly signed-in principal is sent to.
    pub fn for_role(&self, role: Role) -> &str {
        match role {
            Role::Admin => &self.admin,
            Role::User => &self.user,
        }
    }

    /// validate
    ///
    /// Checks every landing against the route table so that a redirect target is always
    /// reachable by the identity being redirected there (no redirect loops). Landings
    /// must be absolute paths; a relative `Location` would resolve against the page
    /// being left.
    pub fn validate(&self, routes: &RouteTable) -> Result<(), ConfigError> {
        let checks: [(&'static str, &str, &[RouteClass]); 3] = [
            ("login", &self.login, &[RouteClass::PublicOnly, RouteClass::Unclassified]),
            (
                "user",
                &self.user,
                &[RouteClass::ProtectedGeneric, RouteClass::Unclassified],
            ),
            (
                "admin",
                &self.admin,
                &[
                    RouteClass::ProtectedAdmin,
                    RouteClass::ProtectedGeneric,
                    RouteClass::Unclassified,
                ],
            ),
        ];

        for (name, path, allowed) in checks {
            if !path.starts_with('/') {
                return Err(ConfigError::RelativeLanding {
                    name,
                    path: path.to_string(),
                });
            }
            let class = routes.classify(path);
            if !allowed.contains(&class) {
                return Err(ConfigError::LandingLoop {
                    name,
                    path: path.to_string(),
                    class,
                });
            }
        }
        Ok(())
    }
}

impl Default for AppConfig {
    /// default
    ///
    /// Safe, non-panicking configuration for tests: local env, default cookies and landings.
    fn default() -> Self {
        Self {
            env: Env::Local,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            bind_addr: "127.0.0.1:3000".to_string(),
            use_mock_backend: false,
            cookies: CookieSettings::default(),
            landings: Landings::default(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables (after `.env` has been loaded).
    ///
    /// # Panics
    /// Panics if `API_BASE_URL` is missing in production, or if a landing override is not
    /// an absolute path or would make the gate redirect into a route it rejects again.
    /// The service must not start with any of these misconfigurations.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let api_base_url = match env {
            Env::Production => env::var("API_BASE_URL")
                .expect("FATAL: API_BASE_URL must be set in production."),
            Env::Local => {
                env::var("API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string())
            }
        };

        let secure = match env::var("COOKIE_SECURE") {
            Ok(value) => parse_flag(&value),
            Err(_) => env == Env::Production,
        };

        // The mock backend is a development aid only.
        let use_mock_backend =
            env == Env::Local && env::var("MOCK_BACKEND").is_ok_and(|v| parse_flag(&v));

        let defaults = Landings::default();
        let landings = Landings {
            login: env::var("STOREFRONT_LOGIN_PATH").unwrap_or(defaults.login),
            user: env::var("STOREFRONT_USER_LANDING").unwrap_or(defaults.user),
            admin: env::var("STOREFRONT_ADMIN_LANDING").unwrap_or(defaults.admin),
        };

        if let Err(e) = landings.validate(&RouteTable::storefront()) {
            panic!("FATAL: {e}");
        }

        Self {
            env,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            use_mock_backend,
            cookies: CookieSettings {
                secure,
                ..CookieSettings::default()
            },
            landings,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
