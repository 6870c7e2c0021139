use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderName, HeaderValue, header, request::Parts},
    response::Redirect,
};

use crate::{
    cart::Cart,
    config::CookieSettings,
    error::PageError,
    gate::NavigationGate,
    session::{RequestCookies, ResolvedIdentity, Role, UserRecord},
};

/// AuthSession Extractor Result
///
/// The credential pair of the signed-in visitor, available to any handler behind the
/// navigation gate. `token` is forwarded as the bearer token on backend calls.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user: UserRecord,
}

impl AuthSession {
    pub fn identity(&self) -> ResolvedIdentity {
        self.user.role.into()
    }

    /// Second line of defence behind the gate for admin-only handlers.
    pub fn require_admin(&self) -> Result<(), PageError> {
        match self.user.role {
            Role::Admin => Ok(()),
            Role::User => Err(PageError::Forbidden),
        }
    }
}

/// AuthSession Extractor Implementation
///
/// Resolves the session from the request cookies with the same resolver the gate uses.
/// The gate already redirected anonymous visitors away from protected pages, so a
/// rejection here only happens for handlers mounted outside the protected areas.
///
/// Rejection: `303 See Other` to the login landing.
impl<S> FromRequestParts<S> for AuthSession
where
    S: Send + Sync,
    Arc<NavigationGate>: FromRef<S>,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let gate = Arc::<NavigationGate>::from_ref(state);
        gate.resolver
            .resolve_session(&RequestCookies::new(&parts.headers))
            .map(|session| AuthSession {
                token: session.token,
                user: session.user,
            })
            .ok_or_else(|| Redirect::to(&gate.landings.login))
    }
}

// --- Cookie Writers ---

/// Set-Cookie headers, ready for `AppendHeaders`.
pub type CookieHeaders = Vec<(HeaderName, HeaderValue)>;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

fn cookie(
    settings: &CookieSettings,
    name: &str,
    value: &str,
    max_age: u64,
    http_only: bool,
) -> Result<(HeaderName, HeaderValue), PageError> {
    let encoded = urlencoding::encode(value);
    let mut cookie = format!("{name}={encoded}; Path=/; SameSite=Lax; Max-Age={max_age}");
    if http_only {
        cookie.push_str("; HttpOnly");
    }
    if settings.secure {
        cookie.push_str("; Secure");
    }
    let value = HeaderValue::from_str(&cookie)
        .map_err(|e| PageError::Internal(format!("invalid cookie header: {e}")))?;
    Ok((header::SET_COOKIE, value))
}

fn session_max_age(settings: &CookieSettings) -> u64 {
    u64::from(settings.max_age_days) * SECONDS_PER_DAY
}

/// user_cookie
///
/// Serialized user record. Readable by page scripts (no `HttpOnly`) since the client
/// renders the name and role from it.
pub fn user_cookie(
    settings: &CookieSettings,
    user: &UserRecord,
) -> Result<(HeaderName, HeaderValue), PageError> {
    let json = serde_json::to_string(user)
        .map_err(|e| PageError::Internal(format!("user record serialization: {e}")))?;
    cookie(
        settings,
        &settings.user_name,
        &json,
        session_max_age(settings),
        false,
    )
}

/// session_cookies
///
/// Writes both halves of the credential pair in a single response so the store never
/// holds a token without its user record.
pub fn session_cookies(
    settings: &CookieSettings,
    token: &str,
    user: &UserRecord,
) -> Result<CookieHeaders, PageError> {
    Ok(vec![
        cookie(
            settings,
            &settings.token_name,
            token,
            session_max_age(settings),
            true,
        )?,
        user_cookie(settings, user)?,
    ])
}

/// Browsers silently drop a `Set-Cookie` larger than this.
pub const MAX_COOKIE_BYTES: usize = 4096;

/// cart_cookie
///
/// Serialized basket. A basket that no longer fits in a cookie is refused instead of
/// being dropped by the browser.
pub fn cart_cookie(
    settings: &CookieSettings,
    cart: &Cart,
) -> Result<(HeaderName, HeaderValue), PageError> {
    let (name, value) = cookie(
        settings,
        &settings.cart_name,
        &cart.to_json(),
        session_max_age(settings),
        false,
    )?;
    if value.len() > MAX_COOKIE_BYTES {
        return Err(PageError::Validation(
            "Your cart is full. Remove an item before adding another one.".to_string(),
        ));
    }
    Ok((name, value))
}

/// clear_session_cookies
///
/// Expires the token, user and cart cookies (logout, corrupted session).
pub fn clear_session_cookies(settings: &CookieSettings) -> Result<CookieHeaders, PageError> {
    [
        (&settings.token_name, true),
        (&settings.user_name, false),
        (&settings.cart_name, false),
    ]
    .into_iter()
    .map(|(name, http_only)| cookie(settings, name, "", 0, http_only))
    .collect()
}
