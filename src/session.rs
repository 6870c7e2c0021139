//! Session resolution for the navigation gate.
//!
//! Reads the credential pair (bearer token + serialized user record) from a read-only
//! store and turns it into a `ResolvedIdentity`. Resolution is local, synchronous and
//! never writes to the store, even when the stored payload is corrupt.

use std::collections::HashMap;

use axum::http::{HeaderMap, header};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::config::CookieSettings;

/// Read-only key/value view of wherever the browser keeps session state.
pub trait CredentialStore {
    /// Raw (still percent-encoded) value stored under `key`.
    fn get(&self, key: &str) -> Option<String>;
}

/// RequestCookies
///
/// Credential store backed by the `Cookie` headers of an incoming request.
/// Every `Cookie` header is consulted; the first occurrence of a name wins.
pub struct RequestCookies<'a> {
    headers: &'a HeaderMap,
}

impl<'a> RequestCookies<'a> {
    pub fn new(headers: &'a HeaderMap) -> Self {
        Self { headers }
    }
}

impl CredentialStore for RequestCookies<'_> {
    fn get(&self, key: &str) -> Option<String> {
        self.headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .find_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                (name.trim() == key).then(|| value.trim().to_string())
            })
    }
}

/// In-memory credential store, used by tests and by callers that already hold the values.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.entries.insert(key.to_string(), value.to_string());
        self
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }
}

/// Role
///
/// Closed two-value view of the backend's free-form role string. Only an exact,
/// case-insensitive `"admin"` grants admin; everything else is a regular customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ToSchema, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn normalize(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("admin") {
            Role::Admin
        } else {
            Role::User
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl<'de> Deserialize<'de> for Role {
    // Never fails: non-string or unknown values fall back to least privilege.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(|value| Role::from_value(&value))
    }
}

impl Role {
    /// Role of a raw JSON value; only a string can name a role.
    pub fn from_value(value: &Value) -> Self {
        value.as_str().map_or(Role::User, Role::normalize)
    }
}

/// UserRecord
///
/// Denormalized snapshot of the signed-in principal, stored next to the token.
/// Fields the storefront does not use are preserved in `extra` so rewriting the
/// cookie never drops backend data.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub role: Role,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserRecord {
    /// Parses a serialized record. Anything that is not a JSON object
    /// (`null`, `"undefined"`, arrays, truncated text) yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match serde_json::from_str::<Value>(raw).ok()? {
            Value::Object(object) => Some(Self::from_object(object)),
            _ => None,
        }
    }

    /// from_object
    ///
    /// Builds a record from any JSON object. The role is read first and never fails;
    /// known fields are lifted out when they hold a string or a number (ids may also be
    /// `{ "$oid": "..." }`). Values of any other shape stay in `extra` untouched.
    pub fn from_object(mut object: Map<String, Value>) -> Self {
        let role = object
            .remove("role")
            .map_or(Role::User, |value| Role::from_value(&value));
        let id = take_text(&mut object, "_id").or_else(|| {
            // An unreadable `_id` stays in `extra`; lifting `id` too would write `_id` twice.
            if object.contains_key("_id") {
                None
            } else {
                take_text(&mut object, "id")
            }
        });

        Self {
            id,
            email: take_text(&mut object, "email"),
            full_name: take_text(&mut object, "fullName"),
            username: take_text(&mut object, "username"),
            phone_number: take_text(&mut object, "phoneNumber"),
            role,
            extra: object,
        }
    }

    /// Name shown in greetings: full name, then username, then a generic fallback.
    pub fn display_name(&self) -> &str {
        [&self.full_name, &self.username]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|name| !name.trim().is_empty())
            .unwrap_or("Shopper")
    }
}

/// ResolvedIdentity
///
/// Derived per navigation, never cached. `Admin` is a superset of `User`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedIdentity {
    Anonymous,
    User,
    Admin,
}

impl ResolvedIdentity {
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, ResolvedIdentity::Anonymous)
    }
}

impl From<Role> for ResolvedIdentity {
    fn from(role: Role) -> Self {
        match role {
            Role::User => ResolvedIdentity::User,
            Role::Admin => ResolvedIdentity::Admin,
        }
    }
}

/// A complete, consistent credential pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user: UserRecord,
}

impl Session {
    pub fn identity(&self) -> ResolvedIdentity {
        self.user.role.into()
    }
}

/// SessionResolver
///
/// Knows which store keys hold the token and the user record.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionResolver {
    token_key: String,
    user_key: String,
}

impl SessionResolver {
    pub fn new(token_key: &str, user_key: &str) -> Self {
        Self {
            token_key: token_key.to_string(),
            user_key: user_key.to_string(),
        }
    }

    pub fn from_settings(settings: &CookieSettings) -> Self {
        Self::new(&settings.token_name, &settings.user_name)
    }

    /// resolve_session
    ///
    /// Returns the credential pair only when both halves are present and the user record
    /// parses as a JSON object. A token without a parseable user (or the reverse) is no
    /// session at all.
    pub fn resolve_session<S>(&self, store: &S) -> Option<Session>
    where
        S: CredentialStore + ?Sized,
    {
        let token = store
            .get(&self.token_key)
            .and_then(|raw| decode_value(&raw))
            .filter(|token| !token.is_empty())?;

        let user = store
            .get(&self.user_key)
            .and_then(|raw| decode_value(&raw))
            .and_then(|raw| UserRecord::parse(&raw))?;

        Some(Session { token, user })
    }

    pub fn resolve<S>(&self, store: &S) -> ResolvedIdentity
    where
        S: CredentialStore + ?Sized,
    {
        self.resolve_session(store)
            .map_or(ResolvedIdentity::Anonymous, |session| session.identity())
    }
}

impl<'de> Deserialize<'de> for UserRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Map::deserialize(deserializer).map(UserRecord::from_object)
    }
}

/// Removes `key` from `object` when its value reads as text.
fn take_text(object: &mut Map<String, Value>, key: &str) -> Option<String> {
    let text = match object.get(key)? {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Object(inner) => inner.get("$oid")?.as_str()?.to_string(),
        _ => return None,
    };
    object.remove(key);
    Some(text)
}

/// Percent-decodes a stored value. Invalid UTF-8 after decoding counts as absent.
pub fn decode_value(raw: &str) -> Option<String> {
    urlencoding::decode(raw).ok().map(|value| value.into_owned())
}
