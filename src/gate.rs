//! Navigation gate: route classification and the access decision.
//!
//! Every request runs Session Resolver -> Route Classifier -> Access Decision once,
//! before routing. The gate holds no mutable state and performs no I/O.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    config::{AppConfig, Landings},
    session::{CredentialStore, RequestCookies, ResolvedIdentity, SessionResolver},
};

/// Static classification of a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    /// Only reachable while signed out (login, registration, password reset).
    PublicOnly,
    /// Requires any signed-in identity.
    ProtectedGeneric,
    /// Requires an admin identity.
    ProtectedAdmin,
    /// Not listed anywhere; always allowed.
    Unclassified,
}

// Overlapping prefixes resolve to the most restrictive class.
const PRIORITY: [RouteClass; 3] = [
    RouteClass::ProtectedAdmin,
    RouteClass::ProtectedGeneric,
    RouteClass::PublicOnly,
];

/// RouteTable
///
/// Prefix table mapping path areas to their class. Matching is segment-aware:
/// `/admin` covers `/admin` and `/admin/users` but not `/administration`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteTable {
    entries: Vec<(String, RouteClass)>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The storefront's canonical table.
    pub fn storefront() -> Self {
        Self::new()
            .public_only(["/login", "/signup", "/register", "/forget-password", "/reset-password"])
            .protected_admin(["/admin"])
            .protected_generic([
                "/user",
                "/dashboard",
                "/categories",
                "/cart",
                "/orders",
                "/orderDetail",
            ])
    }

    /// Adds one prefix. `Unclassified` entries are ignored since unlisted paths already are.
    pub fn with_prefix(mut self, prefix: &str, class: RouteClass) -> Self {
        if class != RouteClass::Unclassified {
            self.entries.push((normalize_prefix(prefix), class));
        }
        self
    }

    pub fn public_only<'a>(self, prefixes: impl IntoIterator<Item = &'a str>) -> Self {
        self.with_all(prefixes, RouteClass::PublicOnly)
    }

    pub fn protected_generic<'a>(self, prefixes: impl IntoIterator<Item = &'a str>) -> Self {
        self.with_all(prefixes, RouteClass::ProtectedGeneric)
    }

    pub fn protected_admin<'a>(self, prefixes: impl IntoIterator<Item = &'a str>) -> Self {
        self.with_all(prefixes, RouteClass::ProtectedAdmin)
    }

    fn with_all<'a>(self, prefixes: impl IntoIterator<Item = &'a str>, class: RouteClass) -> Self {
        prefixes
            .into_iter()
            .fold(self, |table, prefix| table.with_prefix(prefix, class))
    }

    /// classify
    ///
    /// Returns exactly one class for `path` (the path component only, no query string).
    pub fn classify(&self, path: &str) -> RouteClass {
        PRIORITY
            .into_iter()
            .find(|class| {
                self.entries
                    .iter()
                    .any(|(prefix, entry_class)| entry_class == class && matches_prefix(path, prefix))
            })
            .unwrap_or(RouteClass::Unclassified)
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn matches_prefix(path: &str, prefix: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Outcome of the access decision for a single navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Redirect(String),
}

/// decide
///
/// The complete identity x route-class table. Unclassified paths are always allowed;
/// admin privilege is never granted to anything but `ResolvedIdentity::Admin`.
pub fn decide(identity: ResolvedIdentity, class: RouteClass, landings: &Landings) -> Decision {
    use ResolvedIdentity as Who;
    use RouteClass as Area;

    match (identity, class) {
        (_, Area::Unclassified) => Decision::Allow,

        (Who::Anonymous, Area::PublicOnly) => Decision::Allow,
        (Who::Anonymous, Area::ProtectedGeneric | Area::ProtectedAdmin) => {
            Decision::Redirect(landings.login.clone())
        }

        (Who::User, Area::ProtectedGeneric) => Decision::Allow,
        (Who::User, Area::PublicOnly | Area::ProtectedAdmin) => {
            Decision::Redirect(landings.user.clone())
        }

        (Who::Admin, Area::ProtectedGeneric | Area::ProtectedAdmin) => Decision::Allow,
        (Who::Admin, Area::PublicOnly) => Decision::Redirect(landings.admin.clone()),
    }
}

/// NavigationGate
///
/// The resolver, route table and landings, assembled once from the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationGate {
    pub resolver: SessionResolver,
    pub routes: RouteTable,
    pub landings: Landings,
}

impl NavigationGate {
    pub fn new(resolver: SessionResolver, routes: RouteTable, landings: Landings) -> Self {
        Self {
            resolver,
            routes,
            landings,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            SessionResolver::from_settings(&config.cookies),
            RouteTable::storefront(),
            config.landings.clone(),
        )
    }

    /// Runs the full pipeline for one navigation.
    pub fn evaluate<S>(&self, store: &S, path: &str) -> Decision
    where
        S: CredentialStore + ?Sized,
    {
        decide(self.resolver.resolve(store), self.routes.classify(path), &self.landings)
    }
}

/// navigation_gate
///
/// Middleware applied to the whole router. Allowed requests continue to their handler;
/// everything else receives a single `303 See Other` to the decided landing.
pub async fn navigation_gate(
    State(gate): State<Arc<NavigationGate>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();
    let identity = gate.resolver.resolve(&RequestCookies::new(request.headers()));
    let class = gate.routes.classify(&path);

    match decide(identity, class, &gate.landings) {
        Decision::Allow => {
            tracing::trace!(?identity, ?class, %path, "navigation allowed");
            next.run(request).await
        }
        Decision::Redirect(target) => {
            tracing::debug!(?identity, ?class, %path, %target, "navigation redirected");
            Redirect::to(&target).into_response()
        }
    }
}
