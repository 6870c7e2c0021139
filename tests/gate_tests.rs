use freshpicks_storefront::{
    config::Landings,
    error::ConfigError,
    gate::{Decision, NavigationGate, RouteClass, RouteTable, decide},
    session::{MemoryStore, ResolvedIdentity, SessionResolver},
};

// --- Helpers ---

fn gate() -> NavigationGate {
    NavigationGate::new(
        SessionResolver::new("auth_token", "user_data"),
        RouteTable::storefront(),
        Landings::default(),
    )
}

fn store_with_role(role: &str) -> MemoryStore {
    let user = format!(r#"{{"_id":"u1","email":"a@b.co","role":"{role}"}}"#);
    MemoryStore::new()
        .with("auth_token", "abc")
        .with("user_data", &urlencoding::encode(&user))
}

fn redirect(path: &str) -> Decision {
    Decision::Redirect(path.to_string())
}

// --- Route Classifier ---

#[test]
fn test_public_only_prefixes_classify_as_public_only() {
    let routes = RouteTable::storefront();
    for path in [
        "/login",
        "/signup",
        "/register",
        "/forget-password",
        "/reset-password",
        "/reset-password/abc123",
    ] {
        let class = routes.classify(path);
        assert_eq!(class, RouteClass::PublicOnly, "{path}");
        assert_ne!(class, RouteClass::ProtectedAdmin);
        assert_ne!(class, RouteClass::ProtectedGeneric);
    }
}

#[test]
fn test_protected_prefixes_and_subpaths() {
    let routes = RouteTable::storefront();
    assert_eq!(routes.classify("/admin"), RouteClass::ProtectedAdmin);
    assert_eq!(routes.classify("/admin/users/42/edit"), RouteClass::ProtectedAdmin);
    for path in [
        "/user/profile",
        "/dashboard",
        "/categories/p-1",
        "/cart",
        "/cart/items/p-1",
        "/orders",
        "/orderDetail",
    ] {
        assert_eq!(routes.classify(path), RouteClass::ProtectedGeneric, "{path}");
    }
}

#[test]
fn test_unlisted_paths_are_unclassified() {
    let routes = RouteTable::storefront();
    for path in ["/", "/home", "/health", "/logout", "/swagger-ui", "/about"] {
        assert_eq!(routes.classify(path), RouteClass::Unclassified, "{path}");
    }
}

#[test]
fn test_prefix_match_respects_segment_boundaries() {
    let routes = RouteTable::storefront();
    assert_eq!(routes.classify("/administration"), RouteClass::Unclassified);
    assert_eq!(routes.classify("/users"), RouteClass::Unclassified);
    assert_eq!(routes.classify("/cartography"), RouteClass::Unclassified);
    assert_eq!(routes.classify("/login-help"), RouteClass::Unclassified);
}

#[test]
fn test_overlapping_prefixes_resolve_to_most_restrictive_class() {
    let routes = RouteTable::new()
        .public_only(["/shop"])
        .protected_generic(["/shop/account"])
        .protected_admin(["/shop/account/admin"]);

    assert_eq!(routes.classify("/shop"), RouteClass::PublicOnly);
    assert_eq!(routes.classify("/shop/account"), RouteClass::ProtectedGeneric);
    assert_eq!(
        routes.classify("/shop/account/admin/x"),
        RouteClass::ProtectedAdmin
    );
}

#[test]
fn test_with_prefix_normalizes_and_ignores_unclassified() {
    let routes = RouteTable::new()
        .with_prefix("reports/", RouteClass::ProtectedAdmin)
        .with_prefix("/ignored", RouteClass::Unclassified);

    assert_eq!(routes.classify("/reports/daily"), RouteClass::ProtectedAdmin);
    assert_eq!(routes.classify("/ignored"), RouteClass::Unclassified);
}

// --- Access Decision ---

#[test]
fn test_decision_table_is_complete() {
    let landings = Landings::default();
    use ResolvedIdentity::*;
    use RouteClass::*;

    let table = [
        (Anonymous, PublicOnly, Decision::Allow),
        (Anonymous, ProtectedGeneric, redirect("/login")),
        (Anonymous, ProtectedAdmin, redirect("/login")),
        (Anonymous, Unclassified, Decision::Allow),
        (User, PublicOnly, redirect("/dashboard")),
        (User, ProtectedGeneric, Decision::Allow),
        (User, ProtectedAdmin, redirect("/dashboard")),
        (User, Unclassified, Decision::Allow),
        (Admin, PublicOnly, redirect("/admin")),
        (Admin, ProtectedGeneric, Decision::Allow),
        (Admin, ProtectedAdmin, Decision::Allow),
        (Admin, Unclassified, Decision::Allow),
    ];

    for (identity, class, expected) in table {
        assert_eq!(
            decide(identity, class, &landings),
            expected,
            "{identity:?} on {class:?}"
        );
    }
}

#[test]
fn test_decision_uses_configured_landings() {
    let landings = Landings {
        login: "/signin".to_string(),
        user: "/home".to_string(),
        admin: "/admin/dashboard".to_string(),
    };
    assert_eq!(
        decide(ResolvedIdentity::Anonymous, RouteClass::ProtectedAdmin, &landings),
        redirect("/signin")
    );
    assert_eq!(
        decide(ResolvedIdentity::User, RouteClass::ProtectedAdmin, &landings),
        redirect("/home")
    );
    assert_eq!(
        decide(ResolvedIdentity::Admin, RouteClass::PublicOnly, &landings),
        redirect("/admin/dashboard")
    );
}

// --- Full Pipeline Scenarios ---

#[test]
fn test_admin_area_without_token_redirects_to_login() {
    assert_eq!(gate().evaluate(&MemoryStore::new(), "/admin/users"), redirect("/login"));
}

#[test]
fn test_admin_area_with_user_role_redirects_to_generic_landing() {
    assert_eq!(
        gate().evaluate(&store_with_role("user"), "/admin/users"),
        redirect("/dashboard")
    );
}

#[test]
fn test_admin_may_enter_generic_area() {
    assert_eq!(
        gate().evaluate(&store_with_role("admin"), "/dashboard"),
        Decision::Allow
    );
}

#[test]
fn test_admin_on_login_redirects_to_admin_landing() {
    assert_eq!(
        gate().evaluate(&store_with_role("admin"), "/login"),
        redirect("/admin")
    );
}

#[test]
fn test_role_match_is_case_insensitive_and_exact() {
    let gate = gate();
    assert_eq!(
        gate.evaluate(&store_with_role("ADMIN"), "/admin"),
        Decision::Allow
    );
    assert_eq!(
        gate.evaluate(&store_with_role("superadmin"), "/admin"),
        redirect("/dashboard")
    );
    assert_eq!(
        gate.evaluate(&store_with_role("Admin "), "/admin"),
        redirect("/dashboard")
    );
}

#[test]
fn test_corrupt_user_payload_behaves_as_anonymous() {
    let store = MemoryStore::new()
        .with("auth_token", "abc")
        .with("user_data", "undefined");
    let gate = gate();

    assert_eq!(gate.evaluate(&store, "/dashboard"), redirect("/login"));
    // Anonymous visitors may still reach the login page: no redirect loop.
    assert_eq!(gate.evaluate(&store, "/login"), Decision::Allow);
}

#[test]
fn test_token_without_user_record_is_anonymous() {
    let store = MemoryStore::new().with("auth_token", "abc");
    assert_eq!(gate().evaluate(&store, "/orders"), redirect("/login"));
}

#[test]
fn test_unclassified_paths_are_never_redirected() {
    let gate = gate();
    for store in [
        MemoryStore::new(),
        store_with_role("user"),
        store_with_role("admin"),
    ] {
        assert_eq!(gate.evaluate(&store, "/"), Decision::Allow);
        assert_eq!(gate.evaluate(&store, "/health"), Decision::Allow);
    }
}

// --- Landing Validation ---

#[test]
fn test_default_landings_are_valid() {
    assert!(Landings::default().validate(&RouteTable::storefront()).is_ok());
}

#[test]
fn test_landing_that_would_loop_is_rejected() {
    // A customer sent to an admin path would be redirected again.
    let landings = Landings {
        user: "/admin/users".to_string(),
        ..Landings::default()
    };
    assert!(landings.validate(&RouteTable::storefront()).is_err());

    // Anonymous visitors cannot be sent to a protected login page.
    let landings = Landings {
        login: "/dashboard".to_string(),
        ..Landings::default()
    };
    assert!(landings.validate(&RouteTable::storefront()).is_err());
}

#[test]
fn test_relative_landing_is_rejected() {
    for landings in [
        Landings {
            user: "dashboard".to_string(),
            ..Landings::default()
        },
        Landings {
            admin: "admin".to_string(),
            ..Landings::default()
        },
        Landings {
            login: "".to_string(),
            ..Landings::default()
        },
    ] {
        let result = landings.validate(&RouteTable::storefront());
        assert!(
            matches!(result, Err(ConfigError::RelativeLanding { .. })),
            "{landings:?}"
        );
    }
}
