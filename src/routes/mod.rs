/// Router Module Index
///
/// Routes are grouped by the area the navigation gate assigns them to. The gate runs
/// before routing, so the grouping documents access rather than enforcing it.

/// Sign-in, registration, password reset, landing page, logout and health.
pub mod public;

/// Customer pages; any signed-in identity.
pub mod authenticated;

/// The admin console; admin identities only.
pub mod admin;
