//! Role-based link permissions.
//!
//! Predicates: `public`, `authenticated`, or a comma-separated list of
//! roles (`admin,editor`) where any one role grants access. Each role may
//! carry a `role:` prefix.

use tracing::debug;

use crate::core::collab::Authorizer;
use crate::core::session::AuthContext;

#[derive(Debug, Clone, Copy, Default)]
pub struct RoleAuthorizer;

impl Authorizer for RoleAuthorizer {
    fn check(&self, predicate: &str, auth: &AuthContext) -> bool {
        let granted = match predicate.trim() {
            "" | "public" => true,
            "authenticated" => auth.is_authenticated(),
            roles => roles
                .split(',')
                .map(|role| role.trim())
                .map(|role| role.strip_prefix("role:").unwrap_or(role).trim())
                .filter(|role| !role.is_empty())
                .any(|role| auth.has_role(role)),
        };
        debug!(predicate, granted, "permission check");
        granted
    }
}
