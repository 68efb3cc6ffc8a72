//! Identity gate and role authorization for every mutating route.

pub mod gate;
pub mod identity;
pub mod router;

pub use gate::{enforce_roles, AccessGate, RoleGuard, ADMIN_ONLY, ALL_ROLES, CLIENT_ONLY, REVIEWERS};
pub use identity::{
    bearer_token, IdentityVerifier, JwtIdentityVerifier, Principal, Role, RoleAssigner,
    RoleAssignmentError, RoleClaimPolicy, VerifiedClaims,
};
pub use router::access_router;

/// Authentication and authorization failures; the two map to 401 and 403 respectively.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("{0}")]
    Unauthenticated(String),
    #[error("unauthorized - insufficient role '{role}'")]
    Forbidden { role: String },
}

impl AccessError {
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated(message.into())
    }
}
