use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::identity::{bearer_token, IdentityVerifier, Principal, Role, RoleClaimPolicy};
use super::AccessError;
use crate::error::ApiError;

pub const CLIENT_ONLY: &[Role] = &[Role::Client];
pub const REVIEWERS: &[Role] = &[Role::Officer, Role::Admin];
pub const ADMIN_ONLY: &[Role] = &[Role::Admin];
pub const ALL_ROLES: &[Role] = &[Role::Client, Role::Officer, Role::Admin];

/// Identity gate: turns an inbound bearer credential into a [`Principal`].
#[derive(Clone)]
pub struct AccessGate {
    verifier: Arc<dyn IdentityVerifier>,
    policy: Arc<RoleClaimPolicy>,
}

impl AccessGate {
    pub fn new(verifier: Arc<dyn IdentityVerifier>, policy: RoleClaimPolicy) -> Self {
        Self {
            verifier,
            policy: Arc::new(policy),
        }
    }

    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AccessError> {
        let header_value = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        let token = bearer_token(header_value)?;

        let claims = self.verifier.verify(token).await.map_err(|reason| {
            tracing::warn!(%reason, "token verification failed");
            AccessError::Unauthenticated(format!("token verification failed: {reason}"))
        })?;

        Ok(self.policy.principal(&claims))
    }

    /// Guard admitting only principals whose role is in `roles`.
    pub fn permit(&self, roles: &'static [Role]) -> RoleGuard {
        RoleGuard {
            gate: self.clone(),
            permitted: roles,
        }
    }
}

/// Per-route authorization value attached with `route_layer(from_fn_with_state(..))`.
#[derive(Clone)]
pub struct RoleGuard {
    gate: AccessGate,
    permitted: &'static [Role],
}

impl RoleGuard {
    pub fn authorize(&self, principal: &Principal) -> Result<(), AccessError> {
        if self.permitted.contains(&principal.role) {
            Ok(())
        } else {
            tracing::warn!(
                subject = %principal.subject_id,
                role = %principal.role,
                "request denied for role"
            );
            Err(AccessError::Forbidden {
                role: principal.role.label().to_string(),
            })
        }
    }

    /// Reuses a principal resolved earlier in the stack before authenticating again.
    pub async fn check(
        &self,
        headers: &HeaderMap,
        resolved: Option<Principal>,
    ) -> Result<Principal, AccessError> {
        let principal = match resolved {
            Some(principal) => principal,
            None => self.gate.authenticate(headers).await?,
        };
        self.authorize(&principal)?;
        Ok(principal)
    }
}

/// Middleware enforcing a [`RoleGuard`] and exposing the principal to the handler.
pub async fn enforce_roles(
    State(guard): State<RoleGuard>,
    mut request: Request,
    next: Next,
) -> Response {
    let resolved = request.extensions().get::<Principal>().cloned();
    let outcome = guard.check(request.headers(), resolved).await;
    match outcome {
        Ok(principal) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(err) => ApiError::from(err).into_response(),
    }
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthenticated("no principal in request context".into()))
    }
}
