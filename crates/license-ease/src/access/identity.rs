use std::fmt;

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use super::AccessError;

/// Caller role resolved from a verified credential.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    Client,
    Officer,
    Admin,
    /// A role claim this service does not recognise; never passes a role check.
    Unrecognized(String),
}

impl Role {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "client" => Role::Client,
            "officer" => Role::Officer,
            "admin" => Role::Admin,
            _ => Role::Unrecognized(raw.trim().to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Role::Client => "client",
            Role::Officer => "officer",
            Role::Admin => "admin",
            Role::Unrecognized(raw) => raw,
        }
    }

    /// Officers and admins may resolve applications and annotate them.
    pub fn can_review(&self) -> bool {
        matches!(self, Role::Officer | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Authenticated actor for the duration of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub subject_id: String,
    pub email: Option<String>,
    pub role: Role,
}

impl Principal {
    pub fn new(subject_id: impl Into<String>, email: Option<String>, role: Role) -> Self {
        Self {
            subject_id: subject_id.into(),
            email,
            role,
        }
    }
}

/// Claims returned by the identity provider after a token verifies.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VerifiedClaims {
    pub subject: String,
    pub claims: Map<String, Value>,
}

impl VerifiedClaims {
    pub fn email(&self) -> Option<String> {
        self.claims
            .get("email")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Walks a dotted path such as `custom_claims.role`.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.').filter(|segment| !segment.is_empty());
        let first = segments.next()?;
        let mut current = self.claims.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }
}

/// External identity provider boundary.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Returns the verified claims, or the provider's reason for refusing the token.
    async fn verify(&self, token: &str) -> Result<VerifiedClaims, String>;
}

/// Grants roles through the identity provider's custom claims.
#[async_trait]
pub trait RoleAssigner: Send + Sync {
    async fn assign_role(&self, uid: &str, role: &str) -> Result<(), RoleAssignmentError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RoleAssignmentError {
    #[error("identity provider rejected role assignment: {0}")]
    Provider(String),
}

/// Where the role lives in the claims, and what to assume when it is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleClaimPolicy {
    claim_path: String,
    fallback: Role,
}

impl Default for RoleClaimPolicy {
    fn default() -> Self {
        Self::new("role", Role::Client)
    }
}

impl RoleClaimPolicy {
    pub fn new(claim_path: impl Into<String>, fallback: Role) -> Self {
        Self {
            claim_path: claim_path.into(),
            fallback,
        }
    }

    pub fn claim_path(&self) -> &str {
        &self.claim_path
    }

    pub fn fallback(&self) -> &Role {
        &self.fallback
    }

    pub fn resolve(&self, claims: &VerifiedClaims) -> Role {
        match claims.lookup(&self.claim_path).and_then(Value::as_str) {
            Some(raw) if !raw.trim().is_empty() => Role::parse(raw),
            _ => self.fallback.clone(),
        }
    }

    pub fn principal(&self, claims: &VerifiedClaims) -> Principal {
        Principal::new(claims.subject.clone(), claims.email(), self.resolve(claims))
    }
}

/// Verifies HS256 tokens signed with a shared secret.
#[derive(Clone)]
pub struct JwtIdentityVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for JwtIdentityVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtIdentityVerifier")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl JwtIdentityVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl IdentityVerifier for JwtIdentityVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedClaims, String> {
        let data = decode::<Map<String, Value>>(token, &self.key, &self.validation)
            .map_err(|err| err.to_string())?;
        let claims = data.claims;
        let subject = claims
            .get("sub")
            .and_then(Value::as_str)
            .filter(|sub| !sub.is_empty())
            .ok_or_else(|| "token has no subject".to_string())?
            .to_string();
        Ok(VerifiedClaims { subject, claims })
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AccessError> {
    let header = header.ok_or_else(|| AccessError::unauthenticated("missing or invalid token"))?;
    match header.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(AccessError::unauthenticated("missing or invalid token")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn claims(value: Value) -> VerifiedClaims {
        VerifiedClaims {
            subject: "uid-1".to_string(),
            claims: value.as_object().cloned().unwrap_or_default(),
        }
    }

    fn sign(secret: &str, body: Value) -> String {
        encode(
            &Header::default(),
            &body,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("token encodes")
    }

    fn future_exp() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    #[test]
    fn top_level_role_claim_is_read() {
        let policy = RoleClaimPolicy::default();
        assert_eq!(policy.resolve(&claims(json!({ "role": "admin" }))), Role::Admin);
    }

    #[test]
    fn nested_claim_path_is_walked() {
        let policy = RoleClaimPolicy::new("custom_claims.role", Role::Client);
        let resolved = policy.resolve(&claims(json!({ "custom_claims": { "role": "officer" } })));
        assert_eq!(resolved, Role::Officer);
    }

    #[test]
    fn missing_role_uses_configured_fallback() {
        let policy = RoleClaimPolicy::new("role", Role::Officer);
        assert_eq!(policy.resolve(&claims(json!({}))), Role::Officer);
        assert_eq!(policy.resolve(&claims(json!({ "role": 7 }))), Role::Officer);
    }

    #[test]
    fn unknown_role_is_preserved_verbatim() {
        let policy = RoleClaimPolicy::default();
        let role = policy.resolve(&claims(json!({ "role": "Auditor" })));
        assert_eq!(role, Role::Unrecognized("Auditor".to_string()));
        assert_eq!(role.label(), "Auditor");
        assert!(!role.can_review());
    }

    #[test]
    fn bearer_token_requires_scheme() {
        assert_eq!(bearer_token(Some("Bearer abc")).unwrap(), "abc");
        assert!(bearer_token(None).is_err());
        assert!(bearer_token(Some("Basic abc")).is_err());
        assert!(bearer_token(Some("Bearer   ")).is_err());
    }

    #[tokio::test]
    async fn jwt_verifier_accepts_valid_tokens() {
        let verifier = JwtIdentityVerifier::new("secret");
        let token = sign(
            "secret",
            json!({ "sub": "uid-9", "email": "ada@example.com", "role": "client", "exp": future_exp() }),
        );
        let verified = verifier.verify(&token).await.expect("token verifies");
        assert_eq!(verified.subject, "uid-9");
        assert_eq!(verified.email().as_deref(), Some("ada@example.com"));
    }

    #[tokio::test]
    async fn jwt_verifier_rejects_wrong_secret() {
        let verifier = JwtIdentityVerifier::new("secret");
        let token = sign("other", json!({ "sub": "uid-9", "exp": future_exp() }));
        let reason = verifier.verify(&token).await.expect_err("signature mismatch");
        assert!(!reason.is_empty());
    }

    #[tokio::test]
    async fn jwt_verifier_rejects_expired_tokens() {
        let verifier = JwtIdentityVerifier::new("secret");
        let token = sign(
            "secret",
            json!({ "sub": "uid-9", "exp": chrono::Utc::now().timestamp() - 3600 }),
        );
        assert!(verifier.verify(&token).await.is_err());
    }
}
