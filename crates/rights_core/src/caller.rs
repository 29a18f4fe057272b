use serde::Deserialize;

use crate::error::RightsError;

/// Authenticated identity of the party invoking an operation.
///
/// Passed explicitly to every workflow. There is no ambient or thread-local identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub scopes: Vec<String>,
}

impl Caller {
    /// Construct from validated JWT claims at the server boundary.
    pub fn from_jwt_claims(claims: &JwtClaims) -> Result<Self, RightsError> {
        let user_id = claims
            .sub
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| RightsError::Unauthenticated("ClaimsNotFoundError".into()))?;
        Ok(Self {
            user_id,
            scopes: claims.scopes.clone().unwrap_or_default(),
        })
    }

    /// Construct explicitly, e.g. for tests or internal jobs.
    pub fn new(user_id: impl Into<String>, scopes: Vec<String>) -> Self {
        Self {
            user_id: user_id.into(),
            scopes,
        }
    }

    pub fn can_access(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    /// Scope Authorizer: runs before any other logic of an operation.
    pub fn authorize(&self, scope: &str) -> Result<(), RightsError> {
        if self.can_access(scope) {
            Ok(())
        } else {
            tracing::warn!(user = %self.user_id, scope = %scope, "scope not authorized");
            Err(RightsError::PermissionDenied("ScopeValidationError".into()))
        }
    }
}

/// JWT claims shape expected from the identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtClaims {
    pub sub: Option<String>,
    pub scopes: Option<Vec<String>>,
    pub exp: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_jwt_claims_happy_path() {
        let claims = JwtClaims {
            sub: Some("admin@test.com".into()),
            scopes: Some(vec!["s1".into(), "s2".into()]),
            exp: None,
        };
        let c = Caller::from_jwt_claims(&claims).unwrap();
        assert_eq!(c.user_id, "admin@test.com");
        assert_eq!(c.scopes, vec!["s1", "s2"]);
    }

    #[test]
    fn from_jwt_claims_missing_sub() {
        let claims = JwtClaims {
            sub: None,
            scopes: Some(vec!["s1".into()]),
            exp: None,
        };
        let err = Caller::from_jwt_claims(&claims).unwrap_err();
        assert!(matches!(err, RightsError::Unauthenticated(_)));
    }

    #[test]
    fn missing_scopes_default_to_none() {
        let claims = JwtClaims {
            sub: Some("u".into()),
            scopes: None,
            exp: None,
        };
        let c = Caller::from_jwt_claims(&claims).unwrap();
        assert!(c.scopes.is_empty());
        assert!(c.authorize("s1").is_err());
    }

    #[test]
    fn authorize_is_exact_membership() {
        let c = Caller::new("u", vec!["France".into()]);
        assert!(c.authorize("France").is_ok());
        let err = c.authorize("france").unwrap_err();
        assert!(matches!(err, RightsError::PermissionDenied(_)));
    }
}
