//! Bearer-token authentication.
//!
//! Validates an HS256 JWT and inserts the resulting `Caller` into request
//! extensions. Scope authorization happens later, inside each workflow.

use axum::{
    extract::Request,
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use rights_core::{caller::JwtClaims, Caller, RightsError};

use crate::error::AppError;

#[derive(Clone)]
pub struct JwtConfig {
    key: DecodingKey,
    validation: Validation,
}

impl JwtConfig {
    pub fn from_secret(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // `exp` is checked when present but not mandatory.
        validation.required_spec_claims.clear();
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn caller_from_token(&self, token: &str) -> Result<Caller, RightsError> {
        let data = decode::<JwtClaims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "rejected bearer token");
            RightsError::Unauthenticated("invalid token".into())
        })?;
        Caller::from_jwt_claims(&data.claims)
    }
}

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub async fn jwt_auth(mut req: Request, next: Next) -> Response {
    let Some(config) = req.extensions().get::<JwtConfig>().cloned() else {
        tracing::error!("JwtConfig extension missing from router");
        return AppError(RightsError::Internal(anyhow::anyhow!("jwt config missing")))
            .into_response();
    };
    let caller = match bearer_token(&req) {
        Some(token) => config.caller_from_token(token),
        None => Err(RightsError::Unauthenticated("missing bearer token".into())),
    };
    match caller {
        Ok(caller) => {
            req.extensions_mut().insert(caller);
            next.run(req).await
        }
        Err(e) => AppError(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    use super::*;

    const SECRET: &[u8] = b"unit-secret";

    fn token(claims: serde_json::Value, secret: &[u8]) -> String {
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    #[test]
    fn valid_token_yields_caller() {
        let cfg = JwtConfig::from_secret(SECRET);
        let t = token(json!({"sub": "admin@test.com", "scopes": ["s1"]}), SECRET);
        let caller = cfg.caller_from_token(&t).unwrap();
        assert_eq!(caller.user_id, "admin@test.com");
        assert!(caller.can_access("s1"));
    }

    #[test]
    fn wrong_secret_is_unauthenticated() {
        let cfg = JwtConfig::from_secret(SECRET);
        let t = token(json!({"sub": "u", "scopes": ["s1"]}), b"other");
        let err = cfg.caller_from_token(&t).unwrap_err();
        assert!(matches!(err, RightsError::Unauthenticated(_)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let cfg = JwtConfig::from_secret(SECRET);
        let t = token(json!({"sub": "u", "scopes": ["s1"], "exp": 1_000}), SECRET);
        assert!(cfg.caller_from_token(&t).is_err());
    }

    #[test]
    fn token_without_subject_is_rejected() {
        let cfg = JwtConfig::from_secret(SECRET);
        let t = token(json!({"scopes": ["s1"]}), SECRET);
        let err = cfg.caller_from_token(&t).unwrap_err();
        assert_eq!(err.public_message(), "ClaimsNotFoundError");
    }
}
