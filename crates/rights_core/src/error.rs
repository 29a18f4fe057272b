use thiserror::Error;

#[derive(Debug, Error)]
pub enum RightsError {
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// A write failed after validation passed; details are logged, not returned.
    #[error("unknown: {0}")]
    Unknown(String),

    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

impl RightsError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Generic write failure, surfaced as `Unknown(DBError)`.
    pub fn db_write() -> Self {
        Self::Unknown("DBError".into())
    }

    /// Stable category code returned to callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated(_) => "UNAUTHENTICATED",
            Self::PermissionDenied(_) => "PERMISSION_DENIED",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::ServiceUnavailable(_) => "UNAVAILABLE",
            Self::Unknown(_) => "UNKNOWN",
            Self::Internal(_) => "INTERNAL",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::Unauthenticated(_) => 401,
            Self::PermissionDenied(_) => 403,
            Self::InvalidArgument(_) => 400,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::ServiceUnavailable(_) => 503,
            Self::Unknown(_) => 500,
            Self::Internal(_) => 500,
        }
    }

    /// Message safe to hand back to a caller. Internal causes are replaced by `DBError`.
    pub fn public_message(&self) -> String {
        match self {
            Self::Unauthenticated(m)
            | Self::PermissionDenied(m)
            | Self::InvalidArgument(m)
            | Self::NotFound(m)
            | Self::Conflict(m)
            | Self::ServiceUnavailable(m)
            | Self::Unknown(m) => m.clone(),
            Self::Internal(_) => "DBError".into(),
        }
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── http_status ───────────────────────────────────────────────

    #[test]
    fn http_status_per_variant() {
        assert_eq!(RightsError::Unauthenticated("x".into()).http_status(), 401);
        assert_eq!(RightsError::PermissionDenied("x".into()).http_status(), 403);
        assert_eq!(RightsError::invalid("x").http_status(), 400);
        assert_eq!(RightsError::NotFound("x".into()).http_status(), 404);
        assert_eq!(RightsError::Conflict("x".into()).http_status(), 409);
        assert_eq!(
            RightsError::ServiceUnavailable("x".into()).http_status(),
            503
        );
        assert_eq!(RightsError::db_write().http_status(), 500);
        assert_eq!(
            RightsError::Internal(anyhow::anyhow!("boom")).http_status(),
            500
        );
    }

    // ── Display / public message ──────────────────────────────────

    #[test]
    fn display_invalid_argument() {
        let e = RightsError::invalid("sku already exists");
        assert_eq!(e.to_string(), "invalid argument: sku already exists");
        assert_eq!(e.code(), "INVALID_ARGUMENT");
    }

    #[test]
    fn internal_details_are_not_public() {
        let e = RightsError::Internal(anyhow::anyhow!("connection refused on 10.0.0.3"));
        assert_eq!(e.public_message(), "DBError");
        assert!(e.to_string().contains("10.0.0.3"));
    }

    #[test]
    fn db_write_is_unknown_db_error() {
        let e = RightsError::db_write();
        assert_eq!(e.code(), "UNKNOWN");
        assert_eq!(e.public_message(), "DBError");
    }
}
