//! Access gate
//!
//! The caller claims a role through the `role` header. Claims are not
//! verified; the gate only checks them against each endpoint's allow-list.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use dex_core::{InvalidRole, Role, ServiceError};
use tracing::{debug, warn};

use crate::error::ApiError;

/// Header carrying the role claim
pub const ROLE_HEADER: &str = "role";

/// Endpoints open to every known role
pub const ANY_ROLE: &[Role] = &Role::ALL;

/// Endpoints reserved to administrators
pub const ADMIN_ONLY: &[Role] = &[Role::Admin];

/// A syntactically valid role claim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleClaim(pub Role);

impl RoleClaim {
    /// Parse the raw header value; absent or unknown roles are rejected
    pub fn parse(raw: Option<&str>) -> Result<Self, ServiceError> {
        let raw = raw.ok_or_else(|| {
            ServiceError::BadRequest(format!("Missing '{ROLE_HEADER}' header"))
        })?;
        let role = raw.parse::<Role>().map_err(|InvalidRole(value)| {
            warn!(role = %value, "Rejected unknown role");
            ServiceError::from(InvalidRole(value))
        })?;
        Ok(Self(role))
    }

    /// Pass the claim if its role is in `allowed`
    pub fn require(self, allowed: &[Role]) -> Result<Role, ApiError> {
        if allowed.contains(&self.0) {
            debug!(role = %self.0, "Access granted");
            Ok(self.0)
        } else {
            warn!(role = %self.0, "Access denied");
            Err(ApiError(ServiceError::Forbidden(format!(
                "Role '{}' may not access this resource",
                self.0
            ))))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RoleClaim
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = match parts.headers.get(ROLE_HEADER) {
            Some(value) => Some(
                value
                    .to_str()
                    .map_err(|_| ApiError::bad_request("Role header is not valid text"))?,
            ),
            None => None,
        };
        Ok(Self::parse(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dex_core::ErrorKind;

    #[test]
    fn test_parse_claims() {
        assert_eq!(RoleClaim::parse(Some("admin")).unwrap(), RoleClaim(Role::Admin));
        assert_eq!(RoleClaim::parse(Some("user")).unwrap(), RoleClaim(Role::User));

        for raw in [None, Some("guest"), Some("Admin"), Some("")] {
            let err = RoleClaim::parse(raw).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::BadRequest, "{raw:?}");
        }
    }

    #[test]
    fn test_allow_lists() {
        assert_eq!(RoleClaim(Role::Admin).require(ADMIN_ONLY).unwrap(), Role::Admin);
        assert_eq!(RoleClaim(Role::User).require(ANY_ROLE).unwrap(), Role::User);

        let denied = RoleClaim(Role::User).require(ADMIN_ONLY).unwrap_err();
        assert_eq!(denied.0.kind(), ErrorKind::Forbidden);
    }
}
