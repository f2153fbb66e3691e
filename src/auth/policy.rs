//! Role and ownership checks shared by every mutating controller.

use crate::auth::models::{AuthenticatedUser, Role};
use crate::error::AppError;

/// Roles allowed to manage bootcamps and courses.
pub const PUBLISHERS: &[Role] = &[Role::Publisher, Role::Admin];

/// Roles allowed to write reviews.
pub const REVIEWERS: &[Role] = &[Role::User, Role::Admin];

/// Roles allowed to manage user accounts.
pub const ADMINS: &[Role] = &[Role::Admin];

/// Fails with `Forbidden` when the caller's role is not in `allowed`.
pub fn require_role(caller: &AuthenticatedUser, allowed: &[Role]) -> Result<(), AppError> {
    if allowed.contains(&caller.role) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "User role {} is not authorized to access this route",
            caller.role
        )))
    }
}

/// Fails with `Forbidden` unless the caller owns the resource or is an admin.
pub fn ensure_owner_or_admin(caller: &AuthenticatedUser, owner_id: &str) -> Result<(), AppError> {
    if caller.is_admin() || caller.user_id == owner_id {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "User {} is not authorized to modify this resource",
            caller.user_id
        )))
    }
}

/// Role check followed by an ownership check when the resource has an owner.
pub fn authorize(
    caller: &AuthenticatedUser,
    owner_id: Option<&str>,
    allowed: &[Role],
) -> Result<(), AppError> {
    require_role(caller, allowed)?;
    match owner_id {
        Some(owner) => ensure_owner_or_admin(caller, owner),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(id: &str, role: Role) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: id.to_string(),
            email: format!("{id}@example.com"),
            role,
        }
    }

    #[test]
    fn test_role_in_allowed_set() {
        assert!(require_role(&caller("u1", Role::Publisher), PUBLISHERS).is_ok());
        assert!(require_role(&caller("u1", Role::Admin), ADMINS).is_ok());
    }

    #[test]
    fn test_role_outside_allowed_set() {
        match require_role(&caller("u1", Role::User), PUBLISHERS) {
            Err(AppError::Forbidden(msg)) => assert!(msg.contains("User role user")),
            other => panic!("Expected Forbidden, got: {:?}", other),
        }
        assert!(require_role(&caller("u1", Role::Publisher), REVIEWERS).is_err());
    }

    #[test]
    fn test_owner_passes() {
        assert!(ensure_owner_or_admin(&caller("u1", Role::Publisher), "u1").is_ok());
    }

    #[test]
    fn test_admin_bypasses_ownership() {
        assert!(ensure_owner_or_admin(&caller("root", Role::Admin), "u1").is_ok());
    }

    #[test]
    fn test_non_owner_rejected() {
        let result = ensure_owner_or_admin(&caller("u2", Role::Publisher), "u1");
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[test]
    fn test_authorize_checks_role_before_ownership() {
        // An owner with the wrong role is still rejected.
        let result = authorize(&caller("u1", Role::User), Some("u1"), PUBLISHERS);
        match result {
            Err(AppError::Forbidden(msg)) => assert!(msg.contains("role")),
            other => panic!("Expected Forbidden, got: {:?}", other),
        }
    }

    #[test]
    fn test_authorize_without_owner() {
        assert!(authorize(&caller("u1", Role::Publisher), None, PUBLISHERS).is_ok());
    }
}
