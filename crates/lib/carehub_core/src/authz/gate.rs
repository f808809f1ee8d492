//! Authorization gates.
//!
//! Each gate takes the identity attached by authentication (or `None` if the
//! request never passed it) and either returns that identity for chaining or
//! the error the request should fail with.

use uuid::Uuid;

use super::permissions::RolePermissions;
use super::role::Role;
use crate::auth::AuthError;
use crate::models::auth::IdentitySummary;

/// Pass if the identity's role is in `allowed`.
pub fn require_role<'a>(
    identity: Option<&'a IdentitySummary>,
    allowed: &[Role],
) -> Result<&'a IdentitySummary, AuthError> {
    let identity = identity.ok_or(AuthError::Unauthenticated)?;
    if allowed.contains(&identity.role) {
        Ok(identity)
    } else {
        Err(AuthError::InsufficientRole)
    }
}

/// Pass if the identity's role holds `permission`. Administrators always pass.
pub fn require_permission<'a>(
    identity: Option<&'a IdentitySummary>,
    permissions: &RolePermissions,
    permission: &str,
) -> Result<&'a IdentitySummary, AuthError> {
    let identity = identity.ok_or(AuthError::Unauthenticated)?;
    if permissions.allows(identity.role, permission) {
        Ok(identity)
    } else {
        Err(AuthError::InsufficientPermission(permission.to_string()))
    }
}

/// Pass if the identity is an administrator or is `target` itself.
pub fn require_self_or_admin(
    identity: Option<&IdentitySummary>,
    target: Uuid,
) -> Result<&IdentitySummary, AuthError> {
    let identity = identity.ok_or(AuthError::Unauthenticated)?;
    if identity.role.is_admin() || identity.id == target {
        Ok(identity)
    } else {
        Err(AuthError::AccessDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(role: Role) -> IdentitySummary {
        IdentitySummary {
            id: Uuid::new_v4(),
            email: format!("{role}@example.com"),
            role,
            facility_id: None,
        }
    }

    #[test]
    fn role_gate() {
        let caregiver = identity(Role::Caregiver);
        let admin = identity(Role::Administrator);
        assert!(matches!(
            require_role(Some(&caregiver), &[Role::Administrator]),
            Err(AuthError::InsufficientRole)
        ));
        assert_eq!(
            require_role(Some(&admin), &[Role::Administrator]).unwrap(),
            &admin
        );
        assert!(require_role(Some(&caregiver), &[Role::Supervisor, Role::Caregiver]).is_ok());
        assert!(matches!(
            require_role(None, &[Role::Caregiver]),
            Err(AuthError::Unauthenticated)
        ));
    }

    #[test]
    fn permission_gate() {
        let perms = RolePermissions::default();
        let caregiver = identity(Role::Caregiver);
        let admin = identity(Role::Administrator);

        assert!(require_permission(Some(&caregiver), &perms, "tasks.read").is_ok());
        match require_permission(Some(&caregiver), &perms, "users.read") {
            Err(AuthError::InsufficientPermission(p)) => assert_eq!(p, "users.read"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(require_permission(Some(&admin), &perms, "anything").is_ok());
        assert!(matches!(
            require_permission(None, &perms, "tasks.read"),
            Err(AuthError::Unauthenticated)
        ));
    }

    #[test]
    fn self_or_admin_gate() {
        let caregiver = identity(Role::Caregiver);
        let admin = identity(Role::Administrator);
        let other = Uuid::new_v4();

        assert!(require_self_or_admin(Some(&caregiver), caregiver.id).is_ok());
        assert!(matches!(
            require_self_or_admin(Some(&caregiver), other),
            Err(AuthError::AccessDenied)
        ));
        assert!(require_self_or_admin(Some(&admin), other).is_ok());
        assert!(matches!(
            require_self_or_admin(None, other),
            Err(AuthError::Unauthenticated)
        ));
    }

    #[test]
    fn gates_chain() {
        let perms = RolePermissions::default();
        let supervisor = identity(Role::Supervisor);
        let result = require_role(Some(&supervisor), &[Role::Supervisor])
            .and_then(|id| require_permission(Some(id), &perms, "users.read"))
            .and_then(|id| require_self_or_admin(Some(id), id.id));
        assert!(result.is_ok());
    }
}
