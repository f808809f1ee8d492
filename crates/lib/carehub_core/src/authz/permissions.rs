//! Static role → permission map.
//!
//! Loaded once at startup and never mutated afterwards. Administrators hold
//! every permission regardless of what the map says.

use std::collections::{BTreeSet, HashMap};

use thiserror::Error;

use super::role::{Role, UnknownRole};

/// Permission string granting everything.
pub const WILDCARD: &str = "all";

/// Errors raised while loading a permission map.
#[derive(Debug, Error)]
pub enum PermissionConfigError {
    #[error("invalid role permission JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    UnknownRole(#[from] UnknownRole),
}

/// Permissions granted to each role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolePermissions {
    map: HashMap<Role, BTreeSet<String>>,
}

impl RolePermissions {
    /// Build from explicit entries. Roles not listed get no permissions.
    pub fn new<I, P>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Role, P)>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        let mut map: HashMap<Role, BTreeSet<String>> = HashMap::new();
        for (role, perms) in entries {
            map.entry(role)
                .or_default()
                .extend(perms.into_iter().map(Into::into));
        }
        map.entry(Role::Administrator)
            .or_default()
            .insert(WILDCARD.to_string());
        Self { map }
    }

    /// Parse `{"caregiver": ["residents.read", ...], ...}`.
    pub fn from_json(json: &str) -> Result<Self, PermissionConfigError> {
        let raw: HashMap<String, Vec<String>> = serde_json::from_str(json)?;
        let entries = raw
            .into_iter()
            .map(|(role, perms)| Ok((role.parse::<Role>()?, perms)))
            .collect::<Result<Vec<_>, UnknownRole>>()?;
        Ok(Self::new(entries))
    }

    /// Whether `role` holds `permission` (directly or through the wildcard).
    pub fn allows(&self, role: Role, permission: &str) -> bool {
        if role.is_admin() {
            return true;
        }
        self.map
            .get(&role)
            .is_some_and(|perms| perms.contains(permission) || perms.contains(WILDCARD))
    }

    /// Sorted permission list for a role.
    pub fn permissions_for(&self, role: Role) -> Vec<String> {
        self.map
            .get(&role)
            .map(|perms| perms.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for RolePermissions {
    fn default() -> Self {
        Self::new([
            (
                Role::Caregiver,
                vec![
                    "residents.read",
                    "medications.read",
                    "medications.administer",
                    "schedules.read",
                    "tasks.read",
                    "tasks.update",
                    "care_plans.read",
                    "documents.read",
                ],
            ),
            (
                Role::Physician,
                vec![
                    "residents.read",
                    "residents.update",
                    "medications.read",
                    "medications.prescribe",
                    "care_plans.read",
                    "care_plans.write",
                    "documents.read",
                    "documents.write",
                    "reports.read",
                ],
            ),
            (
                Role::Supervisor,
                vec![
                    "residents.read",
                    "residents.write",
                    "medications.read",
                    "schedules.read",
                    "schedules.write",
                    "tasks.read",
                    "tasks.write",
                    "care_plans.read",
                    "care_plans.write",
                    "documents.read",
                    "documents.write",
                    "inspections.read",
                    "inspections.write",
                    "contacts.read",
                    "contacts.write",
                    "reports.read",
                    "users.read",
                ],
            ),
            (Role::Administrator, vec![WILDCARD]),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_allows_everything() {
        let perms = RolePermissions::new(Vec::<(Role, Vec<String>)>::new());
        assert!(perms.allows(Role::Administrator, "anything.at.all"));
        assert_eq!(perms.permissions_for(Role::Administrator), vec!["all"]);
    }

    #[test]
    fn default_map_grants_by_role() {
        let perms = RolePermissions::default();
        assert!(perms.allows(Role::Caregiver, "medications.administer"));
        assert!(!perms.allows(Role::Caregiver, "medications.prescribe"));
        assert!(perms.allows(Role::Physician, "medications.prescribe"));
        assert!(perms.allows(Role::Supervisor, "users.read"));
        assert!(!perms.allows(Role::Caregiver, "users.read"));
    }

    #[test]
    fn wildcard_grants_to_non_admin() {
        let perms = RolePermissions::new([(Role::Supervisor, vec![WILDCARD])]);
        assert!(perms.allows(Role::Supervisor, "reports.export"));
        assert!(!perms.allows(Role::Caregiver, "reports.export"));
    }

    #[test]
    fn from_json_parses_roles() {
        let perms = RolePermissions::from_json(
            r#"{"caregiver": ["tasks.read"], "administrator": []}"#,
        )
        .unwrap();
        assert!(perms.allows(Role::Caregiver, "tasks.read"));
        assert!(!perms.allows(Role::Caregiver, "tasks.write"));
        assert!(!perms.allows(Role::Physician, "tasks.read"));
        assert!(perms.allows(Role::Administrator, "tasks.write"));
    }

    #[test]
    fn from_json_rejects_unknown_role() {
        let err = RolePermissions::from_json(r#"{"janitor": ["mop"]}"#).unwrap_err();
        assert!(matches!(err, PermissionConfigError::UnknownRole(_)));
        let err = RolePermissions::from_json("not json").unwrap_err();
        assert!(matches!(err, PermissionConfigError::Json(_)));
    }
}
