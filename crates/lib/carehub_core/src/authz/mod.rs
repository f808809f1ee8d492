//! Authorization: the closed role set, the role → permission map, the gates
//! that check an attached identity against them, and facility scoping.
//!
//! Gates only inspect an identity that authentication already attached; none
//! of them look at tokens.

pub mod gate;
pub mod permissions;
pub mod role;
pub mod scope;

pub use gate::{require_permission, require_role, require_self_or_admin};
pub use permissions::RolePermissions;
pub use role::Role;
pub use scope::{FacilityScope, ScopeFallback, derive_scope};
