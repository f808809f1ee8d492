//! The closed set of roles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Role of an identity. Stored and transmitted as its lowercase wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(rename = "admin", alias = "administrator")]
    Administrator,
    Caregiver,
    Physician,
    Supervisor,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Administrator,
        Role::Caregiver,
        Role::Physician,
        Role::Supervisor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrator => "admin",
            Role::Caregiver => "caregiver",
            Role::Physician => "physician",
            Role::Supervisor => "supervisor",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Administrator)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised role name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" | "administrator" => Ok(Role::Administrator),
            "caregiver" => Ok(Role::Caregiver),
            "physician" => Ok(Role::Physician),
            "supervisor" => Ok(Role::Supervisor),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_names_and_aliases() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Administrator));
        assert_eq!("Administrator".parse::<Role>(), Ok(Role::Administrator));
        assert_eq!("caregiver".parse::<Role>(), Ok(Role::Caregiver));
        assert!("nurse".parse::<Role>().is_err());
    }

    #[test]
    fn as_str_round_trips_through_from_str() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
    }

    #[test]
    fn serde_uses_wire_names() {
        assert_eq!(
            serde_json::to_string(&Role::Administrator).unwrap(),
            "\"admin\""
        );
        let role: Role = serde_json::from_str("\"administrator\"").unwrap();
        assert_eq!(role, Role::Administrator);
        let role: Role = serde_json::from_str("\"physician\"").unwrap();
        assert_eq!(role, Role::Physician);
    }
}
