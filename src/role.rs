use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    None,
    Student,
    Admin,
    SuperAdmin,
}

impl Into<u8> for Role {
    fn into(self) -> u8 {
        match self {
            Role::None => 0u8,
            Role::Student => 1u8,
            Role::Admin => 2u8,
            Role::SuperAdmin => 3u8,
        }
    }
}

impl From<u8> for Role {
    fn from(value: u8) -> Self {
        vec![Role::None, Role::Student, Role::Admin, Role::SuperAdmin][value as usize]
    }
}

impl Role {
    /// Indicates whether a user with this role can manage batches, tests
    /// and student accounts.
    pub fn can_administer(self) -> bool {
        self >= Role::Admin
    }
}

impl std::default::Default for Role {
    fn default() -> Self {
        Role::None
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::None => write!(f, "none"),
            Role::Student => write!(f, "student"),
            Role::Admin => write!(f, "admin"),
            Role::SuperAdmin => write!(f, "super_admin"),
        }
    }
}

impl std::convert::Into<String> for Role {
    fn into(self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_roles_order_above_students() {
        assert!(Role::Admin > Role::Student);
        assert!(Role::SuperAdmin > Role::Admin);
        assert!(Role::Admin.can_administer());
        assert!(!Role::Student.can_administer());
    }
}
