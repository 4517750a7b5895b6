use serde::{Deserialize, Serialize};

/// Which side of a support conversation the local viewer is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Storefront customer using the chat widget.
    Customer,
    /// Support employee using the multi-conversation console.
    Employee,
}

impl Role {
    pub fn opposite(self) -> Self {
        match self {
            Self::Customer => Self::Employee,
            Self::Employee => Self::Customer,
        }
    }

    pub fn as_label(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Employee => "employee",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_role_swaps_sides() {
        assert_eq!(Role::Customer.opposite(), Role::Employee);
        assert_eq!(Role::Employee.opposite(), Role::Customer);
    }

    #[test]
    fn serializes_as_lowercase_label() {
        let raw = serde_json::to_string(&Role::Employee).expect("role must serialize");

        assert_eq!(raw, "\"employee\"");
        assert_eq!(Role::Customer.as_label(), "customer");
    }
}
