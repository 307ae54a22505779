use std::fmt::Display;

use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::model::db::user::UserCore;

/// Different privilege levels.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Rights {
    Voter = 0,
    Admin = 1,
}

impl Rights {
    /// The rights a user currently holds.
    pub fn of(user: &UserCore) -> Self {
        if user.is_admin {
            Self::Admin
        } else {
            Self::Voter
        }
    }
}

impl Display for Rights {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Voter => "voter",
                Self::Admin => "admin",
            }
        )
    }
}

/// A role that a route can demand of its caller.
pub trait Role {
    /// Can a user holding `rights` act in this role?
    fn permits(rights: Rights) -> bool;
}

/// Any registered user. Admins may vote too.
pub struct Voter;

impl Role for Voter {
    fn permits(_rights: Rights) -> bool {
        true
    }
}

/// Administrators only.
pub struct Admin;

impl Role for Admin {
    fn permits(rights: Rights) -> bool {
        rights == Rights::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admins_can_act_as_voters() {
        assert!(Voter::permits(Rights::Voter));
        assert!(Voter::permits(Rights::Admin));
        assert!(Admin::permits(Rights::Admin));
        assert!(!Admin::permits(Rights::Voter));
    }
}
