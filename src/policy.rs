//! Which roles may run which operation.
//!
//! Every gated route names one [`Operation`]; this table is the only place
//! role sets are written down.

use std::fmt;

use crate::models::user::Role;

/// An operation exposed by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// List sites and fetch their attachments.
    ReadSites,
    CreateSite,
    /// Update a site or upload images for it.
    EditSite,
    DeleteSite,
    /// List, create and update users.
    ManageUsers,
    /// Read the caller's own session.
    ViewSession,
}

impl Operation {
    /// Roles allowed to run this operation.
    pub const fn allowed_roles(self) -> &'static [Role] {
        match self {
            Operation::ReadSites => &[Role::SuperAdmin, Role::Admin, Role::Editor, Role::Viewer],
            Operation::CreateSite => &[Role::SuperAdmin, Role::Admin, Role::Editor, Role::Add],
            Operation::EditSite => &[Role::SuperAdmin, Role::Admin, Role::Editor],
            Operation::DeleteSite => &[Role::SuperAdmin, Role::Admin],
            Operation::ManageUsers => &[Role::SuperAdmin],
            Operation::ViewSession => &Role::ALL,
        }
    }

    /// Whether `role` may run this operation.
    pub fn permits(self, role: Role) -> bool {
        self.allowed_roles().contains(&role)
    }

    pub fn name(self) -> &'static str {
        match self {
            Operation::ReadSites => "read_sites",
            Operation::CreateSite => "create_site",
            Operation::EditSite => "edit_site",
            Operation::DeleteSite => "delete_site",
            Operation::ManageUsers => "manage_users",
            Operation::ViewSession => "view_session",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Rows: read, create, edit, delete, manage users.
    fn capabilities(role: Role) -> [bool; 5] {
        [
            Operation::ReadSites.permits(role),
            Operation::CreateSite.permits(role),
            Operation::EditSite.permits(role),
            Operation::DeleteSite.permits(role),
            Operation::ManageUsers.permits(role),
        ]
    }

    #[test]
    fn table_matches_capability_tiers() {
        assert_eq!(capabilities(Role::SuperAdmin), [true, true, true, true, true]);
        assert_eq!(capabilities(Role::Admin), [true, true, true, true, false]);
        assert_eq!(capabilities(Role::Editor), [true, true, true, false, false]);
        assert_eq!(capabilities(Role::Viewer), [true, false, false, false, false]);
        assert_eq!(capabilities(Role::Add), [false, true, false, false, false]);
    }

    #[test]
    fn every_role_can_view_its_session() {
        for role in Role::ALL {
            assert!(Operation::ViewSession.permits(role));
        }
    }
}
