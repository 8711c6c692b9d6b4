use std::fmt;

use serde::{Deserialize, Serialize};

/// Authorization tier of a dashboard user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    SuperAdmin,
    Admin,
    Editor,
    Viewer,
    /// May only add new sites.
    #[serde(rename = "add", alias = "Add")]
    Add,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::SuperAdmin,
        Role::Admin,
        Role::Editor,
        Role::Viewer,
        Role::Add,
    ];

    /// Roles a SuperAdmin may hand out when creating users.
    pub const ASSIGNABLE: [Role; 4] = [Role::Admin, Role::Editor, Role::Viewer, Role::Add];

    /// Returns the role name as stored in NocoDB.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "SuperAdmin",
            Role::Admin => "Admin",
            Role::Editor => "Editor",
            Role::Viewer => "Viewer",
            Role::Add => "add",
        }
    }

    /// Parses a stored role name. `Add` is accepted as an alias of `add`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "SuperAdmin" => Some(Role::SuperAdmin),
            "Admin" => Some(Role::Admin),
            "Editor" => Some(Role::Editor),
            "Viewer" => Some(Role::Viewer),
            "add" | "Add" => Some(Role::Add),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an account may sign in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserStatus {
    Activo,
    Inactivo,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Activo => "Activo",
            UserStatus::Inactivo => "Inactivo",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, UserStatus::Activo)
    }
}

/// A dashboard user as exposed by the API.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub nombre: String,
    pub rol: Role,
    pub estado: UserStatus,
    pub fecha_creacion: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ultimo_acceso: Option<String>,
}

/// A user row together with its password hash. Never leaves the service layer.
#[derive(Debug, Clone)]
pub struct UserWithPassword {
    pub user: User,
    pub password_hash: String,
}

/// The authenticated identity made available to gated handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub nombre: String,
    pub rol: Role,
    pub estado: UserStatus,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            nombre: user.nombre.clone(),
            rol: user.rol,
            estado: user.estado,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_role_has_one_canonical_spelling() {
        assert_eq!(Role::parse("Add"), Some(Role::Add));
        assert_eq!(Role::parse("add"), Some(Role::Add));
        assert_eq!(Role::Add.as_str(), "add");
        assert_eq!(sonic_rs::to_string(&Role::Add).unwrap(), "\"add\"");

        let parsed: Role = sonic_rs::from_str("\"Add\"").unwrap();
        assert_eq!(parsed, Role::Add);
    }

    #[test]
    fn unknown_roles_are_rejected() {
        assert_eq!(Role::parse("superadmin"), None);
        assert_eq!(Role::parse(""), None);
        for role in Role::ALL {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
    }
}
