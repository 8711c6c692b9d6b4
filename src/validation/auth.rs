use garde::Validate;
use serde::Deserialize;

use crate::models::user::{Role, UserStatus};

/// Minimum password length accepted on registration and update.
pub const MIN_PASSWORD_LEN: usize = 6;

const MAX_FIELD_LEN: usize = 255;

/// Login payload. Missing fields are reported as a 400, not a decode failure.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(default)]
    #[garde(custom(required_credential))]
    pub email: String,
    #[serde(default)]
    #[garde(custom(required_credential))]
    pub password: String,
}

/// Payload of `POST /api/auth/register`.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(default)]
    #[garde(custom(registration_email))]
    pub email: String,
    #[serde(default)]
    #[garde(custom(registration_password))]
    pub password: String,
    #[serde(default)]
    #[garde(custom(registration_name))]
    pub nombre: String,
    #[serde(default)]
    #[garde(custom(assignable_role))]
    pub rol: String,
}

impl RegisterRequest {
    /// The requested role. Only meaningful after `validate()` succeeded.
    pub fn role(&self) -> Option<Role> {
        Role::parse(&self.rol)
    }
}

/// Payload of `PUT /api/usuarios/{id}`. Empty strings count as absent.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[serde(default)]
    #[garde(custom(optional_name))]
    pub nombre: Option<String>,
    #[serde(default)]
    #[garde(custom(optional_email))]
    pub email: Option<String>,
    #[serde(default)]
    #[garde(custom(optional_role))]
    pub rol: Option<String>,
    #[serde(default)]
    #[garde(custom(optional_status))]
    pub estado: Option<String>,
    #[serde(default)]
    #[garde(custom(optional_password))]
    pub password: Option<String>,
}

impl UpdateUserRequest {
    pub fn nombre(&self) -> Option<&str> {
        present(&self.nombre)
    }

    pub fn email(&self) -> Option<&str> {
        present(&self.email)
    }

    pub fn rol(&self) -> Option<Role> {
        present(&self.rol).and_then(Role::parse)
    }

    pub fn estado(&self) -> Option<UserStatus> {
        match present(&self.estado)? {
            "Activo" => Some(UserStatus::Activo),
            "Inactivo" => Some(UserStatus::Inactivo),
            _ => None,
        }
    }

    pub fn password(&self) -> Option<&str> {
        present(&self.password)
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Same shape as `^[^\s@]+@[^\s@]+\.[^\s@]+$`.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) || email.matches('@').count() != 1 {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    let Some(dot) = domain.rfind('.') else {
        return false;
    };
    !local.is_empty() && dot > 0 && dot + 1 < domain.len() && email.len() <= MAX_FIELD_LEN
}

fn required_credential(value: &str, _: &()) -> garde::Result {
    if value.trim().is_empty() {
        return Err(garde::Error::new("Email y contraseña son requeridos"));
    }
    Ok(())
}

fn registration_email(value: &str, _: &()) -> garde::Result {
    if value.trim().is_empty() {
        return Err(garde::Error::new("Email, contraseña y nombre son requeridos"));
    }
    if !is_valid_email(value.trim()) {
        return Err(garde::Error::new("Formato de email inválido"));
    }
    Ok(())
}

fn registration_password(value: &str, _: &()) -> garde::Result {
    if value.is_empty() {
        return Err(garde::Error::new("Email, contraseña y nombre son requeridos"));
    }
    check_password(value)
}

fn registration_name(value: &str, _: &()) -> garde::Result {
    if value.trim().is_empty() {
        return Err(garde::Error::new("Email, contraseña y nombre son requeridos"));
    }
    check_name(value)
}

fn assignable_role(value: &str, _: &()) -> garde::Result {
    match Role::parse(value) {
        Some(role) if Role::ASSIGNABLE.contains(&role) => Ok(()),
        _ => Err(garde::Error::new(
            "Rol inválido. Solo se pueden crear usuarios: Admin, Editor, Viewer, add",
        )),
    }
}

fn optional_name(value: &Option<String>, _: &()) -> garde::Result {
    present(value).map_or(Ok(()), check_name)
}

fn optional_email(value: &Option<String>, _: &()) -> garde::Result {
    match present(value) {
        Some(email) if !is_valid_email(email) => Err(garde::Error::new("Email inválido")),
        _ => Ok(()),
    }
}

fn optional_role(value: &Option<String>, _: &()) -> garde::Result {
    match present(value) {
        Some(role) if Role::parse(role).is_none() => Err(garde::Error::new("Rol inválido")),
        _ => Ok(()),
    }
}

fn optional_status(value: &Option<String>, _: &()) -> garde::Result {
    match present(value) {
        Some("Activo") | Some("Inactivo") | None => Ok(()),
        Some(_) => Err(garde::Error::new("Estado inválido")),
    }
}

fn optional_password(value: &Option<String>, _: &()) -> garde::Result {
    present(value).map_or(Ok(()), check_password)
}

fn check_password(value: &str) -> garde::Result {
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(garde::Error::new(
            "La contraseña debe tener al menos 6 caracteres",
        ));
    }
    if value.len() > 128 {
        return Err(garde::Error::new(
            "La contraseña debe tener como máximo 128 caracteres",
        ));
    }
    Ok(())
}

fn check_name(value: &str) -> garde::Result {
    if value.len() > MAX_FIELD_LEN {
        return Err(garde::Error::new("El nombre es demasiado largo"));
    }
    Ok(())
}
