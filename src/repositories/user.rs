use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    models::user::{Role, User, UserStatus, UserWithPassword},
    repositories::nocodb::NocoDb,
};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RowId {
    Int(i64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct UserRow {
    #[serde(rename = "Id", default)]
    id: Option<RowId>,
    #[serde(rename = "Email", default)]
    email: Option<String>,
    #[serde(rename = "Password", default)]
    password: Option<String>,
    #[serde(rename = "Nombre", default)]
    nombre: Option<String>,
    #[serde(rename = "Rol", default)]
    rol: Option<String>,
    #[serde(rename = "Estado", default)]
    estado: Option<String>,
    #[serde(rename = "FechaCreacion", default)]
    fecha_creacion: Option<String>,
    #[serde(rename = "UltimoAcceso", default)]
    ultimo_acceso: Option<String>,
}

#[derive(Serialize)]
struct NewUserRecord<'a> {
    #[serde(rename = "Email")]
    email: &'a str,
    #[serde(rename = "Password")]
    password: &'a str,
    #[serde(rename = "Nombre")]
    nombre: &'a str,
    #[serde(rename = "Rol")]
    rol: &'static str,
    #[serde(rename = "Estado")]
    estado: &'static str,
    #[serde(rename = "FechaCreacion")]
    fecha_creacion: String,
}

/// Fields to change on a user. `None` leaves a field untouched.
#[derive(Debug, Default, Serialize)]
pub struct UserPatch {
    #[serde(rename = "Id")]
    pub id: i64,
    #[serde(rename = "Nombre", skip_serializing_if = "Option::is_none")]
    pub nombre: Option<String>,
    #[serde(rename = "Email", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "Rol", skip_serializing_if = "Option::is_none")]
    pub rol: Option<&'static str>,
    #[serde(rename = "Estado", skip_serializing_if = "Option::is_none")]
    pub estado: Option<&'static str>,
    /// Already hashed.
    #[serde(rename = "Password", skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(rename = "UltimoAcceso", skip_serializing_if = "Option::is_none")]
    pub ultimo_acceso: Option<String>,
}

/// Lists every user.
pub async fn list_users(db: &NocoDb) -> Result<Vec<User>> {
    let rows: Vec<UserRow> = db.list_records(db.users_table(), None).await?;
    Ok(rows.into_iter().map(|row| row_to_user(row).user).collect())
}

/// Finds a user by email, including the password hash.
pub async fn find_by_email(db: &NocoDb, email: &str) -> Result<Option<UserWithPassword>> {
    let Some(filter) = eq_filter("Email", email) else {
        return Ok(None);
    };
    let rows: Vec<UserRow> = db.list_records(db.users_table(), Some(&filter)).await?;
    Ok(rows.into_iter().next().map(row_to_user))
}

/// Finds a user by id.
pub async fn find_by_id(db: &NocoDb, id: i64) -> Result<Option<User>> {
    let filter = format!("(Id,eq,{})", id);
    let rows: Vec<UserRow> = db.list_records(db.users_table(), Some(&filter)).await?;
    Ok(rows.into_iter().next().map(|row| row_to_user(row).user))
}

/// Inserts a new, active user. `password_hash` must already be hashed.
pub async fn create_user(
    db: &NocoDb,
    email: &str,
    password_hash: &str,
    nombre: &str,
    rol: Role,
) -> Result<()> {
    let record = NewUserRecord {
        email,
        password: password_hash,
        nombre,
        rol: rol.as_str(),
        estado: UserStatus::Activo.as_str(),
        fecha_creacion: now_iso(),
    };
    db.create_record(db.users_table(), &record).await
}

/// Applies a partial update.
pub async fn update_user(db: &NocoDb, patch: &UserPatch) -> Result<()> {
    db.update_records(db.users_table(), std::slice::from_ref(patch))
        .await
}

/// Records a successful sign-in.
pub async fn touch_last_access(db: &NocoDb, id: i64) -> Result<()> {
    let patch = UserPatch {
        id,
        ultimo_acceso: Some(now_iso()),
        ..Default::default()
    };
    update_user(db, &patch).await
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Builds a `where` clause, refusing values that would break its syntax.
fn eq_filter(column: &str, value: &str) -> Option<String> {
    if value.is_empty() || value.contains(['(', ')', ',', '~']) {
        return None;
    }
    Some(format!("({},eq,{})", column, value))
}

fn row_to_user(row: UserRow) -> UserWithPassword {
    let id = match row.id {
        Some(RowId::Int(n)) => n.to_string(),
        Some(RowId::Text(s)) => s,
        None => String::new(),
    };

    UserWithPassword {
        user: User {
            id,
            email: row.email.unwrap_or_default(),
            nombre: row.nombre.unwrap_or_default(),
            rol: row.rol.as_deref().and_then(Role::parse).unwrap_or(Role::Viewer),
            estado: match row.estado.as_deref() {
                Some("Inactivo") => UserStatus::Inactivo,
                _ => UserStatus::Activo,
            },
            fecha_creacion: row.fecha_creacion.unwrap_or_default(),
            ultimo_acceso: row.ultimo_acceso.filter(|s| !s.is_empty()),
        },
        password_hash: row.password.unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_default_to_active_viewers() {
        let row: UserRow =
            sonic_rs::from_str(r#"{"Id": 5, "Email": "a@b.co", "Rol": "Add", "Password": "h"}"#)
                .unwrap();
        let mapped = row_to_user(row);
        assert_eq!(mapped.user.id, "5");
        assert_eq!(mapped.user.rol, Role::Add);
        assert_eq!(mapped.user.estado, UserStatus::Activo);
        assert_eq!(mapped.password_hash, "h");

        let row: UserRow = sonic_rs::from_str(r#"{"Id": "6", "Rol": "Jefe", "Estado": "Inactivo"}"#).unwrap();
        let mapped = row_to_user(row);
        assert_eq!(mapped.user.rol, Role::Viewer);
        assert_eq!(mapped.user.estado, UserStatus::Inactivo);
    }

    #[test]
    fn filter_rejects_clause_breaking_values() {
        assert_eq!(eq_filter("Email", "a@b.co").as_deref(), Some("(Email,eq,a@b.co)"));
        assert_eq!(eq_filter("Email", "a@b.co),(Rol"), None);
        assert_eq!(eq_filter("Email", ""), None);
    }

    #[test]
    fn patch_omits_untouched_fields() {
        let patch = UserPatch {
            id: 2,
            estado: Some("Inactivo"),
            ..Default::default()
        };
        assert_eq!(
            sonic_rs::to_string(&patch).unwrap(),
            r#"{"Id":2,"Estado":"Inactivo"}"#
        );
    }
}
