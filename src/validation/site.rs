use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::coordinates::Coordinates;
use crate::models::site::{Category, NewSite, PermitStatus, SitePatch, SiteStatus};
use crate::vigencia;

pub const MISSING_FIELDS_MESSAGE: &str = "Faltan campos requeridos";
pub const INVALID_VIGENCIA_MESSAGE: &str = "La vigencia debe ser al menos 1 día";
pub const MAX_VIGENCIA_DAYS: i64 = 36_500;
pub const VIGENCIA_TOO_LONG_MESSAGE: &str = "La vigencia no puede superar 36500 días";
pub const MISSING_ISSUE_DATE_MESSAGE: &str =
    "La fecha de emisión es requerida cuando la ubicación tiene permiso";

/// Parses the `{id}` path segment of site routes.
pub fn parse_site_id(id: &str) -> Result<i64> {
    id.trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::Validation("ID de ubicación inválido".to_string()))
}

/// A validity period covers at least one day and at most a century.
pub fn validate_vigencia(dias: i64) -> Result<i64> {
    if dias < 1 {
        return Err(AppError::Validation(INVALID_VIGENCIA_MESSAGE.to_string()));
    }
    if dias > MAX_VIGENCIA_DAYS {
        return Err(AppError::Validation(VIGENCIA_TOO_LONG_MESSAGE.to_string()));
    }
    Ok(dias)
}

fn parse_vigencia_text(value: &str) -> Result<i64> {
    let dias = value
        .trim()
        .parse::<i64>()
        .map_err(|_| AppError::Validation(INVALID_VIGENCIA_MESSAGE.to_string()))?;
    validate_vigencia(dias)
}

fn parse_issue_date(value: &str) -> Result<NaiveDate> {
    vigencia::parse_issue_date(value)
        .ok_or_else(|| AppError::Validation("Fecha de emisión inválida".to_string()))
}

fn parse_category(value: &str) -> Result<Category> {
    Category::parse(value).ok_or_else(|| AppError::Validation("Categoría inválida".to_string()))
}

fn parse_status(value: &str) -> Result<SiteStatus> {
    SiteStatus::parse(value).ok_or_else(|| AppError::Validation("Estado inválido".to_string()))
}

fn parse_permit(value: &str) -> Result<PermitStatus> {
    PermitStatus::parse(value).ok_or_else(|| AppError::Validation("Permiso inválido".to_string()))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Text fields of the site creation form.
#[derive(Debug, Default)]
pub struct SiteForm {
    pub nombre: Option<String>,
    pub ubicacion: Option<String>,
    pub categoria: Option<String>,
    pub estado: Option<String>,
    pub permiso: Option<String>,
    pub fecha_emision: Option<String>,
    pub vigencia: Option<String>,
    pub notas: Option<String>,
}

impl SiteForm {
    /// Stores a form field by name. Unknown fields are ignored.
    pub fn set(&mut self, name: &str, value: String) {
        let slot = match name {
            "nombre" => &mut self.nombre,
            "ubicacion" => &mut self.ubicacion,
            "categoria" => &mut self.categoria,
            "estado" => &mut self.estado,
            "permiso" => &mut self.permiso,
            "fechaEmision" => &mut self.fecha_emision,
            "vigencia" => &mut self.vigencia,
            "notas" => &mut self.notas,
            _ => return,
        };
        *slot = Some(value);
    }

    /// Validates the form. The returned site carries no attachments yet.
    pub fn into_new_site(self) -> Result<NewSite> {
        let (Some(nombre), Some(ubicacion), Some(categoria)) = (
            non_blank(self.nombre),
            non_blank(self.ubicacion),
            non_blank(self.categoria),
        ) else {
            return Err(AppError::Validation(MISSING_FIELDS_MESSAGE.to_string()));
        };

        let ubicacion = Coordinates::parse(&ubicacion)?;
        let categoria = parse_category(&categoria)?;
        let estado = match non_blank(self.estado) {
            Some(estado) => parse_status(&estado)?,
            None => SiteStatus::Activo,
        };
        let permiso = match non_blank(self.permiso) {
            Some(permiso) => parse_permit(&permiso)?,
            None => PermitStatus::Granted,
        };

        let (fecha_emision, vigencia) = match permiso {
            PermitStatus::Granted => {
                let fecha = non_blank(self.fecha_emision)
                    .ok_or_else(|| AppError::Validation(MISSING_ISSUE_DATE_MESSAGE.to_string()))?;
                let dias = non_blank(self.vigencia)
                    .ok_or_else(|| AppError::Validation(INVALID_VIGENCIA_MESSAGE.to_string()))?;
                (Some(parse_issue_date(&fecha)?), Some(parse_vigencia_text(&dias)?))
            }
            PermitStatus::Missing => (None, None),
        };

        Ok(NewSite {
            nombre,
            ubicacion,
            categoria,
            estado,
            permiso,
            fecha_emision,
            vigencia,
            url_imagenes: Vec::new(),
            url_foto360: String::new(),
            notas: self.notas.unwrap_or_default(),
        })
    }
}

/// Day count sent either as a JSON number or as text.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DayCount {
    Int(i64),
    Float(f64),
    Text(String),
}

impl DayCount {
    fn days(&self) -> Result<Option<i64>> {
        match self {
            DayCount::Int(n) => validate_vigencia(*n).map(Some),
            DayCount::Float(n) if n.fract() == 0.0 => validate_vigencia(*n as i64).map(Some),
            DayCount::Float(_) => Err(AppError::Validation(INVALID_VIGENCIA_MESSAGE.to_string())),
            DayCount::Text(s) if s.trim().is_empty() => Ok(None),
            DayCount::Text(s) => parse_vigencia_text(s).map(Some),
        }
    }
}

/// JSON body of `PUT /api/ubicaciones/{id}`. Absent fields stay untouched.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSiteRequest {
    #[serde(default)]
    pub nombre: Option<String>,
    #[serde(default)]
    pub ubicacion: Option<String>,
    #[serde(default)]
    pub categoria: Option<String>,
    #[serde(default)]
    pub estado: Option<String>,
    #[serde(default)]
    pub permiso: Option<String>,
    #[serde(default)]
    pub fecha_emision: Option<String>,
    #[serde(default)]
    pub vigencia: Option<DayCount>,
    #[serde(default)]
    pub url_imagenes: Option<Vec<String>>,
    #[serde(default, rename = "urlFoto360")]
    pub url_foto360: Option<String>,
    #[serde(default)]
    pub notas: Option<String>,
}

impl UpdateSiteRequest {
    /// Validates the present fields and builds the patch.
    ///
    /// Switching to "No Tiene" clears the issuance date and validity; switching
    /// to "Tiene" requires both in the same request.
    pub fn into_patch(self) -> Result<SitePatch> {
        let nombre = match self.nombre {
            Some(nombre) if nombre.trim().is_empty() => {
                return Err(AppError::Validation(MISSING_FIELDS_MESSAGE.to_string()));
            }
            Some(nombre) => Some(nombre.trim().to_string()),
            None => None,
        };
        let ubicacion = self.ubicacion.as_deref().map(Coordinates::parse).transpose()?;
        let categoria = self.categoria.as_deref().map(parse_category).transpose()?;
        let estado = self.estado.as_deref().map(parse_status).transpose()?;
        let permiso = self.permiso.as_deref().map(parse_permit).transpose()?;

        let (fecha_emision, vigencia) = if permiso == Some(PermitStatus::Missing) {
            (Some(None), Some(None))
        } else {
            let fecha = non_blank(self.fecha_emision)
                .map(|f| parse_issue_date(&f))
                .transpose()?;
            let dias = match self.vigencia {
                Some(count) => count.days()?,
                None => None,
            };
            if permiso == Some(PermitStatus::Granted) {
                if fecha.is_none() {
                    return Err(AppError::Validation(MISSING_ISSUE_DATE_MESSAGE.to_string()));
                }
                if dias.is_none() {
                    return Err(AppError::Validation(INVALID_VIGENCIA_MESSAGE.to_string()));
                }
            }
            (fecha.map(Some), dias.map(Some))
        };

        Ok(SitePatch {
            nombre,
            ubicacion,
            categoria,
            estado,
            permiso,
            fecha_emision,
            vigencia,
            url_imagenes: self.url_imagenes,
            url_foto360: self.url_foto360,
            notas: self.notas,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> SiteForm {
        let mut form = SiteForm::default();
        form.set("nombre", "Cantera Sur".to_string());
        form.set("ubicacion", "18.45,-69.95".to_string());
        form.set("categoria", "Mina".to_string());
        form.set("fechaEmision", "2024-03-01".to_string());
        form.set("vigencia", "365".to_string());
        form.set("ignorado", "x".to_string());
        form
    }

    fn validation_message(result: Result<impl std::fmt::Debug>) -> String {
        match result {
            Err(AppError::Validation(msg)) => msg,
            other => panic!("expected a validation error, got {:?}", other),
        }
    }

    #[test]
    fn site_ids_must_be_positive_integers() {
        assert_eq!(parse_site_id("42").unwrap(), 42);
        assert_eq!(validation_message(parse_site_id("abc")), "ID de ubicación inválido");
        assert!(parse_site_id("0").is_err());
    }

    #[test]
    fn complete_form_becomes_a_new_site() {
        let site = form().into_new_site().unwrap();
        assert_eq!(site.ubicacion.latitude(), 18.45);
        assert_eq!(site.estado, SiteStatus::Activo);
        assert_eq!(site.permiso, PermitStatus::Granted);
        assert_eq!(site.fecha_emision, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(site.vigencia, Some(365));
    }

    #[test]
    fn form_rejects_zero_vigencia_and_bad_location() {
        let mut f = form();
        f.set("vigencia", "0".to_string());
        assert_eq!(validation_message(f.into_new_site()), INVALID_VIGENCIA_MESSAGE);

        let mut f = form();
        f.set("ubicacion", "91,0".to_string());
        assert!(validation_message(f.into_new_site()).starts_with("Formato de ubicación inválido"));

        let mut f = form();
        f.nombre = None;
        assert_eq!(validation_message(f.into_new_site()), MISSING_FIELDS_MESSAGE);
    }

    #[test]
    fn sites_without_permit_need_no_dates() {
        let mut f = form();
        f.set("permiso", "No Tiene".to_string());
        f.fecha_emision = None;
        f.set("vigencia", "0".to_string());
        let site = f.into_new_site().unwrap();
        assert_eq!(site.fecha_emision, None);
        assert_eq!(site.vigencia, None);
    }

    #[test]
    fn dropping_the_permit_clears_its_dates() {
        let request: UpdateSiteRequest =
            sonic_rs::from_str(r#"{"permiso":"No Tiene","vigencia":30}"#).unwrap();
        let patch = request.into_patch().unwrap();
        assert_eq!(patch.fecha_emision, Some(None));
        assert_eq!(patch.vigencia, Some(None));
    }

    #[test]
    fn partial_update_validates_present_fields_only() {
        let request: UpdateSiteRequest = sonic_rs::from_str(r#"{"notas":"revisado"}"#).unwrap();
        let patch = request.into_patch().unwrap();
        assert_eq!(patch.notas.as_deref(), Some("revisado"));
        assert_eq!(patch.vigencia, None);

        let request: UpdateSiteRequest = sonic_rs::from_str(r#"{"vigencia":"0"}"#).unwrap();
        assert_eq!(validation_message(request.into_patch()), INVALID_VIGENCIA_MESSAGE);

        let request: UpdateSiteRequest = sonic_rs::from_str(r#"{"vigencia":90}"#).unwrap();
        assert_eq!(request.into_patch().unwrap().vigencia, Some(Some(90)));
    }

    #[test]
    fn granting_a_permit_requires_its_dates() {
        let request: UpdateSiteRequest =
            sonic_rs::from_str(r#"{"permiso":"Tiene","vigencia":30}"#).unwrap();
        assert_eq!(validation_message(request.into_patch()), MISSING_ISSUE_DATE_MESSAGE);
    }

    #[test]
    fn vigencia_is_capped_at_a_century() {
        assert_eq!(validate_vigencia(MAX_VIGENCIA_DAYS).unwrap(), MAX_VIGENCIA_DAYS);
        assert_eq!(
            validation_message(validate_vigencia(MAX_VIGENCIA_DAYS + 1)),
            VIGENCIA_TOO_LONG_MESSAGE
        );

        let request: UpdateSiteRequest =
            sonic_rs::from_str(r#"{"vigencia":200000000000000}"#).unwrap();
        assert_eq!(validation_message(request.into_patch()), VIGENCIA_TOO_LONG_MESSAGE);

        let request: UpdateSiteRequest = sonic_rs::from_str(r#"{"vigencia":1e300}"#).unwrap();
        assert_eq!(validation_message(request.into_patch()), VIGENCIA_TOO_LONG_MESSAGE);

        let mut f = form();
        f.set("vigencia", "9223372036854775807".to_string());
        assert_eq!(validation_message(f.into_new_site()), VIGENCIA_TOO_LONG_MESSAGE);
    }
}
