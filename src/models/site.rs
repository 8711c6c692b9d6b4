use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::models::coordinates::Coordinates;
use crate::vigencia::{self, VigenciaInfo, VigenciaLabel};

/// Kind of tracked site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Mina,
    Hormigonera,
    Permiso,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Mina => "Mina",
            Category::Hormigonera => "Hormigonera",
            Category::Permiso => "Permiso",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "Mina" => Some(Category::Mina),
            "Hormigonera" => Some(Category::Hormigonera),
            "Permiso" => Some(Category::Permiso),
            _ => None,
        }
    }
}

/// Operational status of a site, independent of its permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SiteStatus {
    Activo,
    Inactivo,
}

impl SiteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteStatus::Activo => "Activo",
            SiteStatus::Inactivo => "Inactivo",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "Activo" => Some(SiteStatus::Activo),
            "Inactivo" => Some(SiteStatus::Inactivo),
            _ => None,
        }
    }
}

/// Whether the site holds a permit record at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermitStatus {
    #[serde(rename = "Tiene")]
    Granted,
    #[serde(rename = "No Tiene")]
    Missing,
}

impl PermitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermitStatus::Granted => "Tiene",
            PermitStatus::Missing => "No Tiene",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "Tiene" => Some(PermitStatus::Granted),
            "No Tiene" => Some(PermitStatus::Missing),
            _ => None,
        }
    }
}

/// A tracked site as read from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    pub id: String,
    pub nombre: String,
    pub ubicacion: Coordinates,
    pub categoria: Category,
    pub estado: SiteStatus,
    pub permiso: PermitStatus,
    pub fecha_emision: Option<NaiveDate>,
    pub vigencia: Option<i64>,
    pub url_imagenes: Vec<String>,
    pub url_foto360: String,
    pub notas: String,
}

impl Site {
    /// Validity summary, or `None` when the site holds no permit.
    pub fn vigencia_info(&self, now: NaiveDateTime) -> Option<VigenciaInfo> {
        match self.permiso {
            PermitStatus::Granted => Some(vigencia::compute(self.fecha_emision, self.vigencia, now)),
            PermitStatus::Missing => None,
        }
    }

    /// Builds the API representation, with validity computed as of `now`.
    pub fn view(&self, now: NaiveDateTime) -> SiteView<'_> {
        let info = self.vigencia_info(now);
        let label = match info {
            Some(ref info) => vigencia::describe(info),
            None => vigencia::no_permit_label(),
        };
        let fecha_vencimiento = match (self.permiso, self.fecha_emision, self.vigencia) {
            (PermitStatus::Granted, Some(emision), Some(dias)) => {
                Some(vigencia::expiration_date(emision, dias))
            }
            _ => None,
        };

        SiteView {
            id: &self.id,
            nombre: &self.nombre,
            ubicacion: &self.ubicacion,
            latitud: self.ubicacion.latitude(),
            longitud: self.ubicacion.longitude(),
            categoria: self.categoria,
            estado: self.estado,
            permiso: self.permiso,
            fecha_emision: self.fecha_emision,
            vigencia: self.vigencia,
            fecha_vencimiento,
            url_imagenes: &self.url_imagenes,
            url_foto360: &self.url_foto360,
            notas: &self.notas,
            vigencia_info: info,
            vigencia_label: label,
        }
    }
}

/// Wire form of a site returned by the listing endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteView<'a> {
    pub id: &'a str,
    pub nombre: &'a str,
    pub ubicacion: &'a Coordinates,
    pub latitud: f64,
    pub longitud: f64,
    pub categoria: Category,
    pub estado: SiteStatus,
    pub permiso: PermitStatus,
    pub fecha_emision: Option<NaiveDate>,
    pub vigencia: Option<i64>,
    pub fecha_vencimiento: Option<NaiveDate>,
    pub url_imagenes: &'a [String],
    #[serde(rename = "urlFoto360")]
    pub url_foto360: &'a str,
    pub notas: &'a str,
    pub vigencia_info: Option<VigenciaInfo>,
    pub vigencia_label: VigenciaLabel,
}

/// A site about to be created.
#[derive(Debug, Clone)]
pub struct NewSite {
    pub nombre: String,
    pub ubicacion: Coordinates,
    pub categoria: Category,
    pub estado: SiteStatus,
    pub permiso: PermitStatus,
    pub fecha_emision: Option<NaiveDate>,
    pub vigencia: Option<i64>,
    pub url_imagenes: Vec<String>,
    pub url_foto360: String,
    pub notas: String,
}

/// Fields to change on an existing site. `None` leaves a field untouched.
///
/// `fecha_emision` and `vigencia` use a nested option: `Some(None)` clears
/// the stored value.
#[derive(Debug, Clone, Default)]
pub struct SitePatch {
    pub nombre: Option<String>,
    pub ubicacion: Option<Coordinates>,
    pub categoria: Option<Category>,
    pub estado: Option<SiteStatus>,
    pub permiso: Option<PermitStatus>,
    pub fecha_emision: Option<Option<NaiveDate>>,
    pub vigencia: Option<Option<i64>>,
    pub url_imagenes: Option<Vec<String>>,
    pub url_foto360: Option<String>,
    pub notas: Option<String>,
}
