use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    models::coordinates::{coordinates_to_string, Coordinates},
    models::site::{Category, NewSite, PermitStatus, Site, SitePatch, SiteStatus},
    repositories::nocodb::{Attachment, NocoDb},
    vigencia,
};

/// A cell that NocoDB may return as a number or as text.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    fn as_text(&self) -> String {
        match self {
            Scalar::Int(n) => n.to_string(),
            Scalar::Float(n) => n.to_string(),
            Scalar::Text(s) => s.trim().to_string(),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(n) => Some(*n as f64),
            Scalar::Float(n) => Some(*n),
            Scalar::Text(s) => s.trim().parse().ok(),
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Int(n) => Some(*n),
            Scalar::Float(n) => Some(n.trunc() as i64),
            Scalar::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// An attachment column: native attachment objects or a legacy text cell.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AttachmentColumn {
    List(Vec<Attachment>),
    Text(String),
}

/// Entries of a JSON-encoded legacy attachment cell.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LegacyEntry {
    Object(Attachment),
    Link(String),
}

impl LegacyEntry {
    fn link(&self) -> Option<&str> {
        match self {
            LegacyEntry::Object(a) => a.best_link(),
            LegacyEntry::Link(s) => Some(s.as_str()).filter(|s| !s.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SiteRow {
    #[serde(rename = "Id", default)]
    id: Option<Scalar>,
    #[serde(rename = "Nombre", default)]
    nombre: Option<String>,
    #[serde(rename = "Ubicacion", default)]
    ubicacion: Option<String>,
    #[serde(rename = "Latitud", default)]
    latitud: Option<Scalar>,
    #[serde(rename = "Longitud", default)]
    longitud: Option<Scalar>,
    #[serde(rename = "Fecha_Emision", default)]
    fecha_emision: Option<String>,
    #[serde(rename = "Estado", default)]
    estado: Option<String>,
    #[serde(rename = "Categoria", default)]
    categoria: Option<String>,
    #[serde(rename = "Vigencia", default)]
    vigencia: Option<Scalar>,
    #[serde(rename = "Permiso", default)]
    permiso: Option<String>,
    #[serde(rename = "URL_Imagenes", default)]
    url_imagenes: Option<AttachmentColumn>,
    #[serde(rename = "URL_Foto_360", default)]
    url_foto360: Option<AttachmentColumn>,
    #[serde(rename = "Notas", default)]
    notas: Option<String>,
}

#[derive(Serialize)]
struct SiteRecord<'a> {
    #[serde(rename = "Nombre")]
    nombre: &'a str,
    #[serde(rename = "Ubicacion")]
    ubicacion: &'a str,
    #[serde(rename = "Estado")]
    estado: &'static str,
    #[serde(rename = "Categoria")]
    categoria: &'static str,
    #[serde(rename = "Permiso")]
    permiso: &'static str,
    #[serde(rename = "Fecha_Emision", skip_serializing_if = "Option::is_none")]
    fecha_emision: Option<String>,
    #[serde(rename = "Vigencia", skip_serializing_if = "Option::is_none")]
    vigencia: Option<i64>,
    #[serde(rename = "URL_Imagenes")]
    url_imagenes: Option<String>,
    #[serde(rename = "URL_Foto_360")]
    url_foto360: Option<String>,
    #[serde(rename = "Notas")]
    notas: &'a str,
}

#[derive(Serialize)]
struct SitePatchRecord<'a> {
    #[serde(rename = "Id")]
    id: i64,
    #[serde(rename = "Nombre", skip_serializing_if = "Option::is_none")]
    nombre: Option<&'a str>,
    #[serde(rename = "Ubicacion", skip_serializing_if = "Option::is_none")]
    ubicacion: Option<&'a str>,
    #[serde(rename = "Estado", skip_serializing_if = "Option::is_none")]
    estado: Option<&'static str>,
    #[serde(rename = "Categoria", skip_serializing_if = "Option::is_none")]
    categoria: Option<&'static str>,
    #[serde(rename = "Permiso", skip_serializing_if = "Option::is_none")]
    permiso: Option<&'static str>,
    #[serde(rename = "Fecha_Emision", skip_serializing_if = "Option::is_none")]
    fecha_emision: Option<Option<String>>,
    #[serde(rename = "Vigencia", skip_serializing_if = "Option::is_none")]
    vigencia: Option<Option<i64>>,
    #[serde(rename = "URL_Imagenes", skip_serializing_if = "Option::is_none")]
    url_imagenes: Option<String>,
    #[serde(rename = "URL_Foto_360", skip_serializing_if = "Option::is_none")]
    url_foto360: Option<String>,
    #[serde(rename = "Notas", skip_serializing_if = "Option::is_none")]
    notas: Option<&'a str>,
}

/// Lists every site, up to the listing limit.
pub async fn list_sites(db: &NocoDb) -> Result<Vec<Site>> {
    let rows: Vec<SiteRow> = db.list_records(db.sites_table(), None).await?;
    Ok(rows.into_iter().map(|row| row_to_site(db, row)).collect())
}

/// Inserts a new site.
pub async fn create_site(db: &NocoDb, site: &NewSite) -> Result<()> {
    let record = SiteRecord {
        nombre: &site.nombre,
        ubicacion: site.ubicacion.as_str(),
        estado: site.estado.as_str(),
        categoria: site.categoria.as_str(),
        permiso: site.permiso.as_str(),
        fecha_emision: site.fecha_emision.map(|d| d.format("%Y-%m-%d").to_string()),
        vigencia: site.vigencia,
        url_imagenes: attachments_json(&site.url_imagenes)?,
        url_foto360: single_attachment_json(&site.url_foto360)?,
        notas: &site.notas,
    };
    db.create_record(db.sites_table(), &record).await
}

/// Applies a partial update to site `id`.
pub async fn update_site(db: &NocoDb, id: i64, patch: &SitePatch) -> Result<()> {
    let record = SitePatchRecord {
        id,
        nombre: patch.nombre.as_deref(),
        ubicacion: patch.ubicacion.as_ref().map(Coordinates::as_str),
        estado: patch.estado.map(|e| e.as_str()),
        categoria: patch.categoria.map(|c| c.as_str()),
        permiso: patch.permiso.map(|p| p.as_str()),
        fecha_emision: patch
            .fecha_emision
            .map(|date| date.map(|d| d.format("%Y-%m-%d").to_string())),
        vigencia: patch.vigencia,
        url_imagenes: match patch.url_imagenes {
            Some(ref urls) => attachments_json(urls)?,
            None => None,
        },
        url_foto360: match patch.url_foto360 {
            Some(ref url) => single_attachment_json(url)?,
            None => None,
        },
        notas: patch.notas.as_deref(),
    };
    db.update_records(db.sites_table(), &[record]).await
}

/// Deletes site `id`.
pub async fn delete_site(db: &NocoDb, id: i64) -> Result<()> {
    db.delete_records(db.sites_table(), &[id]).await
}

fn attachments_json(urls: &[String]) -> Result<Option<String>> {
    if urls.is_empty() {
        return Ok(None);
    }
    let attachments: Vec<Attachment> = urls.iter().map(|u| Attachment::from_url(u)).collect();
    Ok(Some(sonic_rs::to_string(&attachments)?))
}

fn single_attachment_json(url: &str) -> Result<Option<String>> {
    if url.is_empty() {
        return Ok(None);
    }
    Ok(Some(sonic_rs::to_string(&[Attachment::from_url(url)])?))
}

fn row_to_site(db: &NocoDb, row: SiteRow) -> Site {
    let id = row.id.as_ref().map(Scalar::as_text).unwrap_or_default();

    // Legacy rows store latitude and longitude in separate columns.
    let raw_location = match (row.ubicacion.as_deref(), &row.latitud, &row.longitud) {
        (Some(u), _, _) if !u.trim().is_empty() => u.to_string(),
        (_, Some(lat), Some(lng)) => match (lat.as_f64(), lng.as_f64()) {
            (Some(lat), Some(lng)) => coordinates_to_string(lat, lng),
            _ => String::new(),
        },
        _ => String::new(),
    };
    let ubicacion = Coordinates::from_stored(&raw_location);
    if !raw_location.is_empty() && Coordinates::parse(&raw_location).is_err() {
        tracing::warn!("⚠️ Site {} has an unusable location: {:?}", id, raw_location);
    }

    Site {
        nombre: row.nombre.unwrap_or_default(),
        ubicacion,
        categoria: row
            .categoria
            .as_deref()
            .and_then(Category::parse)
            .unwrap_or(Category::Permiso),
        estado: row
            .estado
            .as_deref()
            .and_then(SiteStatus::parse)
            .unwrap_or(SiteStatus::Inactivo),
        permiso: row
            .permiso
            .as_deref()
            .and_then(PermitStatus::parse)
            .unwrap_or(PermitStatus::Granted),
        fecha_emision: row.fecha_emision.as_deref().and_then(vigencia::parse_issue_date),
        vigencia: row.vigencia.as_ref().and_then(Scalar::as_i64),
        url_imagenes: row
            .url_imagenes
            .map(|column| image_links(db, column))
            .unwrap_or_default(),
        url_foto360: row
            .url_foto360
            .and_then(|column| image_links(db, column).into_iter().next())
            .unwrap_or_default(),
        notas: row.notas.unwrap_or_default(),
        id,
    }
}

fn image_links(db: &NocoDb, column: AttachmentColumn) -> Vec<String> {
    match column {
        AttachmentColumn::List(list) => list
            .iter()
            .filter_map(Attachment::best_link)
            .map(|link| db.absolute_url(link))
            .collect(),
        AttachmentColumn::Text(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Vec::new();
            }
            if let Ok(entries) = sonic_rs::from_str::<Vec<LegacyEntry>>(text) {
                return entries
                    .iter()
                    .filter_map(LegacyEntry::link)
                    .map(|link| db.absolute_url(link))
                    .collect();
            }
            if let Ok(entry) = sonic_rs::from_str::<Attachment>(text) {
                return entry.best_link().map(|l| db.absolute_url(l)).into_iter().collect();
            }
            text.split(',')
                .map(str::trim)
                .filter(|link| !link.is_empty())
                .map(str::to_string)
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NocoDbConfig;
    use chrono::NaiveDate;
    use std::time::Duration;
    use zeroize::Zeroizing;

    fn db() -> NocoDb {
        NocoDb::new(NocoDbConfig {
            base_url: "https://db.example.com".to_string(),
            api_token: Zeroizing::new("token".to_string()),
            sites_table_id: "sites".to_string(),
            users_table_id: "users".to_string(),
            upload_timeout: Duration::from_secs(60),
        })
        .unwrap()
    }

    fn parse_row(json: &str) -> Site {
        let row: SiteRow = sonic_rs::from_str(json).unwrap();
        row_to_site(&db(), row)
    }

    #[test]
    fn maps_a_current_row() {
        let site = parse_row(
            r#"{
                "Id": 3,
                "Nombre": "Hormigonera Sur",
                "Ubicacion": "18.626,-68.707",
                "Fecha_Emision": "2024-01-01",
                "Estado": "Activo",
                "Categoria": "Hormigonera",
                "Vigencia": "365",
                "Permiso": "Tiene",
                "URL_Imagenes": [
                    {"signedUrl": "https://db.example.com/signed/a.jpg", "path": "download/a.jpg"},
                    {"path": "download/b.jpg"}
                ],
                "URL_Foto_360": [{"url": "https://db.example.com/download/p.jpg"}],
                "Notas": "acceso por el norte"
            }"#,
        );

        assert_eq!(site.id, "3");
        assert_eq!(site.categoria, Category::Hormigonera);
        assert_eq!(site.estado, SiteStatus::Activo);
        assert_eq!(site.vigencia, Some(365));
        assert_eq!(site.fecha_emision, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(
            site.url_imagenes,
            vec![
                "https://db.example.com/signed/a.jpg".to_string(),
                "https://db.example.com/download/b.jpg".to_string(),
            ]
        );
        assert_eq!(site.url_foto360, "https://db.example.com/download/p.jpg");
        assert_eq!(site.ubicacion.latitude(), 18.626);
    }

    #[test]
    fn legacy_row_merges_coordinates_and_defaults() {
        let site = parse_row(
            r#"{"Id": 9, "Nombre": "Vieja", "Latitud": "18.5", "Longitud": -69.25,
                "URL_Imagenes": "https://x.example.com/1.jpg, https://x.example.com/2.jpg",
                "URL_Foto_360": null}"#,
        );
        assert_eq!(site.ubicacion.as_str(), "18.5,-69.25");
        assert_eq!(site.categoria, Category::Permiso);
        assert_eq!(site.estado, SiteStatus::Inactivo);
        assert_eq!(site.permiso, PermitStatus::Granted);
        assert_eq!(site.url_imagenes.len(), 2);
        assert!(site.url_foto360.is_empty());
    }

    #[test]
    fn json_text_attachment_cells_are_decoded() {
        let site = parse_row(
            r#"{"Id": 1, "Permiso": "No Tiene",
                "URL_Imagenes": "[{\"url\":\"download/c.jpg\"}]",
                "URL_Foto_360": "{\"path\":\"download/p.jpg\"}"}"#,
        );
        assert_eq!(site.permiso, PermitStatus::Missing);
        assert_eq!(site.url_imagenes, vec!["https://db.example.com/download/c.jpg".to_string()]);
        assert_eq!(site.url_foto360, "https://db.example.com/download/p.jpg");
    }

    #[test]
    fn patch_serializes_only_present_fields_and_clears_dates() {
        let patch = SitePatch {
            nombre: Some("Nuevo".to_string()),
            permiso: Some(PermitStatus::Missing),
            fecha_emision: Some(None),
            vigencia: Some(None),
            ..Default::default()
        };
        let record = SitePatchRecord {
            id: 4,
            nombre: patch.nombre.as_deref(),
            ubicacion: None,
            estado: None,
            categoria: None,
            permiso: patch.permiso.map(|p| p.as_str()),
            fecha_emision: patch.fecha_emision.map(|d| d.map(|d| d.to_string())),
            vigencia: patch.vigencia,
            url_imagenes: None,
            url_foto360: None,
            notas: None,
        };
        let json = sonic_rs::to_string(&[record]).unwrap();
        assert_eq!(
            json,
            r#"[{"Id":4,"Nombre":"Nuevo","Permiso":"No Tiene","Fecha_Emision":null,"Vigencia":null}]"#
        );
    }

    #[test]
    fn empty_attachment_lists_are_sent_as_null() {
        assert_eq!(attachments_json(&[]).unwrap(), None);
        let json = attachments_json(&["https://db.example.com/download/a.jpg".to_string()])
            .unwrap()
            .unwrap();
        assert!(json.contains("\"title\":\"a.jpg\""));
    }

    #[test]
    fn oversized_vigencia_cells_do_not_break_the_listing() {
        let now = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        for cell in ["1e300", "9223372036854775807", "200000000000000"] {
            let site = parse_row(&format!(
                r#"{{"Id": 9, "Nombre": "Mina Vieja", "Permiso": "Tiene",
                    "Fecha_Emision": "2024-01-01", "Vigencia": {}}}"#,
                cell
            ));
            assert!(site.vigencia.is_some(), "cell {}", cell);
            let view = site.view(now);
            assert_eq!(view.fecha_vencimiento, Some(NaiveDate::MAX));
            assert!(!view.vigencia_info.unwrap().esta_vencido);
        }
    }
}
