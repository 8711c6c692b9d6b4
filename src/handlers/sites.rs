use std::time::Duration;

use axum::{
    extract::{multipart::Field, Multipart, Path, State},
    response::IntoResponse,
    Extension,
};
use tokio::time::timeout;

use crate::{
    error::{AppError, Result},
    models::site::SiteView,
    models::user::SessionUser,
    response,
    services::sites as site_service,
    state::AppState,
    validation::site::{parse_site_id, SiteForm, UpdateSiteRequest},
};

/// Lists every site with its validity computed as of now.
pub async fn list_sites(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let sites = site_service::list_sites(&state.nocodb, state.config.image_proxy_base()).await?;
    let now = chrono::Local::now().naive_local();
    let views: Vec<SiteView<'_>> = sites.iter().map(|site| site.view(now)).collect();
    Ok(response::Json(views).into_response())
}

/// Creates a site from a multipart form.
///
/// Text fields carry the site data; `imagen_0`, `imagen_1`, … carry photos
/// and `imagen360` an optional equirectangular panorama.
pub async fn create_site(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let read_timeout = state.config.nocodb.upload_timeout;
    let mut form = SiteForm::default();
    let mut photos: Vec<(usize, Vec<u8>)> = Vec::new();
    let mut panorama: Option<Vec<u8>> = None;

    while let Some(field) = next_field(&mut multipart, read_timeout).await? {
        let name = field.name().unwrap_or("").to_string();
        if name == "imagen360" {
            panorama = Some(field.bytes().await?.to_vec()).filter(|b| !b.is_empty());
        } else if let Some(index) = name.strip_prefix("imagen_") {
            let index = index
                .parse::<usize>()
                .map_err(|_| AppError::Multipart(format!("Campo de imagen inválido: {}", name)))?;
            let bytes = field.bytes().await?;
            if !bytes.is_empty() {
                photos.push((index, bytes.to_vec()));
            }
        } else {
            let value = field.text().await?;
            form.set(&name, value);
        }
    }

    photos.sort_by_key(|(index, _)| *index);
    let photos = photos.into_iter().map(|(_, bytes)| bytes).collect();

    let site = form.into_new_site()?;
    tracing::info!("📍 {} is creating site '{}'", user.email, site.nombre);
    site_service::create_site(&state.nocodb, site, photos, panorama).await?;

    Ok(response::Json(sonic_rs::json!({ "mensaje": "Ubicación agregada exitosamente" })))
}

/// Applies a partial update to a site.
pub async fn update_site(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
    response::Json(payload): response::Json<UpdateSiteRequest>,
) -> Result<impl IntoResponse> {
    let id = parse_site_id(&id)?;
    let patch = payload.into_patch()?;
    tracing::info!("✏️ {} is updating site {}", user.email, id);
    site_service::update_site(&state.nocodb, id, &patch).await?;

    Ok(response::Json(sonic_rs::json!({ "mensaje": "Ubicación actualizada exitosamente" })))
}

pub async fn delete_site(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let id = parse_site_id(&id)?;
    tracing::info!("🗑️ {} is deleting site {}", user.email, id);
    site_service::delete_site(&state.nocodb, id).await?;

    Ok(response::Json(sonic_rs::json!({
        "success": true,
        "message": "Ubicación eliminada exitosamente"
    })))
}

/// Uploads loose photos sent as repeated `imagenes` fields.
pub async fn upload_images(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let read_timeout = state.config.nocodb.upload_timeout;
    let mut photos = Vec::new();

    while let Some(field) = next_field(&mut multipart, read_timeout).await? {
        if field.name() != Some("imagenes") {
            continue;
        }
        let bytes = field.bytes().await?;
        if !bytes.is_empty() {
            photos.push(bytes.to_vec());
        }
    }

    if photos.is_empty() {
        return Err(AppError::Validation(
            "No se encontraron imágenes para subir".to_string(),
        ));
    }

    let urls = site_service::upload_images(&state.nocodb, photos).await?;
    Ok(response::Json(sonic_rs::json!({
        "mensaje": format!("{} imagen(es) subida(s) exitosamente", urls.len()),
        "urls": urls,
    })))
}

async fn next_field(multipart: &mut Multipart, limit: Duration) -> Result<Option<Field<'_>>> {
    match timeout(limit, multipart.next_field()).await {
        Ok(Ok(field)) => Ok(field),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(AppError::Multipart("Tiempo de carga excedido".to_string())),
    }
}
