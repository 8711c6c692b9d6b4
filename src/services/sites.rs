use crate::error::{AppError, Result};
use crate::models::site::{NewSite, Site, SitePatch};
use crate::repositories::nocodb::NocoDb;
use crate::repositories::site as site_repo;
use crate::services::images::{self, ImageKind, OptimizedImage};

/// Lists every site. With `proxy_base` set, NocoDB links are rewritten to go
/// through the image proxy at that base URL.
pub async fn list_sites(db: &NocoDb, proxy_base: Option<&str>) -> Result<Vec<Site>> {
    let mut sites = site_repo::list_sites(db).await?;

    if proxy_base.is_some() {
        for site in &mut sites {
            for url in &mut site.url_imagenes {
                *url = images::public_url(db, proxy_base, url);
            }
            if !site.url_foto360.is_empty() {
                site.url_foto360 = images::public_url(db, proxy_base, &site.url_foto360);
            }
        }
    }

    tracing::info!("📍 Listed {} sites", sites.len());
    Ok(sites)
}

/// Creates a site with its photos.
///
/// Every image is validated and optimized before anything is uploaded, so a
/// bad panorama does not leave orphaned photos behind.
pub async fn create_site(
    db: &NocoDb,
    mut site: NewSite,
    photos: Vec<Vec<u8>>,
    panorama: Option<Vec<u8>>,
) -> Result<()> {
    let mut optimized = Vec::with_capacity(photos.len());
    for (i, bytes) in photos.into_iter().enumerate() {
        let image = images::optimize_blocking(bytes, ImageKind::Photo)
            .await
            .map_err(|e| numbered_image_error(e, i))?;
        optimized.push(image);
    }
    let panorama = match panorama {
        Some(bytes) => Some(images::optimize_blocking(bytes, ImageKind::Panorama).await?),
        None => None,
    };

    for image in optimized {
        site.url_imagenes.push(upload(db, image).await?);
    }
    if let Some(image) = panorama {
        site.url_foto360 = upload(db, image).await?;
    }

    site_repo::create_site(db, &site).await?;
    tracing::info!(
        "✅ Site '{}' created with {} photos{}",
        site.nombre,
        site.url_imagenes.len(),
        if site.url_foto360.is_empty() { "" } else { " and a 360° photo" }
    );
    Ok(())
}

pub async fn update_site(db: &NocoDb, id: i64, patch: &SitePatch) -> Result<()> {
    site_repo::update_site(db, id, patch).await?;
    tracing::info!("✅ Site {} updated", id);
    Ok(())
}

pub async fn delete_site(db: &NocoDb, id: i64) -> Result<()> {
    site_repo::delete_site(db, id).await?;
    tracing::info!("🗑️ Site {} deleted", id);
    Ok(())
}

/// Optimizes and uploads loose photos, returning their URLs in input order.
pub async fn upload_images(db: &NocoDb, photos: Vec<Vec<u8>>) -> Result<Vec<String>> {
    let mut urls = Vec::with_capacity(photos.len());
    for (i, bytes) in photos.into_iter().enumerate() {
        let image = images::optimize_blocking(bytes, ImageKind::Photo)
            .await
            .map_err(|e| numbered_image_error(e, i))?;
        urls.push(upload(db, image).await?);
    }
    Ok(urls)
}

async fn upload(db: &NocoDb, image: OptimizedImage) -> Result<String> {
    tracing::debug!(
        "🖼️ Uploading {} ({}x{}, {} bytes)",
        image.file_name,
        image.width,
        image.height,
        image.bytes.len()
    );
    db.upload_file(image.bytes, &image.file_name, "image/jpeg")
        .await
}

/// Tells the user which of several images was rejected (1-based).
fn numbered_image_error(error: AppError, index: usize) -> AppError {
    match error {
        AppError::Image(msg) => AppError::Image(format!("Imagen {}: {}", index + 1, msg)),
        other => other,
    }
}
