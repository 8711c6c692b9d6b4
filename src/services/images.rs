use std::io::Cursor;

use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage, GenericImageView};
use reqwest::Url;

use crate::error::{AppError, Result};
use crate::repositories::nocodb::NocoDb;

/// MIME types accepted for site photos.
pub const ACCEPTED_MIME_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

pub const JPEG_QUALITY: u8 = 85;

/// Bounding box for conventional photos.
const MAX_WIDTH: u32 = 1200;
const MAX_HEIGHT: u32 = 800;

/// Tolerance on the 2:1 ratio of equirectangular panoramas.
const PANORAMA_RATIO_TOLERANCE: f64 = 0.1;

pub const NOT_AN_IMAGE_MESSAGE: &str = "El archivo no es una imagen válida";
pub const NOT_EQUIRECTANGULAR_MESSAGE: &str =
    "La imagen 360° debe tener formato equirectangular (relación 2:1)";

/// Which pipeline an uploaded picture goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Photo,
    Panorama,
}

impl ImageKind {
    fn prefix(self) -> &'static str {
        match self {
            ImageKind::Photo => "imagen",
            ImageKind::Panorama => "imagen_360",
        }
    }
}

/// A re-encoded JPEG ready to upload.
#[derive(Debug)]
pub struct OptimizedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub file_name: String,
}

/// Sniffs the content type from the leading bytes; only JPEG, PNG and WebP pass.
pub fn sniff_mime(bytes: &[u8]) -> Result<&'static str> {
    infer::get(bytes)
        .map(|kind| kind.mime_type())
        .filter(|mime| ACCEPTED_MIME_TYPES.contains(mime))
        .ok_or_else(|| AppError::Image(NOT_AN_IMAGE_MESSAGE.to_string()))
}

/// Whether `width`×`height` is a 2:1 equirectangular projection.
pub fn is_equirectangular(width: u32, height: u32) -> bool {
    if width == 0 || height == 0 {
        return false;
    }
    (width as f64 / height as f64 - 2.0).abs() < PANORAMA_RATIO_TOLERANCE
}

/// Output dimensions for an image of the given kind and size.
pub fn target_size(kind: ImageKind, width: u32, height: u32) -> (u32, u32) {
    match kind {
        ImageKind::Panorama if width > 6144 => (6144, 3072),
        ImageKind::Panorama if width > 4096 => (4096, 2048),
        ImageKind::Panorama => (width, height),
        ImageKind::Photo => fit_inside(width, height, MAX_WIDTH, MAX_HEIGHT),
    }
}

/// Scales down to fit the box, keeping the aspect ratio. Never enlarges.
fn fit_inside(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }
    let scale = f64::min(
        max_width as f64 / width as f64,
        max_height as f64 / height as f64,
    );
    let w = ((width as f64 * scale).round() as u32).max(1);
    let h = ((height as f64 * scale).round() as u32).max(1);
    (w, h)
}

/// Validates, resizes and re-encodes an upload as JPEG.
///
/// CPU bound; call through [`optimize_blocking`] from async code.
pub fn optimize(bytes: &[u8], kind: ImageKind) -> Result<OptimizedImage> {
    sniff_mime(bytes)?;

    let img = image::load_from_memory(bytes)
        .map_err(|e| AppError::Image(format!("{}: {}", NOT_AN_IMAGE_MESSAGE, e)))?;
    let (width, height) = img.dimensions();

    if kind == ImageKind::Panorama && !is_equirectangular(width, height) {
        return Err(AppError::Image(NOT_EQUIRECTANGULAR_MESSAGE.to_string()));
    }

    let (target_w, target_h) = target_size(kind, width, height);
    let img = if (target_w, target_h) != (width, height) {
        tracing::debug!(
            "🖼️ Resizing {}x{} -> {}x{}",
            width,
            height,
            target_w,
            target_h
        );
        img.resize_exact(target_w, target_h, FilterType::Lanczos3)
    } else {
        img
    };

    let encoded = encode_jpeg(&img)?;
    let file_name = format!(
        "{}_{}.jpg",
        kind.prefix(),
        &blake3::hash(&encoded).to_hex()[..32]
    );

    Ok(OptimizedImage {
        bytes: encoded,
        width: target_w,
        height: target_h,
        file_name,
    })
}

fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut out = Cursor::new(Vec::new());
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY))
        .map_err(|e| AppError::Internal(format!("JPEG encoding failed: {}", e)))?;
    Ok(out.into_inner())
}

/// Runs [`optimize`] on the blocking pool.
pub async fn optimize_blocking(bytes: Vec<u8>, kind: ImageKind) -> Result<OptimizedImage> {
    tokio::task::spawn_blocking(move || optimize(&bytes, kind))
        .await
        .map_err(|e| AppError::Internal(format!("Image task failed: {}", e)))?
}

/// Link through which browsers load a stored attachment.
///
/// In production, NocoDB URLs go through this service's proxy so the browser
/// never needs the NocoDB token; anything else is returned unchanged.
pub fn public_url(db: &NocoDb, public_app_url: Option<&str>, url: &str) -> String {
    let Some(app_url) = public_app_url else {
        return url.to_string();
    };
    if !db.owns_url(url) {
        return url.to_string();
    }
    match Url::parse_with_params(&format!("{}/api/proxy-image", app_url), &[("url", url)]) {
        Ok(proxied) => proxied.to_string(),
        Err(e) => {
            tracing::warn!("⚠️ Could not build proxy URL from {}: {}", app_url, e);
            url.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NocoDbConfig;
    use image::{ImageFormat, RgbImage};
    use std::time::Duration;
    use zeroize::Zeroizing;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, image::Rgb([40, 120, 200]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn db() -> NocoDb {
        NocoDb::new(NocoDbConfig {
            base_url: "https://db.example.com".to_string(),
            api_token: Zeroizing::new("t".to_string()),
            sites_table_id: "s".to_string(),
            users_table_id: "u".to_string(),
            upload_timeout: Duration::from_secs(60),
        })
        .unwrap()
    }

    #[test]
    fn panorama_ratio_tolerance() {
        assert!(is_equirectangular(4000, 2000));
        assert!(is_equirectangular(4190, 2000));
        assert!(!is_equirectangular(4200, 2000));
        assert!(!is_equirectangular(4000, 3000));
        assert!(!is_equirectangular(4000, 0));
    }

    #[test]
    fn photos_shrink_into_the_box_without_enlarging() {
        assert_eq!(target_size(ImageKind::Photo, 2400, 1600), (1200, 800));
        assert_eq!(target_size(ImageKind::Photo, 1600, 1600), (800, 800));
        assert_eq!(target_size(ImageKind::Photo, 640, 480), (640, 480));
    }

    #[test]
    fn panoramas_step_down_to_fixed_widths() {
        assert_eq!(target_size(ImageKind::Panorama, 8192, 4096), (6144, 3072));
        assert_eq!(target_size(ImageKind::Panorama, 5000, 2500), (4096, 2048));
        assert_eq!(target_size(ImageKind::Panorama, 4096, 2048), (4096, 2048));
    }

    #[test]
    fn text_is_not_an_image() {
        assert!(matches!(sniff_mime(b"hello world"), Err(AppError::Image(_))));
        assert_eq!(sniff_mime(&png(2, 2)).unwrap(), "image/png");
    }

    #[test]
    fn optimize_reencodes_as_jpeg() {
        let out = optimize(&png(1600, 800), ImageKind::Photo).unwrap();
        assert_eq!((out.width, out.height), (1200, 600));
        assert_eq!(infer::get(&out.bytes).unwrap().mime_type(), "image/jpeg");
        assert!(out.file_name.starts_with("imagen_") && out.file_name.ends_with(".jpg"));
    }

    #[test]
    fn square_panorama_is_rejected() {
        assert!(matches!(
            optimize(&png(64, 64), ImageKind::Panorama),
            Err(AppError::Image(msg)) if msg == NOT_EQUIRECTANGULAR_MESSAGE
        ));
        assert!(optimize(&png(128, 64), ImageKind::Panorama).is_ok());
    }

    #[test]
    fn only_nocodb_urls_are_proxied() {
        let db = db();
        let url = "https://db.example.com/download/a b.jpg";
        assert_eq!(public_url(&db, None, url), url);

        let proxied = public_url(&db, Some("https://mapa.example.com"), url);
        assert!(proxied.starts_with("https://mapa.example.com/api/proxy-image?url=https%3A%2F%2Fdb.example.com"));

        let foreign = "https://cdn.example.com/a.jpg";
        assert_eq!(public_url(&db, Some("https://mapa.example.com"), foreign), foreign);
    }
}
