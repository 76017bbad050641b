//! Image attachments carried as `data:` URLs.
//!
//! Attachments are stored on messages exactly as they are sent, so a reloaded
//! session can render and resend them without touching the original files.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;

use crate::errors::SearchError;

pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// Read an image file and encode it as a `data:<mime>;base64,<payload>` URL.
pub async fn load_image<P: AsRef<Path>>(path: P) -> Result<String, SearchError> {
    let path = path.as_ref();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if mime.type_() != mime_guess::mime::IMAGE {
        return Err(SearchError::Image(format!(
            "{} is not an image ({})",
            path.display(),
            mime
        )));
    }

    let bytes = tokio::fs::read(path).await.map_err(|e| {
        SearchError::Image(format!("Failed to read {}: {}", path.display(), e))
    })?;
    log::debug!("Loaded image {} ({} bytes, {})", path.display(), bytes.len(), mime);

    Ok(to_data_url(mime.essence_str(), &bytes))
}

pub fn to_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Split an attachment into `(mime type, base64 payload)`.
///
/// Bare base64 strings are accepted and assumed to be JPEG.
pub fn split_data_url(image: &str) -> (String, String) {
    match image.split_once(',') {
        Some((header, payload)) => {
            let mime = header
                .strip_prefix("data:")
                .and_then(|rest| rest.split(';').next())
                .filter(|m| !m.is_empty())
                .unwrap_or(DEFAULT_IMAGE_MIME);
            (mime.to_string(), payload.to_string())
        }
        None => (DEFAULT_IMAGE_MIME.to_string(), image.to_string()),
    }
}
