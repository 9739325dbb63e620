//!
//! # Stored File Handling
//!
//! Screening, normalization and on-disk placement for uploaded avatars.
//! Uploads are buffered in memory (they are capped well below anything
//! that would hurt), shrunk to fit the avatar bound, then written once at
//! their final path. The Upload record lives in `models::upload`; this
//! module owns the bytes.

use std::io::Cursor;
use std::path::Path;

use image::imageops::FilterType;
use lazy_static::lazy_static;
use regex::Regex;
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::Upload;

/// Upper bound on an uploaded avatar, in bytes.
pub const MAX_AVATAR_BYTES: usize = 1_000_000;

/// Avatars are resized to fit inside this square.
pub const AVATAR_BOUND: u32 = 720;

lazy_static! {
    // Accepted avatar filename extensions, any casing.
    static ref IMAGE_EXTENSION: Regex = Regex::new(r"(?i)\.(png|gif|jpeg|jpg)$").unwrap();
}

/// Screens an uploaded filename. Only the extension is consulted; bytes
/// that do not actually decode as an image are caught later by
/// `normalize_avatar`.
pub fn acceptable_image_name(filename: &str) -> bool {
    IMAGE_EXTENSION.is_match(filename)
}

/// Lowercased extension of a filename, dot included.
pub fn file_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
}

/// On-disk name for a stored upload: field name, upload instant in
/// milliseconds, original extension.
pub fn stored_filename(field_name: &str, original_name: &str) -> Option<String> {
    let extension = file_extension(original_name)?;
    Some(format!(
        "{}-{}{}",
        field_name,
        chrono::Utc::now().timestamp_millis(),
        extension
    ))
}

/// Decodes an upload, shrinks it to fit within the avatar bound keeping
/// aspect ratio, and re-encodes it in its original format. Bytes that do
/// not decode fail the request as client error.
pub fn normalize_avatar(bytes: &[u8], extension: &str) -> Result<Vec<u8>, AppError> {
    let format = image::ImageFormat::from_extension(extension.trim_start_matches('.'))
        .ok_or_else(|| AppError::BadRequest("Unsupported image format".into()))?;

    let decoded = image::load_from_memory(bytes)?;
    let resized = decoded.resize(AVATAR_BOUND, AVATAR_BOUND, FilterType::Lanczos3);

    let mut out = Cursor::new(Vec::new());
    resized.write_to(&mut out, format)?;
    Ok(out.into_inner())
}

/// Writes normalized avatar bytes at their final path, creating the avatar
/// directory on first use. Returns the stored path.
pub async fn store_avatar(dir: &str, filename: &str, bytes: &[u8]) -> Result<String, AppError> {
    tokio::fs::create_dir_all(dir).await?;
    let path = format!("{}/{}", dir.trim_end_matches('/'), filename);
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

/// Removes a stored file and its Upload record, best effort. This cleanup
/// runs while replacing or deleting an avatar; the surrounding request
/// already succeeded and must not fail over leftovers.
pub async fn remove_stored_file(pool: &PgPool, path: &str) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        log::debug!("could not remove stored file {}: {}", path, e);
    }
    if let Err(e) = Upload::delete_by_path(pool, path).await {
        log::debug!("could not remove upload record for {}: {}", path, e);
    }
}

/// Content-Type for a stored file, derived from its extension.
pub fn content_type_for(path: &str) -> mime_guess::Mime {
    mime_guess::from_path(path).first_or_octet_stream()
}
