//! Filesystem layout for generated media.
//!
//! Every user gets a private directory pair under the media root:
//! `images/{user_id}/` for generated PNGs and `captions/{user_id}/`
//! for the JSON sidecar written next to each image. The sidecar keeps
//! the prompt and caption editable without touching the image bytes.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Caption sidecar stored as `{image_stem}_caption.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionSidecar {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub image_filename: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

pub fn user_image_dir(media_root: &str, user_id: &Uuid) -> PathBuf {
    Path::new(media_root).join("images").join(user_id.to_string())
}

pub fn user_caption_dir(media_root: &str, user_id: &Uuid) -> PathBuf {
    Path::new(media_root).join("captions").join(user_id.to_string())
}

pub fn image_path(media_root: &str, user_id: &Uuid, filename: &str) -> PathBuf {
    user_image_dir(media_root, user_id).join(filename)
}

/// Sidecar filename for an image, `img_x.png` becomes `img_x_caption.json`.
pub fn sidecar_filename(image_filename: &str) -> String {
    let stem = Path::new(image_filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(image_filename);
    format!("{}_caption.json", stem)
}

/// Writes generated image bytes into the user's image directory.
///
/// The filename carries a second-resolution timestamp, which is also what
/// ties the image to its activity row. Returns the filename together with
/// the blake3 checksum of the stored bytes.
pub async fn save_image(
    media_root: &str,
    user_id: &Uuid,
    bytes: &[u8],
) -> Result<(String, String)> {
    let dir = user_image_dir(media_root, user_id);
    tokio::fs::create_dir_all(&dir).await.ok();

    let filename = format!("img_{}.png", Utc::now().format("%Y%m%d%H%M%S"));
    let path = dir.join(&filename);
    tokio::fs::write(&path, bytes).await?;

    let checksum = blake3::hash(bytes).to_hex().to_string();
    tracing::debug!(
        "💾 Image saved: {} ({} bytes, blake3 {})",
        filename,
        bytes.len(),
        checksum
    );

    Ok((filename, checksum))
}

pub async fn read_image(media_root: &str, user_id: &Uuid, filename: &str) -> Result<Vec<u8>> {
    let path = image_path(media_root, user_id, filename);
    Ok(tokio::fs::read(&path).await?)
}

pub async fn image_exists(media_root: &str, user_id: &Uuid, filename: &str) -> bool {
    tokio::fs::try_exists(image_path(media_root, user_id, filename))
        .await
        .unwrap_or(false)
}

/// Writes the caption sidecar for a freshly generated image.
///
/// Returns the sidecar filename that gets recorded on the activity row.
pub async fn save_caption_sidecar(
    media_root: &str,
    user_id: &Uuid,
    image_filename: &str,
    prompt: &str,
    caption: &str,
) -> Result<String> {
    let dir = user_caption_dir(media_root, user_id);
    tokio::fs::create_dir_all(&dir).await.ok();

    let caption_filename = sidecar_filename(image_filename);
    let sidecar = CaptionSidecar {
        prompt: prompt.to_string(),
        caption: caption.to_string(),
        image_filename: image_filename.to_string(),
        created_at: Utc::now().to_rfc3339(),
        updated_at: None,
    };

    let json = sonic_rs::to_string(&sidecar)
        .map_err(|e| AppError::Internal(format!("Caption serialization failed: {}", e)))?;
    tokio::fs::write(dir.join(&caption_filename), json).await?;

    Ok(caption_filename)
}

/// Reads a caption sidecar, `None` when the file does not exist.
pub async fn read_caption_sidecar(
    media_root: &str,
    user_id: &Uuid,
    caption_filename: &str,
) -> Result<Option<CaptionSidecar>> {
    let path = user_caption_dir(media_root, user_id).join(caption_filename);
    let raw = match tokio::fs::read_to_string(&path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let sidecar = sonic_rs::from_str(&raw)
        .map_err(|e| AppError::Internal(format!("Caption file corrupted: {}", e)))?;
    Ok(Some(sidecar))
}

/// Rewrites the caption inside an existing sidecar, stamping `updated_at`.
///
/// A missing sidecar is recreated rather than rejected so caption edits
/// survive a wiped media directory.
pub async fn update_caption_sidecar(
    media_root: &str,
    user_id: &Uuid,
    caption_filename: &str,
    new_caption: &str,
) -> Result<CaptionSidecar> {
    let dir = user_caption_dir(media_root, user_id);
    tokio::fs::create_dir_all(&dir).await.ok();
    let path = dir.join(caption_filename);

    let mut sidecar = match tokio::fs::read_to_string(&path).await {
        Ok(raw) => sonic_rs::from_str(&raw)
            .map_err(|e| AppError::Internal(format!("Caption file corrupted: {}", e)))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => CaptionSidecar {
            prompt: String::new(),
            caption: String::new(),
            image_filename: String::new(),
            created_at: Utc::now().to_rfc3339(),
            updated_at: None,
        },
        Err(e) => return Err(e.into()),
    };

    sidecar.caption = new_caption.to_string();
    sidecar.updated_at = Some(Utc::now().to_rfc3339());

    let json = sonic_rs::to_string(&sidecar)
        .map_err(|e| AppError::Internal(format!("Caption serialization failed: {}", e)))?;
    tokio::fs::write(&path, json).await?;

    Ok(sidecar)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_filename_strips_extension() {
        assert_eq!(
            sidecar_filename("img_20250101120000.png"),
            "img_20250101120000_caption.json"
        );
        assert_eq!(sidecar_filename("bare"), "bare_caption.json");
    }

    #[tokio::test]
    async fn image_round_trips_through_user_directory() {
        let root = tempfile::tempdir().unwrap();
        let root = root.path().to_str().unwrap();
        let user_id = Uuid::new_v4();

        let (filename, checksum) = save_image(root, &user_id, b"fake png bytes")
            .await
            .unwrap();
        assert!(filename.starts_with("img_"));
        assert!(filename.ends_with(".png"));
        assert_eq!(checksum.len(), 64);

        assert!(image_exists(root, &user_id, &filename).await);
        let bytes = read_image(root, &user_id, &filename).await.unwrap();
        assert_eq!(bytes, b"fake png bytes");

        let other_user = Uuid::new_v4();
        assert!(!image_exists(root, &other_user, &filename).await);
    }

    #[tokio::test]
    async fn caption_sidecar_update_keeps_prompt_and_stamps_updated_at() {
        let root = tempfile::tempdir().unwrap();
        let root = root.path().to_str().unwrap();
        let user_id = Uuid::new_v4();

        let caption_filename = save_caption_sidecar(
            root,
            &user_id,
            "img_20250101120000.png",
            "a red fox",
            "Fox! #wild",
        )
        .await
        .unwrap();
        assert_eq!(caption_filename, "img_20250101120000_caption.json");

        let stored = read_caption_sidecar(root, &user_id, &caption_filename)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.prompt, "a red fox");
        assert_eq!(stored.caption, "Fox! #wild");
        assert!(stored.updated_at.is_none());

        let updated = update_caption_sidecar(root, &user_id, &caption_filename, "Better caption")
            .await
            .unwrap();
        assert_eq!(updated.caption, "Better caption");
        assert_eq!(updated.prompt, "a red fox");
        assert!(updated.updated_at.is_some());

        let reread = read_caption_sidecar(root, &user_id, &caption_filename)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reread.caption, "Better caption");
    }

    #[tokio::test]
    async fn missing_sidecar_reads_as_none_and_updates_recreate_it() {
        let root = tempfile::tempdir().unwrap();
        let root = root.path().to_str().unwrap();
        let user_id = Uuid::new_v4();

        let missing = read_caption_sidecar(root, &user_id, "nope_caption.json")
            .await
            .unwrap();
        assert!(missing.is_none());

        let recreated = update_caption_sidecar(root, &user_id, "nope_caption.json", "fresh")
            .await
            .unwrap();
        assert_eq!(recreated.caption, "fresh");
        assert!(recreated.updated_at.is_some());
    }
}
