use std::path::PathBuf;

use anyhow::Result;
use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::info;
use uuid::Uuid;

use folio_types::api::{Claims, StoredFile, UploadResponse};

use crate::error::{ApiError, ApiResult};
use crate::extract::AppBytes;
use crate::state::AppState;

/// 5 MB per image
pub const MAX_UPLOAD_SIZE: usize = 5 * 1024 * 1024;

/// Public URL prefix the upload directory is served under.
pub const UPLOADS_PREFIX: &str = "/uploads";

/// Content-addressed image store.
///
/// Files live at `{dir}/{user_id}/{sha256}.{ext}`, so uploading the same bytes
/// twice yields the same URL.
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Upload directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    /// Write `data` for `user_id` and return its public URL.
    pub async fn save(&self, user_id: Uuid, data: &[u8], ext: &str) -> Result<String> {
        let name = format!("{}.{}", hex::encode(Sha256::digest(data)), ext);
        let user_dir = self.dir.join(user_id.to_string());
        fs::create_dir_all(&user_dir).await?;

        let path = user_dir.join(&name);
        if fs::try_exists(&path).await? {
            info!("Upload {} already stored", name);
        } else {
            fs::write(&path, data).await?;
        }

        Ok(format!("{UPLOADS_PREFIX}/{user_id}/{name}"))
    }

    /// Files stored for `user_id`, sorted by name.
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<StoredFile>> {
        let user_dir = self.dir.join(user_id.to_string());
        let mut entries = match fs::read_dir(&user_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            files.push(StoredFile {
                url: format!("{UPLOADS_PREFIX}/{user_id}/{name}"),
                name,
                size: metadata.len(),
            });
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }
}

/// Map an accepted image content type to the extension it is stored under.
fn image_extension(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    match essence.to_ascii_lowercase().as_str() {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// POST /api/uploads: raw image bytes, typed by Content-Type. Bodies over
/// [`MAX_UPLOAD_SIZE`] are cut off by the route's body limit and answered
/// with 413.
pub async fn upload(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    AppBytes(bytes): AppBytes,
) -> ApiResult<impl IntoResponse> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let ext = image_extension(content_type)
        .ok_or_else(|| ApiError::validation("only png, jpeg, gif and webp images can be uploaded"))?;

    if bytes.is_empty() {
        return Err(ApiError::validation("upload is empty"));
    }

    let url = state.storage.save(claims.sub, &bytes, ext).await?;
    info!("Stored {} bytes for {} at {}", bytes.len(), claims.sub, url);

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            url,
            size: bytes.len() as u64,
        }),
    ))
}

/// GET /api/uploads
pub async fn list_uploads(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<StoredFile>>> {
    Ok(Json(state.storage.list(claims.sub).await?))
}
