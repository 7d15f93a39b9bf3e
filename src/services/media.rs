//! MediaStore: on-disk storage for uploaded videos and images.
//!
//! Uploads are streamed into a temp file, fsynced, then renamed into
//! `base_path/{kind}/{shard}/{shard}/{uuid}.{ext}`. The returned URL
//! (`/media/{key}`) is what rows store; `GET /media/{*key}` serves it back.

use crate::services::{ServiceError, ServiceResult};
use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

const MAX_MEDIA_KEY_LEN: usize = 512;
const MEDIA_URL_PREFIX: &str = "/media/";

/// Category of an upload; decides the top-level directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Thumbnail,
    Avatar,
    CoverImage,
}

impl MediaKind {
    fn dir(self) -> &'static str {
        match self {
            MediaKind::Video => "videos",
            MediaKind::Thumbnail => "thumbnails",
            MediaKind::Avatar => "avatars",
            MediaKind::CoverImage => "covers",
        }
    }
}

/// A stored upload: its key under the media root and the public URL rows keep.
#[derive(Debug, Clone)]
pub struct StoredMedia {
    pub key: String,
    pub url: String,
}

#[derive(Clone)]
pub struct MediaStore {
    /// Base directory on disk where media payloads are stored.
    pub base_path: PathBuf,
}

impl MediaStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Basic key validation to avoid trivial path traversal vectors.
    fn ensure_key_safe(key: &str) -> ServiceResult<()> {
        if key.is_empty()
            || key.len() > MAX_MEDIA_KEY_LEN
            || key.starts_with('/')
            || key.contains("..")
            || key
                .bytes()
                .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(ServiceError::invalid("Invalid media key"));
        }
        Ok(())
    }

    /// Two-level shard identifiers: the first two bytes of MD5(key) as hex.
    fn shards(seed: &str) -> (String, String) {
        let digest = md5::compute(seed);
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// Build a fresh key, keeping a sanitized extension from `file_name`.
    fn new_key(kind: MediaKind, file_name: Option<&str>) -> String {
        let id = Uuid::new_v4().to_string();
        let (shard_a, shard_b) = Self::shards(&id);
        let ext = file_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty() && ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
            .unwrap_or_default();
        format!("{}/{}/{}/{}{}", kind.dir(), shard_a, shard_b, id, ext)
    }

    fn media_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }

    /// Map a stored URL back to its key, if it points into this store.
    pub fn key_from_url(url: &str) -> Option<&str> {
        url.strip_prefix(MEDIA_URL_PREFIX).filter(|k| !k.is_empty())
    }

    /// Stream an upload to disk.
    ///
    /// Empty uploads are rejected with `InvalidArgument`. Temp files are
    /// removed on every failure path.
    pub async fn save_stream<S>(
        &self,
        kind: MediaKind,
        file_name: Option<&str>,
        stream: S,
    ) -> ServiceResult<StoredMedia>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let key = Self::new_key(kind, file_name);
        let file_path = self.media_path(&key);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            ServiceError::Io(io::Error::new(
                ErrorKind::Other,
                "media path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size_bytes: u64 = 0;
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(ServiceError::Io(err));
                }
            };
            size_bytes += chunk.len() as u64;
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(ServiceError::Io(err));
            }
        }
        if size_bytes == 0 {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ServiceError::invalid("Uploaded file is empty"));
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ServiceError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ServiceError::Io(err));
        }
        drop(file);

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ServiceError::Io(err));
        }

        debug!("stored {} bytes at {}", size_bytes, file_path.display());

        Ok(StoredMedia {
            url: format!("{}{}", MEDIA_URL_PREFIX, key),
            key,
        })
    }

    /// Open a stored file for streaming, with its guessed content type.
    pub async fn open(&self, key: &str) -> ServiceResult<(File, u64, String)> {
        Self::ensure_key_safe(key)?;
        let file_path = self.media_path(key);
        let file = File::open(&file_path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                ServiceError::not_found("Media not found")
            } else {
                ServiceError::Io(err)
            }
        })?;
        let len = file.metadata().await?.len();
        let content_type = mime_guess::from_path(&file_path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Ok((file, len, content_type))
    }

    /// Best-effort removal of a stored file by URL, pruning empty shard dirs.
    ///
    /// URLs that do not point into this store are ignored.
    pub async fn remove_url(&self, url: &str) {
        let Some(key) = Self::key_from_url(url) else {
            return;
        };
        if Self::ensure_key_safe(key).is_err() {
            return;
        }

        let file_path = self.media_path(key);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed media file {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("media file {} already missing", file_path.display());
            }
            Err(err) => {
                debug!("failed to remove media file {}: {}", file_path.display(), err);
                return;
            }
        }

        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent, &self.base_path).await;
        }
    }

    /// Remove empty directories walking up until `stop`.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}
