use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tilechat_common::{ChatError, ImageRef, Result};

const UNKNOWN_CONTENT_TYPE: &str = "application/octet-stream";

/// Where a selected file's bytes come from.
#[derive(Debug, Clone)]
pub enum FileSource {
    Path(PathBuf),
    Memory(Bytes),
}

/// A user-selected file, described before any of its content is decoded.
#[derive(Debug, Clone)]
pub struct FileHandle {
    pub name: String,
    pub content_type: String,
    pub size: u64,
    pub source: FileSource,
}

impl FileHandle {
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        size: u64,
        source: FileSource,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            size,
            source,
        }
    }

    /// A file whose bytes are already in memory; size is taken from the data.
    pub fn in_memory(
        name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        let data = data.into();
        Self::new(name, content_type, data.len() as u64, FileSource::Memory(data))
    }

    /// Describe a file on disk. The content type is sniffed from magic bytes,
    /// not the extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let read_err = |e: std::io::Error| ChatError::FileReadError {
            name: name.clone(),
            reason: e.to_string(),
        };

        let meta = std::fs::metadata(path).map_err(read_err)?;
        if !meta.is_file() {
            return Err(ChatError::FileReadError {
                name: name.clone(),
                reason: "not a regular file".into(),
            });
        }
        let content_type = infer::get_from_path(path)
            .map_err(read_err)?
            .map(|kind| kind.mime_type().to_string())
            .unwrap_or_else(|| UNKNOWN_CONTENT_TYPE.to_string());

        Ok(Self::new(
            name,
            content_type,
            meta.len(),
            FileSource::Path(path.to_path_buf()),
        ))
    }
}

/// Decodes a selected file into an [`ImageRef`]. The only suspending step of
/// the attachment flow.
#[async_trait]
pub trait ImageReader: Send + Sync {
    async fn read(&self, file: &FileHandle) -> Result<ImageRef>;
}

/// Reads paths with `tokio::fs`; in-memory sources are passed through.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsImageReader;

#[async_trait]
impl ImageReader for FsImageReader {
    async fn read(&self, file: &FileHandle) -> Result<ImageRef> {
        let data = match &file.source {
            FileSource::Memory(bytes) => bytes.clone(),
            FileSource::Path(path) => tokio::fs::read(path)
                .await
                .map(Bytes::from)
                .map_err(|e| ChatError::FileReadError {
                    name: file.name.clone(),
                    reason: e.to_string(),
                })?,
        };
        tracing::debug!(file = %file.name, bytes = data.len(), "image decoded");
        Ok(ImageRef::new(file.name.clone(), data, file.content_type.clone()))
    }
}
