use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::{stream, Stream, StreamExt};
use progress_core::FileInfo;
use tokio_util::io::ReaderStream;

use crate::backend::UploadProgressSink;
use crate::{TransportError, TransportFailure};

const CHUNK_SIZE: usize = 64 * 1024;

type ChunkStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync>>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum UploadSource {
    Path(PathBuf),
    Memory(Bytes),
}

/// A video about to be uploaded, either from disk or already in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    file_name: String,
    content_type: String,
    size: u64,
    source: UploadSource,
}

impl UploadFile {
    /// Describe a file on disk. The content type is guessed from the extension.
    pub fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a file", path.display()),
            ));
        }
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            content_type: content_type_for(path).to_string(),
            file_name,
            size: metadata.len(),
            source: UploadSource::Path(path.to_path_buf()),
        })
    }

    pub fn from_bytes(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        let bytes = bytes.into();
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            size: bytes.len() as u64,
            source: UploadSource::Memory(bytes),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn info(&self) -> FileInfo {
        FileInfo {
            file_name: self.file_name.clone(),
            content_type: self.content_type.clone(),
            size: self.size,
        }
    }

    /// Turn the file into a streaming request body that reports every chunk
    /// handed to the transport.
    pub(crate) async fn into_body(
        self,
        progress: Arc<dyn UploadProgressSink>,
    ) -> Result<reqwest::Body, TransportError> {
        let chunks: ChunkStream = match self.source {
            UploadSource::Path(path) => {
                let file = tokio::fs::File::open(&path).await.map_err(|err| {
                    TransportError::new(TransportFailure::Io, format!("{}: {err}", path.display()))
                })?;
                Box::pin(ReaderStream::with_capacity(file, CHUNK_SIZE))
            }
            UploadSource::Memory(bytes) => Box::pin(stream::iter(split_chunks(bytes))),
        };

        let total = self.size;
        let mut sent = 0u64;
        let counted = chunks.map(move |chunk| {
            if let Ok(bytes) = &chunk {
                sent += bytes.len() as u64;
                progress.on_upload_progress(sent, total);
            }
            chunk
        });
        Ok(reqwest::Body::wrap_stream(counted))
    }
}

fn split_chunks(mut rest: Bytes) -> Vec<io::Result<Bytes>> {
    let mut chunks = Vec::with_capacity(rest.len() / CHUNK_SIZE + 1);
    while !rest.is_empty() {
        let take = rest.len().min(CHUNK_SIZE);
        chunks.push(Ok(rest.split_to(take)));
    }
    chunks
}

/// Content type a browser would report for common video extensions.
pub fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("avi") => "video/avi",
        Some("mov") | Some("qt") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guesses_video_types_case_insensitively() {
        assert_eq!(content_type_for(Path::new("a/b/Clip.MP4")), "video/mp4");
        assert_eq!(content_type_for(Path::new("clip.mov")), "video/quicktime");
        assert_eq!(content_type_for(Path::new("notes")), "application/octet-stream");
    }

    #[test]
    fn memory_uploads_split_into_bounded_chunks() {
        let chunks = split_chunks(Bytes::from(vec![0u8; CHUNK_SIZE * 2 + 10]));
        let sizes: Vec<usize> = chunks
            .into_iter()
            .map(|chunk| chunk.map(|bytes| bytes.len()).unwrap_or(0))
            .collect();
        assert_eq!(sizes, vec![CHUNK_SIZE, CHUNK_SIZE, 10]);
    }
}
