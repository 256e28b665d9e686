//! Upload body normalisation.
//!
//! Whatever the caller hands in (a path, an in-memory buffer or a stream) is
//! turned into one byte stream before it reaches the dispatcher.

use crate::error::Result;
use bytes::Bytes;
use futures::future;
use futures::stream::{self, Stream};
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use tokio_util::io::ReaderStream;

/// Stream of body chunks
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync>>;

/// Where the bytes of an upload come from
pub enum UploadSource {
    /// Local file, opened when the upload starts
    Path(PathBuf),
    /// In-memory buffer
    Bytes(Bytes),
    /// Caller-provided stream, passed through unchanged
    Stream(ByteStream),
}

impl fmt::Debug for UploadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            UploadSource::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            UploadSource::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<PathBuf> for UploadSource {
    fn from(path: PathBuf) -> Self {
        UploadSource::Path(path)
    }
}

impl From<&std::path::Path> for UploadSource {
    fn from(path: &std::path::Path) -> Self {
        UploadSource::Path(path.to_path_buf())
    }
}

impl From<Bytes> for UploadSource {
    fn from(bytes: Bytes) -> Self {
        UploadSource::Bytes(bytes)
    }
}

impl From<Vec<u8>> for UploadSource {
    fn from(bytes: Vec<u8>) -> Self {
        UploadSource::Bytes(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for UploadSource {
    fn from(bytes: &'static [u8]) -> Self {
        UploadSource::Bytes(Bytes::from_static(bytes))
    }
}

impl From<ByteStream> for UploadSource {
    fn from(stream: ByteStream) -> Self {
        UploadSource::Stream(stream)
    }
}

/// Turn an upload source into a byte stream.
///
/// The only failure is opening the file of a [`UploadSource::Path`].
pub async fn normalize_upload_source(source: UploadSource) -> Result<ByteStream> {
    match source {
        UploadSource::Path(path) => {
            let file = tokio::fs::File::open(&path).await?;
            Ok(Box::pin(ReaderStream::new(file)))
        }
        UploadSource::Bytes(bytes) => {
            Ok(Box::pin(stream::once(future::ready(Ok::<_, io::Error>(bytes)))))
        }
        UploadSource::Stream(stream) => Ok(stream),
    }
}
