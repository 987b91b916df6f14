/*!
Error types for reading and writing IDTK containers.

Module-level errors ([`CodecError`], [`HeaderError`], [`DocumentError`])
describe what went wrong; [`ContainerError`] adds where it went wrong. Any
failure that belongs to one chunk carries that chunk's index.
*/

use std::path::PathBuf;

use thiserror::Error;

use crate::codec::CodecError;
use crate::document::DocumentError;
use crate::header::HeaderError;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, ContainerError>;

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The header could not be interpreted; no chunk can be located.
    #[error("Header parse error: {0}")]
    HeaderParse(#[source] HeaderError),

    #[error("Unsupported header version: {0}")]
    UnsupportedHeaderVersion(i64),

    #[error("Unsupported compression engine '{0}'")]
    UnsupportedEngine(String),

    /// Chunk `index` failed decompression or length validation.
    #[error("Corrupt chunk {index}: {reason}")]
    CorruptChunk { index: usize, reason: String },

    /// Chunk `index` decompressed but is not a valid document.
    #[error("Malformed document in chunk {index}: {source}")]
    MalformedDocument {
        index:  usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Verification failed for chunk {index}")]
    VerificationFailed { index: usize },

    /// No readable node has this ID.  `unsearched` lists chunks that could
    /// not be decoded and so were not checked.
    #[error("Node {id} not found{}", unsearched_note(.unsearched))]
    NodeNotFound { id: i64, unsearched: Vec<usize> },

    #[error("Chunk index {index} out of range (file has {count} chunks)")]
    ChunkOutOfRange { index: usize, count: usize },

    /// Documents were staged out of order on the write path.
    #[error("Staging error: {0}")]
    Staging(String),

    #[error("Document error in chunk {index}: {source}")]
    Document {
        index:  usize,
        #[source]
        source: DocumentError,
    },
}

fn unsearched_note(chunks: &[usize]) -> String {
    if chunks.is_empty() {
        return String::new();
    }
    let list: Vec<String> = chunks.iter().map(usize::to_string).collect();
    format!(" (chunks not searched: {})", list.join(", "))
}

impl ContainerError {
    /// Wrap a codec failure for chunk `index`.
    pub fn corrupt_chunk(index: usize, err: CodecError) -> Self {
        match err {
            CodecError::UnsupportedEngine(name) => Self::UnsupportedEngine(name),
            other => Self::CorruptChunk { index, reason: other.to_string() },
        }
    }

    pub fn staging<S: Into<String>>(msg: S) -> Self {
        Self::Staging(msg.into())
    }

    /// Chunk index the error is attributed to, if any.
    pub fn chunk_index(&self) -> Option<usize> {
        match self {
            Self::CorruptChunk { index, .. }
            | Self::MalformedDocument { index, .. }
            | Self::VerificationFailed { index }
            | Self::Document { index, .. } => Some(*index),
            Self::ChunkOutOfRange { index, .. } => Some(*index),
            _ => None,
        }
    }
}

impl From<HeaderError> for ContainerError {
    fn from(err: HeaderError) -> Self {
        match err {
            HeaderError::UnsupportedVersion(v)   => Self::UnsupportedHeaderVersion(v),
            HeaderError::UnsupportedEngine(name) => Self::UnsupportedEngine(name),
            HeaderError::Io(e)                   => Self::Io(e),
            other                                => Self::HeaderParse(other),
        }
    }
}
