//! Reader and writer for IDTK serialized-simulation-state files.
//!
//! An IDTK file is a versioned JSON header followed by independently
//! compressed chunks: one simulation document, then one document per node.
//! See [`header`] for the byte layout, [`container`] for the in-memory model
//! and [`archive`] for reading and writing files by path.

pub mod archive;
pub mod chunk;
pub mod codec;
pub mod container;
pub mod document;
pub mod error;
pub mod header;
pub mod io_stream;
pub mod recovery;
pub mod symbols;

pub use archive::{read, write, WriteOptions};
pub use codec::{get_codec, Engine};
pub use container::{Container, ContainerBuilder};
pub use document::{Document, DocumentExt};
pub use error::{ContainerError, Result};
pub use header::{BuildInfo, Header};
pub use recovery::{triage, TriageReport};
pub use symbols::KeyTable;
