//! Path-level read and write, the primary embedding surface.
//!
//! ```no_run
//! use idtk::archive::{self, WriteOptions};
//! use serde_json::json;
//!
//! // Write
//! let options = WriteOptions { author: "clorton".into(), ..WriteOptions::default() };
//! archive::create("state-00365.dtk", json!({"Run_Number": 1}), vec![json!({"externalId": 1})], &options)?;
//!
//! // Read
//! let container = archive::read("state-00365.dtk")?;
//! let node = container.find_node_document(1)?;
//! # Ok::<(), idtk::ContainerError>(())
//! ```
//!
//! Writes go to a temporary file in the target's directory which is renamed
//! over the target only once every byte is on disk.  A failed write leaves
//! any existing file untouched.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::codec::Engine;
use crate::container::{Container, ContainerBuilder};
use crate::document::Document;
use crate::error::{ContainerError, Result};
use crate::header::{Header, CURRENT_VERSION};
use crate::io_stream::{DtkReader, DtkWriter};

// ── WriteOptions ──────────────────────────────────────────────────────────────

/// Configuration for building and writing a container.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub engine:  Engine,
    pub author:  String,
    pub tool:    String,
    /// Header version and document layout to produce.
    pub version: u32,
    /// Round-trip every chunk before anything is written.
    pub verify:  bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            engine:  Engine::Lz4,
            author:  "unknown".to_owned(),
            tool:    "dtkfile".to_owned(),
            version: CURRENT_VERSION,
            verify:  false,
        }
    }
}

// ── Read ─────────────────────────────────────────────────────────────────────

fn open(path: &Path) -> Result<BufReader<File>> {
    match File::open(path) {
        Ok(f) => Ok(BufReader::new(f)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(ContainerError::FileNotFound(path.to_owned())),
        Err(e) => Err(e.into()),
    }
}

/// Read a container.  Only the header is interpreted; chunks are decoded on
/// first access.
pub fn read<P: AsRef<Path>>(path: P) -> Result<Container> {
    let path = path.as_ref();
    debug!(path = %path.display(), "reading container");
    DtkReader::new(open(path)?)?.read_chunks()
}

/// Read only the header.
pub fn read_header<P: AsRef<Path>>(path: P) -> Result<Header> {
    Ok(DtkReader::new(open(path.as_ref())?)?.header)
}

// ── Write ────────────────────────────────────────────────────────────────────

/// Sync the header, optionally verify, and atomically replace `path`.
/// Returns the number of bytes written.
pub fn write<P: AsRef<Path>>(container: &mut Container, path: P, verify: bool) -> Result<u64> {
    let path = path.as_ref();
    container.sync_header();
    if verify {
        container.verify()?;
        debug!(chunks = container.chunk_count(), "verification passed");
    }

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir)?;
    let mut writer = DtkWriter::new(BufWriter::new(tmp));
    let written = writer.write_container(container)?;
    let mut buffered = writer.into_inner();
    buffered.flush()?;
    let tmp = buffered.into_inner().map_err(|e| e.into_error())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    info!(
        path = %path.display(),
        bytes = written,
        engine = %container.engine(),
        version = container.header().version,
        "wrote container"
    );
    Ok(written)
}

/// Build a container from a simulation document and its nodes and write it.
pub fn create<P: AsRef<Path>>(
    path:       P,
    simulation: Document,
    nodes:      Vec<Document>,
    options:    &WriteOptions,
) -> Result<Container> {
    let mut builder = ContainerBuilder::new(options);
    builder.simulation(simulation)?;
    for node in nodes {
        builder.node(node)?;
    }
    let mut container = builder.build()?;
    write(&mut container, path, options.verify)?;
    Ok(container)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.dtk");
        assert!(matches!(read(&path), Err(ContainerError::FileNotFound(p)) if p == path));
    }

    #[test]
    fn test_create_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.dtk");
        let options = WriteOptions { author: "tester".into(), verify: true, ..WriteOptions::default() };
        create(&path, json!({"a": 1}), vec![json!({"id": 0}), json!({"id": 1})], &options).unwrap();

        let header = read_header(&path).unwrap();
        assert_eq!(header.author, "tester");
        assert_eq!(header.chunk_count(), 3);

        let c = read(&path).unwrap();
        assert_eq!(c.object(1).unwrap(), &json!({"id": 0}));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), c.header().total_len());
    }

    #[test]
    fn test_write_replaces_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.dtk");
        std::fs::write(&path, b"old contents").unwrap();
        create(&path, json!({"b": 2}), vec![], &WriteOptions::default()).unwrap();
        assert_eq!(read(&path).unwrap().simulation().unwrap(), json!({"b": 2}));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_rewrite_keeps_header_provenance() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src.dtk");
        let options = WriteOptions { author: "tester".into(), tool: "model".into(), version: 3, ..WriteOptions::default() };
        create(&src, json!({"Run_Number": 4}), vec![json!({"externalId": 1})], &options).unwrap();

        let mut c = read(&src).unwrap();
        let dst = dir.path().join("dst.dtk");
        write(&mut c, &dst, true).unwrap();
        let header = read_header(&dst).unwrap();
        assert_eq!((header.author.as_str(), header.tool.as_str(), header.version), ("tester", "model", 3));
        assert_eq!(header.compression, options.engine);
    }
}
