//! In-memory model of one IDTK file.
//!
//! A [`Container`] owns the header and the raw (still compressed) chunks.
//! Nothing is decompressed or parsed until it is asked for; the first call to
//! [`Container::content`] or [`Container::object`] for an index fills a
//! per-index cache and later calls return the cached value.  A bad chunk only
//! ever fails the accessors for its own index.
//!
//! # Views
//! Callers usually want the simulation and its nodes rather than raw chunk
//! documents.  The layout differs by header version:
//!
//! | version | chunk 0                                   | chunk i > 0                     |
//! |---------|-------------------------------------------|---------------------------------|
//! | 1       | `{"simulation": {…, "nodes": [{"suid", "node"}, …]}}` | (none)              |
//! | 2       | `{"simulation": {…}}`                     | `{"suid": {"id": n}, "node": {…}}` |
//! | 3+      | simulation document                       | node document                   |
//!
//! [`Container::simulation`] and [`Container::node`] hide the difference.

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::archive::WriteOptions;
use crate::chunk;
use crate::codec::Engine;
use crate::document::{node_id, Document, DocumentExt, DocumentMap};
use crate::error::{ContainerError, Result};
use crate::header::{Header, MAX_VERSION};

// ── Container ─────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Container {
    header:        Header,
    chunks:        Vec<Vec<u8>>,
    /// Uncompressed length per chunk, when known.
    content_sizes: Vec<Option<usize>>,
    /// CRC-32 of the stored bytes, when known.
    checksums:     Vec<Option<u32>>,
    /// Declared size of chunks that ended early on disk.
    truncated:     Vec<Option<usize>>,
    contents:      Vec<OnceCell<Vec<u8>>>,
    objects:       Vec<OnceCell<Document>>,
}

impl Container {
    /// Container around chunks read from a file.  `truncated[i]` holds the
    /// declared size of chunk `i` if fewer bytes were available.
    pub(crate) fn from_parts(header: Header, chunks: Vec<Vec<u8>>, truncated: Vec<Option<usize>>) -> Self {
        let content_sizes = match header.content_sizes() {
            Some(sizes) => sizes.iter().copied().map(Some).collect(),
            None        => vec![None; chunks.len()],
        };
        let checksums = match header.chunk_checksums() {
            Some(crcs) => crcs.iter().copied().map(Some).collect(),
            None       => vec![None; chunks.len()],
        };
        let n = chunks.len();
        Self {
            header,
            chunks,
            content_sizes,
            checksums,
            truncated,
            contents: (0..n).map(|_| OnceCell::new()).collect(),
            objects:  (0..n).map(|_| OnceCell::new()).collect(),
        }
    }

    fn empty(header: Header) -> Self {
        Self::from_parts(header, Vec::new(), Vec::new())
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Mutable header for editing author, tool, version or build info.  The
    /// chunk layout is recomputed from the chunks on every write.
    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    pub fn engine(&self) -> Engine {
        self.header.compression
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_truncated(&self, index: usize) -> bool {
        self.truncated.get(index).is_some_and(Option::is_some)
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.chunks.len() {
            return Err(ContainerError::ChunkOutOfRange { index, count: self.chunks.len() });
        }
        Ok(())
    }

    // ── Chunk-level access ───────────────────────────────────────────────────

    /// Raw compressed bytes of chunk `index`, exactly as stored.
    pub fn chunk(&self, index: usize) -> Result<&[u8]> {
        self.check_index(index)?;
        Ok(&self.chunks[index])
    }

    pub fn chunks(&self) -> &[Vec<u8>] {
        &self.chunks
    }

    /// Decompressed bytes of chunk `index`.
    pub fn content(&self, index: usize) -> Result<&[u8]> {
        self.check_index(index)?;
        let content = self.contents[index].get_or_try_init(|| {
            if let Some(declared) = self.truncated[index] {
                return Err(ContainerError::CorruptChunk {
                    index,
                    reason: format!(
                        "truncated: header declares {declared} bytes, file holds {}",
                        self.chunks[index].len()
                    ),
                });
            }
            if let Some(expected) = self.checksums[index] {
                let actual = crc32fast::hash(&self.chunks[index]);
                if actual != expected {
                    return Err(ContainerError::CorruptChunk {
                        index,
                        reason: format!("checksum mismatch: recorded {expected:08x}, computed {actual:08x}"),
                    });
                }
            }
            debug!(index, engine = %self.engine(), "decompressing chunk");
            chunk::decompress_chunk(self.engine(), index, &self.chunks[index], self.content_sizes[index])
        })?;
        Ok(content)
    }

    /// Decoded document of chunk `index`.
    pub fn object(&self, index: usize) -> Result<&Document> {
        self.check_index(index)?;
        self.objects[index].get_or_try_init(|| chunk::decode_document(index, self.content(index)?))
    }

    /// Decode every chunk.  Each result is independent of the others.
    pub fn decode_all(&self) -> Vec<Result<&Document>> {
        (0..self.chunks.len()).map(|i| self.object(i)).collect()
    }

    /// [`Container::decode_all`] across a rayon thread pool.
    #[cfg(feature = "parallel")]
    pub fn decode_all_parallel(&self) -> Vec<Result<&Document>> {
        use rayon::prelude::*;
        (0..self.chunks.len()).into_par_iter().map(|i| self.object(i)).collect()
    }

    // ── Mutation ─────────────────────────────────────────────────────────────

    /// Replace the stored bytes of chunk `index` verbatim.  No validation is
    /// done; this is how damaged fixtures are produced.  The recorded
    /// uncompressed length and checksum are kept.
    pub fn set_chunk(&mut self, index: usize, bytes: Vec<u8>) -> Result<()> {
        self.check_index(index)?;
        self.chunks[index]    = bytes;
        self.truncated[index] = None;
        self.contents[index]  = OnceCell::new();
        self.objects[index]   = OnceCell::new();
        Ok(())
    }

    /// Encode `doc` with the container's engine and store it at `index`.
    pub fn set_object(&mut self, index: usize, doc: Document) -> Result<()> {
        self.check_index(index)?;
        let (bytes, len) = chunk::encode_chunk(self.engine(), index, &doc)?;
        self.chunks[index]        = bytes;
        self.truncated[index]     = None;
        self.content_sizes[index] = Some(len);
        self.checksums[index]     = Some(crc32fast::hash(&self.chunks[index]));
        self.contents[index]      = OnceCell::new();
        self.objects[index]       = OnceCell::with_value(doc);
        Ok(())
    }

    fn push_object(&mut self, doc: Document) -> Result<()> {
        let index = self.chunks.len();
        let (bytes, len) = chunk::encode_chunk(self.engine(), index, &doc)?;
        self.checksums.push(Some(crc32fast::hash(&bytes)));
        self.chunks.push(bytes);
        self.truncated.push(None);
        self.content_sizes.push(Some(len));
        self.contents.push(OnceCell::new());
        self.objects.push(OnceCell::with_value(doc));
        Ok(())
    }

    /// Re-encode every chunk with `engine`.  Fails without changing anything
    /// if any chunk cannot be decompressed.
    pub fn recompress(&mut self, engine: Engine) -> Result<()> {
        check_engine_for_version(self.header.version, engine)?;
        if engine == self.engine() {
            return Ok(());
        }
        let mut packed = Vec::with_capacity(self.chunks.len());
        for index in 0..self.chunks.len() {
            let content = self.content(index)?;
            let bytes = crate::codec::compress(engine, content)
                .map_err(|e| ContainerError::corrupt_chunk(index, e))?;
            packed.push((bytes, content.len()));
        }
        debug!(from = %self.engine(), to = %engine, chunks = packed.len(), "recompressing");
        for (index, (bytes, len)) in packed.into_iter().enumerate() {
            self.checksums[index]     = Some(crc32fast::hash(&bytes));
            self.chunks[index]        = bytes;
            self.content_sizes[index] = Some(len);
        }
        self.header.compression = engine;
        Ok(())
    }

    /// Recompute the header's chunk layout and date from the chunks.
    pub fn sync_header(&mut self) {
        let sizes = self.chunks.iter().map(Vec::len).collect();
        let content_sizes = self.content_sizes.iter().copied().collect::<Option<Vec<_>>>();
        let checksums = self.checksums.iter().copied().collect::<Option<Vec<_>>>();
        self.header.sync_chunks(sizes, content_sizes, checksums);
        self.header.stamp();
    }

    /// Decompress and decode every stored chunk, and require it to survive a
    /// re-encode unchanged and to match the document it was built from, if
    /// that is still cached.
    pub fn verify(&self) -> Result<()> {
        for index in 0..self.chunks.len() {
            chunk::verify_round_trip(index, self.content(index)?, self.objects[index].get())?;
        }
        Ok(())
    }

    // ── Simulation / node views ──────────────────────────────────────────────

    fn wrapped(&self) -> bool {
        self.header.version <= 2
    }

    /// The simulation document, without its `nodes` list.
    pub fn simulation(&self) -> Result<Document> {
        let root = self.object(0)?;
        let sim = if self.wrapped() {
            root.field("simulation")
                .map_err(|source| ContainerError::Document { index: 0, source })?
        } else {
            root
        };
        Ok(match sim {
            Document::Object(map) => Document::Object(
                map.iter()
                    .filter(|(k, _)| k.as_str() != "nodes")
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect::<DocumentMap>(),
            ),
            other => other.clone(),
        })
    }

    /// Number of node documents.  Version 1 files keep their nodes inside
    /// chunk 0, which is decoded to count them.
    pub fn node_count(&self) -> Result<usize> {
        if self.header.version == 1 {
            let nodes = self.object(0)?
                .at("simulation/nodes")
                .and_then(DocumentExt::as_seq)
                .map_err(|source| ContainerError::Document { index: 0, source })?;
            return Ok(nodes.len());
        }
        Ok(self.chunks.len().saturating_sub(1))
    }

    /// Chunk holding node `k`.
    pub fn node_chunk_index(&self, k: usize) -> usize {
        if self.header.version == 1 { 0 } else { k + 1 }
    }

    /// Node document `k` (0-based, in file order).
    pub fn node(&self, k: usize) -> Result<&Document> {
        let index = self.node_chunk_index(k);
        let found = match self.header.version {
            1 => self.object(0)?.at(&format!("simulation/nodes/{k}/node")),
            2 => self.object(index)?.field("node"),
            _ => return self.object(index),
        };
        found.map_err(|source| ContainerError::Document { index, source })
    }

    pub fn nodes(&self) -> Result<impl Iterator<Item = Result<&Document>> + '_> {
        let count = self.node_count()?;
        Ok((0..count).map(move |k| self.node(k)))
    }

    /// Position `k` of the node whose engine ID is `id`.
    ///
    /// Nodes in chunks that fail to decode are skipped.  If the ID is not
    /// found, [`ContainerError::NodeNotFound`] lists those chunks, since the
    /// node may be in one of them.
    pub fn find_node_position(&self, id: i64) -> Result<usize> {
        let mut unsearched = Vec::new();
        for (k, node) in self.nodes()?.enumerate() {
            match node {
                Ok(node) if node_id(node) == Some(id) => return Ok(k),
                Ok(_) => {}
                Err(e) => {
                    debug!(id, node = k, error = %e, "node skipped during lookup");
                    let index = e.chunk_index().unwrap_or_else(|| self.node_chunk_index(k));
                    if !unsearched.contains(&index) {
                        unsearched.push(index);
                    }
                }
            }
        }
        Err(ContainerError::NodeNotFound { id, unsearched })
    }

    pub fn find_node_document(&self, id: i64) -> Result<&Document> {
        let k = self.find_node_position(id)?;
        self.node(k)
    }
}

fn check_engine_for_version(version: u32, engine: Engine) -> Result<()> {
    // The version 1 header only records a compressed flag, read back as SNAPPY.
    if version == 1 && engine == Engine::Lz4 {
        return Err(ContainerError::UnsupportedEngine(format!("{engine} in a version 1 file")));
    }
    Ok(())
}

// ── ContainerBuilder ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Empty,
    Simulation,
    Nodes(usize),
}

/// Stages a simulation document and its nodes, then lays them out in the
/// shape the target header version expects.
///
/// ```
/// use idtk::archive::WriteOptions;
/// use idtk::container::ContainerBuilder;
/// use serde_json::json;
///
/// let mut builder = ContainerBuilder::new(&WriteOptions::default());
/// builder.simulation(json!({"Run_Number": 42}))?;
/// builder.node(json!({"externalId": 1}))?;
/// let container = builder.build()?;
/// assert_eq!(container.chunk_count(), 2);
/// # Ok::<(), idtk::ContainerError>(())
/// ```
#[derive(Debug)]
pub struct ContainerBuilder {
    header:     Header,
    stage:      Stage,
    simulation: Option<Document>,
    nodes:      Vec<Document>,
}

impl ContainerBuilder {
    pub fn new(options: &WriteOptions) -> Self {
        let mut header = Header::new(options.engine);
        header.version = options.version;
        header.author  = options.author.clone();
        header.tool    = options.tool.clone();
        Self { header, stage: Stage::Empty, simulation: None, nodes: Vec::new() }
    }

    /// Stage the simulation document.  Must come first, exactly once.
    pub fn simulation(&mut self, doc: Document) -> Result<&mut Self> {
        if self.stage != Stage::Empty {
            return Err(ContainerError::staging("simulation document already staged"));
        }
        self.simulation = Some(doc);
        self.stage = Stage::Simulation;
        Ok(self)
    }

    /// Stage the next node document.
    pub fn node(&mut self, doc: Document) -> Result<&mut Self> {
        let staged = match self.stage {
            Stage::Empty      => return Err(ContainerError::staging("node staged before the simulation document")),
            Stage::Simulation => 0,
            Stage::Nodes(n)   => n,
        };
        self.nodes.push(doc);
        self.stage = Stage::Nodes(staged + 1);
        Ok(self)
    }

    /// Compress the staged documents and compute the header.
    pub fn build(self) -> Result<Container> {
        let version = self.header.version;
        if version < 1 || version > MAX_VERSION {
            return Err(ContainerError::UnsupportedHeaderVersion(version as i64));
        }
        check_engine_for_version(version, self.header.compression)?;
        let mut sim = self
            .simulation
            .ok_or_else(|| ContainerError::staging("no simulation document staged"))?;

        let mut container = Container::empty(self.header);
        match version {
            1 => {
                let nodes = self.nodes
                    .into_iter()
                    .enumerate()
                    .map(|(k, node)| {
                        let id = node_id(&node).unwrap_or(k as i64 + 1);
                        serde_json::json!({ "suid": { "id": id }, "node": node })
                    })
                    .collect();
                set_nodes(&mut sim, Document::Array(nodes))?;
                container.push_object(serde_json::json!({ "simulation": sim }))?;
            }
            2 => {
                set_nodes(&mut sim, Document::Array(Vec::new()))?;
                container.push_object(serde_json::json!({ "simulation": sim }))?;
                for (k, node) in self.nodes.into_iter().enumerate() {
                    let id = node_id(&node).unwrap_or(k as i64 + 1);
                    container.push_object(serde_json::json!({ "suid": { "id": id }, "node": node }))?;
                }
            }
            _ => {
                container.push_object(sim)?;
                for node in self.nodes {
                    container.push_object(node)?;
                }
            }
        }
        container.sync_header();
        debug!(
            version,
            engine = %container.engine(),
            chunks = container.chunk_count(),
            "container built"
        );
        Ok(container)
    }
}

fn set_nodes(sim: &mut Document, nodes: Document) -> Result<()> {
    match sim.as_object_mut() {
        Some(map) => {
            map.insert("nodes".to_owned(), nodes);
            Ok(())
        }
        None => Err(ContainerError::staging("legacy layouts need a map as the simulation document")),
    }
}
