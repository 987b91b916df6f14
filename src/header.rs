//! Versioned file header.
//!
//! # On-disk layout
//! ```text
//! offset  size  field
//!      0     4  magic "IDTK"
//!      4    12  header length N, ASCII decimal, right-aligned, space padded
//!     16     N  header JSON (UTF-8)
//!   16+N     …  chunk 0, chunk 1, … (sizes from `chunksizes`)
//! ```
//!
//! # Version history
//! | version | JSON shape            | engine key            |
//! |---------|-----------------------|-----------------------|
//! | 1       | `{"metadata": {...}}` | `compressed` (SNAPPY) |
//! | 2, 3    | `{"metadata": {...}}` | `engine`              |
//! | 4, 5    | flat object           | `compression`         |
//!
//! A missing `version` means 1.  Version 1 files hold exactly one chunk whose
//! size is `bytecount`.  Version 5 adds optional engine build provenance
//! ([`BuildInfo`]).  Keys this build does not know are carried through
//! unchanged.
//!
//! This writer also records `contentsizes` (uncompressed length of each
//! chunk) and `chunkcrcs` (CRC-32 of each stored chunk).  Both are optional
//! on read; when present they let a damaged chunk be detected before its
//! payload is trusted.

use std::io::{self, Read, Write};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::codec::{CodecError, Engine};

pub const MAGIC: &[u8; 4] = b"IDTK";
/// Width of the ASCII header-length field.
pub const SIZE_FIELD_LEN: usize = 12;
/// Bytes preceding the header JSON.
pub const PREFIX_LEN: usize = MAGIC.len() + SIZE_FIELD_LEN;
/// Version written by this build.
pub const CURRENT_VERSION: u32 = 5;
pub const MAX_VERSION: u32 = 5;
/// `strftime` layout of the `date` field.
pub const DATE_FORMAT: &str = "%a %b %d %H:%M:%S %Y";

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("File has incorrect magic number '{0}'")]
    InvalidMagic(String),
    #[error("Invalid header size '{0}'")]
    InvalidSize(String),
    #[error("Header truncated: expected {expected} bytes, found {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("Couldn't decode JSON header: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unknown version: {0}")]
    UnsupportedVersion(i64),
    #[error("Missing required header field '{0}'")]
    MissingField(&'static str),
    #[error("Invalid chunk size {size} for chunk {index}")]
    InvalidChunkSize { index: usize, size: i64 },
    #[error("Header declares {declared} chunks but lists {actual} chunk sizes")]
    ChunkCountMismatch { declared: i64, actual: usize },
    #[error("Unsupported compression engine '{0}'")]
    UnsupportedEngine(String),
    #[error("IO error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for HeaderError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => HeaderError::Truncated { expected: PREFIX_LEN, actual: 0 },
            _ => HeaderError::Io(err),
        }
    }
}

impl From<CodecError> for HeaderError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::UnsupportedEngine(name) => HeaderError::UnsupportedEngine(name),
            other => HeaderError::UnsupportedEngine(other.to_string()),
        }
    }
}

// ── Build provenance (v5) ─────────────────────────────────────────────────────

/// Engine and population-format versions recorded by newer writers.
/// Every field is optional; older files simply leave them all `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emod_major_version:    Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emod_minor_version:    Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emod_revision_number:  Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emod_build_date:       Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emod_builder_name:     Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emod_sccs_branch:      Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emod_sccs_date:        Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ser_pop_major_version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ser_pop_minor_version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ser_pop_patch_version: Option<u64>,
}

impl BuildInfo {
    pub fn is_empty(&self) -> bool {
        *self == BuildInfo::default()
    }
}

// Every shape ever written, accepted leniently and normalised afterwards.
#[derive(Deserialize)]
struct RawHeader {
    #[serde(default)]
    version:      Option<i64>,
    #[serde(default)]
    author:       Option<String>,
    #[serde(default)]
    tool:         Option<String>,
    #[serde(default)]
    date:         Option<String>,
    #[serde(default)]
    compressed:   Option<bool>,
    #[serde(default)]
    engine:       Option<String>,
    #[serde(default)]
    compression:  Option<String>,
    #[serde(default)]
    chunkcount:   Option<i64>,
    #[serde(default)]
    chunksizes:   Option<Vec<i64>>,
    #[serde(default)]
    bytecount:    Option<i64>,
    #[serde(default)]
    contentsizes: Option<Vec<usize>>,
    #[serde(default)]
    chunkcrcs:    Option<Vec<u32>>,
    #[serde(flatten)]
    build:        BuildInfo,
    #[serde(flatten)]
    extra:        Map<String, Value>,
}

// ── Header ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub version:     u32,
    pub author:      String,
    pub tool:        String,
    pub date:        String,
    /// One engine governs every chunk in the file.
    pub compression: Engine,
    pub build:       BuildInfo,
    /// Unrecognised keys, preserved for re-writing.
    pub extra:       Map<String, Value>,

    // Chunk layout.  Only ever replaced as a unit by `sync_chunks`.
    chunksizes:   Vec<usize>,
    bytecount:    u64,
    contentsizes: Option<Vec<usize>>,
    chunkcrcs:    Option<Vec<u32>>,

    // Length of the header as found on disk, prefix included.
    encoded_len:  Option<usize>,
}

impl Header {
    pub fn new(compression: Engine) -> Self {
        Self {
            version:      CURRENT_VERSION,
            author:       "unknown".to_owned(),
            tool:         env!("CARGO_PKG_NAME").to_owned(),
            date:         now(),
            compression,
            build:        BuildInfo::default(),
            extra:        Map::new(),
            chunksizes:   Vec::new(),
            bytecount:    0,
            contentsizes: None,
            chunkcrcs:    None,
            encoded_len:  None,
        }
    }

    // ── Layout accessors ─────────────────────────────────────────────────────

    /// The legacy name for [`Header::compression`].
    pub fn engine(&self) -> Engine { self.compression }
    pub fn compressed(&self) -> bool { self.compression.is_compressed() }
    pub fn chunk_count(&self) -> usize { self.chunksizes.len() }
    pub fn chunk_sizes(&self) -> &[usize] { &self.chunksizes }
    /// `bytecount` as recorded; equal to the sum of chunk sizes in any
    /// well-formed file.
    pub fn byte_count(&self) -> u64 { self.bytecount }
    /// Uncompressed chunk lengths, when the writer recorded them.
    pub fn content_sizes(&self) -> Option<&[usize]> { self.contentsizes.as_deref() }
    /// CRC-32 of each stored chunk, when the writer recorded them.
    pub fn chunk_checksums(&self) -> Option<&[u32]> { self.chunkcrcs.as_deref() }

    /// Replace the chunk layout.  `chunkcount`, `chunksizes` and `bytecount`
    /// are always derived from the same list here and nowhere else.
    pub(crate) fn sync_chunks(
        &mut self,
        chunk_sizes:   Vec<usize>,
        content_sizes: Option<Vec<usize>>,
        checksums:     Option<Vec<u32>>,
    ) {
        self.bytecount    = chunk_sizes.iter().map(|&s| s as u64).sum();
        self.contentsizes = content_sizes.filter(|c| c.len() == chunk_sizes.len());
        self.chunkcrcs    = checksums.filter(|c| c.len() == chunk_sizes.len());
        self.chunksizes   = chunk_sizes;
        self.encoded_len  = None;
    }

    /// Refresh `date` to the current local time.
    pub fn stamp(&mut self) {
        self.date = now();
        self.encoded_len = None;
    }

    /// Byte length of the header including magic and size field.  For a
    /// header read from disk this is the length found there.
    pub fn header_len(&self) -> usize {
        self.encoded_len
            .unwrap_or_else(|| PREFIX_LEN + self.to_json().len())
    }

    /// Absolute file offset of chunk `index`.
    pub fn chunk_offset(&self, index: usize) -> u64 {
        let before: u64 = self.chunksizes[..index.min(self.chunksizes.len())]
            .iter()
            .map(|&s| s as u64)
            .sum();
        self.header_len() as u64 + before
    }

    /// Expected total file length: header plus every chunk.
    pub fn total_len(&self) -> u64 {
        self.chunk_offset(self.chunksizes.len())
    }

    // ── Parsing ──────────────────────────────────────────────────────────────

    /// Parse header JSON (the bytes after the size field).
    pub fn parse(json_bytes: &[u8]) -> Result<Self, HeaderError> {
        let mut value: Value = serde_json::from_slice(json_bytes)?;
        if value.get("metadata").is_some_and(Value::is_object) {
            value = value["metadata"].take();
        }
        let raw: RawHeader = serde_json::from_value(value)?;
        Self::from_raw(raw)
    }

    /// Read magic, size field and header JSON from the start of a file.
    pub fn read<R: Read>(mut reader: R) -> Result<Self, HeaderError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(HeaderError::InvalidMagic(String::from_utf8_lossy(&magic).into_owned()));
        }

        let mut size_field = [0u8; SIZE_FIELD_LEN];
        reader.read_exact(&mut size_field)?;
        let size = parse_size_field(&size_field)?;

        let mut json_bytes = Vec::new();
        reader.by_ref().take(size as u64).read_to_end(&mut json_bytes)?;
        if json_bytes.len() != size {
            return Err(HeaderError::Truncated { expected: size, actual: json_bytes.len() });
        }

        let mut header = Self::parse(&json_bytes)?;
        header.encoded_len = Some(PREFIX_LEN + size);
        Ok(header)
    }

    fn from_raw(raw: RawHeader) -> Result<Self, HeaderError> {
        let version = raw.version.unwrap_or(1);
        if version < 1 || version > MAX_VERSION as i64 {
            return Err(HeaderError::UnsupportedVersion(version));
        }

        let compression = match version {
            1 => match raw.compressed {
                Some(true)  => Engine::Snappy,
                Some(false) => Engine::None,
                None        => return Err(HeaderError::MissingField("compressed")),
            },
            2 | 3 => match (raw.engine, raw.compressed) {
                (Some(name), _)     => name.parse()?,
                (None, Some(false)) => Engine::None,
                (None, _)           => return Err(HeaderError::MissingField("engine")),
            },
            _ => match raw.compression.or(raw.engine) {
                Some(name) => name.parse()?,
                None       => return Err(HeaderError::MissingField("compression")),
            },
        };

        let declared_sizes = if version == 1 {
            vec![raw.bytecount.ok_or(HeaderError::MissingField("bytecount"))?]
        } else {
            raw.chunksizes.ok_or(HeaderError::MissingField("chunksizes"))?
        };

        let mut chunksizes = Vec::with_capacity(declared_sizes.len());
        for (index, &size) in declared_sizes.iter().enumerate() {
            if size <= 0 {
                return Err(HeaderError::InvalidChunkSize { index, size });
            }
            chunksizes.push(size as usize);
        }

        if version > 1 {
            let declared = raw.chunkcount.unwrap_or(chunksizes.len() as i64);
            if declared != chunksizes.len() as i64 || chunksizes.is_empty() {
                return Err(HeaderError::ChunkCountMismatch { declared, actual: chunksizes.len() });
            }
        }

        let sum: u64 = chunksizes.iter().map(|&s| s as u64).sum();
        let bytecount = match raw.bytecount {
            Some(b) if b >= 0 && b as u64 == sum => sum,
            Some(b) => {
                warn!(bytecount = b, sum, "header bytecount disagrees with chunk sizes");
                sum
            }
            None => sum,
        };

        let contentsizes = match raw.contentsizes {
            Some(c) if c.len() == chunksizes.len() => Some(c),
            Some(c) => {
                warn!(listed = c.len(), chunks = chunksizes.len(), "ignoring mismatched contentsizes");
                None
            }
            None => None,
        };

        let chunkcrcs = match raw.chunkcrcs {
            Some(c) if c.len() == chunksizes.len() => Some(c),
            Some(c) => {
                warn!(listed = c.len(), chunks = chunksizes.len(), "ignoring mismatched chunkcrcs");
                None
            }
            None => None,
        };

        Ok(Self {
            version:     version as u32,
            author:      raw.author.unwrap_or_default(),
            tool:        raw.tool.unwrap_or_default(),
            date:        raw.date.unwrap_or_default(),
            compression,
            build:       raw.build,
            extra:       raw.extra,
            chunksizes,
            bytecount,
            contentsizes,
            chunkcrcs,
            encoded_len: None,
        })
    }

    // ── Serialization ────────────────────────────────────────────────────────

    /// Header fields as a JSON object, shaped for `self.version`.
    pub fn to_value(&self) -> Value {
        let mut fields = Map::new();
        fields.insert("author".into(), json!(self.author));
        fields.insert("bytecount".into(), json!(self.bytecount));
        fields.insert("chunkcount".into(), json!(self.chunksizes.len()));
        fields.insert("chunksizes".into(), json!(self.chunksizes));
        if self.version <= 3 {
            fields.insert("compressed".into(), json!(self.compressed()));
            fields.insert("engine".into(), json!(self.compression));
        } else {
            fields.insert("compression".into(), json!(self.compression));
        }
        fields.insert("date".into(), json!(self.date));
        fields.insert("tool".into(), json!(self.tool));
        fields.insert("version".into(), json!(self.version));
        if let Some(sizes) = &self.contentsizes {
            fields.insert("contentsizes".into(), json!(sizes));
        }
        if let Some(crcs) = &self.chunkcrcs {
            fields.insert("chunkcrcs".into(), json!(crcs));
        }
        if let Value::Object(build) = json!(self.build) {
            fields.extend(build);
        }
        for (key, value) in &self.extra {
            fields.entry(key.clone()).or_insert_with(|| value.clone());
        }

        if self.version <= 3 {
            json!({ "metadata": fields })
        } else {
            Value::Object(fields)
        }
    }

    /// Compact header JSON.
    pub fn to_json(&self) -> Vec<u8> {
        self.to_value().to_string().into_bytes()
    }

    /// Magic, size field and JSON, ready to precede the chunks.
    pub fn to_bytes(&self) -> Vec<u8> {
        let json_bytes = self.to_json();
        let mut out = Vec::with_capacity(PREFIX_LEN + json_bytes.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(format!("{:>width$}", json_bytes.len(), width = SIZE_FIELD_LEN).as_bytes());
        out.extend_from_slice(&json_bytes);
        out
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<usize> {
        let bytes = self.to_bytes();
        writer.write_all(&bytes)?;
        Ok(bytes.len())
    }
}

fn parse_size_field(field: &[u8; SIZE_FIELD_LEN]) -> Result<usize, HeaderError> {
    let text = String::from_utf8_lossy(field);
    let size: i64 = text
        .trim()
        .parse()
        .map_err(|_| HeaderError::InvalidSize(text.trim().to_owned()))?;
    if size <= 0 {
        return Err(HeaderError::InvalidSize(size.to_string()));
    }
    Ok(size as usize)
}

fn now() -> String {
    chrono::Local::now().format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framed(json_text: &str) -> Vec<u8> {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(format!("{:>12}", json_text.len()).as_bytes());
        bytes.extend_from_slice(json_text.as_bytes());
        bytes
    }

    #[test]
    fn test_version_one_implies_single_snappy_chunk() {
        let h = Header::parse(br#"{"metadata":{"version":1,"date":"Mon Jan 01 00:00:00 2018","compressed":true,"bytecount":1438033}}"#).unwrap();
        assert_eq!(h.version, 1);
        assert_eq!(h.compression, Engine::Snappy);
        assert_eq!(h.chunk_count(), 1);
        assert_eq!(h.chunk_sizes(), &[1438033]);
        assert_eq!(h.author, "");
        assert!(h.build.is_empty());
    }

    #[test]
    fn test_missing_version_is_version_one() {
        let h = Header::parse(br#"{"metadata":{"author":"clorton","tool":"notepad","compressed":false,"bytecount":80}}"#).unwrap();
        assert_eq!(h.version, 1);
        assert_eq!(h.compression, Engine::None);
        assert_eq!(h.byte_count(), 80);
    }

    #[test]
    fn test_version_two_reads_engine_key() {
        let h = Header::parse(br#"{"metadata":{"version":2,"compressed":true,"engine":"lz4","chunkcount":2,"chunksizes":[1584,166847],"bytecount":168431}}"#).unwrap();
        assert_eq!(h.compression, Engine::Lz4);
        assert_eq!(h.chunk_sizes(), &[1584, 166847]);
        assert_eq!(h.byte_count(), 168431);
    }

    #[test]
    fn test_version_four_is_flat_with_compression_key() {
        let h = Header::parse(br#"{"author":"IDM","tool":"DTK","version":4,"compression":"LZ4","chunkcount":5,"chunksizes":[384,164210,152439,156570,151502],"bytecount":625105}"#).unwrap();
        assert_eq!(h.author, "IDM");
        assert_eq!(h.tool, "DTK");
        assert_eq!(h.chunk_count(), 5);
        assert_eq!(h.byte_count(), 625105);
    }

    #[test]
    fn test_version_five_exposes_build_info() {
        let h = Header::parse(br#"{
            "author":"IDM","bytecount":10,"chunkcount":1,"chunksizes":[10],"compression":"SNAPPY",
            "date":"Tue Mar 03 10:00:00 2020","engine":"SNAPPY","tool":"DTK","version":5,
            "emod_major_version":2,"emod_minor_version":20,"emod_revision_number":1234,
            "emod_build_date":"Mar  2 2020","emod_builder_name":"builder","emod_sccs_branch":"master",
            "emod_sccs_date":"2020-03-01","ser_pop_major_version":1,"ser_pop_minor_version":2,
            "ser_pop_patch_version":3
        }"#).unwrap();
        assert_eq!(h.compression, Engine::Snappy);
        assert_eq!(h.engine(), Engine::Snappy);
        assert_eq!(h.date, "Tue Mar 03 10:00:00 2020");
        assert_eq!(h.build.emod_major_version, Some(2));
        assert_eq!(h.build.emod_minor_version, Some(20));
        assert_eq!(h.build.emod_revision_number, Some(1234));
        assert_eq!(h.build.emod_build_date.as_deref(), Some("Mar  2 2020"));
        assert_eq!(h.build.emod_builder_name.as_deref(), Some("builder"));
        assert_eq!(h.build.emod_sccs_branch.as_deref(), Some("master"));
        assert_eq!(h.build.emod_sccs_date.as_deref(), Some("2020-03-01"));
        assert_eq!(h.build.ser_pop_major_version, Some(1));
        assert_eq!(h.build.ser_pop_minor_version, Some(2));
        assert_eq!(h.build.ser_pop_patch_version, Some(3));
        assert!(h.extra.is_empty());
    }

    #[test]
    fn test_bad_versions_are_unsupported() {
        for v in ["0", "-1", "6"] {
            let text = format!(r#"{{"version":{v},"compression":"NONE","chunksizes":[4]}}"#);
            assert!(matches!(
                Header::parse(text.as_bytes()),
                Err(HeaderError::UnsupportedVersion(_))
            ), "version {v}");
        }
    }

    #[test]
    fn test_bad_chunk_sizes_are_rejected() {
        for sizes in ["[0]", "[12,-3]"] {
            let text = format!(r#"{{"version":4,"compression":"NONE","chunksizes":{sizes}}}"#);
            assert!(matches!(
                Header::parse(text.as_bytes()),
                Err(HeaderError::InvalidChunkSize { .. })
            ));
        }
        let text = br#"{"version":4,"compression":"NONE","chunkcount":3,"chunksizes":[1,2]}"#;
        assert!(matches!(Header::parse(text), Err(HeaderError::ChunkCountMismatch { declared: 3, actual: 2 })));
    }

    #[test]
    fn test_unknown_engine_is_reported() {
        let text = br#"{"version":4,"compression":"ZSTD","chunksizes":[1]}"#;
        assert!(matches!(Header::parse(text), Err(HeaderError::UnsupportedEngine(name)) if name == "ZSTD"));
    }

    #[test]
    fn test_prefix_errors() {
        let mut bad_magic = framed(r#"{"version":4}"#);
        bad_magic[..4].copy_from_slice(b"MIDT");
        assert!(matches!(Header::read(&bad_magic[..]), Err(HeaderError::InvalidMagic(m)) if m == "MIDT"));

        for size in ["           0", "          -5", "    garbage "] {
            let mut bytes = MAGIC.to_vec();
            bytes.extend_from_slice(size.as_bytes());
            assert!(matches!(Header::read(&bytes[..]), Err(HeaderError::InvalidSize(_))), "{size:?}");
        }

        let mut short = MAGIC.to_vec();
        short.extend_from_slice(b"         100{}");
        assert!(matches!(Header::read(&short[..]), Err(HeaderError::Truncated { expected: 100, actual: 2 })));

        assert!(matches!(Header::read(&framed("{not json")[..]), Err(HeaderError::Json(_))));
        assert!(matches!(Header::read(&b"ID"[..]), Err(HeaderError::Truncated { .. })));
    }

    #[test]
    fn test_unknown_keys_survive_rewrite() {
        let text = br#"{"version":4,"compression":"NONE","chunksizes":[3],"site":"Namawala"}"#;
        let h = Header::parse(text).unwrap();
        assert_eq!(h.extra.get("site"), Some(&json!("Namawala")));
        let again = Header::parse(&h.to_json()).unwrap();
        assert_eq!(again.extra.get("site"), Some(&json!("Namawala")));
    }

    #[test]
    fn test_legacy_versions_serialize_under_metadata() {
        let mut h = Header::new(Engine::Snappy);
        h.version = 3;
        h.sync_chunks(vec![10, 20], None, None);
        let value = h.to_value();
        assert_eq!(value["metadata"]["engine"], json!("SNAPPY"));
        assert_eq!(value["metadata"]["compressed"], json!(true));
        assert_eq!(value["metadata"]["chunkcount"], json!(2));
        assert_eq!(Header::parse(&h.to_json()).unwrap().chunk_sizes(), &[10, 20]);

        h.version = 5;
        let value = h.to_value();
        assert!(value.get("metadata").is_none());
        assert_eq!(value["compression"], json!("SNAPPY"));
    }

    #[test]
    fn test_offsets_are_prefix_sums() {
        let mut h = Header::new(Engine::Lz4);
        h.sync_chunks(vec![100, 250, 7], Some(vec![400, 900, 7]), Some(vec![1, 2, 3]));
        let bytes = h.to_bytes();
        let parsed = Header::read(&bytes[..]).unwrap();
        let len = bytes.len() as u64;
        assert_eq!(parsed.header_len() as u64, len);
        assert_eq!(parsed.chunk_offset(0), len);
        assert_eq!(parsed.chunk_offset(1), len + 100);
        assert_eq!(parsed.chunk_offset(2), len + 350);
        assert_eq!(parsed.total_len(), len + 357);
        assert_eq!(parsed.byte_count(), 357);
        assert_eq!(parsed.content_sizes(), Some(&[400, 900, 7][..]));
        assert_eq!(parsed.chunk_checksums(), Some(&[1, 2, 3][..]));
    }

    #[test]
    fn test_size_field_is_right_aligned_decimal() {
        let h = Header::new(Engine::None);
        let bytes = h.to_bytes();
        let field = std::str::from_utf8(&bytes[4..16]).unwrap();
        assert_eq!(field.trim_start().parse::<usize>().unwrap(), bytes.len() - PREFIX_LEN);
        assert!(field.starts_with(' '));
    }
}
