//! Per-chunk triage of a loaded container.
//!
//! [`triage`] tries every chunk independently and records what it found.  It
//! never fails as a whole: one bad node must not hide the state of the
//! others, and the report is what the CLI `info` command prints.
//!
//! ## Chunk health
//!
//! - `Healthy`: decompressed and decoded
//! - `Truncated`: the file ended before the declared chunk size
//! - `CorruptChunk`: decompression or length validation failed
//! - `MalformedDocument`: decompressed, but not a valid document

use crate::container::Container;
use crate::error::ContainerError;

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkHealth {
    Healthy,
    Truncated { declared: usize, available: usize },
    CorruptChunk(String),
    MalformedDocument(String),
}

impl ChunkHealth {
    pub fn is_usable(&self) -> bool {
        matches!(self, ChunkHealth::Healthy)
    }

    /// Short label for tables.
    pub fn label(&self) -> &'static str {
        match self {
            ChunkHealth::Healthy              => "ok",
            ChunkHealth::Truncated { .. }     => "truncated",
            ChunkHealth::CorruptChunk(_)      => "corrupt",
            ChunkHealth::MalformedDocument(_) => "malformed",
        }
    }
}

/// Diagnostic record for one chunk.
#[derive(Debug, Clone)]
pub struct ChunkReport {
    pub index:    usize,
    /// Absolute byte offset of the chunk in the file.
    pub offset:   u64,
    /// Stored (compressed) size.
    pub size:     usize,
    /// CRC-32 of the stored bytes.
    pub checksum: u32,
    pub health:   ChunkHealth,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriageQuality {
    /// Every chunk decodes.
    Full,
    /// The simulation document decodes; some nodes do not.
    Partial,
    /// The simulation document itself is unusable.
    Catastrophic,
}

#[derive(Debug, Clone)]
pub struct TriageReport {
    pub chunks:  Vec<ChunkReport>,
    pub quality: TriageQuality,
}

impl TriageReport {
    pub fn healthy(&self) -> usize {
        self.chunks.iter().filter(|c| c.health.is_usable()).count()
    }

    /// Indices of chunks that failed.
    pub fn damaged(&self) -> Vec<usize> {
        self.chunks
            .iter()
            .filter(|c| !c.health.is_usable())
            .map(|c| c.index)
            .collect()
    }

    pub fn health_pct(&self) -> f64 {
        if self.chunks.is_empty() { return 100.0; }
        self.healthy() as f64 / self.chunks.len() as f64 * 100.0
    }

    pub fn summary(&self) -> String {
        let damaged = self.damaged();
        let mut line = format!(
            "{:?}: {}/{} chunks healthy ({:.1}%)",
            self.quality,
            self.healthy(),
            self.chunks.len(),
            self.health_pct(),
        );
        if !damaged.is_empty() {
            let list: Vec<String> = damaged.iter().map(usize::to_string).collect();
            line.push_str(&format!(", damaged: {}", list.join(", ")));
        }
        line
    }
}

// ── Triage ────────────────────────────────────────────────────────────────────

pub fn triage(container: &Container) -> TriageReport {
    let header = container.header();
    let chunks: Vec<ChunkReport> = container
        .chunks()
        .iter()
        .enumerate()
        .map(|(index, bytes)| {
            let declared = header.chunk_sizes().get(index).copied().unwrap_or(bytes.len());
            let health = if container.is_truncated(index) {
                ChunkHealth::Truncated { declared, available: bytes.len() }
            } else {
                match container.object(index) {
                    Ok(_) => ChunkHealth::Healthy,
                    Err(e @ ContainerError::MalformedDocument { .. }) => ChunkHealth::MalformedDocument(e.to_string()),
                    Err(e) => ChunkHealth::CorruptChunk(e.to_string()),
                }
            };
            ChunkReport {
                index,
                offset: header.chunk_offset(index),
                size: bytes.len(),
                checksum: crc32fast::hash(bytes),
                health,
            }
        })
        .collect();

    let quality = match chunks.first() {
        Some(first) if !first.health.is_usable() => TriageQuality::Catastrophic,
        _ if chunks.iter().all(|c| c.health.is_usable()) => TriageQuality::Full,
        _ => TriageQuality::Partial,
    };
    TriageReport { chunks, quality }
}
