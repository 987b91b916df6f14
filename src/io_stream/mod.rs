//! Streaming container reader and writer.
//!
//! # Reader
//! [`DtkReader::new`] consumes the magic, size field and header JSON and
//! stops there, so a header can be inspected without touching any chunk.
//! [`DtkReader::read_chunks`] then pulls each chunk in header order.  A chunk
//! that ends early is kept as far as it goes and flagged; it fails lazily
//! when accessed, and every chunk after it is empty and flagged too.  Bytes
//! past the last declared chunk are ignored with a warning.
//!
//! # Writer
//! [`DtkWriter`] emits the header followed by the raw chunks, in order, with
//! no padding.  The container's header must describe its chunks; callers
//! normally go through [`crate::archive::write`], which syncs it first.

use std::io::{Read, Write};

use tracing::{debug, warn};

use crate::container::Container;
use crate::error::{ContainerError, Result};
use crate::header::Header;

// ── Writer ───────────────────────────────────────────────────────────────────

pub struct DtkWriter<W: Write> {
    writer:        W,
    bytes_written: u64,
}

impl<W: Write> DtkWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, bytes_written: 0 }
    }

    /// Write header and chunks.  Returns the number of bytes written.
    pub fn write_container(&mut self, container: &Container) -> Result<u64> {
        let header = container.header();
        let stale = header.chunk_count() != container.chunk_count()
            || header
                .chunk_sizes()
                .iter()
                .zip(container.chunks())
                .any(|(&size, chunk)| size != chunk.len());
        if stale {
            return Err(ContainerError::staging("header chunk layout does not match the chunks; sync the header first"));
        }

        let start = self.bytes_written;
        self.bytes_written += header.write(&mut self.writer)? as u64;
        for chunk in container.chunks() {
            self.writer.write_all(chunk)?;
            self.bytes_written += chunk.len() as u64;
        }
        self.writer.flush()?;
        debug!(
            bytes = self.bytes_written - start,
            chunks = container.chunk_count(),
            "container written"
        );
        Ok(self.bytes_written - start)
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

// ── Reader ───────────────────────────────────────────────────────────────────

pub struct DtkReader<R: Read> {
    reader:     R,
    pub header: Header,
}

impl<R: Read> DtkReader<R> {
    /// Parse the header.  Fails if no chunk could be located.
    pub fn new(mut reader: R) -> Result<Self> {
        let header = Header::read(&mut reader)?;
        debug!(
            version = header.version,
            engine = %header.compression,
            chunks = header.chunk_count(),
            "header parsed"
        );
        Ok(Self { reader, header })
    }

    /// Read every declared chunk and hand back the container.
    pub fn read_chunks(mut self) -> Result<Container> {
        let count = self.header.chunk_count();
        let mut chunks    = Vec::with_capacity(count);
        let mut truncated = Vec::with_capacity(count);
        let mut exhausted = false;

        for (index, &size) in self.header.chunk_sizes().iter().enumerate() {
            let mut chunk = Vec::new();
            if !exhausted {
                (&mut self.reader).take(size as u64).read_to_end(&mut chunk)?;
            }
            if chunk.len() < size {
                if !exhausted {
                    warn!(index, declared = size, found = chunk.len(), "chunk truncated");
                }
                exhausted = true;
                truncated.push(Some(size));
            } else {
                truncated.push(None);
            }
            chunks.push(chunk);
        }

        if !exhausted {
            let mut probe = [0u8; 1];
            if self.reader.read(&mut probe)? > 0 {
                warn!(expected = self.header.total_len(), "ignoring trailing bytes after the last chunk");
            }
        }

        Ok(Container::from_parts(self.header, chunks, truncated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::WriteOptions;
    use crate::container::ContainerBuilder;
    use crate::error::ContainerError;
    use serde_json::json;

    fn sample() -> Container {
        let mut b = ContainerBuilder::new(&WriteOptions::default());
        b.simulation(json!({"Run_Number": 3})).unwrap();
        b.node(json!({"externalId": 1})).unwrap();
        b.node(json!({"externalId": 2})).unwrap();
        b.build().unwrap()
    }

    fn encoded(c: &Container) -> Vec<u8> {
        let mut w = DtkWriter::new(Vec::new());
        let n = w.write_container(c).unwrap();
        assert_eq!(n, w.bytes_written());
        w.into_inner()
    }

    #[test]
    fn test_stream_round_trip() {
        let c = sample();
        let bytes = encoded(&c);
        assert_eq!(bytes.len() as u64, c.header().total_len());

        let back = DtkReader::new(&bytes[..]).unwrap().read_chunks().unwrap();
        assert_eq!(back.chunks(), c.chunks());
        assert_eq!(back.object(2).unwrap(), &json!({"externalId": 2}));
    }

    #[test]
    fn test_header_only_read_leaves_chunks() {
        let bytes = encoded(&sample());
        let reader = DtkReader::new(&bytes[..]).unwrap();
        assert_eq!(reader.header.chunk_count(), 3);
    }

    #[test]
    fn test_truncated_stream_flags_tail_chunks() {
        let c = sample();
        let bytes = encoded(&c);
        let cut = c.header().chunk_offset(1) as usize + 2;
        let back = DtkReader::new(&bytes[..cut]).unwrap().read_chunks().unwrap();

        assert!(back.object(0).is_ok());
        assert!(back.is_truncated(1));
        assert!(back.is_truncated(2));
        assert!(matches!(back.object(1), Err(ContainerError::CorruptChunk { index: 1, .. })));
        assert!(matches!(back.object(2), Err(ContainerError::CorruptChunk { index: 2, .. })));
    }

    #[test]
    fn test_trailing_bytes_are_ignored() {
        let mut bytes = encoded(&sample());
        bytes.extend_from_slice(b"junk");
        let back = DtkReader::new(&bytes[..]).unwrap().read_chunks().unwrap();
        assert_eq!(back.chunk_count(), 3);
        assert!(back.decode_all().iter().all(Result::is_ok));
    }

    #[test]
    fn test_stale_header_is_refused() {
        let mut c = sample();
        c.set_chunk(1, vec![0u8; 3]).unwrap();
        let mut w = DtkWriter::new(Vec::new());
        assert!(matches!(w.write_container(&c), Err(ContainerError::Staging(_))));
    }
}
