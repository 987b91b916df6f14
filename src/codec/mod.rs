//! Compression engines for chunk payloads.
//!
//! # Identity rules
//! A file names exactly one engine in its header and every chunk in the file
//! is compressed with it.  Engine names are written to disk as upper-case
//! ASCII (`NONE`, `LZ4`, `SNAPPY`) and parsed case-insensitively.  A reader
//! that meets any other name MUST fail with [`CodecError::UnsupportedEngine`]
//! rather than guess.
//!
//! # Framing
//! - `NONE`: payload stored verbatim.
//! - `LZ4`: one raw LZ4 block preceded by the uncompressed length as a
//!   little-endian `u32`.
//! - `SNAPPY`: raw (unframed) Snappy; the uncompressed length lives in the
//!   Snappy preamble.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

// ── Engine enum ──────────────────────────────────────────────────────────────

/// Compression engine identifier carried in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Engine {
    None,
    #[default]
    Lz4,
    Snappy,
}

impl Engine {
    /// All engines understood by this build, in on-disk name order.
    pub const ALL: [Engine; 3] = [Engine::None, Engine::Lz4, Engine::Snappy];

    /// The on-disk name.
    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            Engine::None   => "NONE",
            Engine::Lz4    => "LZ4",
            Engine::Snappy => "SNAPPY",
        }
    }

    /// `false` only for [`Engine::None`].  Mirrors the legacy `compressed` flag.
    #[inline]
    pub fn is_compressed(self) -> bool {
        self != Engine::None
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Engine {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NONE"   => Ok(Engine::None),
            "LZ4"    => Ok(Engine::Lz4),
            "SNAPPY" => Ok(Engine::Snappy),
            _        => Err(CodecError::UnsupportedEngine(s.to_owned())),
        }
    }
}

impl Serialize for Engine {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Engine {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Compression error: {0}")]
    Compression(String),
    #[error("Decompression error: {0}")]
    Decompression(String),
    /// Decompressed output does not have the length the header promised.
    #[error("Decompressed length {actual} does not match expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("Unsupported compression engine '{0}'")]
    UnsupportedEngine(String),
}

// ── Codec trait ──────────────────────────────────────────────────────────────

pub trait Codec: Send + Sync {
    fn engine(&self) -> Engine;
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
}

// ── Built-in codec implementations ──────────────────────────────────────────

// Upper bounds on output/input for each format.  A length prefix claiming
// more than this is corrupt, and is rejected before anything is allocated.
const LZ4_MAX_RATIO:    usize = 255;
const SNAPPY_MAX_RATIO: usize = 32;

fn check_declared_size(declared: usize, compressed: usize, ratio: usize) -> Result<(), CodecError> {
    let bound = compressed.saturating_mul(ratio).saturating_add(64);
    if declared > bound {
        return Err(CodecError::Decompression(format!(
            "declared length {declared} is implausible for {compressed} compressed bytes"
        )));
    }
    Ok(())
}

pub struct NoneCodec;
impl Codec for NoneCodec {
    fn engine(&self) -> Engine { Engine::None }
    fn compress(&self, data: &[u8])   -> Result<Vec<u8>, CodecError> { Ok(data.to_vec()) }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> { Ok(data.to_vec()) }
}

pub struct Lz4Codec;
impl Codec for Lz4Codec {
    fn engine(&self) -> Engine { Engine::Lz4 }
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(lz4_flex::compress_prepend_size(data))
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        if data.len() < 4 {
            return Err(CodecError::Decompression("LZ4 chunk shorter than its size prefix".into()));
        }
        let declared = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        check_declared_size(declared, data.len() - 4, LZ4_MAX_RATIO)?;
        let out = lz4_flex::decompress(&data[4..], declared)
            .map_err(|e| CodecError::Decompression(e.to_string()))?;
        if out.len() != declared {
            return Err(CodecError::LengthMismatch { expected: declared, actual: out.len() });
        }
        Ok(out)
    }
}

pub struct SnappyCodec;
impl Codec for SnappyCodec {
    fn engine(&self) -> Engine { Engine::Snappy }
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        snap::raw::Encoder::new()
            .compress_vec(data)
            .map_err(|e| CodecError::Compression(e.to_string()))
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let declared = snap::raw::decompress_len(data)
            .map_err(|e| CodecError::Decompression(e.to_string()))?;
        check_declared_size(declared, data.len(), SNAPPY_MAX_RATIO)?;
        snap::raw::Decoder::new()
            .decompress_vec(data)
            .map_err(|e| CodecError::Decompression(e.to_string()))
    }
}

// ── Factory ──────────────────────────────────────────────────────────────────

/// Resolve an engine to its built-in codec.
pub fn get_codec(engine: Engine) -> Box<dyn Codec> {
    match engine {
        Engine::None   => Box::new(NoneCodec),
        Engine::Lz4    => Box::new(Lz4Codec),
        Engine::Snappy => Box::new(SnappyCodec),
    }
}

/// Compress `data` with `engine`.
pub fn compress(engine: Engine, data: &[u8]) -> Result<Vec<u8>, CodecError> {
    get_codec(engine).compress(data)
}

/// Decompress `data` with `engine`.
///
/// When `expected_size` is known the output length must match it exactly;
/// a short or long result is reported as [`CodecError::LengthMismatch`],
/// never truncated or padded.
pub fn decompress(
    engine:        Engine,
    data:          &[u8],
    expected_size: Option<usize>,
) -> Result<Vec<u8>, CodecError> {
    let out = get_codec(engine).decompress(data)?;
    match expected_size {
        Some(expected) if expected != out.len() => Err(CodecError::LengthMismatch {
            expected,
            actual: out.len(),
        }),
        _ => Ok(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = br#"{"individualHumans":[{"m_age":9588.48},{"m_age":9588.48},{"m_age":9588.48}]}"#;

    #[test]
    fn test_every_engine_round_trips() {
        for engine in Engine::ALL {
            let packed = compress(engine, SAMPLE).unwrap();
            let unpacked = decompress(engine, &packed, Some(SAMPLE.len())).unwrap();
            assert_eq!(unpacked, SAMPLE, "engine {engine}");
        }
    }

    #[test]
    fn test_none_is_identity() {
        assert_eq!(compress(Engine::None, SAMPLE).unwrap(), SAMPLE);
    }

    #[test]
    fn test_engine_names_parse_case_insensitively() {
        assert_eq!("lz4".parse::<Engine>().unwrap(), Engine::Lz4);
        assert_eq!("Snappy".parse::<Engine>().unwrap(), Engine::Snappy);
        assert_eq!("NONE".parse::<Engine>().unwrap(), Engine::None);
        assert!(matches!(
            "zstd".parse::<Engine>(),
            Err(CodecError::UnsupportedEngine(name)) if name == "zstd"
        ));
    }

    #[test]
    fn test_length_mismatch_is_an_error() {
        let packed = compress(Engine::Snappy, SAMPLE).unwrap();
        let err = decompress(Engine::Snappy, &packed, Some(SAMPLE.len() + 1)).unwrap_err();
        assert!(matches!(err, CodecError::LengthMismatch { actual, .. } if actual == SAMPLE.len()));
    }

    #[test]
    fn test_garbage_fails_to_decompress() {
        let garbage = [0xffu8; 16];
        assert!(decompress(Engine::Lz4, &garbage, None).is_err());
        assert!(decompress(Engine::Snappy, &garbage, None).is_err());
    }

    #[test]
    fn test_engine_serializes_as_upper_case_name() {
        let text = serde_json::to_string(&Engine::Snappy).unwrap();
        assert_eq!(text, "\"SNAPPY\"");
        let back: Engine = serde_json::from_str("\"lz4\"").unwrap();
        assert_eq!(back, Engine::Lz4);
    }
}
