//! Chunk codec: one document ⇄ one compressed chunk.
//!
//! Documents are encoded as compact JSON (no whitespace, `,`/`:`
//! separators), the same text the engine writes.  Every failure here is
//! attributed to the chunk index it happened in.

use crate::codec::{self, Engine};
use crate::document::Document;
use crate::error::{ContainerError, Result};

/// Canonical UTF-8 encoding of a document.
pub fn encode_document(doc: &Document) -> Vec<u8> {
    doc.to_string().into_bytes()
}

/// Decode the contents of chunk `index`.
pub fn decode_document(index: usize, bytes: &[u8]) -> Result<Document> {
    serde_json::from_slice(bytes)
        .map_err(|source| ContainerError::MalformedDocument { index, source })
}

/// Encode and compress a document.  Returns the chunk and its uncompressed
/// length.
pub fn encode_chunk(engine: Engine, index: usize, doc: &Document) -> Result<(Vec<u8>, usize)> {
    let content = encode_document(doc);
    let chunk = codec::compress(engine, &content)
        .map_err(|e| ContainerError::corrupt_chunk(index, e))?;
    Ok((chunk, content.len()))
}

/// Decompress chunk `index`, validating its length when known.
pub fn decompress_chunk(
    engine:        Engine,
    index:         usize,
    chunk:         &[u8],
    expected_size: Option<usize>,
) -> Result<Vec<u8>> {
    codec::decompress(engine, chunk, expected_size)
        .map_err(|e| ContainerError::corrupt_chunk(index, e))
}

/// Decode `content`, re-encode it and decode again, requiring the two
/// documents to be equal.  When the document the chunk was built from is
/// still at hand it must match too.  Whitespace and key order in `content`
/// do not matter.
pub fn verify_round_trip(index: usize, content: &[u8], intended: Option<&Document>) -> Result<()> {
    let decoded = decode_document(index, content)?;
    let again = decode_document(index, &encode_document(&decoded))?;
    if again != decoded || intended.is_some_and(|doc| *doc != decoded) {
        return Err(ContainerError::VerificationFailed { index });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encoding_is_compact() {
        let doc = json!({"suid": {"id": 1}, "node": {"externalId": 1, "x_birth": 2.718281828}});
        assert_eq!(
            encode_document(&doc),
            br#"{"suid":{"id":1},"node":{"externalId":1,"x_birth":2.718281828}}"#
        );
    }

    #[test]
    fn test_chunk_round_trip_preserves_numbers() {
        let doc = json!({"m_age": 9588.48, "m_mc_weight": 11, "Run_Number": 42, "big": 340461476});
        for engine in Engine::ALL {
            let (chunk, len) = encode_chunk(engine, 3, &doc).unwrap();
            let content = decompress_chunk(engine, 3, &chunk, Some(len)).unwrap();
            let back = decode_document(3, &content).unwrap();
            assert_eq!(back, doc);
            assert_eq!(back["m_age"].as_f64(), Some(9588.48));
            assert!(back["big"].is_i64());
        }
    }

    #[test]
    fn test_malformed_document_carries_index() {
        let err = decode_document(4, b"{\"nodes\": [").unwrap_err();
        assert!(matches!(err, ContainerError::MalformedDocument { index: 4, .. }));
    }

    #[test]
    fn test_corrupt_chunk_carries_index() {
        let err = decompress_chunk(Engine::Snappy, 2, b"\xff\xff\xff\xff\xff\xff", None).unwrap_err();
        assert!(matches!(err, ContainerError::CorruptChunk { index: 2, .. }));
    }

    #[test]
    fn test_verify_ignores_layout() {
        assert!(verify_round_trip(0, br#"{"a":1,"b":[true,null]}"#, None).is_ok());
        assert!(verify_round_trip(1, b"{ \"b\" : [ true , null ],\n  \"a\" : 1 }", Some(&json!({"a": 1, "b": [true, null]}))).is_ok());
    }

    #[test]
    fn test_verify_rejects_different_document() {
        let err = verify_round_trip(2, br#"{"a":1}"#, Some(&json!({"a": 2}))).unwrap_err();
        assert!(matches!(err, ContainerError::VerificationFailed { index: 2 }));
        let err = verify_round_trip(3, br#"{"a":1"#, None).unwrap_err();
        assert!(matches!(err, ContainerError::MalformedDocument { index: 3, .. }));
    }
}
