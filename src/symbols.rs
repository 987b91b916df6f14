//! Key symbol tables.
//!
//! Serialized populations repeat the same few hundred map keys millions of
//! times.  A [`KeyTable`] replaces each distinct key with a short symbol,
//! assigned in order of first appearance, and restores them again.  A table
//! is an ordinary value owned by whoever compacts a file; two tables never
//! share state.

use std::collections::HashMap;

use serde_json::Map;
use thiserror::Error;

use crate::document::{kind_of, Document};

const ALPHABET: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SymbolError {
    #[error("Unknown symbol '{0}'")]
    UnknownSymbol(String),
    #[error("Invalid symbol table: {0}")]
    InvalidTable(String),
}

/// Symbol for the `n`th key, base 62.
fn symbol_for(mut n: usize) -> String {
    let mut out = Vec::new();
    loop {
        out.push(ALPHABET[n % ALPHABET.len()]);
        n /= ALPHABET.len();
        if n == 0 {
            break;
        }
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyTable {
    keys:      Vec<String>,
    by_key:    HashMap<String, usize>,
    by_symbol: HashMap<String, usize>,
}

impl KeyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Symbol for `key`, assigning the next one if unseen.
    pub fn intern(&mut self, key: &str) -> String {
        if let Some(&n) = self.by_key.get(key) {
            return symbol_for(n);
        }
        let n = self.keys.len();
        let symbol = symbol_for(n);
        self.keys.push(key.to_owned());
        self.by_key.insert(key.to_owned(), n);
        self.by_symbol.insert(symbol.clone(), n);
        symbol
    }

    pub fn key(&self, symbol: &str) -> Result<&str, SymbolError> {
        self.by_symbol
            .get(symbol)
            .map(|&n| self.keys[n].as_str())
            .ok_or_else(|| SymbolError::UnknownSymbol(symbol.to_owned()))
    }

    /// Copy of `doc` with every map key replaced by its symbol.
    pub fn compact(&mut self, doc: &Document) -> Document {
        match doc {
            Document::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (key, value) in map {
                    let symbol = self.intern(key);
                    out.insert(symbol, self.compact(value));
                }
                Document::Object(out)
            }
            Document::Array(items) => Document::Array(items.iter().map(|v| self.compact(v)).collect()),
            other => other.clone(),
        }
    }

    /// Inverse of [`KeyTable::compact`].
    pub fn expand(&self, doc: &Document) -> Result<Document, SymbolError> {
        Ok(match doc {
            Document::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (symbol, value) in map {
                    out.insert(self.key(symbol)?.to_owned(), self.expand(value)?);
                }
                Document::Object(out)
            }
            Document::Array(items) => Document::Array(
                items.iter().map(|v| self.expand(v)).collect::<Result<_, _>>()?,
            ),
            other => other.clone(),
        })
    }

    /// `{symbol: key}` in assignment order.
    pub fn to_document(&self) -> Document {
        Document::Object(
            self.keys
                .iter()
                .enumerate()
                .map(|(n, key)| (symbol_for(n), Document::String(key.clone())))
                .collect(),
        )
    }

    pub fn from_document(doc: &Document) -> Result<Self, SymbolError> {
        let map = doc
            .as_object()
            .ok_or_else(|| SymbolError::InvalidTable(format!("expected map, found {}", kind_of(doc))))?;
        let mut table = Self::new();
        for (symbol, key) in map {
            let key = key
                .as_str()
                .ok_or_else(|| SymbolError::InvalidTable(format!("symbol '{symbol}' maps to {}", kind_of(key))))?;
            if table.by_key.contains_key(key) || table.by_symbol.contains_key(symbol) {
                return Err(SymbolError::InvalidTable(format!("duplicate entry '{symbol}': '{key}'")));
            }
            let n = table.keys.len();
            table.keys.push(key.to_owned());
            table.by_key.insert(key.to_owned(), n);
            table.by_symbol.insert(symbol.clone(), n);
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn population() -> Document {
        json!({
            "individualHumans": [
                {"suid": {"id": 1}, "m_age": 9588.48, "infections": []},
                {"suid": {"id": 2}, "m_age": 2457.41, "infections": [{"suid": {"id": 5}}]},
            ],
            "externalId": 1,
        })
    }

    #[test]
    fn test_compact_then_expand() {
        let mut table = KeyTable::new();
        let compacted = table.compact(&population());
        assert_eq!(table.len(), 6);
        assert!(compacted.get("individualHumans").is_none());
        assert_eq!(table.expand(&compacted).unwrap(), population());
    }

    #[test]
    fn test_symbols_follow_first_appearance() {
        let mut table = KeyTable::new();
        assert_eq!(table.intern("individualHumans"), "0");
        assert_eq!(table.intern("suid"), "1");
        assert_eq!(table.intern("individualHumans"), "0");
        assert_eq!(symbol_for(61), "Z");
        assert_eq!(symbol_for(62), "10");
    }

    #[test]
    fn test_unknown_symbol() {
        let table = KeyTable::new();
        assert_eq!(table.expand(&json!({"q": 1})), Err(SymbolError::UnknownSymbol("q".into())));
    }

    #[test]
    fn test_table_document_round_trip() {
        let mut table = KeyTable::new();
        let compacted = table.compact(&population());
        let stored = table.to_document();
        assert_eq!(stored["0"], json!("individualHumans"));

        let restored = KeyTable::from_document(&stored).unwrap();
        assert_eq!(restored, table);
        assert_eq!(restored.expand(&compacted).unwrap(), population());
    }

    #[test]
    fn test_tables_are_independent() {
        let mut a = KeyTable::new();
        let mut b = KeyTable::new();
        a.intern("m_age");
        assert_eq!(b.intern("suid"), "0");
        assert!(b.key("0").is_ok());
        assert_eq!(a.key("0").unwrap(), "m_age");
    }

    #[test]
    fn test_invalid_table_document() {
        assert!(matches!(KeyTable::from_document(&json!([1])), Err(SymbolError::InvalidTable(_))));
        assert!(matches!(KeyTable::from_document(&json!({"0": 3})), Err(SymbolError::InvalidTable(_))));
    }
}
