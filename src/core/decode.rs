//! Purpose: Thin seam over the external container decoding stack.
//! Exports: `FileDecoder`, `ContainerDecoder`, `CompressionBackend`.
//! Role: Translate every decoder-side failure into the uniform `Decode` kind;
//! the orchestrator never sees decompression or parser error types.
//! Invariants: The decoder configures which compression backends are enabled
//! but implements none of them.
//! Notes: The container payload is sniffed: JSON text when the first
//! significant byte looks like JSON, CBOR otherwise.

use std::io::Read;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use ciborium::Value as CborValue;
use flate2::read::{GzDecoder, ZlibDecoder};
use serde_json::{Map, Value};

use crate::core::error::{Error, ErrorKind};
use crate::core::fetch::RawFile;

/// Boundary to the external decoder. Held as `Arc<dyn FileDecoder>` by the
/// orchestrator; configured once at startup.
pub trait FileDecoder: Send + Sync {
    fn decode(&self, file: &RawFile) -> Result<Value, Error>;
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompressionBackend {
    Gzip,
    Zlib,
}

#[derive(Clone, Debug)]
pub struct ContainerDecoder {
    backends: Vec<CompressionBackend>,
}

impl ContainerDecoder {
    pub fn new() -> Self {
        Self {
            backends: vec![CompressionBackend::Gzip, CompressionBackend::Zlib],
        }
    }

    pub fn with_backends(backends: Vec<CompressionBackend>) -> Self {
        Self { backends }
    }

    fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>, Error> {
        let Some(backend) = sniff_compression(bytes) else {
            return Ok(bytes.to_vec());
        };
        if !self.backends.contains(&backend) {
            return Err(Error::new(ErrorKind::Decode)
                .with_message("unsupported compression")
                .with_detail(format!("{backend:?} backend is not enabled")));
        }
        let mut inner = Vec::new();
        let result = match backend {
            CompressionBackend::Gzip => GzDecoder::new(bytes).read_to_end(&mut inner),
            CompressionBackend::Zlib => ZlibDecoder::new(bytes).read_to_end(&mut inner),
        };
        result.map_err(|err| {
            Error::new(ErrorKind::Decode)
                .with_message("failed to decompress file")
                .with_source(err)
        })?;
        Ok(inner)
    }
}

impl Default for ContainerDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FileDecoder for ContainerDecoder {
    fn decode(&self, file: &RawFile) -> Result<Value, Error> {
        if file.bytes.is_empty() {
            return Err(Error::new(ErrorKind::Decode).with_message("file is empty"));
        }
        let document = self.decompress(&file.bytes)?;
        parse_document(&document)
    }
}

fn sniff_compression(bytes: &[u8]) -> Option<CompressionBackend> {
    match bytes {
        [0x1f, 0x8b, ..] => Some(CompressionBackend::Gzip),
        [0x78, flg, ..] if matches!(flg, 0x01 | 0x5e | 0x9c | 0xda) => {
            Some(CompressionBackend::Zlib)
        }
        _ => None,
    }
}

fn parse_document(bytes: &[u8]) -> Result<Value, Error> {
    if looks_like_json(bytes) {
        return serde_json::from_slice(bytes).map_err(|err| {
            Error::new(ErrorKind::Decode)
                .with_message("malformed JSON document")
                .with_source(err)
        });
    }
    let value: CborValue = ciborium::de::from_reader(bytes).map_err(|err| {
        Error::new(ErrorKind::Decode)
            .with_message("malformed CBOR document")
            .with_detail(err.to_string())
    })?;
    Ok(cbor_to_json(value))
}

fn looks_like_json(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .find(|byte| !byte.is_ascii_whitespace())
        .is_some_and(|byte| matches!(byte, b'{' | b'[' | b'"' | b'-' | b'0'..=b'9' | b't' | b'f' | b'n'))
}

fn cbor_to_json(value: CborValue) -> Value {
    match value {
        CborValue::Null => Value::Null,
        CborValue::Bool(flag) => Value::Bool(flag),
        CborValue::Integer(int) => {
            let int = i128::from(int);
            if let Ok(n) = i64::try_from(int) {
                Value::from(n)
            } else if let Ok(n) = u64::try_from(int) {
                Value::from(n)
            } else {
                float_value(int as f64)
            }
        }
        CborValue::Float(float) => float_value(float),
        CborValue::Text(text) => Value::String(text),
        CborValue::Bytes(bytes) => Value::String(BASE64.encode(bytes)),
        CborValue::Array(items) => Value::Array(items.into_iter().map(cbor_to_json).collect()),
        CborValue::Map(entries) => {
            let mut map = Map::new();
            for (key, entry) in entries {
                map.insert(map_key(key), cbor_to_json(entry));
            }
            Value::Object(map)
        }
        CborValue::Tag(_, inner) => cbor_to_json(*inner),
        _ => Value::Null,
    }
}

fn map_key(key: CborValue) -> String {
    match key {
        CborValue::Text(text) => text,
        other => match cbor_to_json(other) {
            Value::String(text) => text,
            rendered => rendered.to_string(),
        },
    }
}

// Non-finite floats have no JSON form; they decode as null.
fn float_value(float: f64) -> Value {
    serde_json::Number::from_f64(float)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
