//! The body codec registry: content-type → decoder, selected by best match
//! with ties broken by registered priority (§4.5).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{DiagnosticId, InputError};
use crate::transport::MultiMap;

/// A single uploaded file, produced by the form codec for `multipart/form-data` parts that carry a filename.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field_name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// The result of decoding a request body: either a JSON value or a form
/// submission split into text fields and uploaded files (§4.5).
#[derive(Debug, Clone)]
pub enum DecodedBody {
    Json(Value),
    Form { fields: MultiMap, files: HashMap<String, Vec<UploadedFile>> },
}

impl DecodedBody {
    pub fn field(&self, name: &str) -> Option<Value> {
        match self {
            DecodedBody::Json(Value::Object(map)) => map.get(name).cloned(),
            DecodedBody::Form { fields, .. } => fields.get(name).map(|v| Value::String(v.to_string())),
            _ => None,
        }
    }

    pub fn field_all(&self, name: &str) -> Vec<Value> {
        match self {
            DecodedBody::Json(Value::Object(map)) => match map.get(name) {
                Some(Value::Array(values)) => values.clone(),
                Some(other) => vec![other.clone()],
                None => Vec::new(),
            },
            DecodedBody::Form { fields, .. } => fields.get_all(name).into_iter().map(|v| Value::String(v.to_string())).collect(),
            _ => Vec::new(),
        }
    }

    pub fn files(&self, name: &str) -> Vec<UploadedFile> {
        match self {
            DecodedBody::Form { files, .. } => files.get(name).cloned().unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    pub fn as_json(&self) -> Value {
        match self {
            DecodedBody::Json(v) => v.clone(),
            DecodedBody::Form { fields, .. } => {
                let mut obj = serde_json::Map::new();
                for (k, v) in fields.iter() {
                    obj.insert(k.to_string(), Value::String(v.to_string()));
                }
                Value::Object(obj)
            }
        }
    }
}

/// A body decoder registered for one or more content types (§4.5).
pub trait BodyCodec: Send + Sync {
    /// Content types this codec matches (exact, or `*` for a type-wide
    /// wildcard like `application/*+json`).
    fn content_types(&self) -> &[&str];

    /// Higher wins a tie when more than one codec matches (§4.5).
    fn priority(&self) -> i32 {
        0
    }

    fn decode(&self, bytes: &[u8], content_type: &str) -> Result<DecodedBody, InputError>;
}

struct JsonCodec;
impl BodyCodec for JsonCodec {
    fn content_types(&self) -> &[&str] {
        &["application/json"]
    }

    fn decode(&self, bytes: &[u8], content_type: &str) -> Result<DecodedBody, InputError> {
        serde_json::from_slice(bytes).map(DecodedBody::Json).map_err(|e| InputError::DecodeError {
            content_type: content_type.to_string(),
            reason: e.to_string(),
            diagnostic_id: DiagnosticId::next(),
        })
    }
}

struct FormCodec;
impl BodyCodec for FormCodec {
    fn content_types(&self) -> &[&str] {
        &["application/x-www-form-urlencoded", "multipart/form-data"]
    }

    fn decode(&self, bytes: &[u8], content_type: &str) -> Result<DecodedBody, InputError> {
        if let Some(boundary) = content_type.split("boundary=").nth(1) {
            decode_multipart(bytes, boundary.trim_matches('"'))
        } else {
            let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(bytes).map_err(|e| InputError::DecodeError {
                content_type: content_type.to_string(),
                reason: e.to_string(),
                diagnostic_id: DiagnosticId::next(),
            })?;
            let mut fields = MultiMap::new();
            for (k, v) in pairs {
                fields.insert(k, v);
            }
            Ok(DecodedBody::Form { fields, files: HashMap::new() })
        }
    }
}

/// Minimal `multipart/form-data` parser: enough to split named text fields
/// from named file parts. Not a general MIME parser.
fn decode_multipart(bytes: &[u8], boundary: &str) -> Result<DecodedBody, InputError> {
    let delimiter = format!("--{boundary}");
    let text = String::from_utf8_lossy(bytes);
    let mut fields = MultiMap::new();
    let mut files: HashMap<String, Vec<UploadedFile>> = HashMap::new();

    for part in text.split(&delimiter) {
        let part = part.trim_start_matches("\r\n").trim_end_matches("\r\n");
        if part.is_empty() || part == "--" {
            continue;
        }
        let Some((headers_block, body)) = part.split_once("\r\n\r\n") else { continue };
        let body = body.trim_end_matches("\r\n");

        let mut field_name = None;
        let mut filename = None;
        let mut content_type = None;
        for line in headers_block.lines() {
            if let Some(disposition) = line.strip_prefix("Content-Disposition:") {
                field_name = extract_quoted(disposition, "name=");
                filename = extract_quoted(disposition, "filename=");
            } else if let Some(ct) = line.strip_prefix("Content-Type:") {
                content_type = Some(ct.trim().to_string());
            }
        }

        let Some(name) = field_name else { continue };
        if let Some(filename) = filename {
            files.entry(name.clone()).or_default().push(UploadedFile {
                field_name: name,
                filename: Some(filename),
                content_type,
                bytes: body.as_bytes().to_vec(),
            });
        } else {
            fields.insert(name, body.to_string());
        }
    }

    Ok(DecodedBody::Form { fields, files })
}

fn extract_quoted(header: &str, key: &str) -> Option<String> {
    let idx = header.find(key)?;
    let rest = &header[idx + key.len()..];
    let rest = rest.trim_start_matches('"');
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

/// Registered body codecs, consulted at parameter-resolution time (§4.5).
/// Embedding applications may register additional codecs (MessagePack,
/// YAML, ...) without forking the core.
pub struct CodecRegistry {
    codecs: Vec<Arc<dyn BodyCodec>>,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self { codecs: vec![Arc::new(JsonCodec), Arc::new(FormCodec)] }
    }
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, codec: Arc<dyn BodyCodec>) {
        self.codecs.push(codec);
    }

    /// Best match by content type, ties broken by priority (higher wins).
    fn best_match(&self, content_type: &str) -> Option<&Arc<dyn BodyCodec>> {
        let base = content_type.split(';').next().unwrap_or(content_type).trim();
        self.codecs
            .iter()
            .filter(|c| c.content_types().iter().any(|ct| *ct == base))
            .max_by_key(|c| c.priority())
    }

    pub fn decode(&self, content_type: &str, bytes: &[u8]) -> Result<DecodedBody, InputError> {
        match self.best_match(content_type) {
            Some(codec) => codec.decode(bytes, content_type),
            None => Err(InputError::DecodeError {
                content_type: content_type.to_string(),
                reason: "no codec registered for content type".to_string(),
                diagnostic_id: DiagnosticId::next(),
            }),
        }
    }
}
