//! Transport-agnostic response model with convenience constructors (§4.7).

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

/// The response body. `Stream` is a marker for transports that want to take
/// over framing themselves; the core never inspects its contents.
#[derive(Debug, Clone)]
pub enum Body {
    Json(Value),
    Text(String),
    Bytes(Vec<u8>),
    Empty,
    Stream,
}

/// A single HTTP header name, case-insensitive for lookup but preserving
/// original casing for emission (§4.7).
#[derive(Debug, Clone)]
struct HeaderEntry {
    original_name: String,
    values: Vec<String>,
}

/// An ordered, case-insensitive-lookup header map.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    entries: Vec<HeaderEntry>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let lower = name.to_ascii_lowercase();
        if let Some(entry) = self.entries.iter_mut().find(|e| e.original_name.to_ascii_lowercase() == lower) {
            entry.values = vec![value.into()];
        } else {
            self.entries.push(HeaderEntry { original_name: name, values: vec![value.into()] });
        }
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let lower = name.to_ascii_lowercase();
        if let Some(entry) = self.entries.iter_mut().find(|e| e.original_name.to_ascii_lowercase() == lower) {
            entry.values.push(value.into());
        } else {
            self.entries.push(HeaderEntry { original_name: name, values: vec![value.into()] });
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let lower = name.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|e| e.original_name.to_ascii_lowercase() == lower)
            .and_then(|e| e.values.first())
            .map(|s| s.as_str())
    }

    pub fn get_all(&self, name: &str) -> Vec<&str> {
        let lower = name.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|e| e.original_name.to_ascii_lowercase() == lower)
            .map(|e| e.values.iter().map(|s| s.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|e| e.values.iter().map(move |v| (e.original_name.as_str(), v.as_str())))
    }

    pub fn as_map(&self) -> HashMap<String, Vec<String>> {
        self.entries.iter().map(|e| (e.original_name.clone(), e.values.clone())).collect()
    }
}

/// `{status, headers, body}` (§3, §4.7). Invariant: status is in `[100,
/// 599]`, enforced by the constructors and by [`Response::with_status`].
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: Headers,
    pub body: Body,
}

impl Response {
    pub fn with_status(status: u16) -> Self {
        assert!((100..=599).contains(&status), "status {status} outside [100, 599]");
        Self { status, headers: Headers::new(), body: Body::Empty }
    }

    /// Serialize `value` as JSON, forcing `Content-Type: application/json`
    /// unless the caller already set one (§4.7).
    pub fn json<T: Serialize>(value: &T) -> crate::error::Result<Self> {
        let json = serde_json::to_value(value).map_err(|e| {
            crate::error::CoreError::Input(crate::error::InputError::DecodeError {
                content_type: "application/json".into(),
                reason: e.to_string(),
                diagnostic_id: crate::error::DiagnosticId::next(),
            })
        })?;
        let mut resp = Self::with_status(200);
        resp.headers.insert("Content-Type", "application/json");
        resp.body = Body::Json(json);
        Ok(resp)
    }

    pub fn text(s: impl Into<String>) -> Self {
        let mut resp = Self::with_status(200);
        resp.headers.insert("Content-Type", "text/plain; charset=utf-8");
        resp.body = Body::Text(s.into());
        resp
    }

    pub fn bytes(b: Vec<u8>, content_type: Option<&str>) -> Self {
        let mut resp = Self::with_status(200);
        resp.headers.insert("Content-Type", content_type.unwrap_or("application/octet-stream"));
        resp.body = Body::Bytes(b);
        resp
    }

    /// `{error_code, message, details?}` payload per §7.
    pub fn error(status: u16, message: impl Into<String>, code: Option<&str>) -> Self {
        let mut resp = Self::with_status(status);
        resp.headers.insert("Content-Type", "application/json");
        let mut obj = serde_json::Map::new();
        obj.insert("error_code".into(), Value::String(code.unwrap_or("error").to_string()));
        obj.insert("message".into(), Value::String(message.into()));
        resp.body = Body::Json(Value::Object(obj));
        resp
    }

    pub fn error_with_details(status: u16, error_code: &str, message: impl Into<String>, details: Value) -> Self {
        let mut resp = Self::with_status(status);
        resp.headers.insert("Content-Type", "application/json");
        let mut obj = serde_json::Map::new();
        obj.insert("error_code".into(), Value::String(error_code.to_string()));
        obj.insert("message".into(), Value::String(message.into()));
        obj.insert("details".into(), details);
        resp.body = Body::Json(Value::Object(obj));
        resp
    }

    /// Forces status 204 and clears the body (§4.7).
    pub fn no_content() -> Self {
        Self::with_status(204)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }
}
