//! The normalized request shape a transport adapter feeds the core (§6).

use std::collections::HashMap;

/// An order-preserving multi-map, used for query parameters and headers,
/// both of which may legally repeat a key.
#[derive(Debug, Clone, Default)]
pub struct MultiMap {
    entries: Vec<(String, String)>,
}

impl MultiMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Case-insensitive lookup, used for header access (§4.5).
    pub fn get_ci(&self, key: &str) -> Option<&str> {
        let lower = key.to_ascii_lowercase();
        self.entries.iter().find(|(k, _)| k.to_ascii_lowercase() == lower).map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.entries.iter().filter(|(k, _)| k == key).map(|(_, v)| v.as_str()).collect()
    }

    pub fn get_all_ci(&self, key: &str) -> Vec<&str> {
        let lower = key.to_ascii_lowercase();
        self.entries.iter().filter(|(k, _)| k.to_ascii_lowercase() == lower).map(|(_, v)| v.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A decoded, method-agnostic HTTP request handed to the core by a transport
/// adapter (§6). The core never parses raw bytes off a socket; an adapter
/// does that and constructs this.
#[derive(Debug, Clone)]
pub struct NormalizedRequest {
    pub method: String,
    pub path: String,
    pub query: MultiMap,
    pub headers: MultiMap,
    pub body_bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub stream_hint: bool,
    /// Captured `{placeholder}` segments from the matched route, filled in
    /// by the router before parameter resolution runs.
    pub path_params: HashMap<String, String>,
}

impl NormalizedRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            query: MultiMap::new(),
            headers: MultiMap::new(),
            body_bytes: Vec::new(),
            content_type: None,
            stream_hint: false,
            path_params: HashMap::new(),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key, value);
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    pub fn with_json_body(mut self, bytes: Vec<u8>) -> Self {
        self.content_type = Some("application/json".into());
        self.body_bytes = bytes;
        self
    }
}
