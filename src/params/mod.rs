//! Parameter resolution: bind declared handler parameters from the
//! normalized request (§4.5).

pub mod codec;
pub mod constraint;
pub mod model;

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{DiagnosticId, InputError};
use crate::transport::NormalizedRequest;
use codec::{CodecRegistry, DecodedBody, UploadedFile};
use constraint::Constraint;
use model::ModelHandlerRegistry;

const TRUTHY: &[&str] = &["true", "1", "yes", "on"];
const FALSY: &[&str] = &["false", "0", "no", "off"];

/// Where a declared parameter's value comes from (§4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterSource {
    Path,
    Query,
    Body,
    Header,
    File,
    FileMultiple,
    RawBody,
    DynamicBody,
}

impl ParameterSource {
    /// Whether this source is required by default absent an explicit
    /// `required` override (§4.5: path is always required; the rest are
    /// "per declaration").
    pub fn required_by_default(&self) -> bool {
        matches!(self, ParameterSource::Path)
    }
}

/// The declared conversion target for a parameter value (§4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetType {
    Integer,
    Float,
    Bool,
    String,
    Json,
    Sequence(Box<TargetType>),
    /// A structured model, resolved through the `ModelHandlerRegistry`.
    Model(String),
    /// No declared type: auto-infer integer, then float, then boolean, then
    /// JSON object, then string — stopping at the first success (§4.5).
    Auto,
}

/// One declared handler parameter (§4.5).
#[derive(Debug, Clone)]
pub struct ParameterDeclaration {
    pub name: String,
    pub source: ParameterSource,
    pub target_type: TargetType,
    pub required: bool,
    pub default: Option<Value>,
    pub constraints: Vec<Constraint>,
    /// Alternate name to read from the source under (e.g. a query string
    /// using camelCase while the handler parameter is snake_case).
    pub alias: Option<String>,
}

impl ParameterDeclaration {
    pub fn new(name: impl Into<String>, source: ParameterSource, target_type: TargetType) -> Self {
        let name = name.into();
        let required = source.required_by_default();
        Self { name, source, target_type, required, default: None, constraints: Vec::new(), alias: None }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    fn lookup_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// A single uploaded file, or a named model instance, alongside plain JSON
/// values — the complete set of shapes a resolved parameter can take.
#[derive(Debug, Clone)]
pub enum ResolvedValue {
    Scalar(Value),
    File(UploadedFile),
    Files(Vec<UploadedFile>),
}

/// Ties the codec registry and model handler registry together to bind a
/// full parameter list from one request (§4.5).
pub struct ParameterResolver<'a> {
    pub codecs: &'a CodecRegistry,
    pub models: &'a ModelHandlerRegistry,
}

impl<'a> ParameterResolver<'a> {
    pub fn new(codecs: &'a CodecRegistry, models: &'a ModelHandlerRegistry) -> Self {
        Self { codecs, models }
    }

    /// Resolve every declaration against `req`. Collects every failure
    /// before returning, so callers see the complete set of problems in one
    /// `ResolveError` (§4.5).
    pub fn resolve_all(
        &self,
        declarations: &[ParameterDeclaration],
        req: &NormalizedRequest,
    ) -> Result<HashMap<String, ResolvedValue>, InputError> {
        let decoded_body = self.decode_body_if_needed(declarations, req)?;

        let mut resolved = HashMap::new();
        let mut failures = Vec::new();

        for decl in declarations {
            match self.resolve_one(decl, req, decoded_body.as_ref()) {
                Ok(Some(value)) => {
                    resolved.insert(decl.name.clone(), value);
                }
                Ok(None) => {}
                Err(e) => failures.push(e),
            }
        }

        if failures.is_empty() {
            Ok(resolved)
        } else {
            Err(InputError::ResolveError(failures))
        }
    }

    fn decode_body_if_needed(
        &self,
        declarations: &[ParameterDeclaration],
        req: &NormalizedRequest,
    ) -> Result<Option<DecodedBody>, InputError> {
        let needs_body = declarations.iter().any(|d| {
            matches!(
                d.source,
                ParameterSource::Body | ParameterSource::File | ParameterSource::FileMultiple | ParameterSource::DynamicBody
            )
        });
        if !needs_body || req.body_bytes.is_empty() {
            return Ok(None);
        }
        let content_type = req.content_type.as_deref().unwrap_or("application/octet-stream");
        self.codecs.decode(content_type, &req.body_bytes).map(Some)
    }

    fn resolve_one(
        &self,
        decl: &ParameterDeclaration,
        req: &NormalizedRequest,
        decoded_body: Option<&DecodedBody>,
    ) -> Result<Option<ResolvedValue>, InputError> {
        match decl.source {
            ParameterSource::Path => self.resolve_scalar(decl, req.path_params.get(decl.lookup_key()).map(|s| s.as_str())),
            ParameterSource::Header => self.resolve_scalar(decl, req.headers.get_ci(decl.lookup_key())),
            ParameterSource::Query => {
                if matches!(decl.target_type, TargetType::Sequence(_)) {
                    let values = req.query.get_all(decl.lookup_key());
                    if values.is_empty() {
                        self.apply_default_or_require(decl)
                    } else {
                        let converted: Result<Vec<Value>, InputError> =
                            values.iter().map(|v| convert_scalar(decl, v)).collect();
                        Ok(Some(ResolvedValue::Scalar(Value::Array(converted?))))
                    }
                } else {
                    self.resolve_scalar(decl, req.query.get(decl.lookup_key()))
                }
            }
            ParameterSource::RawBody => Ok(Some(ResolvedValue::Scalar(Value::String(
                String::from_utf8_lossy(&req.body_bytes).to_string(),
            )))),
            ParameterSource::DynamicBody => match decoded_body {
                Some(body) => Ok(Some(ResolvedValue::Scalar(body.as_json()))),
                None => self.apply_default_or_require(decl),
            },
            ParameterSource::Body => match decoded_body.and_then(|b| b.field(decl.lookup_key())) {
                Some(value) => self.finish_scalar(decl, value),
                None => self.apply_default_or_require(decl),
            },
            ParameterSource::File => match decoded_body.map(|b| b.files(decl.lookup_key())) {
                Some(files) if !files.is_empty() => Ok(Some(ResolvedValue::File(files.into_iter().next().unwrap()))),
                _ => self.apply_default_or_require(decl),
            },
            ParameterSource::FileMultiple => match decoded_body.map(|b| b.files(decl.lookup_key())) {
                Some(files) if !files.is_empty() => Ok(Some(ResolvedValue::Files(files))),
                _ => self.apply_default_or_require(decl),
            },
        }
    }

    fn resolve_scalar(&self, decl: &ParameterDeclaration, raw: Option<&str>) -> Result<Option<ResolvedValue>, InputError> {
        match raw {
            Some(raw) => {
                let value = convert_scalar(decl, raw)?;
                self.finish_scalar(decl, value)
            }
            None => self.apply_default_or_require(decl),
        }
    }

    fn finish_scalar(&self, decl: &ParameterDeclaration, value: Value) -> Result<Option<ResolvedValue>, InputError> {
        let value = if let TargetType::Model(type_name) = &decl.target_type {
            self.models.resolve(type_name, &value).map_err(|reason| InputError::ValidationError {
                parameter: decl.name.clone(),
                constraint: "model".to_string(),
                value_display: reason,
                diagnostic_id: DiagnosticId::next(),
            })?
        } else {
            value
        };
        constraint::validate(&decl.name, &value, &decl.constraints)?;
        Ok(Some(ResolvedValue::Scalar(value)))
    }

    fn apply_default_or_require(&self, decl: &ParameterDeclaration) -> Result<Option<ResolvedValue>, InputError> {
        match (&decl.default, decl.required) {
            (Some(default), _) => Ok(Some(ResolvedValue::Scalar(default.clone()))),
            (None, true) => Err(InputError::ValidationError {
                parameter: decl.name.clone(),
                constraint: "required".to_string(),
                value_display: "<missing>".to_string(),
                diagnostic_id: DiagnosticId::next(),
            }),
            (None, false) => Ok(None),
        }
    }
}

/// Convert a raw string to the declaration's target type (§4.5).
fn convert_scalar(decl: &ParameterDeclaration, raw: &str) -> Result<Value, InputError> {
    let target = match &decl.target_type {
        TargetType::Sequence(inner) => inner.as_ref(),
        other => other,
    };
    convert(&decl.name, raw, target)
}

fn convert(parameter: &str, raw: &str, target: &TargetType) -> Result<Value, InputError> {
    let fail = |target_type: &str| InputError::ValidationError {
        parameter: parameter.to_string(),
        constraint: format!("type:{target_type}"),
        value_display: raw.to_string(),
        diagnostic_id: DiagnosticId::next(),
    };

    match target {
        TargetType::Integer => raw.parse::<i64>().map(Value::from).map_err(|_| fail("integer")),
        TargetType::Float => raw.parse::<f64>().map(|f| Value::from(f)).map_err(|_| fail("float")),
        TargetType::Bool => {
            let lower = raw.to_ascii_lowercase();
            if TRUTHY.contains(&lower.as_str()) {
                Ok(Value::Bool(true))
            } else if FALSY.contains(&lower.as_str()) {
                Ok(Value::Bool(false))
            } else {
                Err(fail("bool"))
            }
        }
        TargetType::String | TargetType::Model(_) => Ok(Value::String(raw.to_string())),
        TargetType::Json => serde_json::from_str(raw).map_err(|_| fail("json")),
        TargetType::Sequence(_) => Ok(Value::String(raw.to_string())),
        TargetType::Auto => Ok(auto_infer(raw)),
    }
}

/// Integer, then float, then boolean, then JSON object, then string —
/// stopping at the first success (§4.5).
fn auto_infer(raw: &str) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Value::from(f);
    }
    let lower = raw.to_ascii_lowercase();
    if TRUTHY.contains(&lower.as_str()) {
        return Value::Bool(true);
    }
    if FALSY.contains(&lower.as_str()) {
        return Value::Bool(false);
    }
    if let Ok(Value::Object(obj)) = serde_json::from_str(raw) {
        return Value::Object(obj);
    }
    Value::String(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> (CodecRegistry, ModelHandlerRegistry) {
        (CodecRegistry::new(), ModelHandlerRegistry::new())
    }

    #[test]
    fn path_parameter_is_required_by_default() {
        let (codecs, models) = resolver();
        let resolver = ParameterResolver::new(&codecs, &models);
        let decl = ParameterDeclaration::new("id", ParameterSource::Path, TargetType::Integer);
        let req = NormalizedRequest::new("GET", "/users/1");
        let err = resolver.resolve_all(&[decl], &req).unwrap_err();
        assert!(matches!(err, InputError::ResolveError(_)));
    }

    #[test]
    fn path_parameter_converts_to_integer() {
        let (codecs, models) = resolver();
        let resolver = ParameterResolver::new(&codecs, &models);
        let decl = ParameterDeclaration::new("id", ParameterSource::Path, TargetType::Integer);
        let mut req = NormalizedRequest::new("GET", "/users/42");
        req.path_params.insert("id".into(), "42".into());
        let resolved = resolver.resolve_all(&[decl], &req).unwrap();
        match resolved.get("id") {
            Some(ResolvedValue::Scalar(v)) => assert_eq!(v.as_i64(), Some(42)),
            _ => panic!("expected resolved scalar"),
        }
    }

    #[test]
    fn multiple_failures_are_aggregated() {
        let (codecs, models) = resolver();
        let resolver = ParameterResolver::new(&codecs, &models);
        let decls = vec![
            ParameterDeclaration::new("id", ParameterSource::Path, TargetType::Integer),
            ParameterDeclaration::new("page", ParameterSource::Query, TargetType::Integer)
                .required(true),
        ];
        let req = NormalizedRequest::new("GET", "/users");
        match resolver.resolve_all(&decls, &req) {
            Err(InputError::ResolveError(errs)) => assert_eq!(errs.len(), 2),
            other => panic!("expected aggregated ResolveError, got {other:?}"),
        }
    }

    #[test]
    fn query_sequence_binds_repeated_values() {
        let (codecs, models) = resolver();
        let resolver = ParameterResolver::new(&codecs, &models);
        let decl = ParameterDeclaration::new("tag", ParameterSource::Query, TargetType::Sequence(Box::new(TargetType::String)));
        let req = NormalizedRequest::new("GET", "/items").with_query("tag", "a").with_query("tag", "b");
        let resolved = resolver.resolve_all(&[decl], &req).unwrap();
        match resolved.get("tag") {
            Some(ResolvedValue::Scalar(Value::Array(values))) => assert_eq!(values.len(), 2),
            _ => panic!("expected array"),
        }
    }

    #[test]
    fn body_field_resolves_from_decoded_json() {
        let (codecs, models) = resolver();
        let resolver = ParameterResolver::new(&codecs, &models);
        let decl = ParameterDeclaration::new("name", ParameterSource::Body, TargetType::String).required(true);
        let req = NormalizedRequest::new("POST", "/users").with_json_body(br#"{"name":"alice"}"#.to_vec());
        let resolved = resolver.resolve_all(&[decl], &req).unwrap();
        match resolved.get("name") {
            Some(ResolvedValue::Scalar(Value::String(s))) => assert_eq!(s, "alice"),
            _ => panic!("expected string"),
        }
    }

    #[test]
    fn auto_infer_prefers_integer_over_string() {
        assert_eq!(auto_infer("42"), Value::from(42));
        assert_eq!(auto_infer("3.14"), Value::from(3.14));
        assert_eq!(auto_infer("true"), Value::Bool(true));
        assert_eq!(auto_infer("hello"), Value::String("hello".into()));
    }

    #[test]
    fn missing_optional_query_parameter_uses_default() {
        let (codecs, models) = resolver();
        let resolver = ParameterResolver::new(&codecs, &models);
        let decl = ParameterDeclaration::new("page", ParameterSource::Query, TargetType::Integer)
            .default_value(Value::from(1));
        let req = NormalizedRequest::new("GET", "/items");
        let resolved = resolver.resolve_all(&[decl], &req).unwrap();
        assert!(matches!(resolved.get("page"), Some(ResolvedValue::Scalar(v)) if v.as_i64() == Some(1)));
    }
}
