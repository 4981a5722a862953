//! Request parameters and per-endpoint parameter schemas.
//!
//! Every endpoint declares an ordered list of named parameters. A request's
//! query string and JSON body are merged into one map (JSON wins) and bound
//! against that list to produce [`Args`].

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{BindingError, EndpointError};

/// Declared type of a parameter.
///
/// Query-string values always arrive as strings; scalar types coerce them.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ParamType {
    Any,
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    fn describe(self) -> &'static str {
        match self {
            ParamType::Any => "any value",
            ParamType::String => "a string",
            ParamType::Integer => "an integer",
            ParamType::Number => "a number",
            ParamType::Boolean => "a boolean",
            ParamType::Object => "an object",
            ParamType::Array => "an array",
        }
    }

    /// Coerce a raw value into this type, or return `None` if it does not fit.
    fn coerce(self, value: Value) -> Option<Value> {
        match (self, value) {
            (ParamType::Any, v) => Some(v),
            (ParamType::String, v @ Value::String(_)) => Some(v),
            (ParamType::String, v @ (Value::Number(_) | Value::Bool(_))) => {
                Some(Value::String(v.to_string()))
            }
            (ParamType::Integer, v @ Value::Number(_)) if v.is_i64() || v.is_u64() => Some(v),
            (ParamType::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),
            (ParamType::Number, v @ Value::Number(_)) => Some(v),
            (ParamType::Number, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            (ParamType::Boolean, v @ Value::Bool(_)) => Some(v),
            (ParamType::Boolean, Value::String(s)) => match s.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Some(Value::Bool(true)),
                "false" | "0" | "no" | "off" => Some(Value::Bool(false)),
                _ => None,
            },
            (ParamType::Object, v @ Value::Object(_)) => Some(v),
            (ParamType::Array, v @ Value::Array(_)) => Some(v),
            _ => None,
        }
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ParamType,
    /// `None` means the parameter is required.
    pub default: Option<Value>,
}

/// Ordered parameter list of an endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSchema {
    params: Vec<ParamSpec>,
    accepts_extra: bool,
}

impl ParamSchema {
    /// A schema with no parameters that rejects any argument.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: impl Into<String>) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            ty: ParamType::Any,
            default: None,
        });
        self
    }

    pub fn required_typed(mut self, name: impl Into<String>, ty: ParamType) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            ty,
            default: None,
        });
        self
    }

    pub fn optional(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            ty: ParamType::Any,
            default: Some(default.into()),
        });
        self
    }

    pub fn optional_typed(
        mut self,
        name: impl Into<String>,
        ty: ParamType,
        default: impl Into<Value>,
    ) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            ty,
            default: Some(default.into()),
        });
        self
    }

    /// Accept (and pass through) keys that are not declared.
    pub fn accept_extra(mut self) -> Self {
        self.accepts_extra = true;
        self
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn accepts_extra(&self) -> bool {
        self.accepts_extra
    }

    /// Bind a merged argument map against this schema.
    pub fn bind(&self, endpoint: &str, mut merged: Map<String, Value>) -> Result<Args, BindingError> {
        let mut values = Map::new();
        let mut missing = Vec::new();

        for spec in &self.params {
            match merged.remove(&spec.name) {
                Some(raw) => {
                    let found = kind_of(&raw);
                    let value = spec.ty.coerce(raw).ok_or_else(|| BindingError::InvalidType {
                        endpoint: endpoint.to_string(),
                        name: spec.name.clone(),
                        expected: spec.ty.describe(),
                        found: found.to_string(),
                    })?;
                    values.insert(spec.name.clone(), value);
                }
                None => match &spec.default {
                    Some(default) => {
                        values.insert(spec.name.clone(), default.clone());
                    }
                    None => missing.push(spec.name.clone()),
                },
            }
        }

        if !missing.is_empty() {
            return Err(BindingError::Missing {
                endpoint: endpoint.to_string(),
                names: missing,
            });
        }

        if let Some((name, _)) = merged.iter().next() {
            if !self.accepts_extra {
                return Err(BindingError::Unexpected {
                    endpoint: endpoint.to_string(),
                    name: name.clone(),
                });
            }
        }

        Ok(Args {
            values,
            extra: merged,
            files: Vec::new(),
        })
    }
}

/// A file received in a multipart request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Multipart field name.
    pub field: String,
    /// Client-supplied filename; may be empty.
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Raw inputs of one request, before merging.
#[derive(Debug, Clone, Default)]
pub struct RequestParams {
    /// Query-string pairs in arrival order.
    pub query: Vec<(String, String)>,
    /// Decoded JSON body, if the request declared one.
    pub json: Option<Value>,
    /// Plain text fields of a multipart body.
    pub form: Vec<(String, String)>,
    pub files: Vec<UploadedFile>,
}

impl RequestParams {
    pub fn from_query(query: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            query: query.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_json(mut self, json: Value) -> Self {
        self.json = Some(json);
        self
    }

    /// Query first, then form fields, then the JSON body on top.
    ///
    /// Repeated query keys keep their first value.
    pub fn merge(&self, endpoint: &str) -> Result<Map<String, Value>, BindingError> {
        let mut merged = Map::new();
        for (k, v) in self.query.iter().chain(self.form.iter()) {
            if !merged.contains_key(k) {
                merged.insert(k.clone(), Value::String(v.clone()));
            }
        }
        match &self.json {
            None | Some(Value::Null) => {}
            Some(Value::Object(body)) => {
                for (k, v) in body {
                    merged.insert(k.clone(), v.clone());
                }
            }
            Some(other) => {
                return Err(BindingError::BodyNotObject {
                    endpoint: endpoint.to_string(),
                    found: kind_of(other),
                });
            }
        }
        Ok(merged)
    }
}

/// Arguments bound for one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    values: Map<String, Value>,
    extra: Map<String, Value>,
    files: Vec<UploadedFile>,
}

impl Args {
    /// Declared arguments, in declaration order.
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Undeclared arguments accepted by an `accept_extra` schema.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.values.get(name).or_else(|| self.extra.get(name))
    }

    /// Deserialize an argument into `T`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, EndpointError> {
        let value = self.raw(name).cloned().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|e| EndpointError::failed(format!("argument '{name}': {e}")))
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.raw(name).and_then(Value::as_str)
    }

    pub fn file(&self, field: &str) -> Option<&UploadedFile> {
        self.files.iter().find(|f| f.field == field)
    }

    pub(crate) fn with_files(mut self, files: Vec<UploadedFile>) -> Self {
        self.files = files;
        self
    }

    /// Everything this call received, for tracing.
    pub fn to_json(&self) -> Value {
        let mut all = self.values.clone();
        all.extend(self.extra.clone());
        Value::Object(all)
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
