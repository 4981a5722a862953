//! Status code registry.
//!
//! A closed set of symbolic HTTP status names. Every response carries exactly
//! one [`RestCode`]; anything that cannot be resolved falls back to
//! [`RestCode::InternalServerError`].

use serde::{Serialize, Serializer};

/// HTTP status codes used by RESTful endpoints.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RestCode {
    Ok,
    Created,
    Accepted,
    NoContent,
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    InternalServerError,
    ServiceUnavailable,
}

/// `(name, code)` pairs, including aliases. Canonical names come first.
const NAMES: &[(&str, RestCode)] = &[
    ("OK", RestCode::Ok),
    ("CREATED", RestCode::Created),
    ("ACCEPTED", RestCode::Accepted),
    ("NO_CONTENT", RestCode::NoContent),
    ("BAD_REQUEST", RestCode::BadRequest),
    ("UNAUTHORIZED", RestCode::Unauthorized),
    ("FORBIDDEN", RestCode::Forbidden),
    ("NOT_FOUND", RestCode::NotFound),
    ("METHOD_NOT_ALLOWED", RestCode::MethodNotAllowed),
    ("INTERNAL_SERVER_ERROR", RestCode::InternalServerError),
    ("SERVICE_UNAVAILABLE", RestCode::ServiceUnavailable),
    ("SUCCESS", RestCode::Ok),
    ("FAILURE", RestCode::InternalServerError),
];

impl RestCode {
    pub const ALL: [RestCode; 11] = [
        RestCode::Ok,
        RestCode::Created,
        RestCode::Accepted,
        RestCode::NoContent,
        RestCode::BadRequest,
        RestCode::Unauthorized,
        RestCode::Forbidden,
        RestCode::NotFound,
        RestCode::MethodNotAllowed,
        RestCode::InternalServerError,
        RestCode::ServiceUnavailable,
    ];

    /// Numeric HTTP status.
    pub fn as_u16(self) -> u16 {
        match self {
            RestCode::Ok => 200,
            RestCode::Created => 201,
            RestCode::Accepted => 202,
            RestCode::NoContent => 204,
            RestCode::BadRequest => 400,
            RestCode::Unauthorized => 401,
            RestCode::Forbidden => 403,
            RestCode::NotFound => 404,
            RestCode::MethodNotAllowed => 405,
            RestCode::InternalServerError => 500,
            RestCode::ServiceUnavailable => 503,
        }
    }

    /// Canonical symbolic name (e.g. `"NOT_FOUND"`).
    pub fn name(self) -> &'static str {
        NAMES
            .iter()
            .find(|(_, code)| *code == self)
            .map(|(name, _)| *name)
            .unwrap_or("INTERNAL_SERVER_ERROR")
    }

    pub fn from_u16(value: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|code| code.as_u16() == value)
    }

    /// Case-insensitive lookup by symbolic name, aliases included.
    pub fn from_name(name: &str) -> Option<Self> {
        NAMES
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, code)| *code)
    }

    /// Resolve any accepted code representation. Never fails.
    pub fn resolve(spec: impl Into<StatusSpec>) -> Self {
        match spec.into() {
            StatusSpec::Code(code) => code,
            StatusSpec::Int(value) => u16::try_from(value)
                .ok()
                .and_then(Self::from_u16)
                .unwrap_or(RestCode::InternalServerError),
            StatusSpec::Name(name) => {
                let name = name.trim();
                if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) {
                    name.parse::<i64>()
                        .map(|v| Self::resolve(StatusSpec::Int(v)))
                        .unwrap_or(RestCode::InternalServerError)
                } else {
                    Self::from_name(name).unwrap_or(RestCode::InternalServerError)
                }
            }
        }
    }

    pub fn is_success(self) -> bool {
        (200..300).contains(&self.as_u16())
    }
}

impl core::fmt::Display for RestCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for RestCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// A status code as handlers may spell it: an integer, a name, or a typed code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusSpec {
    Int(i64),
    Name(String),
    Code(RestCode),
}

impl From<RestCode> for StatusSpec {
    fn from(value: RestCode) -> Self {
        StatusSpec::Code(value)
    }
}

impl From<u16> for StatusSpec {
    fn from(value: u16) -> Self {
        StatusSpec::Int(i64::from(value))
    }
}

impl From<i32> for StatusSpec {
    fn from(value: i32) -> Self {
        StatusSpec::Int(i64::from(value))
    }
}

impl From<i64> for StatusSpec {
    fn from(value: i64) -> Self {
        StatusSpec::Int(value)
    }
}

impl From<&str> for StatusSpec {
    fn from(value: &str) -> Self {
        StatusSpec::Name(value.to_string())
    }
}

impl From<String> for StatusSpec {
    fn from(value: String) -> Self {
        StatusSpec::Name(value)
    }
}
