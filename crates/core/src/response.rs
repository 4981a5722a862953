//! Response envelope and handler replies.

use serde::Serialize;
use serde_json::{Value, json};

use crate::error::EndpointError;
use crate::status::{RestCode, StatusSpec};

/// The uniform `{status, data, code}` JSON response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestResponse {
    pub status: String,
    pub data: Value,
    pub code: u16,
}

impl RestResponse {
    /// Build an envelope whose status is the resolved code's canonical name.
    pub fn create(data: Value, code: impl Into<StatusSpec>) -> Self {
        Self::with_status(data, code, None)
    }

    /// Build an envelope with an optional status-string override.
    pub fn with_status(data: Value, code: impl Into<StatusSpec>, status: Option<String>) -> Self {
        let code = RestCode::resolve(code);
        Self {
            status: status.unwrap_or_else(|| code.name().to_string()),
            data,
            code: code.as_u16(),
        }
    }

    pub fn ok(data: Value) -> Self {
        Self::create(data, RestCode::Ok)
    }

    /// `{"error": message}` with 500.
    pub fn error(message: impl Into<String>) -> Self {
        Self::create(json!({ "error": message.into() }), RestCode::InternalServerError)
    }

    pub fn body(&self) -> Value {
        json!({
            "status": self.status,
            "data": self.data,
            "code": self.code,
        })
    }

    /// `(json_body, http_status)`.
    pub fn into_parts(self) -> (Value, u16) {
        let code = self.code;
        (self.body(), code)
    }
}

/// What a handler returns on success.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Data plus status code; wrapped into a [`RestResponse`].
    Json { data: Value, code: RestCode },
    /// Raw file contents sent as an attachment.
    Attachment { filename: String, bytes: Vec<u8> },
    /// Plain text body.
    Text { body: String },
}

impl Reply {
    /// Serialize `data` with an implicit 200.
    pub fn json<T: Serialize>(data: T) -> Result<Self, EndpointError> {
        Ok(Reply::Json {
            data: serde_json::to_value(data)?,
            code: RestCode::Ok,
        })
    }

    /// The `(data, code)` form.
    pub fn with_code<T: Serialize>(data: T, code: impl Into<StatusSpec>) -> Result<Self, EndpointError> {
        Ok(Reply::Json {
            data: serde_json::to_value(data)?,
            code: RestCode::resolve(code),
        })
    }

    /// `{"error": message}` with the given code.
    pub fn error(message: impl Into<String>, code: impl Into<StatusSpec>) -> Self {
        Reply::Json {
            data: json!({ "error": message.into() }),
            code: RestCode::resolve(code),
        }
    }

    pub fn attachment(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Reply::Attachment {
            filename: filename.into(),
            bytes,
        }
    }

    pub fn text(body: impl Into<String>) -> Self {
        Reply::Text { body: body.into() }
    }
}

impl From<Value> for Reply {
    fn from(data: Value) -> Self {
        Reply::Json {
            data,
            code: RestCode::Ok,
        }
    }
}

impl From<(Value, RestCode)> for Reply {
    fn from((data, code): (Value, RestCode)) -> Self {
        Reply::Json { data, code }
    }
}

impl From<String> for Reply {
    fn from(data: String) -> Self {
        Reply::from(Value::String(data))
    }
}

/// Final result of a bound call: an envelope or a non-JSON reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Envelope(RestResponse),
    Attachment { filename: String, bytes: Vec<u8> },
    Text { body: String },
}

impl Outcome {
    pub fn status(&self) -> u16 {
        match self {
            Outcome::Envelope(resp) => resp.code,
            Outcome::Attachment { .. } | Outcome::Text { .. } => 200,
        }
    }

    pub fn envelope(&self) -> Option<&RestResponse> {
        match self {
            Outcome::Envelope(resp) => Some(resp),
            _ => None,
        }
    }
}

impl From<Reply> for Outcome {
    fn from(reply: Reply) -> Self {
        match reply {
            Reply::Json { data, code } => Outcome::Envelope(RestResponse::create(data, code)),
            Reply::Attachment { filename, bytes } => Outcome::Attachment { filename, bytes },
            Reply::Text { body } => Outcome::Text { body },
        }
    }
}
