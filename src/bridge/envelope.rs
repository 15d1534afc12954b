use crate::error::RequestError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Correlation id answered when a frame cannot be parsed far enough to
/// recover its own id.
pub const MALFORMED_FRAME_ID: u64 = 0;

/// Page → extension call frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEnvelope {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    pub code: String,
    pub message: String,
}

/// Extension → page reply frame. Exactly one of `result` / `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError>,
}

impl ReplyEnvelope {
    #[must_use]
    pub fn ok(id: u64, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    #[must_use]
    pub fn err(id: u64, error: &RequestError) -> Self {
        Self {
            id,
            result: None,
            error: Some(WireError {
                code: error.code().to_string(),
                message: error.detail(),
            }),
        }
    }

    #[must_use]
    pub fn from_result(id: u64, result: Result<Value, RequestError>) -> Self {
        match result {
            Ok(value) => Self::ok(id, value),
            Err(error) => Self::err(id, &error),
        }
    }

    /// Rebuild the call outcome on the page side.
    pub fn into_result(self) -> Result<Value, RequestError> {
        match (self.result, self.error) {
            (_, Some(error)) => Err(RequestError::from_wire(&error.code, error.message)),
            (Some(value), None) => Ok(value),
            (None, None) => Ok(Value::Null),
        }
    }

    #[must_use]
    pub fn to_json(&self) -> String {
        // A struct of strings, integers and JSON values always serializes.
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"id":{},"error":{{"code":"unavailable","message":"reply encoding failed"}}}}"#,
                self.id
            )
        })
    }
}
