use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Largest request accepted on the socket.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Numeric error codes carried in `error.code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    RateLimited,
    AlertNotFound,
    ConfigError,
}

impl ErrorCode {
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::RateLimited => 102,
            Self::AlertNotFound => 103,
            Self::ConfigError => 104,
        }
    }

    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            -32700 => Some(Self::ParseError),
            -32600 => Some(Self::InvalidRequest),
            -32601 => Some(Self::MethodNotFound),
            -32602 => Some(Self::InvalidParams),
            -32603 => Some(Self::InternalError),
            102 => Some(Self::RateLimited),
            103 => Some(Self::AlertNotFound),
            104 => Some(Self::ConfigError),
            _ => None,
        }
    }
}

/// A request or handler failure, before it is put on the wire.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ProtocolError {
    pub code: ErrorCode,
    pub message: String,
}

impl ProtocolError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

/// A parsed client request. `params` is always an object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    pub method: String,
    pub params: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Request {
    #[must_use]
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            params: Map::new(),
            id: None,
        }
    }

    #[must_use]
    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    /// Parses one raw message.
    ///
    /// # Errors
    ///
    /// `ParseError` if the text is not JSON, `InvalidRequest` if it is not an
    /// object with a string `method` and (when present) object `params`.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| ProtocolError::new(ErrorCode::ParseError, format!("invalid JSON: {e}")))?;
        let Value::Object(mut object) = value else {
            return Err(ProtocolError::new(
                ErrorCode::InvalidRequest,
                "request must be a JSON object",
            ));
        };

        let method = match object.remove("method") {
            Some(Value::String(method)) => method,
            _ => {
                return Err(ProtocolError::new(
                    ErrorCode::InvalidRequest,
                    "missing or non-string 'method'",
                ))
            }
        };

        let params = match object.remove("params") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(params)) => params,
            Some(_) => {
                return Err(ProtocolError::new(
                    ErrorCode::InvalidRequest,
                    "'params' must be an object",
                ))
            }
        };

        let id = match object.remove("id") {
            Some(Value::String(id)) => Some(id),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        Ok(Self { method, params, id })
    }

    /// Optional boolean parameter.
    ///
    /// # Errors
    ///
    /// `InvalidParams` if the key is present with another type.
    pub fn bool_param(&self, key: &str) -> Result<Option<bool>, ProtocolError> {
        match self.params.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(ProtocolError::invalid_params(format!(
                "'{key}' must be a boolean"
            ))),
        }
    }

    /// Optional string parameter.
    ///
    /// # Errors
    ///
    /// `InvalidParams` if the key is present with another type.
    pub fn str_param(&self, key: &str) -> Result<Option<&str>, ProtocolError> {
        match self.params.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(ProtocolError::invalid_params(format!(
                "'{key}' must be a string"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: i32,
}

/// Wire response. Exactly one of `result` and `error` is set, matching `success`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Response {
    #[must_use]
    pub fn ok(result: Value) -> Self {
        Self {
            success: true,
            timestamp: chrono::Utc::now().timestamp(),
            result: Some(result),
            error: None,
        }
    }

    #[must_use]
    pub fn err(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            timestamp: chrono::Utc::now().timestamp(),
            result: None,
            error: Some(ErrorBody {
                message: message.into(),
                code: code.code(),
            }),
        }
    }

    #[must_use]
    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error.as_ref().and_then(|e| ErrorCode::from_code(e.code))
    }

    /// Serializes to one JSON line.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"success":false,"timestamp":{},"error":{{"message":"serialization failed: {}","code":{}}}}}"#,
                self.timestamp,
                e.to_string().replace('"', "'"),
                ErrorCode::InternalError.code()
            )
        })
    }
}

impl From<ProtocolError> for Response {
    fn from(err: ProtocolError) -> Self {
        Self::err(err.code, err.message)
    }
}

impl From<Result<Value, ProtocolError>> for Response {
    fn from(result: Result<Value, ProtocolError>) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(err) => err.into(),
        }
    }
}
