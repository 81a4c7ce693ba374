// Wire envelope: JSON-RPC request/response shapes shared by the EAS and
// Apperian services, the request id counter and the known error codes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};

pub const JSON_RPC_VERSION: &str = "2.0";
pub const API_VERSION: &str = "1.0";

/// Header carrying the session token on every call after authentication.
pub const X_TOKEN_HEADER: &str = "x-token";

pub const ERROR_CODE_GENERIC: i64 = 1;
pub const ERROR_CODE_SESSION_EXPIRED: i64 = 666;
pub const ERROR_CODE_MISSING_PARAMETER: i64 = -32602;

static ID_GENERATOR: AtomicU64 = AtomicU64::new(1);

/// Next request id. Process-wide, strictly increasing, never reused.
pub fn next_id() -> u64 {
    ID_GENERATOR.fetch_add(1, Ordering::Relaxed)
}

/// The fixed set of remote methods this client knows how to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RpcMethod {
    #[serde(rename = "com.apperian.eas.user.authenticateuser")]
    AuthenticateUser,
    #[serde(rename = "com.apperian.eas.apps.getlist")]
    GetList,
    #[serde(rename = "com.apperian.eas.apps.update")]
    Update,
    #[serde(rename = "com.apperian.eas.apps.publish")]
    Publish,
    #[serde(rename = "com.apperian.api.signing.listcredentials")]
    ListCredentials,
    #[serde(rename = "com.apperian.api.signing.signapplication")]
    SignApplication,
    #[serde(rename = "com.apperian.api.applications.updateapplication")]
    UpdateApplication,
}

impl RpcMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RpcMethod::AuthenticateUser => "com.apperian.eas.user.authenticateuser",
            RpcMethod::GetList => "com.apperian.eas.apps.getlist",
            RpcMethod::Update => "com.apperian.eas.apps.update",
            RpcMethod::Publish => "com.apperian.eas.apps.publish",
            RpcMethod::ListCredentials => "com.apperian.api.signing.listcredentials",
            RpcMethod::SignApplication => "com.apperian.api.signing.signapplication",
            RpcMethod::UpdateApplication => "com.apperian.api.applications.updateapplication",
        }
    }
}

impl fmt::Display for RpcMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request ready to be sent. Built once through [`Request::new`] and never
/// modified afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    method: RpcMethod,
    params: Vec<Value>,
    id: u64,
    version: &'static str,
    #[serde(rename = "apiVersion")]
    api_version: &'static str,
}

impl Request {
    pub fn new(method: RpcMethod, params: Vec<Value>) -> Self {
        Request {
            method,
            params,
            id: next_id(),
            version: JSON_RPC_VERSION,
            api_version: API_VERSION,
        }
    }

    pub fn method(&self) -> RpcMethod {
        self.method
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }
}

/// Error object of a failed call.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RpcError {
    #[serde(default = "generic_code")]
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "detailedMessage")]
    pub detailed_message: Option<String>,
}

fn generic_code() -> i64 {
    ERROR_CODE_GENERIC
}

/// Implemented by every typed result so a payload can report that it
/// represents a failure even though the server sent no error object.
pub trait Payload {
    fn failure_hint(&self) -> Option<&'static str> {
        None
    }
}

impl Payload for Value {}

/// Response envelope. Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Response<T> {
    pub result: Option<T>,
    pub error: Option<RpcError>,
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl<T: Payload> Response<T> {
    pub fn has_error(&self) -> bool {
        match (&self.error, &self.result) {
            (Some(_), _) | (None, None) => true,
            (None, Some(result)) => result.failure_hint().is_some(),
        }
    }

    /// Human-readable failure reason. Prefers the server's detailed message,
    /// then its generic message, then whatever the payload itself signals.
    /// Empty when the call succeeded.
    pub fn error_message(&self) -> String {
        if !self.has_error() {
            return String::new();
        }
        let from_error = self
            .error
            .as_ref()
            .and_then(|e| non_empty(&e.detailed_message).or(non_empty(&e.message)));
        let hint = self.result.as_ref().and_then(|r| r.failure_hint());
        from_error
            .or(hint)
            .unwrap_or("Unknown error")
            .to_string()
    }

    /// Error code reported by the server, or the generic code for failures
    /// the server did not describe.
    pub fn error_code(&self) -> Option<i64> {
        if !self.has_error() {
            return None;
        }
        Some(self.error.as_ref().map_or(ERROR_CODE_GENERIC, |e| e.code))
    }

    /// Collapse into the payload, or an [`Error::Rpc`] describing the failure.
    pub fn into_result(self) -> Result<T> {
        if self.has_error() {
            let code = self.error_code().unwrap_or(ERROR_CODE_GENERIC);
            let message = self.error_message();
            return Err(Error::Rpc { code, message });
        }
        self.result.ok_or(Error::Rpc {
            code: ERROR_CODE_GENERIC,
            message: "Unknown error".to_string(),
        })
    }
}

/// Parse a response body. A body that is not JSON is fatal for the call.
pub fn parse_response<T>(body: &str) -> Result<Response<T>>
where
    T: for<'de> Deserialize<'de>,
{
    Ok(serde_json::from_str(body)?)
}
