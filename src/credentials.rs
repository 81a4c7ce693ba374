// Credential store: username/password pair plus the session token obtained
// from the last successful authentication. Nothing here is persisted.

use anyhow::Context;
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::api::Endpoint;
use crate::envelope::{Request, RpcMethod};
use crate::model::AuthenticateResult;

/// A password that never shows up in `Debug` output or logs.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Secret(value.into())
    }

    /// Plaintext, only at the moment of use.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(****)")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoredCredential {
    pub url: String,
    pub username: String,
    pub password: Secret,
}

/// Host capability able to recover a credential saved for an endpoint.
pub trait CredentialLookup {
    fn lookup(&self, endpoint: &Endpoint) -> anyhow::Result<Option<StoredCredential>>;
}

/// Lookup that never finds anything.
pub struct NoLookup;

impl CredentialLookup for NoLookup {
    fn lookup(&self, _endpoint: &Endpoint) -> anyhow::Result<Option<StoredCredential>> {
        Ok(None)
    }
}

#[derive(Debug, Default, Deserialize)]
struct CredentialFile {
    #[serde(default)]
    credential: Vec<StoredCredential>,
}

/// Reads `[[credential]]` entries (url, username, password) from a TOML file,
/// `~/.ease-upload/credentials.toml` by default.
pub struct FileLookup {
    path: PathBuf,
}

impl FileLookup {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileLookup { path: path.into() }
    }

    pub fn default_path() -> PathBuf {
        let dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        dir.join(".ease-upload").join("credentials.toml")
    }
}

impl Default for FileLookup {
    fn default() -> Self {
        FileLookup::new(FileLookup::default_path())
    }
}

impl CredentialLookup for FileLookup {
    fn lookup(&self, endpoint: &Endpoint) -> anyhow::Result<Option<StoredCredential>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        let file: CredentialFile = toml::from_str(&data)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        Ok(file
            .credential
            .into_iter()
            .find(|c| c.url.trim_end_matches('/') == endpoint.base_url().trim_end_matches('/')))
    }
}

#[derive(Debug, Clone)]
pub struct Credentials {
    username: String,
    password: Secret,
    token: Option<String>,
    last_error: Option<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: Secret) -> Self {
        Credentials {
            username: username.into(),
            password,
            token: None,
            last_error: None,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Reason the most recent authentication failed, if it did.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Best effort: fill in a missing password from a stored credential for
    /// the same user. Lookup failures are logged and ignored.
    pub fn lookup_stored_credentials(&mut self, endpoint: &Endpoint, lookup: &dyn CredentialLookup) {
        if !self.password.is_empty() {
            return;
        }
        match lookup.lookup(endpoint) {
            Ok(Some(stored)) if stored.username == self.username => {
                debug!(url = endpoint.base_url(), "using stored password");
                self.password = stored.password;
            }
            Ok(_) => {}
            Err(e) => warn!(url = endpoint.base_url(), "credential lookup failed: {:#}", e),
        }
    }

    /// Authenticate against `endpoint`. On success the token is recorded here
    /// and attached to the endpoint; on failure both are cleared and
    /// [`last_error`](Self::last_error) explains why.
    pub fn authenticate(&mut self, endpoint: &mut Endpoint) -> bool {
        let request = Request::new(
            RpcMethod::AuthenticateUser,
            vec![json!({
                "email": self.username,
                "password": self.password.expose(),
            })],
        );

        let failure = match endpoint.call::<AuthenticateResult>(&request) {
            Err(e) => e.to_string(),
            Ok(response) if response.has_error() => response.error_message(),
            Ok(response) => match response.result.and_then(|r| r.token) {
                Some(token) => {
                    endpoint.set_token(&token);
                    self.token = Some(token);
                    self.last_error = None;
                    debug!(service = %endpoint.service(), user = %self.username, "authenticated");
                    return true;
                }
                None => "No access".to_string(),
            },
        };

        warn!(service = %endpoint.service(), user = %self.username, "authentication failed: {}", failure);
        endpoint.clear_token();
        self.token = None;
        self.last_error = Some(failure);
        false
    }
}
