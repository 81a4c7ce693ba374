// Endpoint module: a small blocking HTTP client bound to one service URL.
// Every call blocks until the round-trip completes; nothing is retried here.

use reqwest::blocking::{multipart, Client};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

use crate::envelope::{parse_response, Payload, Request, Response, RpcMethod, X_TOKEN_HEADER};
use crate::error::{Error, Result};
use crate::model::{
    ApplicationList, EnableResult, Metadata, PublishResult, SignResult, SigningCredentialList,
    UpdateResult, UploadResult,
};

/// Multipart field name the upload service expects the binary under.
pub const UPLOAD_FIELD: &str = "LUuploadFile";

const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// Which of the two services an endpoint talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Eas,
    Apperian,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Service::Eas => "ease",
            Service::Apperian => "apperian",
        })
    }
}

/// A service URL plus the HTTP transport used to reach it. The session token,
/// once set, is sent in the `X-TOKEN` header on every later call.
pub struct Endpoint {
    service: Service,
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("service", &self.service)
            .field("base_url", &self.base_url)
            .field("authenticated", &self.token.is_some())
            .finish()
    }
}

impl Endpoint {
    pub fn new(service: Service, base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Endpoint {
            service,
            client,
            base_url: base_url.into(),
            token: None,
        })
    }

    pub fn service(&self) -> Service {
        self.service
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_token(&mut self, token: &str) {
        self.token = Some(token.to_string());
    }

    pub fn clear_token(&mut self) {
        self.token = None;
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn auth_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(t) = &self.token {
            let val = HeaderValue::from_str(t)
                .map_err(|_| Error::Auth("session token is not a valid header value".into()))?;
            headers.insert(X_TOKEN_HEADER, val);
        }
        Ok(headers)
    }

    /// POST a request to the base URL and decode the whole body as the
    /// response envelope for `T`.
    pub fn call<T>(&self, request: &Request) -> Result<Response<T>>
    where
        T: Payload + for<'de> Deserialize<'de>,
    {
        debug!(service = %self.service, method = %request.method(), id = request.id(), "rpc call");
        let body = serde_json::to_vec(request)?;
        let res = self
            .client
            .post(&self.base_url)
            .headers(self.auth_headers()?)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(body)
            .send()?;
        let status = res.status();
        let text = res.text()?;
        debug!(service = %self.service, id = request.id(), %status, "rpc response");
        parse_response(&text)
    }

    /// Upload a file as a single multipart part. A non-200 status turns the
    /// raw body into the error message; only a 200 body is parsed as JSON.
    pub fn upload_file(&self, upload_url: &str, file_path: &Path) -> Result<UploadResult> {
        let file = File::open(file_path)?;
        let length = file.metadata()?.len();
        let file_name = file_path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("application.bin")
            .to_string();

        let part = multipart::Part::reader_with_length(file, length)
            .file_name(file_name)
            .mime_str("application/octet-stream")?;
        let form = multipart::Form::new().part(UPLOAD_FIELD, part);

        info!(url = upload_url, file = %file_path.display(), "uploading");
        let res = self
            .client
            .post(upload_url)
            .headers(self.auth_headers()?)
            .multipart(form)
            .send()?;
        let status = res.status();
        let body = res.text()?;
        if status != StatusCode::OK {
            debug!(%status, "upload rejected");
            return Ok(UploadResult::failed(body));
        }
        Ok(serde_json::from_str(&body)?)
    }

    pub fn list_applications(&self) -> Result<Response<ApplicationList>> {
        self.call(&Request::new(RpcMethod::GetList, vec![]))
    }

    /// Open an update transaction for an existing application.
    pub fn update(&self, app_id: &str) -> Result<Response<UpdateResult>> {
        self.call(&Request::new(RpcMethod::Update, vec![json!({ "appID": app_id })]))
    }

    pub fn publish(
        &self,
        transaction_id: &str,
        metadata: &Metadata,
        file_id: &str,
    ) -> Result<Response<PublishResult>> {
        let params: Vec<Value> = vec![json!({
            "transactionID": transaction_id,
            "EASEmetadata": metadata,
            "files": { "application": file_id },
        })];
        self.call(&Request::new(RpcMethod::Publish, params))
    }

    pub fn list_credentials(&self) -> Result<Response<SigningCredentialList>> {
        self.call(&Request::new(RpcMethod::ListCredentials, vec![]))
    }

    pub fn sign_application(
        &self,
        app_id: &str,
        credential_id: &str,
    ) -> Result<Response<SignResult>> {
        self.call(&Request::new(
            RpcMethod::SignApplication,
            vec![json!(app_id), json!(credential_id)],
        ))
    }

    pub fn enable_application(&self, app_id: &str) -> Result<Response<EnableResult>> {
        self.call(&Request::new(
            RpcMethod::UpdateApplication,
            vec![json!(app_id), json!({ "enabled": true })],
        ))
    }

    /// Release the HTTP transport. Consuming `self` makes a second close
    /// impossible.
    pub fn close(self) {
        debug!(service = %self.service, url = %self.base_url, "closing endpoint");
        drop(self.client);
    }
}

/// The EAS and Apperian endpoints of one environment.
#[derive(Debug)]
pub struct EndpointPair {
    eas: Endpoint,
    apperian: Endpoint,
}

impl EndpointPair {
    pub fn new(eas: Endpoint, apperian: Endpoint) -> Self {
        EndpointPair { eas, apperian }
    }

    pub fn eas(&self) -> &Endpoint {
        &self.eas
    }

    pub fn apperian(&self) -> &Endpoint {
        &self.apperian
    }

    pub fn get(&self, service: Service) -> &Endpoint {
        match service {
            Service::Eas => &self.eas,
            Service::Apperian => &self.apperian,
        }
    }

    pub(crate) fn get_mut(&mut self, service: Service) -> &mut Endpoint {
        match service {
            Service::Eas => &mut self.eas,
            Service::Apperian => &mut self.apperian,
        }
    }

    pub fn close(self) {
        self.eas.close();
        self.apperian.close();
    }
}
