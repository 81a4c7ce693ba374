// Upload orchestration: validate, find the artifact, authenticate, then
// update/upload/publish on EAS and optionally sign and enable on Apperian.
// Each step writes one status line to the build log.

use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::api::{Endpoint, EndpointPair, Service};
use crate::artifact::search_for_artifact;
use crate::config::UploadConfig;
use crate::credentials::{CredentialLookup, Credentials};
use crate::envelope::{Payload, Response, ERROR_CODE_SESSION_EXPIRED};
use crate::error::{Error, Result};
use crate::model::{Application, Metadata, PlatformType, SigningCredential};

/// Build both endpoints for the configured environment.
pub fn build_endpoints(config: &UploadConfig) -> Result<EndpointPair> {
    let env = config.validate().map_err(Error::Config)?;
    let eas = Endpoint::new(Service::Eas, env.eas_url())?;
    let apperian = Endpoint::new(Service::Apperian, env.apperian_url())?;
    Ok(EndpointPair::new(eas, apperian))
}

/// Authenticated endpoints plus the credentials used, kept so an expired
/// session can be renewed.
#[derive(Debug)]
pub struct Session {
    endpoints: EndpointPair,
    credentials: Credentials,
}

impl Session {
    pub fn endpoints(&self) -> &EndpointPair {
        &self.endpoints
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Run one call against `service`. If the server reports an expired
    /// session, authenticate once more and repeat the call once.
    pub fn call<T, F>(&mut self, service: Service, f: F) -> Result<T>
    where
        T: Payload,
        F: Fn(&Endpoint) -> Result<Response<T>>,
    {
        let response = f(self.endpoints.get(service))?;
        if response.error_code() != Some(ERROR_CODE_SESSION_EXPIRED) {
            return response.into_result();
        }

        info!(%service, "session expired, authenticating again");
        if !self.credentials.authenticate(self.endpoints.get_mut(service)) {
            let reason = self.credentials.last_error().unwrap_or("No access");
            return Err(Error::Auth(format!("{}: {}", service, reason)));
        }
        f(self.endpoints.get(service))?.into_result()
    }

    pub fn close(self) {
        self.endpoints.close();
    }
}

/// Authenticate against the requested sides. Both sides are attempted even
/// when the first fails; any failure returns every reason and no endpoints.
pub fn try_authenticate(
    need_eas: bool,
    need_apperian: bool,
    config: &UploadConfig,
    lookup: &dyn CredentialLookup,
) -> std::result::Result<Session, String> {
    let mut endpoints = build_endpoints(config).map_err(|e| e.to_string())?;
    let mut credentials = config.credentials();

    let mut errors = Vec::new();
    for (needed, service) in [(need_eas, Service::Eas), (need_apperian, Service::Apperian)] {
        if !needed {
            continue;
        }
        let endpoint = endpoints.get_mut(service);
        credentials.lookup_stored_credentials(endpoint, lookup);
        if !credentials.authenticate(endpoint) {
            let reason = credentials.last_error().unwrap_or("No access");
            errors.push(format!("{}: {}", service, reason));
        }
    }

    if !errors.is_empty() {
        endpoints.close();
        return Err(errors.join("; "));
    }
    Ok(Session {
        endpoints,
        credentials,
    })
}

/// Authenticate against both services.
pub fn test_connection(
    config: &UploadConfig,
    lookup: &dyn CredentialLookup,
) -> std::result::Result<&'static str, String> {
    if !config.validate_configuration() {
        return Err("Username and production environment should be provided".to_string());
    }
    let session = try_authenticate(true, true, config, lookup)?;
    session.close();
    Ok("Connection OK")
}

/// Applications visible to the configured user.
pub fn list_applications(
    config: &UploadConfig,
    lookup: &dyn CredentialLookup,
) -> std::result::Result<Vec<Application>, String> {
    if !config.validate_configuration() {
        return Err("credentials required".to_string());
    }
    let mut session = try_authenticate(true, false, config, lookup)?;
    let apps = session.call(Service::Eas, Endpoint::list_applications);
    session.close();
    apps.map(|list| list.applications).map_err(|e| e.to_string())
}

/// Signing credentials, restricted to the platform of `app_id` when given.
#[derive(Debug, Clone)]
pub struct CredentialListing {
    pub platform: Option<PlatformType>,
    pub credentials: Vec<SigningCredential>,
}

pub fn list_signing_credentials(
    config: &UploadConfig,
    app_id: Option<&str>,
    lookup: &dyn CredentialLookup,
) -> std::result::Result<CredentialListing, String> {
    if !config.validate_configuration() {
        return Err("credentials required".to_string());
    }
    let app_id = app_id.map(str::trim).filter(|id| !id.is_empty());
    let mut session = try_authenticate(app_id.is_some(), true, config, lookup)?;

    let result = credential_listing(&mut session, app_id);
    session.close();
    result.map_err(|e| e.to_string())
}

fn credential_listing(session: &mut Session, app_id: Option<&str>) -> Result<CredentialListing> {
    let platform = match app_id {
        // An unreadable app list just means no filter.
        Some(id) => match session.call(Service::Eas, Endpoint::list_applications) {
            Ok(list) => list
                .applications
                .iter()
                .find(|app| app.id == id)
                .and_then(Application::platform),
            Err(e) => {
                warn!("could not resolve platform for {}: {}", id, e);
                None
            }
        },
        None => None,
    };
    let all = session.call(Service::Apperian, Endpoint::list_credentials)?;
    let credentials = all
        .credentials
        .into_iter()
        .filter(|c| platform.map_or(true, |p| c.platform == p))
        .collect();
    Ok(CredentialListing {
        platform,
        credentials,
    })
}

/// Summary of a successful publish run.
#[derive(Debug, Clone)]
pub struct PublishReport {
    pub file: PathBuf,
    pub app_id: String,
    pub status: Option<String>,
    pub signed: bool,
    pub enabled: bool,
}

/// Full upload sequence. Stops at the first failing step; endpoints are
/// released whatever the outcome.
pub fn publish(
    config: &UploadConfig,
    workspace: &Path,
    lookup: &dyn CredentialLookup,
    log: &mut dyn Write,
) -> Result<PublishReport> {
    if let Err(reason) = config.validate() {
        return Err(Error::Config(reason));
    }
    if !config.check_ok() {
        return Err(Error::Config(
            "Application id and file pattern are required".to_string(),
        ));
    }

    let file = search_for_artifact(workspace, &config.filename)?;
    writeln!(log, "Found {}", file.display())?;

    let need_apperian = config.sign_app || config.enable_app;
    let mut session = try_authenticate(true, need_apperian, config, lookup).map_err(Error::Auth)?;
    writeln!(log, "Authenticated as {}", config.username)?;

    let result = run_steps(&mut session, config, file, log);
    session.close();
    result
}

fn run_steps(
    session: &mut Session,
    config: &UploadConfig,
    file: PathBuf,
    log: &mut dyn Write,
) -> Result<PublishReport> {
    let apps = session.call(Service::Eas, Endpoint::list_applications)?;
    let app = apps
        .applications
        .into_iter()
        .find(|a| a.id == config.app_id)
        .ok_or_else(|| Error::NotFound(format!("Application '{}' not found", config.app_id)))?;
    writeln!(log, "Updating {}", app.label())?;

    let update = session.call(Service::Eas, |e| e.update(&app.id))?;

    writeln!(log, "Uploading {}", file.display())?;
    let upload = session
        .endpoints()
        .eas()
        .upload_file(&update.file_upload_url, &file)?;
    let file_id = match upload.file_id {
        Some(ref id) if !upload.has_error() => id.clone(),
        _ => return Err(Error::Upload(upload.error_message())),
    };

    let metadata = Metadata {
        author: config.author.clone(),
        version: config.version.clone(),
        version_notes: config.version_notes.clone(),
    };
    let published = session.call(Service::Eas, |e| {
        e.publish(&update.transaction_id, &metadata, &file_id)
    })?;
    writeln!(
        log,
        "Published {} ({})",
        published.app_id,
        published.status.as_deref().unwrap_or("ok")
    )?;

    let mut report = PublishReport {
        file,
        app_id: published.app_id,
        status: published.status,
        signed: false,
        enabled: false,
    };

    if config.sign_app {
        let credential = find_signing_credential(session, &config.credential, app.platform())?;
        let signed = session.call(Service::Apperian, |e| {
            e.sign_application(&report.app_id, &credential.credential_id)
        })?;
        writeln!(
            log,
            "Signed with '{}' ({})",
            credential.description,
            signed.status.as_deref().unwrap_or("ok")
        )?;
        report.signed = true;
    }

    if config.enable_app {
        session.call(Service::Apperian, |e| e.enable_application(&report.app_id))?;
        writeln!(log, "Enabled {}", report.app_id)?;
        report.enabled = true;
    }

    Ok(report)
}

fn find_signing_credential(
    session: &mut Session,
    credential_id: &str,
    platform: Option<PlatformType>,
) -> Result<SigningCredential> {
    let all = session.call(Service::Apperian, Endpoint::list_credentials)?;
    all.credentials
        .into_iter()
        .filter(|c| platform.map_or(true, |p| c.platform == p))
        .find(|c| c.credential_id == credential_id)
        .ok_or_else(|| {
            let scope = platform.map_or(String::new(), |p| format!(" for {}", p));
            Error::NotFound(format!(
                "Signing credential '{}' not found{}",
                credential_id, scope
            ))
        })
}
