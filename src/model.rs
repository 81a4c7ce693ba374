// Typed payloads exchanged with the EAS and Apperian services. Each result
// type says through `Payload` when it stands for a failure on its own.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::envelope::Payload;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthenticateResult {
    #[serde(default)]
    pub token: Option<String>,
}

impl Payload for AuthenticateResult {
    fn failure_hint(&self) -> Option<&'static str> {
        match self.token.as_deref() {
            Some(token) if !token.is_empty() => None,
            _ => Some("No access"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationList {
    #[serde(default)]
    pub applications: Vec<Application>,
}

impl Payload for ApplicationList {}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Application {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, rename = "type")]
    pub app_type: String,
    #[serde(default)]
    pub status: Option<i64>,
    #[serde(default, rename = "shortdescription")]
    pub short_description: Option<String>,
}

impl Application {
    /// Platform inferred from the service's free-form type label.
    pub fn platform(&self) -> Option<PlatformType> {
        if self.app_type.contains("Android App") {
            Some(PlatformType::Android)
        } else if self.app_type.contains("iOS App") {
            Some(PlatformType::Ios)
        } else {
            None
        }
    }

    /// Label used when the application is offered as a selectable option.
    pub fn label(&self) -> String {
        format!("{} v:{} type:{}", self.name, self.version, self.app_type)
    }
}

/// Transaction opened by an update call; the binary goes to `file_upload_url`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateResult {
    #[serde(rename = "transactionID")]
    pub transaction_id: String,
    #[serde(rename = "fileUploadURL")]
    pub file_upload_url: String,
}

impl Payload for UpdateResult {}

/// Outcome of a multipart upload. Not wrapped in the JSON-RPC envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadResult {
    #[serde(default, rename = "fileID")]
    pub file_id: Option<String>,
    #[serde(default, rename = "errorMessage")]
    pub error_message: Option<String>,
}

impl UploadResult {
    pub fn failed(message: impl Into<String>) -> Self {
        UploadResult {
            file_id: None,
            error_message: Some(message.into()),
        }
    }

    pub fn has_error(&self) -> bool {
        self.error_message.is_some() || self.file_id.as_deref().map_or(true, str::is_empty)
    }

    pub fn error_message(&self) -> String {
        match (&self.error_message, &self.file_id) {
            (Some(message), _) => message.clone(),
            (None, Some(id)) if !id.is_empty() => String::new(),
            _ => "Upload returned no file id".to_string(),
        }
    }
}

/// Release metadata attached to a publish call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Metadata {
    pub author: String,
    pub version: String,
    #[serde(rename = "versionNotes")]
    pub version_notes: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishResult {
    #[serde(rename = "appID")]
    pub app_id: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl Payload for PublishResult {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlatformType {
    #[serde(rename = "IOS", alias = "ios", alias = "iOS")]
    Ios,
    #[serde(rename = "ANDROID", alias = "android", alias = "Android")]
    Android,
}

impl PlatformType {
    pub fn display_name(&self) -> &'static str {
        match self {
            PlatformType::Ios => "iOS",
            PlatformType::Android => "Android",
        }
    }
}

impl fmt::Display for PlatformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SigningCredentialList {
    #[serde(default)]
    pub credentials: Vec<SigningCredential>,
}

impl Payload for SigningCredentialList {}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SigningCredential {
    #[serde(rename = "credentialId")]
    pub credential_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "expirationDate")]
    pub expiration_date: Option<String>,
    pub platform: PlatformType,
}

impl SigningCredential {
    /// Option label; the platform is appended only when the list is unfiltered.
    pub fn label(&self, with_platform: bool) -> String {
        let expires = self.expiration_date.as_deref().unwrap_or("-");
        if with_platform {
            format!(
                "{} exp:{} platform:{}",
                self.description, expires, self.platform
            )
        } else {
            format!("{} exp:{}", self.description, expires)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignResult {
    #[serde(default)]
    pub status: Option<String>,
}

impl Payload for SignResult {}

#[derive(Debug, Clone, Deserialize)]
pub struct EnableResult {
    #[serde(default)]
    pub updated: bool,
}

impl Payload for EnableResult {
    fn failure_hint(&self) -> Option<&'static str> {
        if self.updated {
            None
        } else {
            Some("Application was not updated")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::parse_response;

    #[test]
    fn platform_from_type_label() {
        let mut app = Application {
            id: "1".into(),
            app_type: "Android App".into(),
            ..Default::default()
        };
        assert_eq!(app.platform(), Some(PlatformType::Android));
        app.app_type = "iOS App (Universal)".into();
        assert_eq!(app.platform(), Some(PlatformType::Ios));
        app.app_type = "Web App".into();
        assert_eq!(app.platform(), None);
    }

    #[test]
    fn application_list_parses_with_extra_fields() {
        let r = parse_response::<ApplicationList>(
            r#"{"result":{"applications":[{"ID":"a1","name":"Demo","version":"2.1","type":"iOS App","bundleId":"x.y"}]}}"#,
        )
        .unwrap();
        let apps = r.into_result().unwrap().applications;
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].label(), "Demo v:2.1 type:iOS App");
    }

    #[test]
    fn credential_label() {
        let c = SigningCredential {
            credential_id: "c1".into(),
            description: "Dist".into(),
            expiration_date: Some("2027-01-31".into()),
            platform: PlatformType::Ios,
        };
        assert_eq!(c.label(false), "Dist exp:2027-01-31");
        assert_eq!(c.label(true), "Dist exp:2027-01-31 platform:iOS");
    }

    #[test]
    fn upload_result_without_file_id_is_error() {
        let r: UploadResult = serde_json::from_str("{}").unwrap();
        assert!(r.has_error());
        let ok: UploadResult = serde_json::from_str(r#"{"fileID":"f9"}"#).unwrap();
        assert!(!ok.has_error());
        assert_eq!(ok.error_message(), "");
    }

    #[test]
    fn enable_not_updated_is_error() {
        let r = parse_response::<EnableResult>(r#"{"result":{"updated":false}}"#).unwrap();
        assert!(r.has_error());
        assert_eq!(r.error_message(), "Application was not updated");
    }
}
