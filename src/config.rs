// Upload settings: target environment, account and publish options, loaded
// from TOML and overridden from the command line. Validation never panics.

use regex::{Captures, Regex};
use reqwest::Url;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::credentials::{Credentials, Secret};

/// Target environment: one of the hosted regions, or explicit URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Production,
    Europe,
    Custom { eas_url: String, apperian_url: String },
}

/// Names accepted for the environment setting, with their display titles.
pub const ENVIRONMENTS: &[(&str, &str)] = &[
    ("PRODUCTION", "North America"),
    ("EUROPE", "Europe"),
    ("CUSTOM", "Custom URLs"),
];

impl Environment {
    /// Resolve an environment name. Unknown names fail closed; `CUSTOM`
    /// requires both URLs to be well-formed.
    pub fn resolve(name: &str, custom_eas_url: &str, custom_apperian_url: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "PRODUCTION" => Some(Environment::Production),
            "EUROPE" => Some(Environment::Europe),
            "CUSTOM" if is_valid_url(custom_eas_url) && is_valid_url(custom_apperian_url) => {
                Some(Environment::Custom {
                    eas_url: custom_eas_url.trim().to_string(),
                    apperian_url: custom_apperian_url.trim().to_string(),
                })
            }
            _ => None,
        }
    }

    pub fn eas_url(&self) -> &str {
        match self {
            Environment::Production => "https://easesvc.apperian.com/ease.interface.php",
            Environment::Europe => "https://easesvc.apperian.eu/ease.interface.php",
            Environment::Custom { eas_url, .. } => eas_url,
        }
    }

    pub fn apperian_url(&self) -> &str {
        match self {
            Environment::Production => "https://na01ws.apperian.com",
            Environment::Europe => "https://eu01ws.apperian.eu",
            Environment::Custom { apperian_url, .. } => apperian_url,
        }
    }
}

/// Absolute http(s) URL with a host.
pub fn is_valid_url(s: &str) -> bool {
    match Url::parse(s.trim()) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

/// Everything one upload needs. Loaded from TOML and overridden from the
/// command line; the password is never written back out.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub environment: String,
    pub custom_eas_url: String,
    pub custom_apperian_url: String,
    pub username: String,
    pub password: Secret,
    pub app_id: String,
    pub filename: String,
    pub author: String,
    pub version: String,
    pub version_notes: String,
    pub sign_app: bool,
    pub credential: String,
    pub enable_app: bool,
}

impl UploadConfig {
    /// Load from `path`, or from the default location when `None`. A missing
    /// file yields the default configuration.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);
        if !path.exists() {
            return Ok(UploadConfig::default());
        }
        let content = std::fs::read_to_string(&path)?;
        let config: UploadConfig = toml::from_str(&content)?;
        Ok(config.trimmed())
    }

    pub fn config_path() -> PathBuf {
        match dirs::config_dir() {
            Some(dir) => dir.join("ease-upload").join("config.toml"),
            None => PathBuf::from(".ease-upload/config.toml"),
        }
    }

    /// Strip surrounding whitespace from every text field except the password.
    pub fn trimmed(mut self) -> Self {
        for field in [
            &mut self.environment,
            &mut self.custom_eas_url,
            &mut self.custom_apperian_url,
            &mut self.username,
            &mut self.app_id,
            &mut self.filename,
            &mut self.author,
            &mut self.version,
            &mut self.version_notes,
            &mut self.credential,
        ] {
            let t = field.trim();
            if t.len() != field.len() {
                *field = t.to_string();
            }
        }
        self
    }

    pub fn resolve_environment(&self) -> Option<Environment> {
        Environment::resolve(
            &self.environment,
            &self.custom_eas_url,
            &self.custom_apperian_url,
        )
    }

    /// Check everything authentication depends on; the error is a reason fit
    /// for display.
    pub fn validate(&self) -> Result<Environment, String> {
        if self.username.is_empty() {
            return Err("Username is required".to_string());
        }
        if self.environment.is_empty() {
            return Err("Production environment is required".to_string());
        }
        self.resolve_environment().ok_or_else(|| {
            if self.environment.eq_ignore_ascii_case("CUSTOM") {
                "Custom environment needs valid EAS and Apperian URLs".to_string()
            } else {
                format!("Unknown environment '{}'", self.environment)
            }
        })
    }

    pub fn validate_configuration(&self) -> bool {
        self.validate().is_ok()
    }

    /// Ready for a full upload: auth fields plus application id and file pattern.
    pub fn check_ok(&self) -> bool {
        !self.app_id.is_empty() && self.validate_configuration() && !self.filename.is_empty()
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone())
    }

    /// Expand `${VAR}` / `$VAR` references in the build-facing fields.
    /// Unknown variables are kept as written.
    pub fn expand<F>(&self, vars: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut out = self.clone();
        for field in [
            &mut out.username,
            &mut out.app_id,
            &mut out.filename,
            &mut out.author,
            &mut out.version,
            &mut out.version_notes,
        ] {
            *field = expand_vars(field, &vars);
        }
        out
    }
}

fn var_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_.]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
            .expect("valid variable pattern")
    })
}

fn expand_vars<F>(input: &str, vars: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    var_pattern()
        .replace_all(input, |caps: &Captures| {
            let name = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
            vars(name).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn custom(eas: &str, apperian: &str) -> UploadConfig {
        UploadConfig {
            environment: "CUSTOM".into(),
            custom_eas_url: eas.into(),
            custom_apperian_url: apperian.into(),
            username: "bob".into(),
            ..Default::default()
        }
    }

    #[test]
    fn fixed_environments_resolve() {
        let env = Environment::resolve("production", "", "").unwrap();
        assert_eq!(env, Environment::Production);
        assert!(env.eas_url().starts_with("https://easesvc.apperian.com"));
        assert_eq!(
            Environment::resolve("EUROPE", "", "").unwrap().apperian_url(),
            "https://eu01ws.apperian.eu"
        );
    }

    #[test]
    fn unknown_environment_fails_closed() {
        assert!(Environment::resolve("STAGING", "", "").is_none());
        assert!(Environment::resolve("", "", "").is_none());
    }

    #[test]
    fn custom_keeps_urls() {
        let cfg = custom("https://eas.local/rpc", "http://apperian.local:8080");
        let env = cfg.validate().unwrap();
        assert_eq!(env.eas_url(), "https://eas.local/rpc");
        assert_eq!(env.apperian_url(), "http://apperian.local:8080");
    }

    #[test]
    fn validation_rules() {
        assert!(custom("https://a.example", "https://b.example").validate_configuration());

        let mut no_user = custom("https://a.example", "https://b.example");
        no_user.username.clear();
        assert!(!no_user.validate_configuration());

        assert!(!custom("not a url", "https://b.example").validate_configuration());
        assert!(!custom("https://a.example", "").validate_configuration());
        assert!(!custom("ftp://a.example", "https://b.example").validate_configuration());

        let mut unknown = custom("", "");
        unknown.environment = "MARS".into();
        assert_eq!(unknown.validate().unwrap_err(), "Unknown environment 'MARS'");

        let mut fixed = custom("", "");
        fixed.environment = "PRODUCTION".into();
        assert!(fixed.validate_configuration());
    }

    #[test]
    fn check_ok_needs_app_and_pattern() {
        let mut cfg = custom("https://a.example", "https://b.example");
        assert!(!cfg.check_ok());
        cfg.app_id = "app-1".into();
        assert!(!cfg.check_ok());
        cfg.filename = "*.ipa".into();
        assert!(cfg.check_ok());
    }

    #[test]
    fn expands_build_variables() {
        let vars: HashMap<&str, &str> = [("BUILD_NUMBER", "42"), ("USER", "ci")].into();
        let cfg = UploadConfig {
            username: "$USER".into(),
            filename: "out/app-${BUILD_NUMBER}.ipa".into(),
            version_notes: "build ${BUILD_NUMBER} ($MISSING)".into(),
            ..Default::default()
        };
        let out = cfg.expand(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(out.username, "ci");
        assert_eq!(out.filename, "out/app-42.ipa");
        assert_eq!(out.version_notes, "build 42 ($MISSING)");
    }

    #[test]
    fn loads_and_trims_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "environment = \" EUROPE \"\nusername = \"bob \"\npassword = \" pw \"\nsign_app = true\n",
        )
        .unwrap();
        let cfg = UploadConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.environment, "EUROPE");
        assert_eq!(cfg.username, "bob");
        assert_eq!(cfg.password.expose(), " pw ");
        assert!(cfg.sign_app);
        assert!(!cfg.enable_app);
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = UploadConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert!(cfg.username.is_empty());
    }
}
