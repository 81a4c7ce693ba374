// Command-line surface. Flags and `EASE_*` variables override whatever the
// config file set; the config file is the lowest layer.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

use ease_upload::config::UploadConfig;
use ease_upload::credentials::Secret;

#[derive(Parser)]
#[command(name = "ease-upload")]
#[command(about = "Upload, sign and publish mobile builds to EAS / Apperian", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (default: <config dir>/ease-upload/config.toml)
    #[arg(long, global = true, env = "EASE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Layer flag and environment overrides over a loaded config.
    pub fn apply(&self, config: &mut UploadConfig) {
        self.connection.apply(config);
        if let Commands::Publish(args) = &self.command {
            args.apply(config);
        }
    }
}

/// Default tracing filter for the given `-v` count, used when `RUST_LOG` is unset.
pub fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

#[derive(Args)]
pub struct ConnectionArgs {
    /// PRODUCTION, EUROPE or CUSTOM
    #[arg(long, global = true, env = "EASE_ENVIRONMENT")]
    pub environment: Option<String>,

    #[arg(long, global = true, env = "EASE_CUSTOM_EAS_URL")]
    pub custom_eas_url: Option<String>,

    #[arg(long, global = true, env = "EASE_CUSTOM_APPERIAN_URL")]
    pub custom_apperian_url: Option<String>,

    #[arg(short, long, global = true, env = "EASE_USERNAME")]
    pub username: Option<String>,

    #[arg(long, global = true, env = "EASE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

impl ConnectionArgs {
    pub fn apply(&self, config: &mut UploadConfig) {
        let fields = [
            (&self.environment, &mut config.environment),
            (&self.custom_eas_url, &mut config.custom_eas_url),
            (&self.custom_apperian_url, &mut config.custom_apperian_url),
            (&self.username, &mut config.username),
        ];
        for (arg, field) in fields {
            if let Some(v) = arg {
                *field = v.clone();
            }
        }
        if let Some(v) = &self.password {
            config.password = Secret::new(v.as_str());
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload the build artifact and publish a new version
    Publish(PublishArgs),

    /// List applications available to the user
    Apps {
        /// Choose one interactively and print its id
        #[arg(long)]
        pick: bool,
    },

    /// List signing credentials, filtered by the application's platform
    Credentials {
        #[arg(long)]
        app_id: Option<String>,

        #[arg(long)]
        pick: bool,
    },

    /// Check that both services accept the credentials
    TestConnection,

    /// List known environments
    Environments,
}

#[derive(Args)]
pub struct PublishArgs {
    /// Directory the file pattern is resolved against
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    #[arg(long)]
    pub app_id: Option<String>,

    /// Glob pattern matching exactly one build output, e.g. "build/*.ipa"
    #[arg(long)]
    pub filename: Option<String>,

    #[arg(long)]
    pub author: Option<String>,

    #[arg(long = "app-version")]
    pub version: Option<String>,

    #[arg(long)]
    pub version_notes: Option<String>,

    /// Sign with the given credential after upload
    #[arg(long)]
    pub sign: bool,

    #[arg(long)]
    pub credential: Option<String>,

    /// Enable the application after upload
    #[arg(long)]
    pub enable: bool,
}

impl PublishArgs {
    pub fn apply(&self, config: &mut UploadConfig) {
        let fields = [
            (&self.app_id, &mut config.app_id),
            (&self.filename, &mut config.filename),
            (&self.author, &mut config.author),
            (&self.version, &mut config.version),
            (&self.version_notes, &mut config.version_notes),
            (&self.credential, &mut config.credential),
        ];
        for (arg, field) in fields {
            if let Some(v) = arg {
                *field = v.clone();
            }
        }
        config.sign_app |= self.sign;
        config.enable_app |= self.enable;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use clap::CommandFactory;

    fn from_file() -> UploadConfig {
        UploadConfig {
            environment: "EUROPE".into(),
            username: "file-user".into(),
            app_id: "file-app".into(),
            author: "file-author".into(),
            ..Default::default()
        }
    }

    fn overridden(args: &[&str]) -> UploadConfig {
        let cli = Cli::try_parse_from(args).unwrap();
        let mut config = from_file();
        cli.apply(&mut config);
        config
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_config_file() {
        let config = overridden(&[
            "ease-upload", "--username", "u", "publish", "--app-id", "a", "--sign",
        ]);
        assert_eq!(config.username, "u");
        assert_eq!(config.app_id, "a");
        assert!(config.sign_app);
        assert!(!config.enable_app);
        // Untouched fields keep the file's values.
        assert_eq!(config.environment, "EUROPE");
        assert_eq!(config.author, "file-author");
    }

    #[test]
    fn global_flags_accepted_after_subcommand() {
        let config = overridden(&["ease-upload", "apps", "--environment", "PRODUCTION"]);
        assert_eq!(config.environment, "PRODUCTION");
        assert_eq!(config.app_id, "file-app");
    }

    #[test]
    fn app_version_is_separate_from_clap_version() {
        let config = overridden(&["ease-upload", "publish", "--app-version", "2.4.1"]);
        assert_eq!(config.version, "2.4.1");

        let err = Cli::try_parse_from(["ease-upload", "--version"]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);
    }

    #[test]
    fn password_from_environment_is_not_trimmed() {
        std::env::set_var("EASE_PASSWORD", "  pass word ");
        let cli = Cli::try_parse_from(["ease-upload", "test-connection"]);
        std::env::remove_var("EASE_PASSWORD");

        let mut config = from_file();
        cli.unwrap().apply(&mut config);
        let config = config.trimmed();
        assert_eq!(config.password.expose(), "  pass word ");
    }

    #[test]
    fn verbosity_levels() {
        assert_eq!(log_level(0), "warn");
        assert_eq!(log_level(1), "info");
        assert_eq!(log_level(2), "debug");
        assert_eq!(log_level(7), "debug");

        let cli = Cli::try_parse_from(["ease-upload", "-vv", "environments"]).unwrap();
        assert_eq!(log_level(cli.verbose), "debug");
    }
}
