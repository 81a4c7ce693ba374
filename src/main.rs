// Entrypoint for the command-line host.
// - Keeps `main` small: load config, apply overrides, hand off to the library.
// - Returns `anyhow::Result` so failures end up as one line on stderr.

mod cli;

use anyhow::{bail, Context};
use clap::Parser;
use std::io;

use ease_upload::config::UploadConfig;
use ease_upload::credentials::FileLookup;
use ease_upload::{publish, ui};

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    let default_level = cli::log_level(cli.verbose);
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let mut config = UploadConfig::load(cli.config.as_deref()).context("loading config")?;
    cli.apply(&mut config);
    let mut config = config
        .trimmed()
        .expand(|name| std::env::var(name).ok());

    let lookup = FileLookup::default();
    let mut stdout = io::stdout();

    match cli.command {
        cli::Commands::Environments => {
            ui::print_options(&mut stdout, &ui::environment_options())?;
        }
        cli::Commands::TestConnection => {
            ui::ensure_password(&mut config)?;
            match publish::test_connection(&config, &lookup) {
                Ok(msg) => println!("{}", msg),
                Err(e) => bail!(e),
            }
        }
        cli::Commands::Apps { pick } => {
            ui::ensure_password(&mut config)?;
            let choices = ui::application_options(publish::list_applications(&config, &lookup));
            if pick {
                if let Some(id) = ui::select("Application", &choices)? {
                    println!("{}", id);
                }
            } else {
                ui::print_options(&mut stdout, &choices)?;
            }
        }
        cli::Commands::Credentials { app_id, pick } => {
            ui::ensure_password(&mut config)?;
            let app_id = app_id.or_else(|| Some(config.app_id.clone()));
            let listing = publish::list_signing_credentials(&config, app_id.as_deref(), &lookup);
            let choices = ui::credential_options(listing);
            if pick {
                if let Some(id) = ui::select("Signing credential", &choices)? {
                    println!("{}", id);
                }
            } else {
                ui::print_options(&mut stdout, &choices)?;
            }
        }
        cli::Commands::Publish(args) => {
            ui::ensure_password(&mut config)?;
            let report = ui::run_publish(&config, &args.workspace, &lookup)
                .context("publish failed")?;
            println!(
                "Published {} from {}{}{}",
                report.app_id,
                report.file.display(),
                if report.signed { ", signed" } else { "" },
                if report.enabled { ", enabled" } else { "" },
            );
        }
    }
    Ok(())
}
