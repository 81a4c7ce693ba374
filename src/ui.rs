// UI layer: turns core results into selectable options and status text.
// Prompts use `dialoguer`, progress uses an `indicatif` spinner.

use anyhow::Result;
use dialoguer::{Password, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, IsTerminal, Write};
use std::path::Path;
use std::time::Duration;

use crate::config::{UploadConfig, ENVIRONMENTS};
use crate::credentials::{CredentialLookup, Secret};
use crate::error;
use crate::model::Application;
use crate::publish::{self, CredentialListing, PublishReport};

/// One selectable entry: what the user sees and the value submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub label: String,
    pub value: String,
}

impl Choice {
    fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Choice {
            label: label.into(),
            value: value.into(),
        }
    }

    /// A placeholder entry carrying a message and no value.
    fn message(text: &str) -> Self {
        Choice::new(format!("({})", text), "")
    }
}

pub fn environment_options() -> Vec<Choice> {
    ENVIRONMENTS
        .iter()
        .map(|(name, title)| Choice::new(*title, *name))
        .collect()
}

pub fn application_options(result: std::result::Result<Vec<Application>, String>) -> Vec<Choice> {
    match result {
        Ok(apps) => apps
            .iter()
            .map(|app| Choice::new(app.label(), app.id.clone()))
            .collect(),
        Err(e) => vec![Choice::message(&e)],
    }
}

pub fn credential_options(result: std::result::Result<CredentialListing, String>) -> Vec<Choice> {
    match result {
        Ok(listing) => {
            let with_platform = listing.platform.is_none();
            listing
                .credentials
                .iter()
                .map(|c| Choice::new(c.label(with_platform), c.credential_id.clone()))
                .collect()
        }
        Err(e) => vec![Choice::message(&e)],
    }
}

/// Print options as an aligned two-column table, value first.
pub fn print_options(out: &mut dyn Write, choices: &[Choice]) -> io::Result<()> {
    let width = choices.iter().map(|c| c.value.len()).max().unwrap_or(0);
    for c in choices {
        writeln!(out, "{:<width$}  {}", c.value, c.label, width = width)?;
    }
    Ok(())
}

/// Let the user pick one option with arrow keys; `None` when there is
/// nothing selectable.
pub fn select(prompt: &str, choices: &[Choice]) -> Result<Option<String>> {
    if choices.iter().all(|c| c.value.is_empty()) {
        return Ok(None);
    }
    let labels: Vec<&str> = choices.iter().map(|c| c.label.as_str()).collect();
    let idx = Select::new()
        .with_prompt(prompt)
        .items(&labels)
        .default(0)
        .interact()?;
    Ok(Some(choices[idx].value.clone()))
}

/// Ask for the password on the terminal when none was configured.
pub fn ensure_password(config: &mut UploadConfig) -> Result<()> {
    if !config.password.is_empty() || !io::stdin().is_terminal() {
        return Ok(());
    }
    let prompt = format!("Password for {}", config.username);
    let password: String = Password::new().with_prompt(prompt).interact()?;
    config.password = Secret::new(password);
    Ok(())
}

/// Build-log sink that prints lines above a running spinner.
struct SpinnerLog {
    spinner: ProgressBar,
    pending: Vec<u8>,
}

impl Write for SpinnerLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
            self.spinner.set_message(text.clone());
            self.spinner.println(text);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run the publish sequence, with a spinner when stderr is a terminal.
pub fn run_publish(
    config: &UploadConfig,
    workspace: &Path,
    lookup: &dyn CredentialLookup,
) -> error::Result<PublishReport> {
    if !io::stderr().is_terminal() {
        let mut out = io::stdout().lock();
        return publish::publish(config, workspace, lookup, &mut out);
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message("Publishing...");
    spinner.enable_steady_tick(Duration::from_millis(120));

    let mut log = SpinnerLog {
        spinner: spinner.clone(),
        pending: Vec::new(),
    };
    let result = publish::publish(config, workspace, lookup, &mut log);
    spinner.finish_and_clear();
    result
}
