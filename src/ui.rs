// UI layer: the interactive option prompt (`dialoguer`) and one spinner per
// upload (`indicatif`). Nothing here knows how uploads are performed.

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Mutex;
use std::time::Duration;

use dialoguer::{Input, Select};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing_subscriber::fmt::MakeWriter;

use crate::option::{AccessPolicy, OptionPrompt, PromptAnswers};
use crate::upload::{ProgressEvent, ProgressSink};

/// Prompt session on the controlling terminal.
pub struct TerminalPrompt;

impl OptionPrompt for TerminalPrompt {
    fn ask(&self, defaults: &PromptAnswers) -> io::Result<Option<PromptAnswers>> {
        match ask_all(defaults) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(None),
            other => other,
        }
    }
}

fn ask_all(defaults: &PromptAnswers) -> io::Result<Option<PromptAnswers>> {
    let policies = AccessPolicy::ALL;
    let labels: Vec<&str> = policies.iter().map(|p| p.as_str()).collect();
    let default_policy = policies
        .iter()
        .position(|p| *p == defaults.access_policy)
        .unwrap_or(0);
    let Some(policy) = Select::new()
        .with_prompt("AccessPolicy (who can see the image)")
        .items(&labels)
        .default(default_policy)
        .interact_opt()?
    else {
        return Ok(None);
    };

    let Some(metadata_is_public) = select_bool(
        "MetadataIsPublic (publish URL, title and description)",
        defaults.metadata_is_public,
    )?
    else {
        return Ok(None);
    };

    let Some(enable_exif) = select_bool("Exif (use EXIF data)", defaults.enable_exif)? else {
        return Ok(None);
    };

    let app: String = Input::new()
        .with_prompt("App (application that captured the image)")
        .default(defaults.app.clone())
        .allow_empty(true)
        .interact_text()?;

    let desc: String = Input::new()
        .with_prompt("Description (free comment or tags)")
        .default(defaults.desc.clone())
        .show_default(false)
        .allow_empty(true)
        .interact_text()?;

    Ok(Some(PromptAnswers {
        access_policy: policies[policy],
        metadata_is_public,
        enable_exif,
        app,
        desc,
    }))
}

fn select_bool(prompt: &str, default: bool) -> io::Result<Option<bool>> {
    let items = ["true", "false"];
    let choice = Select::new()
        .with_prompt(prompt)
        .items(&items)
        .default(if default { 0 } else { 1 })
        .interact_opt()?;
    Ok(choice.map(|i| i == 0))
}

/// One spinner line per file, kept on screen once finished.
pub struct SpinnerProgress {
    multi: MultiProgress,
    bars: Mutex<HashMap<usize, ProgressBar>>,
    style: ProgressStyle,
}

impl SpinnerProgress {
    pub fn new() -> Self {
        let style = ProgressStyle::with_template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
            style,
        }
    }

    /// Writer for log lines that clears the spinners while each line is
    /// printed, so logs never tear through them.
    pub fn log_writer(&self) -> LogWriter {
        LogWriter {
            multi: self.multi.clone(),
        }
    }

    fn take(&self, index: usize) -> Option<ProgressBar> {
        self.bars.lock().ok()?.remove(&index)
    }
}

impl Default for SpinnerProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Stderr writer that suspends the spinners of a `MultiProgress` per write.
#[derive(Clone)]
pub struct LogWriter {
    multi: MultiProgress,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.multi.suspend(|| io::stderr().write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl ProgressSink for SpinnerProgress {
    fn report(&self, event: ProgressEvent<'_>) {
        match event {
            ProgressEvent::Started { index, path } => {
                let bar = self.multi.add(ProgressBar::new_spinner());
                bar.set_style(self.style.clone());
                bar.set_message(format!("uploading {}", path.display()));
                bar.enable_steady_tick(Duration::from_millis(100));
                if let Ok(mut bars) = self.bars.lock() {
                    bars.insert(index, bar);
                }
            }
            ProgressEvent::Uploaded { index, path, url } => {
                if let Some(bar) = self.take(index) {
                    bar.finish_with_message(format!("uploaded! {} -> {url}", path.display()));
                }
            }
            ProgressEvent::Failed { index, path, error } => {
                if let Some(bar) = self.take(index) {
                    bar.abandon_with_message(format!(
                        "failed to upload({}): {error}",
                        path.display()
                    ));
                }
            }
        }
    }
}
