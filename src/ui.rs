// UI layer: line-oriented output for command results, a spinner while a
// request is in flight, and the interactive prompts used by `init`.

use crossterm::style::Stylize;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, IsTerminal, Write};
use std::time::Duration;
use tracing::warn;

use crate::config::Configuration;

/// Terminal output sink. Writes go to `out`; colors and the spinner are
/// only enabled when attached to a terminal. A failed write (closed pipe,
/// full disk) is logged once and remembered, later lines are dropped.
pub struct Ui<W: Write> {
    out: W,
    color: bool,
    progress: bool,
    broken: bool,
}

impl Ui<io::Stdout> {
    /// UI bound to stdout, with color and spinner detected from the terminal.
    pub fn stdout() -> Self {
        Self {
            out: io::stdout(),
            color: io::stdout().is_terminal(),
            progress: io::stderr().is_terminal(),
            broken: false,
        }
    }
}

impl<W: Write> Ui<W> {
    /// Plain UI over any writer: no color, no spinner.
    pub fn plain(out: W) -> Self {
        Self {
            out,
            color: false,
            progress: false,
            broken: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn line(&mut self, text: impl AsRef<str>) {
        if self.broken {
            return;
        }
        if let Err(e) = writeln!(self.out, "{}", text.as_ref()) {
            warn!("failed to write output: {}", e);
            self.broken = true;
        }
    }

    /// True once a write to the output has failed.
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    pub fn success(&mut self, text: impl AsRef<str>) {
        let text = format!("✅ {}", text.as_ref());
        let styled = if self.color { text.green().bold().to_string() } else { text };
        self.line(styled);
    }

    pub fn warning(&mut self, text: impl AsRef<str>) {
        let text = format!("⚠️ {}", text.as_ref());
        let styled = if self.color { text.yellow().bold().to_string() } else { text };
        self.line(styled);
    }

    pub fn error(&mut self, text: impl AsRef<str>) {
        let text = format!("❌ {}", text.as_ref());
        let styled = if self.color { text.red().bold().to_string() } else { text };
        self.line(styled);
    }

    pub fn rule(&mut self, width: usize) {
        self.line("-".repeat(width));
    }

    /// Spinner drawn on stderr; hidden when not interactive.
    pub fn spinner(&self, message: impl Into<String>) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(message.into());
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner
    }

    /// Print the effective configuration and where it is stored.
    pub fn show_config(&mut self, location: &str, config: &Configuration) {
        self.line(format!("Config file: {}", location));
        self.rule(40);
        self.line(format!("  base_url:       {}", config.base_url));
        self.line(format!(
            "  python_version: {}",
            config.python_version.as_deref().unwrap_or("not set")
        ));
        self.line(format!("  timeout:        {} s", config.timeout));
    }
}

/// Ask for each setting, showing the current value as default. Blank input
/// keeps the current value.
pub fn prompt_config(current: &Configuration) -> anyhow::Result<Configuration> {
    let mut config = current.clone();

    let base_url: String = Input::new()
        .with_prompt("Service URL")
        .default(current.base_url.clone())
        .interact_text()?;
    if !base_url.trim().is_empty() {
        config.base_url = base_url.trim().to_string();
    }

    let python_version: String = Input::new()
        .with_prompt(format!(
            "Default Python version [{}]",
            current.python_version.as_deref().unwrap_or("not set")
        ))
        .allow_empty(true)
        .interact_text()?;
    if !python_version.trim().is_empty() {
        config.python_version = Some(python_version.trim().to_string());
    }

    config.timeout = Input::new()
        .with_prompt("Timeout (seconds)")
        .default(current.timeout)
        .validate_with(|value: &u64| {
            if *value > 0 {
                Ok(())
            } else {
                Err("timeout must be positive")
            }
        })
        .interact_text()?;

    Ok(config)
}
