//! Human-readable status lines and download progress

use std::io::{IsTerminal, Write};

use indicatif::{ProgressBar, ProgressStyle};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Writes one coloured status line per pipeline stage
#[derive(Debug, Clone, Copy)]
pub struct Reporter {
    color: ColorChoice,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter {
    pub fn new() -> Self {
        let color = if std::io::stdout().is_terminal() {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };
        Self { color }
    }

    fn line(&self, color: Option<Color>, bold: bool, msg: &str) {
        let mut stdout = StandardStream::stdout(self.color);
        let _ = stdout.set_color(ColorSpec::new().set_fg(color).set_bold(bold));
        let _ = writeln!(stdout, "{msg}");
        let _ = stdout.reset();
    }

    pub fn header(&self, msg: &str) {
        self.line(Some(Color::Cyan), true, msg);
    }

    pub fn step(&self, msg: &str) {
        self.line(Some(Color::Cyan), false, msg);
    }

    pub fn success(&self, msg: &str) {
        self.line(Some(Color::Green), false, msg);
    }

    pub fn note(&self, msg: &str) {
        self.line(None, false, msg);
    }

    pub fn warn(&self, msg: &str) {
        self.line(Some(Color::Yellow), false, msg);
    }

    /// Fatal error line on stderr
    pub fn error(&self, msg: &str) {
        let mut stderr = StandardStream::stderr(self.color);
        let _ = stderr.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true));
        let _ = writeln!(stderr, "❌ {msg}");
        let _ = stderr.reset();
    }

    /// Byte progress bar for the artifact transfer
    ///
    /// Falls back to a spinner when the server sends no content length.
    pub fn download_bar(&self, total_bytes: Option<u64>, label: &str) -> ProgressBar {
        let bar = match total_bytes {
            Some(total) => {
                let bar = ProgressBar::new(total);
                if let Ok(style) = ProgressStyle::default_bar()
                    .template("   [{bar:40.green/blue}] {bytes}/{total_bytes}  {msg}")
                {
                    bar.set_style(style.progress_chars("█▓░"));
                }
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                if let Ok(style) = ProgressStyle::default_spinner().template("   {spinner} {bytes}  {msg}") {
                    bar.set_style(style);
                }
                bar
            }
        };
        bar.set_message(label.to_string());
        bar
    }
}
