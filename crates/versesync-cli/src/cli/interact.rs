//! Terminal implementations of the library's interaction hooks.
//!
//! The folder prompt and the consent notice write to stderr so stdout stays
//! clean for `--output json`.

use console::Style;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::debug;
use versesync::adapters::drive_http::ConsentPresenter;
use versesync::adapters::local_dir::DirectoryPicker;
use versesync::error::Result;

/// Asks for a folder path on a line of input. An empty line cancels.
pub struct PromptDirectory {
    input: Box<dyn BufRead>,
    output: Box<dyn Write>,
}

impl PromptDirectory {
    pub fn new(input: Box<dyn BufRead>, output: Box<dyn Write>) -> Self {
        Self { input, output }
    }

    pub fn stdio() -> Self {
        Self::new(
            Box::new(std::io::BufReader::new(std::io::stdin())),
            Box::new(std::io::stderr()),
        )
    }
}

impl DirectoryPicker for PromptDirectory {
    fn pick_directory(&mut self) -> Result<Option<PathBuf>> {
        write!(self.output, "Folder to sync into (empty to cancel): ")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let answer = line.trim();
        if answer.is_empty() {
            return Ok(None);
        }
        Ok(Some(expand_home(answer)))
    }
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

/// Shows the Google consent URL and tries to open it in the default browser.
pub struct BrowserConsent {
    pub open_browser: bool,
}

impl ConsentPresenter for BrowserConsent {
    fn present(&mut self, auth_url: &str) {
        let hint = Style::new().dim();
        eprintln!("Authorize versesync in your browser:");
        eprintln!("  {}", Style::new().cyan().apply_to(auth_url));
        if self.open_browser {
            if let Err(e) = open::that(auth_url) {
                debug!(error = %e, "could not open browser");
                eprintln!("{}", hint.apply_to("(open the link above manually)"));
            }
        }
        eprintln!("{}", hint.apply_to("Waiting for the redirect..."));
    }
}
