use std::env;
use std::process::{Command, Stdio};
use std::thread;

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// Opens a URL for the user without waiting for it to close.
pub trait UrlOpener {
    fn open(&self, url: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl UrlOpener for SystemBrowser {
    fn open(&self, url: &str) -> Result<()> {
        let browser = env::var("BROWSER").ok();
        let mut command = launcher(browser.as_deref(), url);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let mut child = command
            .spawn()
            .with_context(|| format!("failed to launch browser for {url}"))?;
        debug!(pid = child.id(), url, "browser launched");

        // reap in the background so the launcher never lingers as a zombie
        thread::spawn(move || {
            if let Err(e) = child.wait() {
                warn!(error = ?e, "waiting on browser launcher failed");
            }
        });
        Ok(())
    }
}

/// `browser` is a `$BROWSER`-style command line: a program followed by
/// whitespace-separated arguments. The URL is appended last.
fn launcher(browser: Option<&str>, url: &str) -> Command {
    let mut parts = browser.unwrap_or_default().split_whitespace();
    if let Some(program) = parts.next() {
        let mut command = Command::new(program);
        command.args(parts).arg(url);
        return command;
    }

    if cfg!(target_os = "macos") {
        let mut command = Command::new("open");
        command.arg(url);
        command
    } else if cfg!(target_os = "windows") {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", "", url]);
        command
    } else {
        let mut command = Command::new("xdg-open");
        command.arg(url);
        command
    }
}
