use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use stock::chart::{build_chart, write_chart};
use stock::{ChartRenderer, ChartSize, SeriesPayload};
use tracing::{info, warn};

use crate::browser::UrlOpener;

/// Writes the chart to a file and opens it in the browser.
pub struct BrowserRenderer<B> {
    output: PathBuf,
    size: ChartSize,
    open: bool,
    browser: B,
}

impl<B: UrlOpener> BrowserRenderer<B> {
    pub fn new(output: PathBuf, size: ChartSize, open: bool, browser: B) -> Self {
        Self {
            output,
            size,
            open,
            browser,
        }
    }
}

impl<B: UrlOpener> ChartRenderer for BrowserRenderer<B> {
    fn render(&mut self, payload: &SeriesPayload) -> Result<()> {
        let chart = build_chart(payload)?;
        write_chart(&chart, &self.output, self.size)?;

        let url = file_url(&self.output)?;
        info!(kind = %payload.kind(), path = %self.output.display(), "chart saved");

        if self.open
            && let Err(e) = self.browser.open(&url)
        {
            warn!(error = ?e, url, "could not open chart; open the url to view it");
        }

        Ok(())
    }
}

fn file_url(path: &Path) -> Result<String> {
    let absolute = std::path::absolute(path)
        .with_context(|| format!("cannot resolve {}", path.display()))?;
    Ok(format!("file://{}", absolute.display()))
}
