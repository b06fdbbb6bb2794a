use std::{env::var, path::PathBuf};

use anyhow::{Context, Result, bail};

pub const DEFAULT_TICKER_LIST_URL: &str = "https://stockanalysis.com/stocks/";

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub version: String,
    /// Page opened by the "list of tickers" menu entry.
    pub ticker_list_url: String,
    /// Where the rendered chart is written; `.png` selects an image.
    pub chart_output: PathBuf,
    pub open_chart: bool,
    /// Cap on consecutive ticker prompts without a valid symbol. `None` keeps
    /// asking forever.
    pub ticker_attempts: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "Unknown".to_string(),
            ticker_list_url: DEFAULT_TICKER_LIST_URL.to_string(),
            chart_output: std::env::temp_dir().join("stock-chart.html"),
            open_chart: true,
            ticker_attempts: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let open_chart = match get("CHART_OPEN") {
            Some(v) => parse_bool(&v).with_context(|| format!("CHART_OPEN={v:?}"))?,
            None => defaults.open_chart,
        };

        let ticker_attempts = match get("TICKER_PROMPT_ATTEMPTS") {
            Some(v) => {
                let n: usize = v
                    .trim()
                    .parse()
                    .with_context(|| format!("TICKER_PROMPT_ATTEMPTS={v:?} is not a number"))?;
                if n == 0 {
                    bail!("TICKER_PROMPT_ATTEMPTS must be at least 1");
                }
                Some(n)
            }
            None => defaults.ticker_attempts,
        };

        Ok(Self {
            version: get("APP_VERSION").unwrap_or(defaults.version),
            ticker_list_url: get("TICKER_LIST_URL").unwrap_or(defaults.ticker_list_url),
            chart_output: get("CHART_OUTPUT")
                .map(PathBuf::from)
                .unwrap_or(defaults.chart_output),
            open_chart,
            ticker_attempts,
        })
    }
}

fn parse_bool(v: &str) -> Result<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("expected true or false"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        assert_eq!(config(&[]).unwrap(), Config::default());
    }

    #[test]
    fn reads_overrides() {
        let cfg = config(&[
            ("APP_VERSION", "v1.2.0"),
            ("TICKER_LIST_URL", "https://example.com/list"),
            ("CHART_OUTPUT", "/tmp/out.png"),
            ("CHART_OPEN", "false"),
            ("TICKER_PROMPT_ATTEMPTS", "3"),
        ])
        .unwrap();

        assert_eq!(cfg.version, "v1.2.0");
        assert_eq!(cfg.ticker_list_url, "https://example.com/list");
        assert_eq!(cfg.chart_output, PathBuf::from("/tmp/out.png"));
        assert!(!cfg.open_chart);
        assert_eq!(cfg.ticker_attempts, Some(3));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let cfg = config(&[("TICKER_LIST_URL", "  ")]).unwrap();
        assert_eq!(cfg.ticker_list_url, DEFAULT_TICKER_LIST_URL);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(config(&[("CHART_OPEN", "maybe")]).is_err());
        assert!(config(&[("TICKER_PROMPT_ATTEMPTS", "zero")]).is_err());
        assert!(config(&[("TICKER_PROMPT_ATTEMPTS", "0")]).is_err());
    }
}
