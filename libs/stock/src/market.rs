use std::fmt;

use anyhow::{Result, ensure};
use chrono::NaiveDate;

/// Uppercase stock symbol, `[A-Z0-9.-]+`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticker(String);

impl Ticker {
    pub fn parse(raw: &str) -> Result<Self> {
        let symbol = raw.trim().to_uppercase();

        ensure!(!symbol.is_empty(), "ticker is empty");
        ensure!(
            symbol
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '.' || c == '-'),
            "ticker {symbol:?} contains characters outside [A-Z0-9.-]"
        );

        Ok(Self(symbol))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated calendar date plus the text the user typed for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradingDate {
    pub date: NaiveDate,
    pub raw: String,
}

impl fmt::Display for TradingDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Half-open `[start, end)` range. Ordering is checked by the price source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    pub start: TradingDate,
    pub end: TradingDate,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceRow {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl PriceRow {
    /// All four prices finite and non-negative.
    pub fn is_valid(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .all(|p| p.is_finite() && *p >= 0.0)
    }
}

/// Fetched rows per ticker, in the order tickers were inserted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    entries: Vec<(Ticker, Vec<PriceRow>)>,
}

impl PriceSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorts `rows` by date and drops duplicate dates. Replaces any rows
    /// already stored for `ticker`.
    pub fn insert(&mut self, ticker: Ticker, mut rows: Vec<PriceRow>) {
        rows.sort_by_key(|r| r.date);
        rows.dedup_by_key(|r| r.date);

        match self.entries.iter_mut().find(|(t, _)| *t == ticker) {
            Some((_, existing)) => *existing = rows,
            None => self.entries.push((ticker, rows)),
        }
    }

    pub fn get(&self, ticker: &Ticker) -> Option<&[PriceRow]> {
        self.entries
            .iter()
            .find(|(t, _)| t == ticker)
            .map(|(_, rows)| rows.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Ticker, &[PriceRow])> {
        self.entries.iter().map(|(t, rows)| (t, rows.as_slice()))
    }

    /// Tickers that have at least one row.
    pub fn non_empty(&self) -> impl Iterator<Item = (&Ticker, &[PriceRow])> {
        self.iter().filter(|(_, rows)| !rows.is_empty())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
