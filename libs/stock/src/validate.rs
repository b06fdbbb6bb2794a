use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use thiserror::Error;

use crate::market::{Ticker, TradingDate};

const RETURN_KEYWORD: &str = "RETURN";

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\W+").expect("valid regex"));

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Answer to a prompt: either a value or the user asking to go back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply<T> {
    Value(T),
    Return,
}

/// Tokens split out of one ticker prompt answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickerBatch {
    pub tickers: Vec<Ticker>,
    /// Tokens that are not well-formed symbols, in input order.
    pub rejected: Vec<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateFormatError {
    #[error("invalid date format: {0:?}")]
    InvalidFormat(String),
}

/// Splits `raw` on runs of non-word characters and uppercases each token.
/// Any `RETURN` token short-circuits to [`Reply::Return`].
pub fn validate_tickers(raw: &str) -> Reply<TickerBatch> {
    let upper = raw.to_uppercase();
    let tokens: Vec<&str> = NON_WORD.split(&upper).filter(|t| !t.is_empty()).collect();

    if tokens.contains(&RETURN_KEYWORD) {
        return Reply::Return;
    }

    let mut batch = TickerBatch::default();
    for token in tokens {
        match Ticker::parse(token) {
            Ok(ticker) => batch.tickers.push(ticker),
            Err(_) => batch.rejected.push(token.to_string()),
        }
    }

    Reply::Value(batch)
}

pub fn validate_date(raw: &str) -> Result<Reply<TradingDate>, DateFormatError> {
    let text = raw.trim();

    if text.eq_ignore_ascii_case(RETURN_KEYWORD) {
        return Ok(Reply::Return);
    }

    let date = parse_calendar_date(text)
        .ok_or_else(|| DateFormatError::InvalidFormat(text.to_string()))?;

    Ok(Reply::Value(TradingDate {
        date,
        raw: text.to_string(),
    }))
}

fn parse_calendar_date(text: &str) -> Option<NaiveDate> {
    // compact YYYYMMDD
    if text.len() == 8 && text.bytes().all(|b| b.is_ascii_digit()) {
        let dashed = format!("{}-{}-{}", &text[..4], &text[4..6], &text[6..]);
        return NaiveDate::parse_from_str(&dashed, "%Y-%m-%d").ok();
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols(reply: Reply<TickerBatch>) -> Vec<String> {
        match reply {
            Reply::Value(batch) => batch.tickers.iter().map(|t| t.to_string()).collect(),
            Reply::Return => panic!("unexpected Return"),
        }
    }

    #[test]
    fn splits_on_any_non_word_run() {
        assert_eq!(symbols(validate_tickers("aapl, msft")), vec!["AAPL", "MSFT"]);
        assert_eq!(
            symbols(validate_tickers("  tsla;;goog\tnvda  ")),
            vec!["TSLA", "GOOG", "NVDA"]
        );
    }

    #[test]
    fn return_anywhere_wins() {
        assert_eq!(validate_tickers("return"), Reply::Return);
        assert_eq!(validate_tickers("AAPL Return MSFT"), Reply::Return);
        assert_eq!(validate_tickers("aapl,RETURN"), Reply::Return);
    }

    #[test]
    fn return_must_be_a_whole_token() {
        assert_eq!(symbols(validate_tickers("RETURNS")), vec!["RETURNS"]);
    }

    #[test]
    fn blank_input_yields_empty_batch() {
        assert_eq!(
            validate_tickers(" ,;  "),
            Reply::Value(TickerBatch::default())
        );
    }

    #[test]
    fn malformed_tokens_are_rejected_not_fatal() {
        let Reply::Value(batch) = validate_tickers("aapl foo_bar msft") else {
            panic!("expected tickers");
        };
        assert_eq!(batch.tickers.len(), 2);
        assert_eq!(batch.rejected, vec!["FOO_BAR"]);
    }

    #[test]
    fn iso_date_parses() {
        let reply = validate_date("2024-01-01").unwrap();
        assert_eq!(
            reply,
            Reply::Value(TradingDate {
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                raw: "2024-01-01".to_string(),
            })
        );
    }

    #[test]
    fn alternate_layouts_parse() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        for raw in [
            "2024/03/15",
            "03/15/2024",
            "20240315",
            "March 15, 2024",
            "15 Mar 2024",
            "2024-03-15T09:30:00",
        ] {
            match validate_date(raw) {
                Ok(Reply::Value(d)) => assert_eq!(d.date, expected, "{raw}"),
                other => panic!("{raw}: {other:?}"),
            }
        }
    }

    #[test]
    fn invalid_dates_are_reported() {
        assert_eq!(
            validate_date("not-a-date"),
            Err(DateFormatError::InvalidFormat("not-a-date".to_string()))
        );
        assert!(validate_date("2024-02-30").is_err());
        assert!(validate_date("").is_err());
    }

    #[test]
    fn return_keyword_for_dates() {
        assert_eq!(validate_date("return"), Ok(Reply::Return));
        assert_eq!(validate_date("  Return "), Ok(Reply::Return));
    }
}
