use std::future::Future;

use anyhow::{Error, Result, ensure};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::America::New_York;
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue},
};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::market::{DateRange, PriceRow, Ticker};

const PAGE_LIMIT: usize = 10_000;

/// Supplies daily OHLC rows for one ticker over a date range.
pub trait PriceSource {
    fn fetch(
        &self,
        ticker: &Ticker,
        range: &DateRange,
    ) -> impl Future<Output = Result<Vec<PriceRow>>> + Send;
}

#[derive(Clone)]
pub struct PriceClient {
    client: Client,
    base_api: String,
}

impl PriceClient {
    pub fn new(base_api: String, key_id: String, secret: String) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("APCA-API-KEY-ID", HeaderValue::from_str(&key_id)?);
        headers.insert("APCA-API-SECRET-KEY", HeaderValue::from_str(&secret)?);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self { client, base_api })
    }

    pub fn from_env() -> Result<Self> {
        let base_api = std::env::var("APCA_API_BASE_URL")
            .map_err(|_| Error::msg("APCA_API_BASE_URL environment variable not set"))?;
        let key_id = std::env::var("APCA_API_KEY_ID")
            .map_err(|_| Error::msg("APCA_API_KEY_ID environment variable not set"))?;
        let secret = std::env::var("APCA_API_SECRET_KEY")
            .map_err(|_| Error::msg("APCA_API_SECRET_KEY environment variable not set"))?;
        Self::new(base_api, key_id, secret)
    }

    /// Daily bars in `[start, end)`, following pagination to the end.
    pub async fn fetch_daily_bars(
        &self,
        symbol: &str,
        range: &DateRange,
    ) -> Result<Vec<Bar>, Error> {
        ensure!(
            range.start.date < range.end.date,
            "start date {} must be before end date {}",
            range.start,
            range.end
        );

        let url = format!(
            "{}/v2/stocks/{}/bars",
            self.base_api.trim_end_matches('/'),
            symbol
        );
        let start = market_midnight(range.start.date)?.to_rfc3339();
        let end = market_midnight(range.end.date)?.to_rfc3339();
        let limit = PAGE_LIMIT.to_string();

        let mut bars = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("feed", "iex"),
                ("timeframe", "1Day"),
                ("adjustment", "all"),
                ("start", start.as_str()),
                ("end", end.as_str()),
                ("limit", limit.as_str()),
            ];
            if let Some(token) = page_token.as_deref() {
                query.push(("page_token", token));
            }

            let res: BarsResponse = self
                .client
                .get(&url)
                .query(&query)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            let page = res.bars.unwrap_or_default();
            debug!(symbol, page_bars = page.len(), "fetched bars page");
            bars.extend(page);

            match res.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(bars)
    }
}

impl PriceSource for PriceClient {
    async fn fetch(&self, ticker: &Ticker, range: &DateRange) -> Result<Vec<PriceRow>> {
        let bars = self.fetch_daily_bars(ticker.as_str(), range).await?;
        Ok(rows_from_bars(&bars, range.end.date))
    }
}

fn market_midnight(date: NaiveDate) -> Result<DateTime<Utc>> {
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| Error::msg(format!("no midnight on {date}")))?;
    let local = New_York
        .from_local_datetime(&midnight)
        .earliest()
        .ok_or_else(|| Error::msg(format!("no New York midnight on {date}")))?;
    Ok(local.with_timezone(&Utc))
}

/// Converts bars to rows dated in New York time, dropping rows on or after
/// `end` and rows with unusable prices. Output is ascending with unique dates.
pub fn rows_from_bars(bars: &[Bar], end: NaiveDate) -> Vec<PriceRow> {
    let mut rows: Vec<PriceRow> = bars
        .iter()
        .map(|b| PriceRow {
            date: b.timestamp.with_timezone(&New_York).date_naive(),
            open: b.open,
            high: b.high,
            low: b.low,
            close: b.close,
        })
        .filter(|r| r.date < end)
        .filter(|r| {
            let ok = r.is_valid();
            if !ok {
                warn!(date = %r.date, "dropping bar with invalid prices");
            }
            ok
        })
        .collect();

    rows.sort_by_key(|r| r.date);
    rows.dedup_by_key(|r| r.date);
    rows
}

//
// Match Alpaca API JSON
// https://docs.alpaca.markets/reference/stockbars
//
#[derive(Debug, Deserialize, Clone)]
pub struct BarsResponse {
    /// Alpaca sends `null` rather than `[]` when the range has no bars.
    #[serde(default)]
    pub bars: Option<Vec<Bar>>,

    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Bar {
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,

    #[serde(rename = "o")]
    pub open: f64,

    #[serde(rename = "h")]
    pub high: f64,

    #[serde(rename = "l")]
    pub low: f64,

    #[serde(rename = "c")]
    pub close: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::TradingDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn range(start: NaiveDate, end: NaiveDate) -> DateRange {
        DateRange {
            start: TradingDate {
                date: start,
                raw: start.to_string(),
            },
            end: TradingDate {
                date: end,
                raw: end.to_string(),
            },
        }
    }

    #[test]
    fn decodes_alpaca_bars() {
        let body = r#"{
            "bars": [
                {"t": "2024-01-03T05:00:00Z", "o": 184.2, "h": 185.9, "l": 183.4, "c": 184.25, "v": 58414460, "n": 1, "vw": 184.3},
                {"t": "2024-01-02T05:00:00Z", "o": 187.15, "h": 188.44, "l": 183.89, "c": 185.64, "v": 82488674, "n": 1, "vw": 185.9}
            ],
            "symbol": "AAPL",
            "next_page_token": null
        }"#;

        let res: BarsResponse = serde_json::from_str(body).unwrap();
        assert!(res.next_page_token.is_none());
        let bars = res.bars.unwrap();
        assert_eq!(bars.len(), 2);

        let rows = rows_from_bars(&bars, date(2024, 1, 10));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, date(2024, 1, 2));
        assert_eq!(rows[0].close, 185.64);
        assert_eq!(rows[1].date, date(2024, 1, 3));
    }

    #[test]
    fn null_bars_decode_as_empty() {
        let res: BarsResponse =
            serde_json::from_str(r#"{"bars": null, "symbol": "ZZZZ", "next_page_token": null}"#)
                .unwrap();
        assert!(res.bars.unwrap_or_default().is_empty());
    }

    #[test]
    fn rows_stop_before_end_date() {
        let bars: Vec<Bar> = serde_json::from_str(
            r#"[
                {"t": "2024-01-09T05:00:00Z", "o": 1, "h": 1, "l": 1, "c": 1},
                {"t": "2024-01-10T05:00:00Z", "o": 2, "h": 2, "l": 2, "c": 2}
            ]"#,
        )
        .unwrap();

        let rows = rows_from_bars(&bars, date(2024, 1, 10));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, date(2024, 1, 9));
    }

    #[test]
    fn invalid_prices_are_dropped() {
        let bars: Vec<Bar> = serde_json::from_str(
            r#"[
                {"t": "2024-01-02T05:00:00Z", "o": 1, "h": 1, "l": -1, "c": 1},
                {"t": "2024-01-03T05:00:00Z", "o": 2, "h": 2, "l": 2, "c": 2}
            ]"#,
        )
        .unwrap();

        let rows = rows_from_bars(&bars, date(2024, 2, 1));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, date(2024, 1, 3));
    }

    #[test]
    fn midnight_is_new_york_time() {
        let winter = market_midnight(date(2024, 1, 2)).unwrap();
        assert_eq!(winter.to_rfc3339(), "2024-01-02T05:00:00+00:00");

        let summer = market_midnight(date(2024, 7, 1)).unwrap();
        assert_eq!(summer.to_rfc3339(), "2024-07-01T04:00:00+00:00");
    }

    #[tokio::test]
    async fn inverted_range_is_rejected() {
        let client = PriceClient::new(
            "http://localhost:9".to_string(),
            "key".to_string(),
            "secret".to_string(),
        )
        .unwrap();

        let err = client
            .fetch_daily_bars("AAPL", &range(date(2024, 1, 10), date(2024, 1, 1)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("must be before"));
    }

    /// Answers one request per connection with each body in turn and returns
    /// the request lines it saw.
    async fn serve_pages(
        listener: tokio::net::TcpListener,
        pages: Vec<&'static str>,
    ) -> Vec<String> {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let mut seen = Vec::new();
        for body in pages {
            let (mut stream, _) = listener.accept().await.unwrap();

            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let request = String::from_utf8_lossy(&request);
            seen.push(request.lines().next().unwrap_or_default().to_string());

            let response = format!(
                "HTTP/1.1 200 OK\r\n\
                 Content-Type: application/json\r\n\
                 Content-Length: {}\r\n\
                 Connection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
        }
        seen
    }

    #[tokio::test]
    async fn follows_page_tokens_until_empty() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve_pages(
            listener,
            vec![
                r#"{"bars": [{"t": "2024-01-02T05:00:00Z", "o": 1, "h": 1, "l": 1, "c": 1}], "next_page_token": "abc"}"#,
                r#"{"bars": [{"t": "2024-01-03T05:00:00Z", "o": 2, "h": 2, "l": 2, "c": 2}], "next_page_token": ""}"#,
            ],
        ));

        let client = PriceClient::new(
            format!("http://{addr}"),
            "key".to_string(),
            "secret".to_string(),
        )
        .unwrap();
        let bars = client
            .fetch_daily_bars("AAPL", &range(date(2024, 1, 1), date(2024, 1, 10)))
            .await
            .unwrap();

        let requests = server.await.unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].starts_with("GET /v2/stocks/AAPL/bars?"));
        assert!(!requests[0].contains("page_token"));
        assert!(requests[1].contains("page_token=abc"));

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![1.0, 2.0]);
    }

    #[tokio::test]
    #[ignore] // Requires network access and Alpaca credentials
    async fn fetches_live_bars() {
        let client = PriceClient::from_env().unwrap();
        let ticker = Ticker::parse("AAPL").unwrap();
        let rows = client
            .fetch(&ticker, &range(date(2024, 1, 1), date(2024, 1, 10)))
            .await
            .unwrap();
        assert!(!rows.is_empty());
    }
}
