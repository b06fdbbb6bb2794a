use std::fmt;

use anyhow::Result;
use chrono::NaiveDate;

use crate::indicators::moving_average::{self, DEFAULT_WINDOWS};
use crate::market::{PriceRow, PriceSeries, Ticker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Line,
    Area,
    MovingAverage,
    Candlestick,
}

impl ChartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Line => "line",
            ChartKind::Area => "area",
            ChartKind::MovingAverage => "moving-average",
            ChartKind::Candlestick => "candlestick",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CloseSeries {
    pub ticker: Ticker,
    pub dates: Vec<NaiveDate>,
    pub close: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MovingAverage {
    pub window: usize,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AveragedSeries {
    pub ticker: Ticker,
    pub dates: Vec<NaiveDate>,
    pub close: Vec<f64>,
    pub averages: Vec<MovingAverage>,
}

/// OHLC columns; `close` also feeds the overlay line.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleSeries {
    pub ticker: Ticker,
    pub dates: Vec<NaiveDate>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
}

/// Chart-ready data handed to a renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesPayload {
    Line(Vec<CloseSeries>),
    Area(Vec<CloseSeries>),
    MovingAverage(Vec<AveragedSeries>),
    Candlestick(Vec<CandleSeries>),
}

impl SeriesPayload {
    pub fn kind(&self) -> ChartKind {
        match self {
            SeriesPayload::Line(_) => ChartKind::Line,
            SeriesPayload::Area(_) => ChartKind::Area,
            SeriesPayload::MovingAverage(_) => ChartKind::MovingAverage,
            SeriesPayload::Candlestick(_) => ChartKind::Candlestick,
        }
    }

    pub fn tickers(&self) -> Vec<&Ticker> {
        match self {
            SeriesPayload::Line(s) | SeriesPayload::Area(s) => {
                s.iter().map(|s| &s.ticker).collect()
            }
            SeriesPayload::MovingAverage(s) => s.iter().map(|s| &s.ticker).collect(),
            SeriesPayload::Candlestick(s) => s.iter().map(|s| &s.ticker).collect(),
        }
    }
}

pub fn build(kind: ChartKind, series: &PriceSeries) -> Result<SeriesPayload> {
    Ok(match kind {
        ChartKind::Line => SeriesPayload::Line(build_basic(series)),
        ChartKind::Area => SeriesPayload::Area(build_basic(series)),
        ChartKind::MovingAverage => {
            SeriesPayload::MovingAverage(build_moving_averages(series, &DEFAULT_WINDOWS)?)
        }
        ChartKind::Candlestick => SeriesPayload::Candlestick(build_candlestick(series)),
    })
}

pub fn build_basic(series: &PriceSeries) -> Vec<CloseSeries> {
    series
        .non_empty()
        .map(|(ticker, rows)| CloseSeries {
            ticker: ticker.clone(),
            dates: column(rows, |r| r.date),
            close: column(rows, |r| r.close),
        })
        .collect()
}

pub fn build_moving_averages(
    series: &PriceSeries,
    windows: &[usize],
) -> Result<Vec<AveragedSeries>> {
    series
        .non_empty()
        .map(|(ticker, rows)| {
            let close = column(rows, |r| r.close);
            let averages = windows
                .iter()
                .map(|&window| {
                    Ok(MovingAverage {
                        window,
                        values: moving_average::simple(&close, window)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            Ok(AveragedSeries {
                ticker: ticker.clone(),
                dates: column(rows, |r| r.date),
                close,
                averages,
            })
        })
        .collect()
}

pub fn build_candlestick(series: &PriceSeries) -> Vec<CandleSeries> {
    series
        .non_empty()
        .map(|(ticker, rows)| CandleSeries {
            ticker: ticker.clone(),
            dates: column(rows, |r| r.date),
            open: column(rows, |r| r.open),
            high: column(rows, |r| r.high),
            low: column(rows, |r| r.low),
            close: column(rows, |r| r.close),
        })
        .collect()
}

fn column<T>(rows: &[PriceRow], f: impl Fn(&PriceRow) -> T) -> Vec<T> {
    rows.iter().map(f).collect()
}
