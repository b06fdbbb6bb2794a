use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, ensure};
use charming::{
    Chart, HtmlRenderer, ImageFormat, ImageRenderer,
    component::{Axis, DataZoom, DataZoomType, Legend, Title},
    datatype::CompositeValue,
    element::{
        AreaStyle, AxisLabel, AxisType, LineStyle, LineStyleType, Symbol, TextStyle, Tooltip,
        Trigger,
    },
    series::{Candlestick, Line},
};
use chrono::NaiveDate;
use tracing::debug;

use crate::series::{AveragedSeries, CandleSeries, CloseSeries, SeriesPayload};

pub const CHART_TITLE: &str = "Stock Market Performance";

const AVERAGE_COLORS: [&str; 2] = ["#004d00", "#800000"];

/// Consumes a chart payload and presents it to the user.
pub trait ChartRenderer {
    fn render(&mut self, payload: &SeriesPayload) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct ChartSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ChartSize {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 600,
        }
    }
}

pub fn build_chart(payload: &SeriesPayload) -> Result<Chart> {
    ensure!(!payload.tickers().is_empty(), "no series to chart");

    let axis = date_axis(payload);
    let labels: Vec<String> = axis.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect();

    let mut chart = Chart::new()
        .title(
            Title::new()
                .text(CHART_TITLE)
                .left("center")
                .top("2%")
                .text_style(TextStyle::new().font_size(16)),
        )
        .tooltip(Tooltip::new().trigger(Trigger::Axis))
        .legend(Legend::new().top("8%"))
        .x_axis(
            Axis::new()
                .type_(AxisType::Category)
                .name("Date")
                .data(labels)
                .axis_label(AxisLabel::new().rotate(45)),
        )
        .y_axis(Axis::new().type_(AxisType::Value).name("Price").scale(true))
        .data_zoom(DataZoom::new().type_(DataZoomType::Slider));

    match payload {
        SeriesPayload::Line(series) => {
            for s in series {
                chart = chart.series(close_line(&s.ticker.to_string(), &axis, s));
            }
        }
        SeriesPayload::Area(series) => {
            for s in series {
                chart = chart.series(
                    close_line(&s.ticker.to_string(), &axis, s).area_style(AreaStyle::new()),
                );
            }
        }
        SeriesPayload::MovingAverage(series) => {
            for s in series {
                chart = chart.series(
                    Line::new()
                        .name(s.ticker.to_string())
                        .data(align(&axis, &s.dates, &s.close))
                        .symbol(Symbol::None),
                );
                for (avg, color) in s.averages.iter().zip(AVERAGE_COLORS.iter().cycle()) {
                    chart = chart.series(average_line(&axis, s, avg.window, &avg.values, color));
                }
            }
        }
        SeriesPayload::Candlestick(series) => {
            for s in series {
                chart = chart
                    .series(
                        Candlestick::new()
                            .name(s.ticker.to_string())
                            .data(candles(&axis, s)),
                    )
                    .series(
                        Line::new()
                            .name(format!("{} Close", s.ticker))
                            .data(align(&axis, &s.dates, &s.close))
                            .symbol(Symbol::None),
                    );
            }
        }
    }

    Ok(chart)
}

/// Writes `chart` to `path`: a PNG when the extension is `png`, an HTML page
/// otherwise.
pub fn write_chart(chart: &Chart, path: &Path, size: ChartSize) -> Result<()> {
    let is_png = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));

    if is_png {
        let mut renderer = ImageRenderer::new(size.width, size.height);
        let png_bytes = renderer.render_format(ImageFormat::Png, chart)?;
        fs::write(path, png_bytes)
            .with_context(|| format!("failed to write chart to {}", path.display()))?;
    } else {
        let mut renderer =
            HtmlRenderer::new(CHART_TITLE, u64::from(size.width), u64::from(size.height));
        let html = renderer.render(chart)?;
        fs::write(path, html)
            .with_context(|| format!("failed to write chart to {}", path.display()))?;
    }

    debug!(path = %path.display(), png = is_png, "chart written");
    Ok(())
}

fn date_axis(payload: &SeriesPayload) -> Vec<NaiveDate> {
    let mut dates = BTreeSet::new();
    match payload {
        SeriesPayload::Line(s) | SeriesPayload::Area(s) => {
            s.iter().for_each(|s| dates.extend(&s.dates))
        }
        SeriesPayload::MovingAverage(s) => s.iter().for_each(|s| dates.extend(&s.dates)),
        SeriesPayload::Candlestick(s) => s.iter().for_each(|s| dates.extend(&s.dates)),
    }
    dates.into_iter().collect()
}

/// Spreads `values` over the shared axis; dates a ticker lacks become NaN,
/// which serializes as null and shows as a gap.
fn align(axis: &[NaiveDate], dates: &[NaiveDate], values: &[f64]) -> Vec<f64> {
    let by_date: HashMap<&NaiveDate, f64> = dates.iter().zip(values.iter().copied()).collect();
    axis.iter()
        .map(|d| by_date.get(d).copied().unwrap_or(f64::NAN))
        .collect()
}

fn close_line(name: &str, axis: &[NaiveDate], s: &CloseSeries) -> Line {
    Line::new()
        .name(name)
        .data(align(axis, &s.dates, &s.close))
        .symbol(Symbol::None)
}

fn average_line(
    axis: &[NaiveDate],
    s: &AveragedSeries,
    window: usize,
    values: &[Option<f64>],
    color: &str,
) -> Line {
    let values: Vec<f64> = values.iter().map(|v| v.unwrap_or(f64::NAN)).collect();

    Line::new()
        .name(format!("{} {}-Day Avg", s.ticker, window))
        .data(align(axis, &s.dates, &values))
        .symbol(Symbol::None)
        .line_style(LineStyle::new().color(color).type_(LineStyleType::Dashed))
}

// ECharts candlestick order is [open, close, low, high].
fn candles(axis: &[NaiveDate], s: &CandleSeries) -> Vec<Vec<CompositeValue>> {
    let open = align(axis, &s.dates, &s.open);
    let close = align(axis, &s.dates, &s.close);
    let low = align(axis, &s.dates, &s.low);
    let high = align(axis, &s.dates, &s.high);

    (0..axis.len())
        .map(|i| {
            vec![
                CompositeValue::from(open[i]),
                CompositeValue::from(close[i]),
                CompositeValue::from(low[i]),
                CompositeValue::from(high[i]),
            ]
        })
        .collect()
}
