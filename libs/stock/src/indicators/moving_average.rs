use anyhow::{Result, anyhow};
use ta::Next;
use ta::indicators::SimpleMovingAverage;

/// Window sizes shown in moving-average mode.
pub const DEFAULT_WINDOWS: [usize; 2] = [10, 20];

/// Trailing simple moving average of `closes`, aligned index-for-index.
///
/// Entry `i` is the mean of `closes[i + 1 - window..=i]`; indices before the
/// window fills are `None`.
pub fn simple(closes: &[f64], window: usize) -> Result<Vec<Option<f64>>> {
    let mut sma = SimpleMovingAverage::new(window)
        .map_err(|e| anyhow!("invalid moving average window {window}: {e:?}"))?;

    Ok(closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let avg = sma.next(close);
            (i + 1 >= window).then_some(avg)
        })
        .collect())
}
