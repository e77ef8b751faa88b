//! Per-period candlestick (OHLCV) series.
//!
//! Periods are minutes drawn from a fixed set matching the exchange's
//! interval labels. Ingestion normalizes open times from milliseconds to
//! seconds and rounds volume to 4 decimal places.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{FeedError, FeedResult};

/// The recognized k-line periods, in minutes.
pub const PERIOD_MINUTES: [u32; 12] = [1, 5, 15, 30, 60, 120, 240, 360, 720, 1440, 4320, 10080];

/// Exchange interval label for a period in minutes.
pub fn interval_label(minutes: u32) -> FeedResult<&'static str> {
    let label = match minutes {
        1 => "1m",
        5 => "5m",
        15 => "15m",
        30 => "30m",
        60 => "1h",
        120 => "2h",
        240 => "4h",
        360 => "6h",
        720 => "12h",
        1440 => "1d",
        4320 => "3d",
        10080 => "1w",
        _ => {
            return Err(FeedError::Configuration(format!(
                "Unknown k-line period: {} minutes",
                minutes
            )))
        }
    };
    Ok(label)
}

/// Period in minutes for an exchange interval label.
pub fn interval_minutes(label: &str) -> FeedResult<u32> {
    let minutes = match label {
        "1m" => 1,
        "5m" => 5,
        "15m" => 15,
        "30m" => 30,
        "1h" => 60,
        "2h" => 120,
        "4h" => 240,
        "6h" => 360,
        "12h" => 720,
        "1d" => 1440,
        "3d" => 4320,
        "1w" => 10080,
        _ => {
            return Err(FeedError::Configuration(format!(
                "Unknown k-line interval: {}",
                label
            )))
        }
    };
    Ok(minutes)
}

/// One OHLCV point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KlinePoint {
    /// Bar open time, unix seconds
    pub open_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    /// Rounded to 4 decimal places on ingestion
    pub volume: Decimal,
}

/// Per-period OHLCV series for one symbol.
#[derive(Debug, Clone)]
pub struct KLineSeries {
    symbol: String,
    series: BTreeMap<u32, Vec<KlinePoint>>,
}

impl KLineSeries {
    /// Create a series holding the given periods.
    ///
    /// Every period must be one of [`PERIOD_MINUTES`].
    pub fn new(symbol: impl Into<String>, periods: &[u32]) -> FeedResult<Self> {
        let mut series = BTreeMap::new();
        for &period in periods {
            interval_label(period)?;
            series.insert(period, Vec::new());
        }
        Ok(Self {
            symbol: symbol.into(),
            series,
        })
    }

    /// Symbol this series tracks.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Configured periods in ascending order.
    pub fn periods(&self) -> Vec<u32> {
        self.series.keys().copied().collect()
    }

    /// Normalize an incoming bar: ms -> s open time, volume to 4 dp.
    pub fn filter(
        &self,
        open_time_ms: i64,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> KlinePoint {
        KlinePoint {
            open_time: open_time_ms / 1000,
            open,
            high,
            low,
            close,
            volume: volume.round_dp(4),
        }
    }

    /// Normalize and append a bar to the given period's series.
    pub fn add(
        &mut self,
        period: u32,
        open_time_ms: i64,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> FeedResult<()> {
        let point = self.filter(open_time_ms, open, high, low, close, volume);
        let list = self.series.get_mut(&period).ok_or_else(|| {
            FeedError::Configuration(format!("Unknown k-line period: {} minutes", period))
        })?;
        list.push(point);
        Ok(())
    }

    /// Full copy of all series keyed by period.
    pub fn depth(&self) -> BTreeMap<u32, Vec<KlinePoint>> {
        self.series.clone()
    }

    /// Number of stored bars for a period, if configured.
    pub fn len(&self, period: u32) -> Option<usize> {
        self.series.get(&period).map(|list| list.len())
    }
}
