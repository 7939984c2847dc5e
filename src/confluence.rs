//! Confluence classifier
//!
//! Maps the joined daily/hourly snapshot of one instrument to four labels and
//! a composite status. Total over its input: every missing value has an
//! explicit fallback branch, and NaN is treated the same as missing.

use crate::types::MatrixRow;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierThresholds {
    /// Daily ADX strictly above this is TRENDING
    pub trending_adx: f64,
    /// Squeeze when width <= trailing min width * factor
    pub squeeze_factor: f64,
    pub overbought_rsi: f64,
    pub oversold_rsi: f64,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            trending_adx: 25.0,
            squeeze_factor: 1.1,
            overbought_rsi: 70.0,
            oversold_rsi: 30.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Regime {
    Trending,
    Ranging,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Volatility {
    Squeeze,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Momentum {
    Overbought,
    Oversold,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Bullish,
    Bearish,
    Neutral,
}

/// Composite confluence status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "SQUEEZE")]
    Squeeze,
    #[serde(rename = "BULLISH PULLBACK")]
    BullishPullback,
    #[serde(rename = "BEARISH PULLBACK")]
    BearishPullback,
    #[serde(rename = "TRENDING")]
    Trending,
    #[serde(rename = "RANGE BUY")]
    RangeBuy,
    #[serde(rename = "RANGE SELL")]
    RangeSell,
    #[serde(rename = "RANGING")]
    Ranging,
    #[serde(rename = "WAIT")]
    Wait,
}

impl Regime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::Trending => "TRENDING",
            Regime::Ranging => "RANGING",
        }
    }
}

impl Volatility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Volatility::Squeeze => "SQUEEZE",
            Volatility::Normal => "NORMAL",
        }
    }
}

impl Momentum {
    pub fn as_str(&self) -> &'static str {
        match self {
            Momentum::Overbought => "OVERBOUGHT",
            Momentum::Oversold => "OVERSOLD",
            Momentum::Neutral => "NEUTRAL",
        }
    }
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Bullish => "BULLISH",
            Direction::Bearish => "BEARISH",
            Direction::Neutral => "NEUTRAL",
        }
    }
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Squeeze => "SQUEEZE",
            Status::BullishPullback => "BULLISH PULLBACK",
            Status::BearishPullback => "BEARISH PULLBACK",
            Status::Trending => "TRENDING",
            Status::RangeBuy => "RANGE BUY",
            Status::RangeSell => "RANGE SELL",
            Status::Ranging => "RANGING",
            Status::Wait => "WAIT",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// The four sub-labels of one instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Labels {
    pub regime: Regime,
    pub volatility: Volatility,
    pub momentum: Momentum,
    pub direction: Direction,
}

/// Matrix row plus derived labels and status
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedRecord {
    pub row: MatrixRow,
    pub labels: Labels,
    pub status: Status,
}

/// Drop NaN so it takes the missing-data branch
fn present(v: Option<f64>) -> Option<f64> {
    v.filter(|x| !x.is_nan())
}

pub fn regime(daily_adx: Option<f64>, t: &ClassifierThresholds) -> Regime {
    match present(daily_adx) {
        Some(adx) if adx > t.trending_adx => Regime::Trending,
        _ => Regime::Ranging,
    }
}

pub fn volatility(width: Option<f64>, min_width_20: Option<f64>, t: &ClassifierThresholds) -> Volatility {
    match (present(width), present(min_width_20)) {
        (Some(w), Some(min)) if w <= min * t.squeeze_factor => Volatility::Squeeze,
        _ => Volatility::Normal,
    }
}

pub fn momentum(rsi: Option<f64>, t: &ClassifierThresholds) -> Momentum {
    match present(rsi) {
        Some(r) if r > t.overbought_rsi => Momentum::Overbought,
        Some(r) if r < t.oversold_rsi => Momentum::Oversold,
        _ => Momentum::Neutral,
    }
}

pub fn direction(macd_line: Option<f64>, macd_signal: Option<f64>) -> Direction {
    match (present(macd_line), present(macd_signal)) {
        (Some(line), Some(signal)) if line > signal => Direction::Bullish,
        (Some(line), Some(signal)) if line < signal => Direction::Bearish,
        _ => Direction::Neutral,
    }
}

/// Composite status, first matching rule wins. Squeeze pre-empts every
/// trend and range rule.
pub fn composite(labels: &Labels) -> Status {
    use Direction::{Bearish, Bullish};
    use Momentum::{Overbought, Oversold};

    if labels.volatility == Volatility::Squeeze {
        return Status::Squeeze;
    }

    let setup = (labels.direction, labels.momentum);

    if labels.regime == Regime::Trending {
        return match setup {
            (Bullish, Oversold) => Status::BullishPullback,
            (Bearish, Overbought) => Status::BearishPullback,
            _ => Status::Trending,
        };
    }

    if labels.regime == Regime::Ranging {
        return match setup {
            (Bullish, Oversold) => Status::RangeBuy,
            (Bearish, Overbought) => Status::RangeSell,
            _ => Status::Ranging,
        };
    }

    Status::Wait
}

/// Derive the labels for one matrix row.
pub fn labels(row: &MatrixRow, t: &ClassifierThresholds) -> Labels {
    Labels {
        regime: regime(row.daily_adx, t),
        volatility: volatility(row.hourly_bb_width, row.hourly_min_bb_width_20, t),
        momentum: momentum(row.hourly_rsi, t),
        direction: direction(row.hourly_macd_line, row.hourly_macd_signal),
    }
}

/// Classify one matrix row. Pure; never fails.
pub fn classify(row: MatrixRow, t: &ClassifierThresholds) -> ClassifiedRecord {
    let labels = labels(&row, t);
    let status = composite(&labels);
    ClassifiedRecord { row, labels, status }
}
