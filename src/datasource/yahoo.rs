//! Yahoo Finance chart API adapter

use crate::config::FetchSpec;
use crate::datasource::DataSource;
use crate::error::{AppError, Result};
use crate::types::{Bar, Timeframe};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use chrono_tz::Tz;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) confluence-scanner/1.0";

/// Yahoo Finance implementation
pub struct YahooSource {
    client: Client,
    base_url: String,
}

impl YahooSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_base_url(BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn chart_url(&self, instrument: &str, spec: &FetchSpec) -> String {
        format!(
            "{}/{}?range={}&interval={}&includePrePost=false&events=div%2Csplits",
            self.base_url,
            urlencoding::encode(instrument),
            urlencoding::encode(&spec.lookback),
            urlencoding::encode(&spec.interval),
        )
    }
}

#[async_trait]
impl DataSource for YahooSource {
    fn id(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch(&self, instrument: &str, spec: &FetchSpec) -> Result<Vec<Bar>> {
        let url = self.chart_url(instrument, spec);
        debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let body: ChartResponse = response.json().await?;

        if let Some(err) = &body.chart.error {
            if err.code == "Not Found" {
                return Ok(Vec::new());
            }
            return Err(AppError::DataSource(format!(
                "{} {}: {} ({})",
                instrument,
                spec.interval,
                err.description.as_deref().unwrap_or("unknown error"),
                status
            )));
        }

        parse_chart(body, spec.timeframe)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    exchange_timezone_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<QuoteColumns>,
    #[serde(default)]
    adjclose: Vec<AdjCloseColumn>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteColumns {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<i64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseColumn {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

/// Turn a chart payload into bars.
///
/// Rows with any missing price are skipped. Prices are scaled by
/// adjclose/close when an adjusted close is present (splits and dividends).
/// Intraday timestamps become naive UTC; daily bars are stamped with the
/// exchange-local calendar date at midnight.
pub(crate) fn parse_chart(body: ChartResponse, timeframe: Timeframe) -> Result<Vec<Bar>> {
    let result = match body.chart.result.and_then(|r| r.into_iter().next()) {
        Some(r) => r,
        None => return Ok(Vec::new()),
    };

    let tz: Tz = result
        .meta
        .exchange_timezone_name
        .as_deref()
        .and_then(|name| name.parse().ok())
        .unwrap_or(Tz::UTC);

    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let adjclose = result
        .indicators
        .adjclose
        .into_iter()
        .next()
        .map(|c| c.adjclose)
        .unwrap_or_default();

    let mut bars = Vec::with_capacity(result.timestamp.len());
    for (i, &epoch) in result.timestamp.iter().enumerate() {
        let column = |c: &Vec<Option<f64>>| c.get(i).copied().flatten();
        let (open, high, low, close) = match (
            column(&quote.open),
            column(&quote.high),
            column(&quote.low),
            column(&quote.close),
        ) {
            (Some(o), Some(h), Some(l), Some(c)) => (o, h, l, c),
            _ => continue,
        };

        let ratio = match column(&adjclose) {
            Some(adj) if close != 0.0 => adj / close,
            _ => 1.0,
        };

        bars.push(Bar {
            timestamp: to_naive(epoch, timeframe, tz)?,
            open: open * ratio,
            high: high * ratio,
            low: low * ratio,
            close: close * ratio,
            volume: quote.volume.get(i).copied().flatten().unwrap_or(0).max(0),
        });
    }

    Ok(bars)
}

fn to_naive(epoch: i64, timeframe: Timeframe, tz: Tz) -> Result<NaiveDateTime> {
    let utc = DateTime::from_timestamp(epoch, 0)
        .ok_or_else(|| AppError::DataSource(format!("Timestamp out of range: {}", epoch)))?;

    match timeframe {
        Timeframe::Hourly => Ok(utc.naive_utc()),
        Timeframe::Daily => utc
            .with_timezone(&tz)
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| AppError::DataSource(format!("Bad daily timestamp: {}", epoch))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn chart(json: &str) -> ChartResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_hourly_timestamps_become_naive_utc() {
        // 2024-06-03 13:30:00 UTC and 14:30:00 UTC
        let body = chart(
            r#"{"chart":{"result":[{
                "meta":{"exchangeTimezoneName":"America/New_York"},
                "timestamp":[1717421400,1717425000],
                "indicators":{"quote":[{
                    "open":[100.0,101.0],"high":[102.0,103.0],"low":[99.0,100.5],
                    "close":[101.0,102.5],"volume":[1200,900]}]}
            }],"error":null}}"#,
        );

        let bars = parse_chart(body, Timeframe::Hourly).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(
            bars[0].timestamp,
            NaiveDate::from_ymd_opt(2024, 6, 3).unwrap().and_hms_opt(13, 30, 0).unwrap()
        );
        assert_eq!(bars[1].close, 102.5);
        assert_eq!(bars[1].volume, 900);
    }

    #[test]
    fn test_daily_bars_use_exchange_date_and_adjclose() {
        // 2024-06-04 04:00:00 UTC is midnight in New York
        let body = chart(
            r#"{"chart":{"result":[{
                "meta":{"exchangeTimezoneName":"America/New_York"},
                "timestamp":[1717473600],
                "indicators":{
                    "quote":[{"open":[200.0],"high":[210.0],"low":[190.0],"close":[200.0],"volume":[5000]}],
                    "adjclose":[{"adjclose":[100.0]}]}
            }],"error":null}}"#,
        );

        let bars = parse_chart(body, Timeframe::Daily).unwrap();
        assert_eq!(
            bars[0].timestamp,
            NaiveDate::from_ymd_opt(2024, 6, 4).unwrap().and_hms_opt(0, 0, 0).unwrap()
        );
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].high, 105.0);
        assert_eq!(bars[0].low, 95.0);
        assert_eq!(bars[0].close, 100.0);
    }

    #[test]
    fn test_rows_with_missing_prices_are_skipped() {
        let body = chart(
            r#"{"chart":{"result":[{
                "meta":{},
                "timestamp":[1717421400,1717425000,1717428600],
                "indicators":{"quote":[{
                    "open":[100.0,null,101.0],"high":[102.0,null,103.0],"low":[99.0,null,100.5],
                    "close":[101.0,null,102.5],"volume":[1200,null,null]}]}
            }],"error":null}}"#,
        );

        let bars = parse_chart(body, Timeframe::Hourly).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].volume, 0);
    }

    #[test]
    fn test_empty_result_is_not_an_error() {
        let body = chart(r#"{"chart":{"result":null,"error":null}}"#);
        assert!(parse_chart(body, Timeframe::Daily).unwrap().is_empty());

        let body = chart(r#"{"chart":{"result":[{"meta":{},"indicators":{"quote":[{}]}}],"error":null}}"#);
        assert!(parse_chart(body, Timeframe::Hourly).unwrap().is_empty());
    }

    #[test]
    fn test_chart_url_encodes_symbol() {
        let source = YahooSource::with_base_url("http://localhost:9/chart/", Duration::from_secs(1)).unwrap();
        let spec = FetchSpec::new(Timeframe::Hourly, "60d", "1h");
        assert_eq!(
            source.chart_url("^GSPC", &spec),
            "http://localhost:9/chart/%5EGSPC?range=60d&interval=1h&includePrePost=false&events=div%2Csplits"
        );
    }
}
