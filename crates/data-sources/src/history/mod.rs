//! Daily history backfill.
//!
//! Reuses the classification rules of quote resolution to route a
//! tracked symbol at its history backend: crypto bases go to the candle
//! provider, everything equity-shaped goes to the chart range pull.
//!
//! Batch updates run five symbols at a time with a fixed two-second
//! pause between batches to stay under upstream rate limits. Every job
//! in a batch runs to completion; individual failures are collected and
//! summarized, never propagated as an abort.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use log::{info, warn};
use serde::Serialize;

use crate::classify::{is_six_digit_code, normalize_a_share};
use crate::errors::DataSourceError;
use crate::models::{AssetType, DailyQuote};
use crate::provider::crypto_exchange::CryptoHistoryProvider;
use crate::provider::yahoo_chart::YahooChartProvider;

/// Concurrent symbol updates per batch.
const BATCH_SIZE: usize = 5;

/// Pause between batches.
const INTER_BATCH_DELAY: Duration = Duration::from_secs(2);

/// One symbol to backfill.
#[derive(Clone, Debug)]
pub struct BackfillJob {
    pub symbol: String,
    pub asset_type: AssetType,
}

/// Outcome counts for a batch run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct BackfillSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
}

#[derive(Debug, PartialEq, Eq)]
enum HistoryTarget {
    Equity(String),
    Crypto(String),
}

/// Route a symbol at its history backend.
fn history_target(
    symbol: &str,
    asset_type: AssetType,
) -> Result<HistoryTarget, DataSourceError> {
    match asset_type {
        AssetType::Crypto => {
            // Holdings store the matched market ("BTC/USDC"); the candle
            // feed wants the bare base.
            let base = symbol.split('/').next().unwrap_or(symbol).trim();
            Ok(HistoryTarget::Crypto(base.to_uppercase()))
        }
        AssetType::Stock | AssetType::Etf | AssetType::Index => {
            let trimmed = symbol.trim();
            let symbol = if is_six_digit_code(trimmed) {
                normalize_a_share(trimmed)
            } else {
                trimmed.to_string()
            };
            Ok(HistoryTarget::Equity(symbol))
        }
        other => Err(DataSourceError::Unrecognized {
            input: format!("{} ({:?})", symbol, other),
        }),
    }
}

/// Daily OHLC backfill over the tracked portfolio.
pub struct HistoryService {
    yahoo: Arc<YahooChartProvider>,
    crypto: Arc<CryptoHistoryProvider>,
}

impl HistoryService {
    pub fn new(yahoo: Arc<YahooChartProvider>, crypto: Arc<CryptoHistoryProvider>) -> Self {
        Self { yahoo, crypto }
    }

    /// Daily close series for one symbol, oldest first.
    pub async fn daily_series(
        &self,
        symbol: &str,
        asset_type: AssetType,
        days: i64,
    ) -> Result<Vec<DailyQuote>, DataSourceError> {
        match history_target(symbol, asset_type)? {
            HistoryTarget::Equity(symbol) => self.yahoo.daily_history(&symbol, days).await,
            HistoryTarget::Crypto(base) => self.crypto.daily_series(&base, days).await,
        }
    }

    /// Update every job, five at a time with a pause between batches.
    pub async fn backfill(&self, jobs: &[BackfillJob], days: i64) -> BackfillSummary {
        let mut summary = BackfillSummary {
            total: jobs.len(),
            ..Default::default()
        };

        let mut batches = jobs.chunks(BATCH_SIZE).peekable();
        while let Some(batch) = batches.next() {
            let results = join_all(batch.iter().map(|job| async move {
                let result = self
                    .daily_series(&job.symbol, job.asset_type, days)
                    .await;
                (job.symbol.clone(), result)
            }))
            .await;

            for (symbol, result) in results {
                match result {
                    Ok(series) => {
                        info!("backfilled {} ({} days of closes)", symbol, series.len());
                        summary.success += 1;
                    }
                    Err(e) => {
                        warn!("backfill failed for {}: {}", symbol, e);
                        summary.failed += 1;
                    }
                }
            }

            if batches.peek().is_some() {
                tokio::time::sleep(INTER_BATCH_DELAY).await;
            }
        }

        summary
    }
}
