//! REST API Endpoints
//!
//! Stateless endpoints used by the charting frontend: transaction-cost
//! estimation from fixed linear formulas and synthetic historical series.
//! None of these touch the feed session.

use std::time::Instant;

use axum::{Json, extract::Query};
use chrono::{Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::infrastructure::okx::normalizer::round_to;

/// Fee rate for an unknown tier.
const DEFAULT_FEE_RATE: f64 = 0.002;

/// Baseline daily volume for the synthetic series.
const BASE_VOLUME: f64 = 1_000_000.0;

/// Baseline price for the synthetic candles.
const BASE_PRICE: f64 = 50_000.0;

// =============================================================================
// Cost Estimation
// =============================================================================

/// Request body for `POST /api/simulate`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationParams {
    /// Asset identifier (echoed only; one instrument is supported).
    pub asset: String,
    /// Order quantity, must be positive.
    pub quantity: f64,
    /// Assumed volatility in `[0, 1]`.
    pub volatility: f64,
    /// Fee tier, `VIP1`..`VIP5`.
    pub fee_tier: String,
}

/// Maker/taker fill probability split.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MakerTakerSplit {
    /// Probability the order fills passively.
    pub maker: f64,
    /// Probability the order crosses the spread.
    pub taker: f64,
}

/// Response body for `POST /api/simulate`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    /// Estimated slippage fraction.
    pub slippage: f64,
    /// Fee rate for the requested tier.
    pub fee: f64,
    /// Estimated market impact fraction.
    pub impact: f64,
    /// Total cost including all frictions.
    pub net_cost: f64,
    /// Maker/taker probability split.
    pub maker_taker_probability: MakerTakerSplit,
    /// Computation latency in milliseconds.
    pub latency: f64,
}

/// Validation error for cost estimation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CostEstimateError {
    /// Quantity was zero or negative.
    #[error("Quantity must be positive")]
    NonPositiveQuantity,
    /// Volatility outside `[0, 1]`.
    #[error("Volatility must be between 0 and 1")]
    VolatilityOutOfRange,
}

/// Fee rate for a tier name.
#[must_use]
pub fn fee_rate(tier: &str) -> f64 {
    match tier {
        "VIP1" => 0.002,
        "VIP2" => 0.0018,
        "VIP3" => 0.0015,
        "VIP4" => 0.0012,
        "VIP5" => 0.001,
        _ => DEFAULT_FEE_RATE,
    }
}

/// Compute a cost estimate from the fixed linear formulas.
///
/// # Errors
///
/// Returns a validation error for non-positive quantity or out-of-range
/// volatility.
pub fn estimate_cost(params: &SimulationParams) -> Result<SimulationResult, CostEstimateError> {
    let started = Instant::now();

    if params.quantity <= 0.0 {
        return Err(CostEstimateError::NonPositiveQuantity);
    }
    if !(0.0..=1.0).contains(&params.volatility) {
        return Err(CostEstimateError::VolatilityOutOfRange);
    }

    let fee = fee_rate(&params.fee_tier);
    let slippage = params.volatility.mul_add(0.001, 0.0005);
    let impact = (params.quantity / 10_000.0).mul_add(params.volatility, 0.0005);
    let net_cost = params.quantity * (1.0 + slippage + fee + impact);
    let taker = params.volatility.mul_add(0.4, 0.3);
    let maker = 1.0 - taker;

    Ok(SimulationResult {
        slippage,
        fee,
        impact,
        net_cost: round_to(net_cost, 2),
        maker_taker_probability: MakerTakerSplit {
            maker: round_to(maker, 3),
            taker: round_to(taker, 3),
        },
        latency: round_to(started.elapsed().as_secs_f64() * 1000.0, 2),
    })
}

/// `POST /api/simulate`
///
/// Validation failures are reported as `{"error": ...}` with status 200.
pub async fn simulate_handler(Json(params): Json<SimulationParams>) -> Json<serde_json::Value> {
    match estimate_cost(&params) {
        Ok(result) => Json(serde_json::json!(result)),
        Err(e) => Json(serde_json::json!({ "error": e.to_string() })),
    }
}

// =============================================================================
// Synthetic History
// =============================================================================

/// Query parameters for the history endpoints.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct HistoryQuery {
    /// Number of days to generate; the series has `days + 1` points.
    #[serde(default = "default_days")]
    pub days: i64,
}

const fn default_days() -> i64 {
    90
}

/// One point of the cost-history series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostHistoryPoint {
    /// Point timestamp.
    pub timestamp: String,
    /// Estimated slippage fraction.
    pub slippage: f64,
    /// Estimated impact fraction.
    pub impact: f64,
    /// Daily volume.
    pub volume: f64,
}

/// One OHLCV candle of the price-history series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candle {
    /// Candle timestamp.
    pub timestamp: String,
    /// Open price.
    pub open: f64,
    /// High price.
    pub high: f64,
    /// Low price.
    pub low: f64,
    /// Close price.
    pub close: f64,
    /// Volume.
    pub volume: f64,
}

/// Generate the synthetic slippage/impact/volume series.
#[must_use]
pub fn historical_series(days: i64) -> Vec<CostHistoryPoint> {
    let days = days.max(0);
    let count = days + 1;
    let end = Utc::now();
    let start = end - Duration::days(days);
    let mut rng = rand::rng();

    (0..count)
        .map(|i| {
            let trend = trend_cycle(i, count, 4.0);
            let daily_volatility = 0.2f64.mul_add(trend, 0.3) + rng.random::<f64>() * 0.2;
            let volume =
                BASE_VOLUME * (1.0 + trend * 0.3 + gaussian(&mut rng) * 0.1);
            let slippage = daily_volatility.mul_add(0.001, 0.0005);
            let impact = ((volume / BASE_VOLUME) * daily_volatility).mul_add(0.001, 0.0005);

            CostHistoryPoint {
                timestamp: (start + Duration::days(i)).to_rfc3339(),
                slippage: round_to(slippage, 6),
                impact: round_to(impact, 6),
                volume: round_to(volume, 2),
            }
        })
        .collect()
}

/// Generate the synthetic OHLCV candle series.
#[must_use]
pub fn price_history(days: i64) -> Vec<Candle> {
    let days = days.max(0);
    let count = days + 1;
    let end = Utc::now();
    let start = end - Duration::days(days);
    let mut rng = rand::rng();

    let mut trend = 0.0f64;
    (0..count)
        .map(|i| {
            trend += gaussian(&mut rng) * 100.0;
            let volatility = trend_cycle(i, count, 8.0).abs().mul_add(200.0, 100.0);

            let price_base = BASE_PRICE + trend;
            let daily_range = volatility * rng.random::<f64>();
            let open = gaussian(&mut rng).mul_add(volatility, price_base);
            let close = gaussian(&mut rng).mul_add(volatility, open);
            let high = open.max(close) + daily_range;
            let low = open.min(close) - daily_range;
            let price_change = (close - open).abs();
            let volume = BASE_VOLUME
                * (1.0 + price_change / price_base)
                * (1.0 + gaussian(&mut rng) * 0.2);

            Candle {
                timestamp: (start + Duration::days(i)).to_rfc3339(),
                open: round_to(open, 2),
                high: round_to(high, 2),
                low: round_to(low, 2),
                close: round_to(close, 2),
                volume: round_to(volume, 2),
            }
        })
        .collect()
}

/// `GET /api/historical`
pub async fn historical_handler(Query(query): Query<HistoryQuery>) -> Json<Vec<CostHistoryPoint>> {
    Json(historical_series(query.days))
}

/// `GET /api/price-history`
pub async fn price_history_handler(Query(query): Query<HistoryQuery>) -> Json<Vec<Candle>> {
    Json(price_history(query.days))
}

/// `GET /api/assets`
pub async fn assets_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "assets": ["BTC-USDT"] }))
}

/// Position `i` of `count` on a sine cycle spanning `half_turns * π`.
fn trend_cycle(i: i64, count: i64, half_turns: f64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let fraction = if count > 1 {
        i as f64 / (count - 1) as f64
    } else {
        0.0
    };
    (fraction * half_turns * std::f64::consts::PI).sin()
}

/// Standard-normal sample from twelve summed uniforms.
fn gaussian(rng: &mut impl Rng) -> f64 {
    (0..12).map(|_| rng.random::<f64>()).sum::<f64>() - 6.0
}
