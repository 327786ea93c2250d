//! Synthetic Feed Generator
//!
//! Produces plausible ticker and trade events from a bounded random walk
//! when no real upstream connection is available. Events go straight into
//! the canonical shape; the normalizer is bypassed on this path.
//!
//! The walk is driftless and multiplicative: each step scales the price by a
//! factor in `(1 - volatility, 1 + volatility)`, so the price can never
//! reach zero or go negative regardless of run length.

use chrono::Utc;
use rand::Rng;

use crate::domain::event::{BookLevel, TickerEvent, TradeEvent, TradeSide};
use crate::infrastructure::okx::normalizer::round_to;

/// Spread applied around the walk price for the synthetic best book (1 bp).
const BOOK_SPREAD: f64 = 0.0001;

/// Configuration for the synthetic generator.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Price the walk starts from.
    pub initial_price: f64,
    /// Per-tick volatility factor.
    pub volatility: f64,
    /// Interval between ticks while simulating.
    pub tick_interval: std::time::Duration,
    /// Probability of emitting a synthetic trade alongside a tick.
    pub trade_probability: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            initial_price: 45_000.0,
            volatility: 0.002,
            tick_interval: std::time::Duration::from_secs(1),
            trade_probability: 0.3,
        }
    }
}

/// Bounded random-walk generator for one instrument.
#[derive(Debug)]
pub struct SyntheticFeed {
    config: SimulatorConfig,
    exchange: String,
    instrument: String,
    last_price: f64,
}

impl SyntheticFeed {
    /// Create a generator starting at the configured initial price.
    pub fn new(config: SimulatorConfig, instrument: impl Into<String>) -> Self {
        let last_price = config.initial_price;
        Self {
            config,
            exchange: "OKX".to_string(),
            instrument: instrument.into(),
            last_price,
        }
    }

    /// Current price of the walk.
    #[must_use]
    pub const fn last_price(&self) -> f64 {
        self.last_price
    }

    /// Advance the walk one step and emit a ticker snapshot.
    ///
    /// The 24h high/low are a random presentational band of up to ±5%
    /// around the new price; no history is kept.
    pub fn tick(&mut self) -> TickerEvent {
        let mut rng = rand::rng();

        let step = self.last_price
            * self.config.volatility
            * rng.random::<f64>().mul_add(2.0, -1.0);
        self.last_price += step;

        let price = round_to(self.last_price, 2);
        let high_24h = round_to(self.last_price * (1.0 + rng.random::<f64>() * 0.05), 2);
        let low_24h = round_to(self.last_price * (1.0 - rng.random::<f64>() * 0.05), 2);
        let volume_24h = round_to(rng.random_range(1000.0..5000.0), 2);
        let change_24h = round_to(step / self.last_price * 100.0, 2);

        TickerEvent {
            timestamp: Utc::now(),
            exchange: self.exchange.clone(),
            symbol: self.instrument.clone(),
            price,
            high_24h,
            low_24h,
            volume_24h,
            change_24h,
            ask: BookLevel {
                price: round_to(self.last_price * (1.0 + BOOK_SPREAD), 2),
                size: round_to(rng.random_range(0.1..2.0), 4),
            },
            bid: BookLevel {
                price: round_to(self.last_price * (1.0 - BOOK_SPREAD), 2),
                size: round_to(rng.random_range(0.1..2.0), 4),
            },
            latency_ms: 0.0,
        }
    }

    /// With the configured probability, emit a synthetic trade near the
    /// current walk price.
    pub fn maybe_trade(&mut self) -> Option<TradeEvent> {
        let mut rng = rand::rng();

        if rng.random::<f64>() >= self.config.trade_probability {
            return None;
        }

        let side = if rng.random::<bool>() {
            TradeSide::Buy
        } else {
            TradeSide::Sell
        };

        Some(TradeEvent {
            timestamp: Utc::now(),
            price: round_to(self.last_price + rng.random_range(-10.0..10.0), 2),
            size: round_to(rng.random_range(0.1..2.0), 4),
            side,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed() -> SyntheticFeed {
        SyntheticFeed::new(SimulatorConfig::default(), "BTC-USDT-SWAP")
    }

    #[test]
    fn price_stays_positive_over_long_runs() {
        let mut feed = feed();
        for _ in 0..10_000 {
            let ticker = feed.tick();
            assert!(ticker.price > 0.0);
            assert!(feed.last_price() > 0.0);
        }
    }

    #[test]
    fn change_percent_is_consistent_with_successive_prices() {
        let mut feed = feed();
        for _ in 0..1_000 {
            let before = feed.last_price();
            let ticker = feed.tick();
            let after = feed.last_price();

            let expected = (after - before) / after * 100.0;
            // Emitted value is rounded to two decimals.
            assert!(
                (ticker.change_24h - expected).abs() <= 0.005 + 1e-9,
                "change {} inconsistent with step {before} -> {after}",
                ticker.change_24h
            );
        }
    }

    #[test]
    fn steps_are_bounded_by_volatility() {
        let mut feed = feed();
        for _ in 0..1_000 {
            let before = feed.last_price();
            feed.tick();
            let after = feed.last_price();

            let relative = ((after - before) / before).abs();
            assert!(relative <= SimulatorConfig::default().volatility);
        }
    }

    #[test]
    fn band_straddles_the_price() {
        let mut feed = feed();
        for _ in 0..1_000 {
            let ticker = feed.tick();
            assert!(ticker.high_24h >= ticker.price * 0.999);
            assert!(ticker.low_24h <= ticker.price * 1.001);
            assert!(ticker.ask.price >= ticker.bid.price);
            assert!((1000.0..5000.0).contains(&ticker.volume_24h) || ticker.volume_24h == 5000.0);
        }
    }

    #[test]
    fn trade_frequency_tracks_probability() {
        let mut feed = feed();
        let trials: u32 = 10_000;
        let mut trades = 0u32;
        let mut buys = 0u32;

        for _ in 0..trials {
            if let Some(trade) = feed.maybe_trade() {
                trades += 1;
                if trade.side == TradeSide::Buy {
                    buys += 1;
                }
                assert!(trade.size >= 0.1 && trade.size <= 2.0);
                assert!((trade.price - feed.last_price()).abs() <= 10.0);
            }
        }

        let rate = f64::from(trades) / f64::from(trials);
        assert!(
            (0.25..0.35).contains(&rate),
            "trade rate {rate} outside expected band"
        );
        // Both sides occur.
        assert!(buys > 0 && buys < trades);
    }

    #[test]
    fn never_trades_with_zero_probability() {
        let config = SimulatorConfig {
            trade_probability: 0.0,
            ..SimulatorConfig::default()
        };
        let mut feed = SyntheticFeed::new(config, "BTC-USDT-SWAP");

        for _ in 0..100 {
            assert!(feed.maybe_trade().is_none());
        }
    }
}
