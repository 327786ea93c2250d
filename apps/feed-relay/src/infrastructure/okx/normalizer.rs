//! Message Normalizer
//!
//! Maps raw OKX feed payloads into the relay's canonical event shape.
//! Pure mapping: persistence and broadcast happen outside this module.
//!
//! Frames that are not market data (control events, unknown channels,
//! empty data arrays) normalize to `Ok(None)` and are silently dropped.
//! Frames that *should* be market data but cannot be decoded (missing trade
//! fields, non-numeric or non-finite values, unknown side) fail with a typed
//! error so the session can log the offending payload and continue.

use chrono::{DateTime, Utc};

use crate::domain::event::{BookLevel, CanonicalEvent, TickerEvent, TradeEvent, TradeSide};
use crate::infrastructure::okx::messages::{
    CHANNEL_TICKERS, CHANNEL_TRADES, FeedEnvelope, RawTicker, RawTrade,
};

/// Errors for a single malformed message. Never fatal to the session.
#[derive(Debug, thiserror::Error)]
pub enum NormalizerError {
    /// The payload was not valid JSON or did not match the expected record
    /// shape for its channel.
    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// A numeric field did not parse or was not finite.
    #[error("field {field} has invalid numeric value {value:?}")]
    BadNumber {
        /// Field name as on the wire.
        field: &'static str,
        /// Offending raw value.
        value: String,
    },

    /// The trade timestamp was out of range.
    #[error("invalid trade timestamp {0:?}")]
    BadTimestamp(String),

    /// The trade side was neither buy nor sell.
    #[error("unknown trade side {0:?}")]
    UnknownSide(String),
}

/// Normalizes raw upstream payloads for one instrument.
#[derive(Debug, Clone)]
pub struct Normalizer {
    exchange: String,
    instrument: String,
}

impl Normalizer {
    /// Create a normalizer stamping events with the given instrument.
    pub fn new(instrument: impl Into<String>) -> Self {
        Self {
            exchange: "OKX".to_string(),
            instrument: instrument.into(),
        }
    }

    /// Map one raw payload into a canonical event.
    ///
    /// `received_at` becomes the ticker timestamp (trades carry the
    /// upstream-reported time instead) and `latency_ms` is the measured
    /// processing latency the session attaches to ticker events.
    ///
    /// # Errors
    ///
    /// Returns an error when the payload claims to be market data but a
    /// field is malformed. The caller drops the message and keeps the
    /// session alive.
    pub fn normalize(
        &self,
        raw: &str,
        received_at: DateTime<Utc>,
        latency_ms: f64,
    ) -> Result<Option<CanonicalEvent>, NormalizerError> {
        let envelope: FeedEnvelope = serde_json::from_str(raw)?;
        self.normalize_envelope(envelope, received_at, latency_ms)
    }

    /// Map an already-parsed envelope into a canonical event. Used by the
    /// session, which needs the envelope for its own frame classification.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::normalize`].
    pub fn normalize_envelope(
        &self,
        envelope: FeedEnvelope,
        received_at: DateTime<Utc>,
        latency_ms: f64,
    ) -> Result<Option<CanonicalEvent>, NormalizerError> {
        if let Some(event) = envelope.event {
            tracing::debug!(event = %event, "upstream control frame");
            return Ok(None);
        }

        let Some(arg) = envelope.arg else {
            return Ok(None);
        };
        let Some(first) = envelope.data.into_iter().next() else {
            return Ok(None);
        };

        match arg.channel.as_str() {
            CHANNEL_TRADES => {
                let raw_trade: RawTrade = serde_json::from_value(first)?;
                Ok(Some(CanonicalEvent::Trade(self.trade(&raw_trade)?)))
            }
            CHANNEL_TICKERS => {
                let raw_ticker: RawTicker = serde_json::from_value(first)?;
                Ok(Some(CanonicalEvent::Ticker(self.ticker(
                    &raw_ticker,
                    received_at,
                    latency_ms,
                )?)))
            }
            other => {
                tracing::trace!(channel = %other, "ignoring unrecognized channel");
                Ok(None)
            }
        }
    }

    fn trade(&self, raw: &RawTrade) -> Result<TradeEvent, NormalizerError> {
        let millis: i64 = raw
            .ts
            .parse()
            .map_err(|_| NormalizerError::BadTimestamp(raw.ts.clone()))?;
        let timestamp = DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| NormalizerError::BadTimestamp(raw.ts.clone()))?;

        let side = match raw.side.to_lowercase().as_str() {
            "buy" => TradeSide::Buy,
            "sell" => TradeSide::Sell,
            _ => return Err(NormalizerError::UnknownSide(raw.side.clone())),
        };

        Ok(TradeEvent {
            timestamp,
            price: parse_finite("px", &raw.px)?,
            size: parse_finite("sz", &raw.sz)?,
            side,
        })
    }

    fn ticker(
        &self,
        raw: &RawTicker,
        received_at: DateTime<Utc>,
        latency_ms: f64,
    ) -> Result<TickerEvent, NormalizerError> {
        let last = parse_finite("last", &raw.last)?;
        let open_24h = parse_finite("open24h", &raw.open_24h)?;

        // Division-by-zero policy: a non-positive 24h open reads as 0% change.
        let change_24h = if open_24h > 0.0 {
            round_to((last - open_24h) / open_24h * 100.0, 2)
        } else {
            0.0
        };

        Ok(TickerEvent {
            timestamp: received_at,
            exchange: self.exchange.clone(),
            symbol: self.instrument.clone(),
            price: last,
            high_24h: parse_finite("high24h", &raw.high_24h)?,
            low_24h: parse_finite("low24h", &raw.low_24h)?,
            volume_24h: parse_finite("volCcy24h", &raw.vol_ccy_24h)?,
            change_24h,
            ask: BookLevel {
                price: parse_finite("askPx", &raw.ask_px)?,
                size: parse_finite("askSz", &raw.ask_sz)?,
            },
            bid: BookLevel {
                price: parse_finite("bidPx", &raw.bid_px)?,
                size: parse_finite("bidSz", &raw.bid_sz)?,
            },
            latency_ms,
        })
    }
}

fn parse_finite(field: &'static str, value: &str) -> Result<f64, NormalizerError> {
    let parsed: f64 = value.parse().map_err(|_| NormalizerError::BadNumber {
        field,
        value: value.to_string(),
    })?;

    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err(NormalizerError::BadNumber {
            field,
            value: value.to_string(),
        })
    }
}

/// Round to `dp` decimal places.
pub(crate) fn round_to(value: f64, dp: i32) -> f64 {
    let factor = 10f64.powi(dp);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn normalizer() -> Normalizer {
        Normalizer::new("BTC-USDT-SWAP")
    }

    fn normalize(raw: &str) -> Result<Option<CanonicalEvent>, NormalizerError> {
        normalizer().normalize(raw, Utc::now(), 0.5)
    }

    #[test]
    fn trade_payload_maps_to_trade_event() {
        let raw = r#"{"arg":{"channel":"trades","instId":"BTC-USDT-SWAP"},
                      "data":[{"ts":"1700000000000","px":"45000.5","sz":"0.01","side":"BUY"}]}"#;

        let event = normalize(raw).unwrap().unwrap();
        let CanonicalEvent::Trade(trade) = event else {
            panic!("expected trade event");
        };

        assert_eq!(
            trade.timestamp,
            DateTime::from_timestamp_millis(1_700_000_000_000).unwrap()
        );
        assert_eq!(
            trade.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            "2023-11-14T22:13:20Z"
        );
        assert_eq!(trade.price, 45000.5);
        assert_eq!(trade.size, 0.01);
        assert_eq!(trade.side, TradeSide::Buy);
    }

    #[test]
    fn ticker_payload_maps_to_ticker_event() {
        let raw = r#"{"arg":{"channel":"tickers","instId":"BTC-USDT-SWAP"},
                      "data":[{"last":"45900.0","open24h":"45000.0","high24h":"46000.0",
                               "low24h":"44500.0","volCcy24h":"12345.6",
                               "askPx":"45900.1","askSz":"1.5","bidPx":"45899.9","bidSz":"2.5"}]}"#;

        let received_at = Utc::now();
        let event = normalizer()
            .normalize(raw, received_at, 1.25)
            .unwrap()
            .unwrap();
        let CanonicalEvent::Ticker(ticker) = event else {
            panic!("expected ticker event");
        };

        assert_eq!(ticker.timestamp, received_at);
        assert_eq!(ticker.exchange, "OKX");
        assert_eq!(ticker.symbol, "BTC-USDT-SWAP");
        assert_eq!(ticker.price, 45900.0);
        assert_eq!(ticker.change_24h, 2.0);
        assert_eq!(ticker.ask.price, 45900.1);
        assert_eq!(ticker.bid.size, 2.5);
        assert_eq!(ticker.latency_ms, 1.25);
    }

    #[test]
    fn zero_open_yields_zero_change() {
        let raw = r#"{"arg":{"channel":"tickers","instId":"BTC-USDT-SWAP"},
                      "data":[{"last":"45900.0","open24h":"0"}]}"#;

        let event = normalize(raw).unwrap().unwrap();
        let CanonicalEvent::Ticker(ticker) = event else {
            panic!("expected ticker event");
        };
        assert_eq!(ticker.change_24h, 0.0);
    }

    #[test]
    fn negative_open_yields_zero_change() {
        let raw = r#"{"arg":{"channel":"tickers","instId":"BTC-USDT-SWAP"},
                      "data":[{"last":"45900.0","open24h":"-1"}]}"#;

        let event = normalize(raw).unwrap().unwrap();
        let CanonicalEvent::Ticker(ticker) = event else {
            panic!("expected ticker event");
        };
        assert_eq!(ticker.change_24h, 0.0);
    }

    #[test_case(r#"{"event":"subscribe","arg":{"channel":"tickers"}}"# ; "control frame")]
    #[test_case(r#"{"arg":{"channel":"books5","instId":"BTC-USDT-SWAP"},"data":[{}]}"# ; "unknown channel")]
    #[test_case(r#"{"arg":{"channel":"trades","instId":"BTC-USDT-SWAP"},"data":[]}"# ; "empty data array")]
    #[test_case(r#"{"foo":"bar"}"# ; "untagged frame")]
    fn non_data_frames_yield_no_event(raw: &str) {
        assert!(normalize(raw).unwrap().is_none());
    }

    #[test_case(r#"{"arg":{"channel":"trades"},"data":[{"ts":"1700000000000","px":"abc","sz":"0.01","side":"BUY"}]}"# ; "non numeric price")]
    #[test_case(r#"{"arg":{"channel":"trades"},"data":[{"ts":"not-ms","px":"1.0","sz":"0.01","side":"BUY"}]}"# ; "bad timestamp")]
    #[test_case(r#"{"arg":{"channel":"trades"},"data":[{"ts":"1700000000000","px":"1.0","sz":"0.01","side":"HOLD"}]}"# ; "unknown side")]
    #[test_case(r#"{"arg":{"channel":"trades"},"data":[{"px":"1.0"}]}"# ; "missing trade fields")]
    #[test_case(r#"{"arg":{"channel":"tickers"},"data":[{"last":"NaN"}]}"# ; "non finite last")]
    #[test_case("not json at all" ; "invalid json")]
    fn malformed_frames_yield_errors(raw: &str) {
        assert!(normalize(raw).is_err());
    }

    #[test]
    fn side_is_lowercased() {
        let raw = r#"{"arg":{"channel":"trades"},
                      "data":[{"ts":"1700000000000","px":"1.0","sz":"2.0","side":"SELL"}]}"#;

        let event = normalize(raw).unwrap().unwrap();
        let CanonicalEvent::Trade(trade) = event else {
            panic!("expected trade event");
        };
        assert_eq!(trade.side, TradeSide::Sell);
    }

    #[test]
    fn missing_ticker_fields_read_as_zero() {
        let raw = r#"{"arg":{"channel":"tickers"},"data":[{"last":"100.0"}]}"#;

        let event = normalize(raw).unwrap().unwrap();
        let CanonicalEvent::Ticker(ticker) = event else {
            panic!("expected ticker event");
        };
        assert_eq!(ticker.high_24h, 0.0);
        assert_eq!(ticker.volume_24h, 0.0);
        assert_eq!(ticker.ask.price, 0.0);
        assert_eq!(ticker.change_24h, 0.0);
    }

    #[test]
    fn change_is_rounded_to_two_decimals() {
        let raw = r#"{"arg":{"channel":"tickers"},
                      "data":[{"last":"100.333","open24h":"100.0"}]}"#;

        let event = normalize(raw).unwrap().unwrap();
        let CanonicalEvent::Ticker(ticker) = event else {
            panic!("expected ticker event");
        };
        assert_eq!(ticker.change_24h, 0.33);
    }
}
