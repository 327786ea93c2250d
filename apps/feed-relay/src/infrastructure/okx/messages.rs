//! OKX WebSocket Message Types
//!
//! Wire format types for the OKX v5 public WebSocket API. These map directly
//! to OKX's JSON schemas: one subscribe request going out, and tagged data
//! envelopes coming in. OKX encodes every numeric field as a string.
//!
//! # Wire Format
//!
//! Outbound subscribe:
//! ```json
//! {"op":"subscribe","args":[
//!   {"channel":"tickers","instId":"BTC-USDT-SWAP"},
//!   {"channel":"trades","instId":"BTC-USDT-SWAP"}]}
//! ```
//!
//! Inbound data frame:
//! ```json
//! {"arg":{"channel":"trades","instId":"BTC-USDT-SWAP"},
//!  "data":[{"ts":"1700000000000","px":"45000.5","sz":"0.01","side":"BUY"}]}
//! ```
//!
//! Inbound control frame (subscription ack, errors):
//! ```json
//! {"event":"subscribe","arg":{"channel":"tickers","instId":"BTC-USDT-SWAP"}}
//! ```

use serde::{Deserialize, Serialize};

/// Channel carrying 24h ticker snapshots.
pub const CHANNEL_TICKERS: &str = "tickers";

/// Channel carrying individual trades.
pub const CHANNEL_TRADES: &str = "trades";

/// One channel/instrument pair in a subscribe request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelArg {
    /// Channel name (`tickers`, `trades`, ...).
    pub channel: String,
    /// Instrument identifier, e.g. `BTC-USDT-SWAP`.
    #[serde(rename = "instId", default, skip_serializing_if = "Option::is_none")]
    pub inst_id: Option<String>,
}

/// Subscribe request sent once per connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    /// Operation, always `subscribe`.
    pub op: String,
    /// Channels to subscribe.
    pub args: Vec<ChannelArg>,
}

impl SubscribeRequest {
    /// Build the market-data subscription for one instrument: the ticker
    /// channel and the trade channel.
    #[must_use]
    pub fn market_data(inst_id: &str) -> Self {
        Self {
            op: "subscribe".to_string(),
            args: vec![
                ChannelArg {
                    channel: CHANNEL_TICKERS.to_string(),
                    inst_id: Some(inst_id.to_string()),
                },
                ChannelArg {
                    channel: CHANNEL_TRADES.to_string(),
                    inst_id: Some(inst_id.to_string()),
                },
            ],
        }
    }
}

/// Envelope of every inbound frame.
///
/// Control frames carry `event`; data frames carry `arg` + `data`.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedEnvelope {
    /// Control event name, if this is a control frame.
    #[serde(default)]
    pub event: Option<String>,
    /// Channel descriptor, if this is a data frame.
    #[serde(default)]
    pub arg: Option<ChannelArg>,
    /// Channel-specific records; OKX sends one-element arrays.
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
}

impl FeedEnvelope {
    /// Whether this frame carries channel data (as opposed to a control
    /// event or an unrecognized shape).
    #[must_use]
    pub fn is_data_frame(&self) -> bool {
        self.event.is_none() && self.arg.is_some() && !self.data.is_empty()
    }
}

/// Raw trade record from the `trades` channel. All fields required;
/// a record missing any of them is malformed.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTrade {
    /// Trade time, epoch milliseconds.
    pub ts: String,
    /// Trade price.
    pub px: String,
    /// Trade size.
    pub sz: String,
    /// Trade side, `BUY`/`SELL` in any casing.
    pub side: String,
}

/// Raw ticker record from the `tickers` channel. OKX omits fields for thin
/// instruments; absent numeric fields read as zero.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTicker {
    /// Last traded price.
    #[serde(default = "zero")]
    pub last: String,
    /// 24h open price.
    #[serde(rename = "open24h", default = "zero")]
    pub open_24h: String,
    /// 24h high price.
    #[serde(rename = "high24h", default = "zero")]
    pub high_24h: String,
    /// 24h low price.
    #[serde(rename = "low24h", default = "zero")]
    pub low_24h: String,
    /// 24h volume in quote currency.
    #[serde(rename = "volCcy24h", default = "zero")]
    pub vol_ccy_24h: String,
    /// Best ask price.
    #[serde(rename = "askPx", default = "zero")]
    pub ask_px: String,
    /// Best ask size.
    #[serde(rename = "askSz", default = "zero")]
    pub ask_sz: String,
    /// Best bid price.
    #[serde(rename = "bidPx", default = "zero")]
    pub bid_px: String,
    /// Best bid size.
    #[serde(rename = "bidSz", default = "zero")]
    pub bid_sz: String,
}

fn zero() -> String {
    "0".to_string()
}
