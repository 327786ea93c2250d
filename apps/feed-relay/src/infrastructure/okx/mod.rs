//! OKX Upstream Adapters
//!
//! Everything that faces the exchange: wire types, the message normalizer,
//! the backoff policy, the synthetic fallback generator, and the session
//! task that ties them together.

pub mod backoff;
pub mod messages;
pub mod normalizer;
pub mod session;
pub mod simulator;

pub use backoff::{BackoffConfig, BackoffDecision, BackoffPolicy};
pub use messages::{ChannelArg, FeedEnvelope, RawTicker, RawTrade, SubscribeRequest};
pub use normalizer::{Normalizer, NormalizerError};
pub use session::{
    DEFAULT_FEED_URL, DEFAULT_INSTRUMENT, FeedSession, FeedSessionConfig, FeedSessionError,
    SessionCommand, SessionStats,
};
pub use simulator::{SimulatorConfig, SyntheticFeed};
