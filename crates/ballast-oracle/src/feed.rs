//! External price feed contract.
//!
//! Feeds are untrusted: a read may fail, return a non-positive price or carry
//! a stale timestamp. The aggregator tolerates all of these and never lets a
//! feed error escape an aggregation pass.
//!
//! [`StaticFeed`] is a settable in-process feed for development, simulation
//! and tests.

use std::sync::{Arc, Mutex};

/// A raw reading in the feed's native precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedReading {
    /// Price in the source's native decimals. May be zero or negative.
    pub price: i128,
    /// Unix timestamp of the feed's last update. Zero means "never".
    pub updated_at: u64,
}

/// Failure to obtain a reading from a feed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FeedError {
    /// The feed could not be reached.
    #[error("feed unreachable: {0}")]
    Unreachable(String),

    /// The feed did not answer in time.
    #[error("feed timed out after {0}s")]
    Timeout(u64),

    /// The feed answered with something unparseable.
    #[error("malformed feed response: {0}")]
    Malformed(String),
}

/// A source of raw price readings.
pub trait PriceFeed: Send + Sync {
    /// Fetch the latest reading.
    fn latest_value(&self) -> std::result::Result<FeedReading, FeedError>;
}

/// Shared handle to a feed, as stored in the source registry.
pub type FeedHandle = Arc<dyn PriceFeed>;

/// A feed whose reading is set by hand.
///
/// An unset feed reports [`FeedError::Unreachable`].
#[derive(Debug, Default)]
pub struct StaticFeed {
    reading: Mutex<Option<FeedReading>>,
}

impl StaticFeed {
    /// Create a feed reporting `price` updated at `updated_at`.
    pub fn new(price: i128, updated_at: u64) -> Self {
        Self {
            reading: Mutex::new(Some(FeedReading { price, updated_at })),
        }
    }

    /// Create a feed that is currently unreachable.
    pub fn unreachable() -> Self {
        Self::default()
    }

    /// Create a shareable feed and the handle to register with the aggregator.
    pub fn shared(price: i128, updated_at: u64) -> (Arc<Self>, FeedHandle) {
        let feed = Arc::new(Self::new(price, updated_at));
        let handle: FeedHandle = feed.clone();
        (feed, handle)
    }

    /// Replace the current reading (development and testing only).
    pub fn dev_set_price(&self, price: i128, updated_at: u64) {
        tracing::warn!(price, updated_at, "static feed: price changed (dev only)");
        *self.lock() = Some(FeedReading { price, updated_at });
    }

    /// Make subsequent reads fail.
    pub fn set_unreachable(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<FeedReading>> {
        self.reading
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PriceFeed for StaticFeed {
    fn latest_value(&self) -> std::result::Result<FeedReading, FeedError> {
        (*self.lock()).ok_or_else(|| FeedError::Unreachable("static feed not set".to_string()))
    }
}
