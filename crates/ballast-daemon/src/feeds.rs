//! Price feeds available to the daemon.

use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use serde::Deserialize;

use ballast_oracle::{FeedError, FeedHandle, FeedReading, PriceFeed};

use crate::config::FeedKind;
use crate::scheduler::unix_now;

/// A constant price stamped with the current time on every read.
///
/// The price can be changed at runtime through `dev_set_feed_price`.
#[derive(Debug)]
pub struct FixedRateFeed {
    price: AtomicI64,
}

impl FixedRateFeed {
    pub fn new(price: i64) -> Self {
        Self {
            price: AtomicI64::new(price),
        }
    }

    pub fn price(&self) -> i64 {
        self.price.load(Ordering::SeqCst)
    }

    pub fn set_price(&self, price: i64) {
        tracing::warn!(price, "fixed feed: price changed (dev only)");
        self.price.store(price, Ordering::SeqCst);
    }
}

impl PriceFeed for FixedRateFeed {
    fn latest_value(&self) -> Result<FeedReading, FeedError> {
        Ok(FeedReading {
            price: i128::from(self.price()),
            updated_at: unix_now(),
        })
    }
}

/// File contents expected by [`FileFeed`].
#[derive(Debug, Deserialize)]
struct FileReading {
    price: i128,
    updated_at: u64,
}

/// Reads `{"price": <int>, "updated_at": <unix secs>}` from disk on every
/// query. An external process keeps the file current.
#[derive(Debug)]
pub struct FileFeed {
    path: PathBuf,
}

impl FileFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PriceFeed for FileFeed {
    fn latest_value(&self) -> Result<FeedReading, FeedError> {
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| FeedError::Unreachable(format!("{}: {e}", self.path.display())))?;
        let reading: FileReading = serde_json::from_str(&content)
            .map_err(|e| FeedError::Malformed(format!("{}: {e}", self.path.display())))?;
        Ok(FeedReading {
            price: reading.price,
            updated_at: reading.updated_at,
        })
    }
}

/// Build the feed for a configured source.
///
/// Fixed feeds are also returned by concrete type so the daemon can adjust
/// them later.
pub fn build_feed(kind: &FeedKind) -> (FeedHandle, Option<Arc<FixedRateFeed>>) {
    match kind {
        FeedKind::Fixed { price } => {
            let feed = Arc::new(FixedRateFeed::new(*price));
            let handle: FeedHandle = feed.clone();
            (handle, Some(feed))
        }
        FeedKind::File { path } => (Arc::new(FileFeed::new(path)), None),
    }
}
