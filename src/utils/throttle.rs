//! Log throttling
//!
//! A camera that keeps sending corrupt JPEGs or keeps refusing connections
//! would otherwise produce one log line per frame or per retry. The throttler
//! lets the first message for a key through, swallows repeats for an
//! interval and reports how many were swallowed when the key logs again.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct Entry {
    last: Instant,
    suppressed: u64,
}

/// Per-key rate limiter for log messages
///
/// # Example
///
/// ```rust
/// use camwatch::utils::LogThrottler;
/// use std::time::Duration;
///
/// let throttler = LogThrottler::new(Duration::from_secs(5));
/// assert!(throttler.should_log("porch:decode"));
/// assert!(!throttler.should_log("porch:decode"));
/// ```
pub struct LogThrottler {
    entries: Mutex<HashMap<String, Entry>>,
    interval: Duration,
}

impl LogThrottler {
    pub fn new(interval: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            interval,
        }
    }

    pub fn with_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Whether a message for `key` should be logged now
    pub fn should_log(&self, key: &str) -> bool {
        self.check(key).is_some()
    }

    /// Like [`should_log`](Self::should_log), but returns the number of
    /// messages swallowed since the key last logged
    pub fn check(&self, key: &str) -> Option<u64> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get_mut(key) {
            Some(entry) if now.duration_since(entry.last) < self.interval => {
                entry.suppressed += 1;
                None
            }
            Some(entry) => {
                let suppressed = entry.suppressed;
                entry.last = now;
                entry.suppressed = 0;
                Some(suppressed)
            }
            None => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        last: now,
                        suppressed: 0,
                    },
                );
                Some(0)
            }
        }
    }

    /// Forget a key once its error condition recovers
    pub fn clear(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    /// Forget every key starting with `prefix` (e.g. a removed camera)
    pub fn clear_prefix(&self, prefix: &str) {
        self.entries.lock().retain(|k, _| !k.starts_with(prefix));
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for LogThrottler {
    fn default() -> Self {
        Self::with_secs(5)
    }
}

/// Throttled `tracing::warn!`
///
/// ```rust
/// use camwatch::utils::LogThrottler;
/// use camwatch::warn_throttled;
///
/// let throttler = LogThrottler::default();
/// warn_throttled!(throttler, "porch:decode", "Bad frame from {}", "porch");
/// ```
#[macro_export]
macro_rules! warn_throttled {
    ($throttler:expr, $key:expr, $($arg:tt)*) => {
        if $throttler.should_log($key) {
            tracing::warn!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_throttling() {
        let throttler = LogThrottler::new(Duration::from_millis(100));
        assert!(throttler.should_log("cam"));
        assert!(!throttler.should_log("cam"));

        thread::sleep(Duration::from_millis(150));
        assert!(throttler.should_log("cam"));
    }

    #[test]
    fn test_suppressed_count() {
        let throttler = LogThrottler::new(Duration::from_millis(50));
        assert_eq!(throttler.check("cam"), Some(0));
        assert_eq!(throttler.check("cam"), None);
        assert_eq!(throttler.check("cam"), None);

        thread::sleep(Duration::from_millis(80));
        assert_eq!(throttler.check("cam"), Some(2));
    }

    #[test]
    fn test_keys_are_independent() {
        let throttler = LogThrottler::with_secs(10);
        assert!(throttler.should_log("porch:decode"));
        assert!(throttler.should_log("garage:decode"));
        assert!(!throttler.should_log("porch:decode"));
        assert_eq!(throttler.len(), 2);
    }

    #[test]
    fn test_clear_and_prefix() {
        let throttler = LogThrottler::with_secs(10);
        throttler.should_log("porch:decode");
        throttler.should_log("porch:connect");
        throttler.should_log("garage:decode");

        throttler.clear("garage:decode");
        assert!(throttler.should_log("garage:decode"));

        throttler.clear_prefix("porch:");
        assert_eq!(throttler.len(), 1);
        assert!(throttler.should_log("porch:connect"));
    }
}
