use std::collections::HashMap;
use std::time::{Duration, Instant};

use legate::{Error, Result};

use parking_lot::Mutex;

/// Per (source, usage) cooldown bookkeeping.
///
/// The only mutable state touched during dispatch. Check and stamp
/// happen under one lock so two near-simultaneous invocations cannot
/// both pass the gate.
#[derive(Default)]
pub struct CooldownTracker {
    inner: Mutex<HashMap<(u64, usize), Instant>>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Passes when the pair is off cooldown and stamps the new use;
    /// fails with the remaining wait otherwise.
    pub fn check(&self, source: u64, usage: usize, cooldown: Duration) -> Result<()> {
        let mut map = self.inner.lock();
        let now = Instant::now();

        if let Some(last) = map.get(&(source, usage)) {
            let elapsed = now.duration_since(*last);
            if elapsed < cooldown {
                return Err(Error::CooldownActive {
                    remaining: cooldown - elapsed,
                });
            }
        }

        map.insert((source, usage), now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::CooldownTracker;
    use legate::Error;

    #[test]
    fn test_cooldown_blocks_second_use() {
        let tracker = CooldownTracker::new();
        let cooldown = Duration::from_secs(3600);

        assert!(tracker.check(1, 7, cooldown).is_ok());

        match tracker.check(1, 7, cooldown).unwrap_err() {
            Error::CooldownActive { remaining } => assert!(remaining <= cooldown),
            err => panic!("unexpected error: {:?}", err),
        }

        // Another source or usage is unaffected.
        assert!(tracker.check(2, 7, cooldown).is_ok());
        assert!(tracker.check(1, 8, cooldown).is_ok());
    }

    #[test]
    fn test_zero_cooldown_never_blocks() {
        let tracker = CooldownTracker::new();

        assert!(tracker.check(1, 7, Duration::ZERO).is_ok());
        assert!(tracker.check(1, 7, Duration::ZERO).is_ok());
    }
}
