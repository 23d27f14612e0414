//! Time source shared by lookups and the expiry sweep

use std::fmt::Debug;

use chrono::{DateTime, Utc};

/// Source of the current time
///
/// Lookup staleness checks and the background sweep must read the same
/// clock so that the sweep never deletes an entry a lookup still
/// considers fresh.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Clock that only moves when told to
    #[derive(Debug)]
    pub struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        pub fn new() -> Self {
            Self {
                now: Mutex::new(Utc::now()),
            }
        }

        pub fn advance(&self, by: std::time::Duration) {
            let mut now = self.now.lock().unwrap();
            *now += chrono::Duration::from_std(by).unwrap();
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::time::Duration;

        #[test]
        fn test_manual_clock_advances() {
            let clock = ManualClock::new();
            let start = clock.now();

            clock.advance(Duration::from_secs(90));

            assert_eq!((clock.now() - start).num_seconds(), 90);
        }
    }
}
