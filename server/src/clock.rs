use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::UNIX_EPOCH,
};

/// Source of the current unix time in seconds.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> u64;
}

/// Reads time from the runtime context.
pub struct SystemClock<C> {
    context: C,
}

impl<C: commonware_runtime::Clock> SystemClock<C> {
    pub fn new(context: C) -> Self {
        Self { context }
    }
}

impl<C: commonware_runtime::Clock> Clock for SystemClock<C> {
    fn now(&self) -> u64 {
        self.context
            .current()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to.
#[derive(Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(now: u64) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_runtime::{deterministic::Runner, Clock as _, Runner as _};
    use std::time::Duration;

    #[test]
    fn test_system_clock_follows_runtime() {
        let executor = Runner::default();
        executor.start(|context| async move {
            let clock = SystemClock::new(context.clone());
            let start = clock.now();
            context.sleep(Duration::from_secs(90)).await;
            assert_eq!(clock.now(), start + 90);
        });
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(100);
        clock.advance(5);
        assert_eq!(clock.now(), 105);
        clock.set(7);
        assert_eq!(clock.now(), 7);
    }
}
