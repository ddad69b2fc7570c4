//! Injectable time sources so the controller can be driven without real
//! delays.

use super::events::TimerKind;
use std::cell::Cell;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Wall-clock milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<u64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Cell::new(start_ms),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

pub trait Scheduler {
    fn schedule(&mut self, kind: TimerKind, period_ms: u64, repeating: bool, now_ms: u64);
    fn cancel(&mut self, kind: TimerKind);
    /// Timers due at `now_ms`, in firing order. Repeating timers are
    /// rescheduled.
    fn due(&mut self, now_ms: u64) -> Vec<TimerKind>;
    fn is_scheduled(&self, kind: TimerKind) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Timer {
    next_due: u64,
    period_ms: u64,
    repeating: bool,
}

/// Keeps at most one timer per kind, polled by the host event loop.
#[derive(Debug, Default)]
pub struct IntervalScheduler {
    timers: BTreeMap<TimerKind, Timer>,
}

impl IntervalScheduler {
    pub fn active(&self) -> Vec<TimerKind> {
        self.timers.keys().copied().collect()
    }

    /// The earliest deadline, for hosts that sleep until the next timer.
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.values().map(|timer| timer.next_due).min()
    }
}

impl Scheduler for IntervalScheduler {
    fn schedule(&mut self, kind: TimerKind, period_ms: u64, repeating: bool, now_ms: u64) {
        let period_ms = period_ms.max(1);
        self.timers.insert(
            kind,
            Timer {
                next_due: now_ms + period_ms,
                period_ms,
                repeating,
            },
        );
    }

    fn cancel(&mut self, kind: TimerKind) {
        self.timers.remove(&kind);
    }

    fn due(&mut self, now_ms: u64) -> Vec<TimerKind> {
        let mut fired: Vec<(u64, TimerKind)> = Vec::new();
        for (kind, timer) in self.timers.iter_mut() {
            while timer.next_due <= now_ms {
                fired.push((timer.next_due, *kind));
                if !timer.repeating {
                    break;
                }
                timer.next_due += timer.period_ms;
            }
        }
        self.timers
            .retain(|_, timer| timer.repeating || timer.next_due > now_ms);
        fired.sort();
        fired.into_iter().map(|(_, kind)| kind).collect()
    }

    fn is_scheduled(&self, kind: TimerKind) -> bool {
        self.timers.contains_key(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeating_timer_fires_each_period() {
        let mut scheduler = IntervalScheduler::default();
        scheduler.schedule(TimerKind::PositionFlush, 15_000, true, 0);
        scheduler.schedule(TimerKind::ProgressLoadTimeout, 5_000, false, 0);
        assert!(scheduler.due(4_999).is_empty());
        assert_eq!(scheduler.due(5_000), vec![TimerKind::ProgressLoadTimeout]);
        assert!(!scheduler.is_scheduled(TimerKind::ProgressLoadTimeout));
        assert_eq!(
            scheduler.due(45_000),
            vec![
                TimerKind::PositionFlush,
                TimerKind::PositionFlush,
                TimerKind::PositionFlush
            ]
        );
        assert_eq!(scheduler.next_deadline(), Some(60_000));
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let mut scheduler = IntervalScheduler::default();
        scheduler.schedule(TimerKind::ListeningFlush, 60_000, true, 0);
        scheduler.cancel(TimerKind::ListeningFlush);
        assert!(scheduler.due(200_000).is_empty());
        assert!(scheduler.active().is_empty());
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(10);
        clock.advance(5);
        assert_eq!(clock.now_ms(), 15);
        clock.set(2);
        assert_eq!((&clock).now_ms(), 2);
    }
}
