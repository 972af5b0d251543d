//! Cooperative timer queue driven by a virtual millisecond clock.
//!
//! Nothing here sleeps. The host advances the clock and pulls due timers one at a
//! time, so a callback may cancel or schedule timers before the next one is
//! handed out.

use std::collections::BTreeMap;

/// What a timer is for; the owner dispatches on this when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    PreRoll,
    Cadence,
    Countdown,
    Watchdog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle(u64);

/// A timer callback that is due
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fired {
    pub handle: TimerHandle,
    pub kind: TimerKind,
    /// Opaque tag captured at scheduling time
    pub tag: u64,
    /// Time the timer was due, not the time it was pulled
    pub due_ms: u64,
}

#[derive(Debug, Clone)]
struct Entry {
    kind: TimerKind,
    tag: u64,
    due_ms: u64,
    period_ms: Option<u64>,
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    entries: BTreeMap<TimerHandle, Entry>,
    next_handle: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_once(
        &mut self,
        kind: TimerKind,
        tag: u64,
        now_ms: u64,
        delay_ms: u64,
    ) -> TimerHandle {
        self.insert(Entry {
            kind,
            tag,
            due_ms: now_ms + delay_ms,
            period_ms: None,
        })
    }

    /// Repeating timer; first fires after one period
    pub fn schedule_repeating(
        &mut self,
        kind: TimerKind,
        tag: u64,
        now_ms: u64,
        period_ms: u64,
    ) -> TimerHandle {
        let period_ms = period_ms.max(1);
        self.insert(Entry {
            kind,
            tag,
            due_ms: now_ms + period_ms,
            period_ms: Some(period_ms),
        })
    }

    fn insert(&mut self, entry: Entry) -> TimerHandle {
        self.next_handle += 1;
        let handle = TimerHandle(self.next_handle);
        self.entries.insert(handle, entry);
        handle
    }

    /// Cancel a timer. Unknown or already cancelled handles are ignored.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.entries.remove(&handle).is_some()
    }

    /// Lose a timer without its owner finding out, as a host may do with a
    /// callback scheduled from a backgrounded tab.
    pub fn drop_timer(&mut self, handle: TimerHandle) -> bool {
        self.entries.remove(&handle).is_some()
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.entries.contains_key(&handle)
    }

    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    pub fn period_of(&self, handle: TimerHandle) -> Option<u64> {
        self.entries.get(&handle).and_then(|e| e.period_ms)
    }

    pub fn next_due(&self) -> Option<u64> {
        self.entries.values().map(|e| e.due_ms).min()
    }

    /// Pull the earliest timer due at or before `now_ms`. Ties go to the timer
    /// scheduled first. One-shot timers are removed; repeating timers re-arm
    /// from their due time so the cadence does not drift. Periods missed
    /// entirely (host stalled) are coalesced into the one firing.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<Fired> {
        let (handle, entry) = self
            .entries
            .iter()
            .filter(|(_, e)| e.due_ms <= now_ms)
            .min_by_key(|(h, e)| (e.due_ms, **h))
            .map(|(h, e)| (*h, e.clone()))?;

        let fired = Fired {
            handle,
            kind: entry.kind,
            tag: entry.tag,
            due_ms: entry.due_ms,
        };

        match entry.period_ms {
            Some(period) => {
                if let Some(e) = self.entries.get_mut(&handle) {
                    e.due_ms += period;
                    while e.due_ms <= now_ms {
                        e.due_ms += period;
                    }
                }
            }
            None => {
                self.entries.remove(&handle);
            }
        }

        Some(fired)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
