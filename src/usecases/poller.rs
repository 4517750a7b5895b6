//! Cancellable periodic-refresh scheduler.
//!
//! The poller owns at most one timer per [`PollSlot`]. It never performs I/O
//! itself: [`Poller::due`] hands out tickets for timers whose deadline has
//! passed, and the caller reports back with [`Poller::complete`], which tells
//! it whether the result still belongs to a live timer. Time is passed in
//! explicitly so tests can advance it deterministically.

use std::collections::BTreeMap;

pub const DEFAULT_POLL_INTERVAL_MS: i64 = 3_000;

const POLL_TICK_SKIPPED: &str = "POLL_TICK_SKIPPED";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PollSlot {
    ConversationList,
    ActiveMessages,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollScope {
    ConversationList,
    Messages(i64),
}

impl PollScope {
    pub fn slot(self) -> PollSlot {
        match self {
            Self::ConversationList => PollSlot::ConversationList,
            Self::Messages(_) => PollSlot::ActiveMessages,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Permission to run one fetch for a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickTicket {
    pub timer_id: TimerId,
    pub scope: PollScope,
    /// Issued by [`Poller::trigger_now`] rather than by the timer.
    pub immediate: bool,
}

#[derive(Debug, Clone)]
struct Timer {
    id: TimerId,
    scope: PollScope,
    next_due_ms: i64,
    in_flight: bool,
}

#[derive(Debug, Clone)]
pub struct Poller {
    interval_ms: i64,
    next_timer_id: u64,
    timers: BTreeMap<PollSlot, Timer>,
}

impl Default for Poller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL_MS)
    }
}

impl Poller {
    pub fn new(interval_ms: i64) -> Self {
        Self {
            interval_ms: interval_ms.max(1),
            next_timer_id: 1,
            timers: BTreeMap::new(),
        }
    }

    pub fn interval_ms(&self) -> i64 {
        self.interval_ms
    }

    /// Starts a timer for `scope`, cancelling whatever timer held its slot.
    pub fn start(&mut self, scope: PollScope, now_ms: i64) -> TimerId {
        let id = TimerId(self.next_timer_id);
        self.next_timer_id += 1;

        let previous = self.timers.insert(
            scope.slot(),
            Timer {
                id,
                scope,
                next_due_ms: now_ms + self.interval_ms,
                in_flight: false,
            },
        );

        if let Some(previous) = previous {
            tracing::debug!(
                slot = ?scope.slot(),
                cancelled_scope = ?previous.scope,
                cancelled_in_flight = previous.in_flight,
                "poll timer replaced"
            );
        }

        id
    }

    /// Idempotent; a result arriving for a stopped timer is reported stale.
    pub fn stop(&mut self, slot: PollSlot) -> bool {
        self.timers.remove(&slot).is_some()
    }

    pub fn stop_all(&mut self) {
        self.timers.clear();
    }

    pub fn scope(&self, slot: PollSlot) -> Option<PollScope> {
        self.timers.get(&slot).map(|timer| timer.scope)
    }

    pub fn active_timers(&self) -> Vec<TimerId> {
        self.timers.values().map(|timer| timer.id).collect()
    }

    pub fn is_in_flight(&self, slot: PollSlot) -> bool {
        self.timers.get(&slot).is_some_and(|timer| timer.in_flight)
    }

    pub fn next_deadline(&self) -> Option<i64> {
        self.timers
            .values()
            .filter(|timer| !timer.in_flight)
            .map(|timer| timer.next_due_ms)
            .min()
    }

    /// Tickets for every timer whose deadline passed. A timer whose previous
    /// tick is still in flight skips this round instead of queueing.
    pub fn due(&mut self, now_ms: i64) -> Vec<TickTicket> {
        let interval_ms = self.interval_ms;
        let mut tickets = Vec::new();

        for (slot, timer) in &mut self.timers {
            if now_ms < timer.next_due_ms {
                continue;
            }

            timer.next_due_ms = now_ms + interval_ms;

            if timer.in_flight {
                tracing::debug!(
                    code = POLL_TICK_SKIPPED,
                    slot = ?slot,
                    scope = ?timer.scope,
                    "previous tick still in flight; skipping"
                );
                continue;
            }

            timer.in_flight = true;
            tickets.push(TickTicket {
                timer_id: timer.id,
                scope: timer.scope,
                immediate: false,
            });
        }

        tickets
    }

    /// Out-of-band ticket (e.g. right after a scope switch), same overlap rule.
    pub fn trigger_now(&mut self, slot: PollSlot) -> Option<TickTicket> {
        let timer = self.timers.get_mut(&slot)?;
        if timer.in_flight {
            return None;
        }

        timer.in_flight = true;
        Some(TickTicket {
            timer_id: timer.id,
            scope: timer.scope,
            immediate: true,
        })
    }

    /// Releases the ticket; returns false when its timer was stopped or replaced.
    pub fn complete(&mut self, ticket: &TickTicket) -> bool {
        match self.timers.get_mut(&ticket.scope.slot()) {
            Some(timer) if timer.id == ticket.timer_id => {
                timer.in_flight = false;
                true
            }
            _ => false,
        }
    }
}
