//! Playback controller: which step is current and whether a timer advances it.
//!
//! The timer handle lives inside [`Transport::Playing`], so at most one can exist.
//! Every transition that leaves `Playing` drops it, and every new handle gets a
//! fresh id so late deliveries of an old timer are recognised and ignored.

use crate::models::PlaybackState;
use log::debug;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// The single recurring timer of a chart. Time is host-supplied (`Duration` since mount).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerHandle {
    pub id: TimerId,
    pub period: Duration,
    pub next_due: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    Stopped(usize),
    Playing(usize, TimerHandle),
}

impl Transport {
    pub fn index(&self) -> usize {
        match self {
            Transport::Stopped(i) | Transport::Playing(i, _) => *i,
        }
    }
}

#[derive(Debug)]
pub struct PlaybackController {
    transport: Transport,
    len: usize,
    interval: Duration,
    next_id: u64,
}

impl PlaybackController {
    pub fn new(len: usize, interval: Duration) -> Self {
        Self {
            transport: Transport::Stopped(0),
            len,
            interval: interval.max(Duration::from_millis(1)),
            next_id: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn last_index(&self) -> usize {
        self.len.saturating_sub(1)
    }

    pub fn index(&self) -> usize {
        self.transport.index()
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.transport, Transport::Playing(..))
    }

    /// Playback needs at least two steps.
    pub fn can_play(&self) -> bool {
        self.len > 1
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn state(&self) -> PlaybackState {
        PlaybackState {
            current_index: self.index(),
            is_playing: self.is_playing(),
        }
    }

    pub fn timer(&self) -> Option<&TimerHandle> {
        match &self.transport {
            Transport::Playing(_, h) => Some(h),
            Transport::Stopped(_) => None,
        }
    }

    /// Number of live timers: 0 or 1.
    pub fn active_timers(&self) -> usize {
        usize::from(self.timer().is_some())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The only place a timer is created. The previous one is dropped first.
    fn arm(&mut self, index: usize, now: Duration) {
        self.clear_timer();
        self.next_id += 1;
        let handle = TimerHandle {
            id: TimerId(self.next_id),
            period: self.interval,
            next_due: now + self.interval,
        };
        debug!("timer {} armed at step {index}", handle.id.0);
        self.transport = Transport::Playing(index, handle);
    }

    /// Drop the timer (if any), keeping the index.
    fn clear_timer(&mut self) {
        if let Transport::Playing(i, h) = &self.transport {
            let i = *i;
            debug!("timer {} cleared at step {i}", h.id.0);
            self.transport = Transport::Stopped(i);
        }
    }

    fn move_to(&mut self, index: usize) -> Option<usize> {
        self.clear_timer();
        let before = self.index();
        let after = index.min(self.last_index());
        self.transport = Transport::Stopped(after);
        (after != before).then_some(after)
    }

    /// Start auto-advance. At the last step this restarts from 0. A second call
    /// while playing keeps the existing timer.
    pub fn play(&mut self, now: Duration) -> Option<usize> {
        if !self.can_play() {
            return None;
        }
        match self.transport {
            Transport::Playing(..) => None,
            Transport::Stopped(i) if i >= self.last_index() => {
                self.arm(0, now);
                Some(0)
            }
            Transport::Stopped(i) => {
                self.arm(i, now);
                None
            }
        }
    }

    pub fn pause(&mut self) {
        self.clear_timer();
    }

    pub fn toggle(&mut self, now: Duration) -> Option<usize> {
        if self.is_playing() {
            self.pause();
            None
        } else {
            self.play(now)
        }
    }

    /// Jump to `index` (clamped). Always cancels auto-play.
    pub fn scrub(&mut self, index: usize) -> Option<usize> {
        self.move_to(index)
    }

    /// Move relative to the current step (clamped). Always cancels auto-play.
    pub fn step(&mut self, delta: isize) -> Option<usize> {
        let target = self.index().saturating_add_signed(delta);
        self.move_to(target)
    }

    pub fn reset(&mut self) -> Option<usize> {
        self.move_to(0)
    }

    /// New dataset: drop the timer and start over at `Stopped(0)`.
    pub fn reset_for(&mut self, len: usize) {
        self.clear_timer();
        self.len = len;
        self.transport = Transport::Stopped(0);
    }

    /// Keep a possibly shorter dataset in range without touching the timer.
    pub fn set_len(&mut self, len: usize) {
        self.len = len;
        let last = self.last_index();
        match &mut self.transport {
            Transport::Stopped(i) | Transport::Playing(i, _) => *i = (*i).min(last),
        }
        if !self.can_play() {
            self.clear_timer();
        }
    }

    /// Change the tick period; a running timer is re-armed at the same step.
    pub fn set_interval(&mut self, interval: Duration, now: Duration) {
        self.interval = interval.max(Duration::from_millis(1));
        if let Transport::Playing(i, _) = self.transport {
            self.arm(i, now);
        }
    }

    /// Advance one step. A tick that finds playback already on the last step
    /// stops it and drops the timer.
    fn tick(&mut self, now: Duration) -> Option<usize> {
        let last = self.last_index();
        let Transport::Playing(i, handle) = &mut self.transport else {
            return None;
        };
        if *i < last {
            *i += 1;
            // no catch-up bursts after a stall
            handle.next_due = (handle.next_due + handle.period).max(now + handle.period / 2);
            Some(*i)
        } else {
            self.clear_timer();
            None
        }
    }

    /// Pull-style driver: fires at most one tick if the timer is due.
    pub fn poll(&mut self, now: Duration) -> Option<usize> {
        let due = self.timer().is_some_and(|h| now >= h.next_due);
        if due { self.tick(now) } else { None }
    }

    /// Push-style driver for hosts with real timers. Ticks from a handle that is
    /// no longer live are dropped.
    pub fn on_timer(&mut self, id: TimerId, now: Duration) -> Option<usize> {
        if self.timer().is_some_and(|h| h.id == id) {
            self.tick(now)
        } else {
            debug!("stale tick from timer {} ignored", id.0);
            None
        }
    }
}
