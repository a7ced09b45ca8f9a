//! Resize coalescing: a burst of size events yields one rebuild.

use crate::models::Viewport;
use std::time::Duration;

pub const DEFAULT_QUIET: Duration = Duration::from_millis(150);

#[derive(Debug, Clone)]
pub struct ResizeDebouncer {
    quiet: Duration,
    pending: Option<Viewport>,
    last_event: Duration,
    applied: Option<Viewport>,
}

impl Default for ResizeDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET)
    }
}

impl ResizeDebouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: None,
            last_event: Duration::ZERO,
            applied: None,
        }
    }

    /// Seed the size that is already on screen so an identical event is a no-op.
    pub fn with_applied(mut self, viewport: Viewport) -> Self {
        self.applied = Some(viewport);
        self
    }

    pub fn quiet(&self) -> Duration {
        self.quiet
    }

    pub fn applied(&self) -> Option<Viewport> {
        self.applied
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Record a size event; only the latest size of a burst is kept.
    pub fn observe(&mut self, viewport: Viewport, now: Duration) {
        self.pending = Some(viewport);
        self.last_event = now;
    }

    /// The settled size, once `quiet` has passed since the last event and it
    /// differs from what was last applied.
    pub fn poll(&mut self, now: Duration) -> Option<Viewport> {
        let pending = self.pending?;
        if now.saturating_sub(self.last_event) < self.quiet {
            return None;
        }
        self.pending = None;
        if self.applied == Some(pending) {
            return None;
        }
        self.applied = Some(pending);
        Some(pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn drag_resize_applies_once() {
        let mut d = ResizeDebouncer::default().with_applied(Viewport::new(800.0, 600.0));
        for (i, w) in (0..20).zip(600..620) {
            d.observe(Viewport::new(w as f64, 400.0), ms(i * 10));
            assert_eq!(d.poll(ms(i * 10 + 5)), None);
        }
        assert_eq!(d.poll(ms(200)), None);
        assert_eq!(d.poll(ms(340)), Some(Viewport::new(619.0, 400.0)));
        assert_eq!(d.poll(ms(1000)), None);
    }

    #[test]
    fn unchanged_size_is_ignored() {
        let vp = Viewport::new(640.0, 480.0);
        let mut d = ResizeDebouncer::new(ms(50)).with_applied(vp);
        d.observe(vp, ms(0));
        assert_eq!(d.poll(ms(100)), None);
        assert!(!d.is_pending());
    }
}
