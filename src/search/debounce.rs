use std::time::{Duration, Instant};

/// A value whose updates only become visible once input has been quiet
/// for `delay`. Each `set` restarts the quiet period.
#[derive(Debug, Clone)]
pub struct Debounced<T> {
    delay: Duration,
    current: T,
    pending: Option<Pending<T>>,
}

#[derive(Debug, Clone)]
struct Pending<T> {
    value: T,
    since: Instant,
}

impl<T: Clone + PartialEq> Debounced<T> {
    pub fn new(initial: T, delay: Duration) -> Self {
        Self {
            delay,
            current: initial,
            pending: None,
        }
    }

    pub fn value(&self) -> &T {
        &self.current
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn set(&mut self, value: T, now: Instant) {
        if self.pending.is_none() && value == self.current {
            return;
        }
        self.pending = Some(Pending { value, since: now });
    }

    /// Publishes `value` immediately, dropping anything still pending.
    pub fn force(&mut self, value: T) {
        self.pending = None;
        self.current = value;
    }

    /// Promotes the pending value once the delay has elapsed.
    /// Returns true when the published value changed.
    pub fn poll(&mut self, now: Instant) -> bool {
        let ready = self
            .pending
            .as_ref()
            .map(|pending| now.saturating_duration_since(pending.since) >= self.delay)
            .unwrap_or(false);
        if !ready {
            return false;
        }
        let Some(pending) = self.pending.take() else {
            return false;
        };
        if pending.value == self.current {
            return false;
        }
        self.current = pending.value;
        true
    }
}
