//! Superseding bookkeeping for asynchronous requests.
//!
//! Every outstanding request carries a `RequestToken`. A completion is only
//! applied when:
//! - no newer request of the same tracker has already been applied, and
//! - the tracker has not been invalidated (store cleared/replaced) since the
//!   token was issued.
//!
//! Tokens are totally ordered by issue sequence, so out-of-order completions
//! resolve deterministically regardless of network timing.

use tracing::debug;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken {
    seq: u64,
    epoch: u64,
}

impl RequestToken {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

#[derive(Debug, Default)]
pub struct RequestTracker {
    next_seq: u64,
    epoch: u64,
    last_applied: Option<u64>,
    in_flight: usize,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self) -> RequestToken {
        let token = RequestToken {
            seq: self.next_seq,
            epoch: self.epoch,
        };
        self.next_seq = self.next_seq.wrapping_add(1);
        self.in_flight += 1;
        token
    }

    /// Marks every outstanding token stale.
    pub fn invalidate(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// True if the token was issued in the current epoch.
    pub fn is_current_epoch(&self, token: RequestToken) -> bool {
        token.epoch == self.epoch
    }

    /// Resolves a completion. Returns `true` if the caller should apply it.
    ///
    /// Each token must be resolved at most once.
    pub fn accept(&mut self, token: RequestToken) -> bool {
        self.in_flight = self.in_flight.saturating_sub(1);

        if token.epoch != self.epoch {
            debug!(seq = token.seq, epoch = token.epoch, "dropping completion from invalidated epoch");
            return false;
        }
        if self.last_applied.is_some_and(|last| token.seq <= last) {
            debug!(seq = token.seq, "dropping out-of-order completion");
            return false;
        }

        self.last_applied = Some(token.seq);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::RequestTracker;

    #[test]
    fn in_order_completions_apply() {
        let mut t = RequestTracker::new();
        let a = t.issue();
        assert!(t.accept(a));
        let b = t.issue();
        assert!(t.accept(b));
        assert_eq!(t.in_flight(), 0);
    }

    #[test]
    fn older_completion_after_newer_is_dropped() {
        let mut t = RequestTracker::new();
        let older = t.issue();
        let newer = t.issue();
        assert_eq!(t.in_flight(), 2);

        assert!(t.accept(newer));
        assert!(!t.accept(older));
        assert_eq!(t.in_flight(), 0);
    }

    #[test]
    fn invalidation_drops_outstanding_tokens() {
        let mut t = RequestTracker::new();
        let stale = t.issue();
        t.invalidate();
        assert!(!t.is_current_epoch(stale));
        assert!(!t.accept(stale));

        let fresh = t.issue();
        assert!(t.is_current_epoch(fresh));
        assert!(t.accept(fresh));
    }

    #[test]
    fn tokens_are_ordered_by_issue_sequence() {
        let mut t = RequestTracker::new();
        let a = t.issue();
        let b = t.issue();
        assert!(a < b);
        assert_eq!(b.seq(), a.seq() + 1);
        assert_eq!(a.epoch(), t.epoch());
    }
}
