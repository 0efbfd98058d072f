//! Debounced call issuance with stale-result detection
//!
//! Every submitted call gets a [`Ticket`] from a monotonic [`SequenceGate`].
//! Debounced calls wait out the quiet period and are cancelled by any later
//! submission; immediate calls fire at once. Results carry their ticket and
//! are only applied while it is still the newest one issued.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Whether a call may wait for the quiet period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Fire now (initial mount, explicit locate)
    Immediate,
    /// Fire after the quiet period unless superseded (drag, radius)
    Debounced,
}

/// Issuance order of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl Ticket {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Monotonic ticket source
#[derive(Debug, Default)]
pub struct SequenceGate {
    latest: u64,
}

impl SequenceGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self) -> Ticket {
        self.latest += 1;
        Ticket(self.latest)
    }

    /// Whether `ticket` is the newest one issued
    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 == self.latest
    }

    pub fn latest(&self) -> Option<Ticket> {
        (self.latest > 0).then_some(Ticket(self.latest))
    }
}

/// A call that survived its quiet period
#[derive(Debug, Clone, PartialEq)]
pub struct Fired<A> {
    pub ticket: Ticket,
    pub args: A,
}

/// Coalesces bursts of calls into the last one.
///
/// Fired calls are delivered on the channel passed to [`Debouncer::new`],
/// so the owner consumes them from its own event loop.
#[derive(Debug)]
pub struct Debouncer<A> {
    quiet_period: Duration,
    gate: SequenceGate,
    pending: Option<JoinHandle<()>>,
    tx: mpsc::UnboundedSender<Fired<A>>,
}

impl<A: Send + 'static> Debouncer<A> {
    pub fn new(quiet_period: Duration, tx: mpsc::UnboundedSender<Fired<A>>) -> Self {
        Self {
            quiet_period,
            gate: SequenceGate::new(),
            pending: None,
            tx,
        }
    }

    /// Submit a call. Any pending debounced call is cancelled.
    pub fn submit(&mut self, args: A, mode: FetchMode) -> Ticket {
        self.cancel();
        let ticket = self.gate.issue();
        let fired = Fired { ticket, args };

        match mode {
            FetchMode::Immediate => {
                if self.tx.send(fired).is_err() {
                    tracing::debug!(ticket = ticket.value(), "Debounce receiver dropped");
                }
            }
            FetchMode::Debounced => {
                let tx = self.tx.clone();
                let quiet_period = self.quiet_period;
                self.pending = Some(tokio::spawn(async move {
                    tokio::time::sleep(quiet_period).await;
                    let _ = tx.send(fired);
                }));
            }
        }

        ticket
    }

    /// Cancel the pending debounced call, if any
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.gate.is_current(ticket)
    }

    pub fn gate(&self) -> &SequenceGate {
        &self.gate
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }
}

impl<A> Drop for Debouncer<A> {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUIET: Duration = Duration::from_millis(500);

    fn make_debouncer() -> (Debouncer<u32>, mpsc::UnboundedReceiver<Fired<u32>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Debouncer::new(QUIET, tx), rx)
    }

    #[test]
    fn test_sequence_gate_latest_wins() {
        let mut gate = SequenceGate::new();
        assert!(gate.latest().is_none());

        let a = gate.issue();
        let b = gate.issue();
        assert!(a < b);
        assert!(!gate.is_current(a));
        assert!(gate.is_current(b));
        assert_eq!(gate.latest(), Some(b));
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_fires_once_with_last_args() {
        let (mut debouncer, mut rx) = make_debouncer();

        for n in 1..=5 {
            debouncer.submit(n, FetchMode::Debounced);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let fired = rx.recv().await.unwrap();
        assert_eq!(fired.args, 5);
        assert!(debouncer.is_current(fired.ticket));

        tokio::time::sleep(QUIET * 4).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_period_elapses_before_firing() {
        let (mut debouncer, mut rx) = make_debouncer();
        let start = tokio::time::Instant::now();

        debouncer.submit(1, FetchMode::Debounced);
        assert!(debouncer.has_pending());
        rx.recv().await.unwrap();

        assert!(start.elapsed() >= QUIET);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_bypasses_quiet_period() {
        let (mut debouncer, mut rx) = make_debouncer();

        let ticket = debouncer.submit(7, FetchMode::Immediate);

        let fired = rx.try_recv().unwrap();
        assert_eq!(fired, Fired { ticket, args: 7 });
        assert!(!debouncer.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_cancels_pending_debounced() {
        let (mut debouncer, mut rx) = make_debouncer();

        debouncer.submit(1, FetchMode::Debounced);
        debouncer.submit(2, FetchMode::Immediate);

        assert_eq!(rx.recv().await.unwrap().args, 2);
        tokio::time::sleep(QUIET * 2).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_ticket_is_stale() {
        let (mut debouncer, _rx) = make_debouncer();

        let first = debouncer.submit(1, FetchMode::Immediate);
        let second = debouncer.submit(2, FetchMode::Debounced);

        assert!(!debouncer.is_current(first));
        assert!(debouncer.is_current(second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending() {
        let (mut debouncer, mut rx) = make_debouncer();

        debouncer.submit(1, FetchMode::Debounced);
        debouncer.cancel();
        assert!(!debouncer.has_pending());

        tokio::time::sleep(QUIET * 2).await;
        assert!(rx.try_recv().is_err());
    }
}
