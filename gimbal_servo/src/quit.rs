// THEORY:
// One-shot quit notification and the per-cycle predicate that may fire it.

use tokio::sync::watch;

/// A one-shot, cloneable quit notification. Firing it more than once is a no-op.
#[derive(Clone, Debug)]
pub struct QuitSignal {
    tx: watch::Sender<bool>,
}

impl Default for QuitSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl QuitSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Fires the signal. Returns `true` only for the call that actually fired it.
    pub fn fire(&self) -> bool {
        self.tx.send_if_modified(|fired| {
            if *fired {
                false
            } else {
                *fired = true;
                true
            }
        })
    }

    pub fn is_fired(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the signal has fired.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|fired| *fired).await;
    }
}

/// Evaluated once per control cycle. Returning `true` fires the quit signal.
pub trait QuitPredicate: Send {
    fn should_quit(&mut self) -> bool;
}

/// Never asks to quit; the process lives as long as its video session.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverQuit;

impl QuitPredicate for NeverQuit {
    fn should_quit(&mut self) -> bool {
        false
    }
}

impl<F: FnMut() -> bool + Send> QuitPredicate for F {
    fn should_quit(&mut self) -> bool {
        self()
    }
}

/// Asks to quit after a fixed number of cycles.
#[derive(Debug, Clone, Copy)]
pub struct AfterCycles {
    remaining: u64,
}

impl AfterCycles {
    pub fn new(cycles: u64) -> Self {
        Self { remaining: cycles }
    }
}

impl QuitPredicate for AfterCycles {
    fn should_quit(&mut self) -> bool {
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining == 0
    }
}
