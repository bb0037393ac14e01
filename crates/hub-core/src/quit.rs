use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// A one-shot broadcast signal that transitions to "fired" exactly once.
///
/// Used to cancel all tasks associated with a connection or the hub. Every
/// blocking operation that must remain cancellable races its own future
/// against [`Quit::fired`] in a `select!`.
#[derive(Debug, Default)]
pub struct Quit {
    fired: AtomicBool,
    notify: Notify,
}

impl Quit {
    pub fn new() -> Self {
        Self {
            fired: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Fire the signal. Idempotent: only the first call wakes waiters.
    pub fn fire(&self) {
        if !self.fired.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Resolve immediately if already fired, otherwise wait for `fire()`.
    ///
    /// The `notified()` future is created before the flag check so a
    /// `fire()` racing between the check and the await is never missed.
    pub async fn fired(&self) {
        let notified = self.notify.notified();
        if self.fired.load(Ordering::SeqCst) {
            return;
        }
        notified.await;
    }
}
