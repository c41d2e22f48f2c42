use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use crate::foundation::error::{SongreelError, SongreelResult};

/// Cooperative cancellation flag shared between the Ctrl+C handler, the batch coordinator and
/// pool workers.
///
/// A token can be *deferred*: while at least one [`DeferGuard`] is alive, a cancellation request
/// is latched but [`CancelToken::is_cancelled`] keeps reporting `false`. Dropping the last guard
/// re-arms the token and makes a latched request observable.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    requested: AtomicBool,
    deferrals: AtomicUsize,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Safe to call from a signal handler thread.
    pub fn cancel(&self) {
        self.inner.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.deferrals.load(Ordering::SeqCst) == 0
            && self.inner.requested.load(Ordering::SeqCst)
    }

    /// `true` once `cancel` was called, even while deferred.
    pub fn is_requested(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    /// Enter a cancellation scope that holds interrupts back until the guard is dropped.
    pub fn defer(&self) -> DeferGuard<'_> {
        self.inner.deferrals.fetch_add(1, Ordering::SeqCst);
        DeferGuard { token: self }
    }

    /// `Err(Aborted)` when cancellation is observable.
    pub fn check(&self) -> SongreelResult<()> {
        if self.is_cancelled() {
            Err(SongreelError::Aborted)
        } else {
            Ok(())
        }
    }

    /// Route Ctrl+C to this token.
    ///
    /// The handler is process-wide and may only be installed once.
    pub fn install_ctrlc_handler(&self) -> SongreelResult<()> {
        let token = self.clone();
        ctrlc::set_handler(move || token.cancel()).map_err(|e| {
            SongreelError::configuration(format!("failed to install Ctrl+C handler: {e}"))
        })
    }
}

/// Re-arms its [`CancelToken`] on drop.
#[must_use = "dropping the guard immediately re-arms cancellation"]
#[derive(Debug)]
pub struct DeferGuard<'a> {
    token: &'a CancelToken,
}

impl DeferGuard<'_> {
    /// Explicitly leave the scope.
    pub fn release(self) {}
}

impl Drop for DeferGuard<'_> {
    fn drop(&mut self) {
        self.token.inner.deferrals.fetch_sub(1, Ordering::SeqCst);
    }
}
