use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

/// Coalesced repaint request.
///
/// Any number of raisers (clock ticks, media frame callbacks, state-machine
/// promotions) collapse into at most one outstanding redraw: the host
/// notifier fires only on the transition from "clean" to "pending", and the
/// render thread acknowledges with [`RepaintSignal::take`] before drawing.
#[derive(Clone)]
pub struct RepaintSignal {
    inner: Arc<SignalInner>,
}

struct SignalInner {
    pending: AtomicBool,
    notifier: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
}

impl RepaintSignal {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SignalInner {
                pending: AtomicBool::new(false),
                notifier: Mutex::new(None),
            }),
        }
    }

    /// Install the host callback invoked when a redraw becomes pending.
    /// Typically this is the toolkit's `request_redraw` equivalent.
    pub fn set_notifier(&self, notifier: impl Fn() + Send + Sync + 'static) {
        if let Ok(mut slot) = self.inner.notifier.lock() {
            *slot = Some(Box::new(notifier));
        }
    }

    /// Request a redraw. Raises already pending are absorbed silently.
    pub fn raise(&self) {
        if !self.inner.pending.swap(true, Ordering::AcqRel)
            && let Ok(slot) = self.inner.notifier.lock()
            && let Some(notify) = slot.as_ref()
        {
            notify();
        }
    }

    /// Consume the pending request. Returns whether one was outstanding.
    pub fn take(&self) -> bool {
        self.inner.pending.swap(false, Ordering::AcqRel)
    }

    pub fn is_pending(&self) -> bool {
        self.inner.pending.load(Ordering::Acquire)
    }
}

impl Default for RepaintSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RepaintSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepaintSignal")
            .field("pending", &self.is_pending())
            .finish()
    }
}
