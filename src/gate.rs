use std::{
    sync::{Arc, Mutex, Weak, mpsc},
    thread,
};

use crate::{
    error::{LimelightError, LimelightResult},
    media::MediaPlaybackHandle,
    slide::Slide,
    surface::{Phase, SurfaceCore, lock_core, release_all},
    transition::TransitionSpec,
};

/// What to do with a request submitted while a transition is in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitPolicy {
    /// Hold at most one request; apply the latest once the in-flight
    /// transition completes.
    CoalesceLatest,
    /// Force the in-flight transition to complete instantly, then apply.
    ForceImmediate,
}

/// One presentation request. Consumed by the gate; the slide inside is the
/// submit-time snapshot.
#[derive(Debug)]
pub enum PresentationRequest {
    Show { slide: Slide, spec: TransitionSpec },
    Clear { spec: TransitionSpec },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Applied synchronously; visual completion follows through paint.
    Applied,
    /// Retained until the in-flight transition completes.
    Queued,
}

pub(crate) enum GateEvent {
    /// A transition finished; the handles it retired travel with the event
    /// so the gate thread, not the render thread, releases them.
    TransitionComplete {
        retired: Vec<MediaPlaybackHandle>,
    },
    Shutdown,
}

/// Serializes and coalesces presentation requests around in-flight
/// transitions.
///
/// The gate owns the one worker thread of the engine. It never touches
/// pixel state: the surface's paint path reports completion over a
/// single-producer channel, and the worker resubmits whatever single
/// request the configured [`WaitPolicy`] retained. Lock order is always
/// surface core first, pending slot second.
pub struct TransitionGate {
    policy: WaitPolicy,
    core: Weak<Mutex<SurfaceCore>>,
    pending: Arc<Mutex<Option<PresentationRequest>>>,
    tx: mpsc::Sender<GateEvent>,
    worker: Option<thread::JoinHandle<()>>,
}

impl TransitionGate {
    pub(crate) fn spawn(
        policy: WaitPolicy,
        core: Weak<Mutex<SurfaceCore>>,
    ) -> LimelightResult<Self> {
        let (tx, rx) = mpsc::channel();
        let pending: Arc<Mutex<Option<PresentationRequest>>> = Arc::new(Mutex::new(None));
        let worker = thread::Builder::new()
            .name("limelight-gate".into())
            .spawn({
                let core = core.clone();
                let pending = pending.clone();
                move || gate_worker(core, pending, rx)
            })
            .map_err(|e| LimelightError::resource(format!("spawn gate thread: {e}")))?;
        Ok(Self {
            policy,
            core,
            pending,
            tx,
            worker: Some(worker),
        })
    }

    pub(crate) fn completion_sender(&self) -> mpsc::Sender<GateEvent> {
        self.tx.clone()
    }

    /// Accept a request: apply it now if the surface is quiescent,
    /// otherwise resolve it against the in-flight transition per policy.
    /// Either way the final displayed slide for any burst is the last one
    /// submitted.
    pub fn submit(&self, request: PresentationRequest) -> LimelightResult<SubmitOutcome> {
        let core = self
            .core
            .upgrade()
            .ok_or_else(|| LimelightError::concurrency("surface is gone"))?;
        let mut core = lock_core(&core)?;

        if !core.has_active_transition() {
            // Direct application supersedes anything still queued.
            self.clear_pending()?;
            core.apply(request)?;
            return Ok(SubmitOutcome::Applied);
        }

        match request {
            PresentationRequest::Clear { spec } => {
                if core.phase() == Phase::TransitioningOut {
                    // Already clearing; the repeat is dropped.
                    tracing::debug!("redundant clear dropped");
                    return Ok(SubmitOutcome::Applied);
                }
                // An in-transition is making content visible; clearing wins
                // immediately.
                core.force_finish_transition();
                self.clear_pending()?;
                core.apply(PresentationRequest::Clear { spec })?;
                Ok(SubmitOutcome::Applied)
            }
            request @ PresentationRequest::Show { .. } => match self.policy {
                WaitPolicy::CoalesceLatest => {
                    let mut pending = self.lock_pending()?;
                    if pending.is_some() {
                        tracing::debug!("queued request coalesced away by a newer one");
                    }
                    *pending = Some(request);
                    Ok(SubmitOutcome::Queued)
                }
                WaitPolicy::ForceImmediate => {
                    core.force_finish_transition();
                    self.clear_pending()?;
                    core.apply(request)?;
                    Ok(SubmitOutcome::Applied)
                }
            },
        }
    }

    fn lock_pending(
        &self,
    ) -> LimelightResult<std::sync::MutexGuard<'_, Option<PresentationRequest>>> {
        self.pending
            .lock()
            .map_err(|_| LimelightError::concurrency("gate queue lock poisoned"))
    }

    fn clear_pending(&self) -> LimelightResult<()> {
        self.lock_pending()?.take();
        Ok(())
    }
}

impl Drop for TransitionGate {
    fn drop(&mut self) {
        let _ = self.tx.send(GateEvent::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn gate_worker(
    core: Weak<Mutex<SurfaceCore>>,
    pending: Arc<Mutex<Option<PresentationRequest>>>,
    rx: mpsc::Receiver<GateEvent>,
) {
    while let Ok(event) = rx.recv() {
        match event {
            GateEvent::Shutdown => break,
            GateEvent::TransitionComplete { retired } => {
                release_all(retired);
                let Some(core) = core.upgrade() else {
                    break;
                };
                let Ok(mut core) = core.lock() else {
                    break;
                };
                let request = match pending.lock() {
                    Ok(mut slot) => slot.take(),
                    Err(_) => break,
                };
                let Some(request) = request else {
                    continue;
                };
                if core.has_active_transition() {
                    // A newer direct submission raced in ahead of us; the
                    // held request is stale and loses.
                    tracing::debug!("queued request superseded by a newer submission");
                    continue;
                }
                if let Err(err) = core.apply(request) {
                    tracing::warn!(%err, "dequeued presentation request failed");
                }
            }
        }
    }

    // A request still queued at teardown is cancelled, never applied.
    if let Ok(mut slot) = pending.lock()
        && slot.take().is_some()
    {
        tracing::debug!("queued presentation request cancelled at gate shutdown");
    }
}
