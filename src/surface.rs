use std::{
    sync::{Arc, Mutex, MutexGuard, mpsc},
    time::Instant,
};

use crate::{
    clock::TransitionClock,
    compositor::{BackgroundLayer, RenderGroup, SlideCompositor},
    composite,
    config::EngineConfig,
    error::{LimelightError, LimelightResult},
    gate::{GateEvent, PresentationRequest, SubmitOutcome, TransitionGate},
    media::{MediaPlaybackHandle, MediaRegistry, PlaybackState},
    pixmap::Pixmap,
    signal::RepaintSignal,
    slide::Slide,
    transition::{self, TransitionSpec},
};

/// Where the surface state machine currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Nothing shown.
    Idle,
    /// A slide is fully displayed, no transition running.
    Showing,
    /// The incoming slide is animating to visible.
    TransitioningIn,
    /// The current slide is animating to cleared.
    TransitioningOut,
}

/// One output surface: owns the current/incoming buffer pair, both live
/// slide lifecycles, and the active transition clock.
///
/// `show`/`clear` may be called from any thread and only guarantee
/// acceptance; `paint` is the render-thread entry point and the only place
/// pixels are composited or swapped. A full-screen primary surface and a
/// notification overlay are just two instances with different
/// configuration.
pub struct DisplaySurface {
    core: Arc<Mutex<SurfaceCore>>,
    gate: TransitionGate,
    repaint: RepaintSignal,
    default_transition: TransitionSpec,
}

impl DisplaySurface {
    pub fn new(
        config: EngineConfig,
        registry: Arc<MediaRegistry>,
        width: u32,
        height: u32,
    ) -> LimelightResult<Self> {
        let repaint = RepaintSignal::new();
        let core = Arc::new(Mutex::new(SurfaceCore::new(
            config.clone(),
            registry,
            width,
            height,
            repaint.clone(),
        )?));
        let gate = TransitionGate::spawn(config.wait_policy, Arc::downgrade(&core))?;
        lock_core(&core)?.completion = Some(gate.completion_sender());
        Ok(Self {
            core,
            gate,
            repaint,
            default_transition: config.default_transition,
        })
    }

    /// The surface's coalesced repaint signal; the host hooks its redraw
    /// request here and polls/acknowledges it from the render callback.
    pub fn repaint_signal(&self) -> RepaintSignal {
        self.repaint.clone()
    }

    /// Present a slide. The slide is snapshotted by value; the caller keeps
    /// no shared mutable state with the surface.
    pub fn show(&self, slide: Slide, spec: TransitionSpec) -> LimelightResult<SubmitOutcome> {
        self.submit(PresentationRequest::Show { slide, spec })
    }

    /// Present a slide with the configured default transition.
    pub fn show_default(&self, slide: Slide) -> LimelightResult<SubmitOutcome> {
        self.show(slide, self.default_transition)
    }

    /// Fade the current slide out to an empty surface.
    pub fn clear(&self, spec: TransitionSpec) -> LimelightResult<SubmitOutcome> {
        self.submit(PresentationRequest::Clear { spec })
    }

    /// Clear with the configured default transition.
    pub fn clear_default(&self) -> LimelightResult<SubmitOutcome> {
        self.clear(self.default_transition)
    }

    pub fn submit(&self, request: PresentationRequest) -> LimelightResult<SubmitOutcome> {
        self.gate.submit(request)
    }

    /// Render-thread entry: composite the current engine state into
    /// `target`, which must match the surface dimensions. Detects clock
    /// completion, so a host that stops painting also stops promoting.
    pub fn paint(&self, target: &mut Pixmap) -> LimelightResult<()> {
        lock_core(&self.core)?.paint_at(target, Instant::now())
    }

    /// Hard reset to new output dimensions: buffers are recreated, an
    /// in-flight transition completes instantly (its remaining visual
    /// discarded), cached groups are rebuilt. Handles keep playing.
    pub fn resize(&self, width: u32, height: u32) -> LimelightResult<()> {
        lock_core(&self.core)?.resize(width, height)
    }

    pub fn phase(&self) -> LimelightResult<Phase> {
        Ok(lock_core(&self.core)?.phase)
    }

    pub fn is_transitioning(&self) -> LimelightResult<bool> {
        Ok(lock_core(&self.core)?.transition.is_some())
    }

    pub fn current_slide_id(&self) -> LimelightResult<Option<String>> {
        Ok(lock_core(&self.core)?
            .current
            .as_ref()
            .map(|live| live.slide.id().to_string()))
    }

    pub fn dimensions(&self) -> LimelightResult<(u32, u32)> {
        let core = lock_core(&self.core)?;
        Ok((core.width, core.height))
    }
}

pub(crate) fn lock_core<'a>(
    core: &'a Arc<Mutex<SurfaceCore>>,
) -> LimelightResult<MutexGuard<'a, SurfaceCore>> {
    core.lock()
        .map_err(|_| LimelightError::concurrency("surface state lock poisoned"))
}

/// One slide lifecycle while it is current or incoming: its snapshot, its
/// render groups, and the playback handles opened for it.
struct LiveSlide {
    slide: Slide,
    groups: Vec<RenderGroup>,
    background: BackgroundLayer,
    handles: Vec<MediaPlaybackHandle>,
    background_handle: Option<usize>,
}

impl LiveSlide {
    fn release_handles(&mut self) {
        for handle in &mut self.handles {
            handle.release();
        }
    }
}

pub(crate) fn release_all(handles: Vec<MediaPlaybackHandle>) {
    for mut handle in handles {
        handle.release();
    }
}

struct ActiveTransition {
    clock: TransitionClock,
    spec: TransitionSpec,
}

pub(crate) struct SurfaceCore {
    config: EngineConfig,
    registry: Arc<MediaRegistry>,
    compositor: SlideCompositor,
    width: u32,
    height: u32,
    phase: Phase,
    current: Option<LiveSlide>,
    incoming: Option<LiveSlide>,
    current_buffer: Pixmap,
    incoming_buffer: Pixmap,
    scratch: Pixmap,
    transition: Option<ActiveTransition>,
    /// False only when outgoing and incoming share one continuously
    /// playing background video; the background then stays static while
    /// the foregrounds animate.
    transition_background: bool,
    repaint: RepaintSignal,
    pub(crate) completion: Option<mpsc::Sender<GateEvent>>,
}

impl SurfaceCore {
    fn new(
        config: EngineConfig,
        registry: Arc<MediaRegistry>,
        width: u32,
        height: u32,
        repaint: RepaintSignal,
    ) -> LimelightResult<Self> {
        let current_buffer = Pixmap::new(width, height)?;
        let incoming_buffer = Pixmap::new(width, height)?;
        let scratch = Pixmap::new(width, height)?;
        Ok(Self {
            compositor: SlideCompositor::new(config.quality.scale_filter()),
            config,
            registry,
            width,
            height,
            phase: Phase::Idle,
            current: None,
            incoming: None,
            current_buffer,
            incoming_buffer,
            scratch,
            transition: None,
            transition_background: true,
            repaint,
            completion: None,
        })
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn has_active_transition(&self) -> bool {
        self.transition.is_some()
    }

    /// Apply a request directly. Callers (the gate) guarantee no transition
    /// is in flight.
    pub(crate) fn apply(&mut self, request: PresentationRequest) -> LimelightResult<()> {
        debug_assert!(self.transition.is_none());
        match request {
            PresentationRequest::Show { slide, spec } => self.apply_show(slide, spec),
            PresentationRequest::Clear { spec } => self.apply_clear(spec),
        }
    }

    /// Jump the in-flight clock to its end and finish the state transition
    /// synchronously.
    pub(crate) fn force_finish_transition(&mut self) {
        if let Some(active) = &mut self.transition {
            active.clock.force_complete();
            self.finish_transition();
        }
    }

    #[tracing::instrument(skip(self, slide, spec), fields(slide = slide.id()))]
    fn apply_show(&mut self, slide: Slide, spec: TransitionSpec) -> LimelightResult<()> {
        spec.validate()?;

        // Build everything fallible up front; a resource failure here must
        // leave the surface exactly as it was.
        let mut groups = self.compositor.build(&slide, self.width, self.height)?;
        let mut background = self
            .compositor
            .build_background(&slide, self.width, self.height)?;

        let mut handles: Vec<MediaPlaybackHandle> = Vec::new();
        let mut background_handle = None;
        let mut transition_background = true;

        if let Some(binding) = slide.background_media().cloned() {
            let carried = self.take_carryover_background(&binding.asset);
            transition_background = carried.is_none();

            let handle = match carried {
                // Continuity: the shared background player keeps running;
                // only its frame feed is re-pointed at the new layer.
                Some(handle) => Some(handle),
                None => {
                    match MediaPlaybackHandle::open(
                        &self.registry,
                        slide.id(),
                        slide.background().id(),
                        &binding,
                        self.repaint.clone(),
                    ) {
                        Ok(mut handle) => {
                            if let Err(err) = handle.play() {
                                tracing::warn!(%err, "background playback degraded");
                            }
                            Some(handle)
                        }
                        Err(err) => {
                            tracing::warn!(%err, "background media degraded to still frame");
                            None
                        }
                    }
                }
            };
            if let Some(handle) = handle {
                background.attach_feed(handle.frame_cell());
                background_handle = Some(handles.len());
                handles.push(handle);
            }
        }

        for group in &mut groups {
            let RenderGroup::LivePassthrough {
                component, feed, ..
            } = group
            else {
                continue;
            };
            let Some(binding) = component.media() else {
                continue;
            };
            match MediaPlaybackHandle::open(
                &self.registry,
                slide.id(),
                component.id(),
                binding,
                self.repaint.clone(),
            ) {
                Ok(mut handle) => {
                    if let Err(err) = handle.play() {
                        tracing::warn!(%err, "component playback degraded");
                    }
                    *feed = Some(handle.frame_cell());
                    handles.push(handle);
                }
                Err(err) => {
                    tracing::warn!(%err, "component media degraded to still frame");
                }
            }
        }

        let incoming = LiveSlide {
            slide,
            groups,
            background,
            handles,
            background_handle,
        };

        if spec.is_immediate() {
            self.incoming = Some(incoming);
            self.render_incoming(true);
            // No transition was in flight, so nothing observes a completion
            // signal; the swapped-out handles are released right here.
            release_all(self.promote_incoming());
            self.phase = Phase::Showing;
            tracing::debug!("immediate swap");
        } else {
            self.transition_background = transition_background;
            self.incoming = Some(incoming);
            self.phase = Phase::TransitioningIn;
            self.transition = Some(ActiveTransition {
                clock: TransitionClock::start(spec.duration_millis),
                spec,
            });
            tracing::debug!(
                duration_millis = spec.duration_millis,
                animate_background = transition_background,
                "transition started"
            );
        }
        self.repaint.raise();
        Ok(())
    }

    /// Detach the current slide's background handle when the new slide
    /// keeps playing the same asset: the engine must never run two players
    /// for it.
    fn take_carryover_background(&mut self, asset: &crate::media::AssetId) -> Option<MediaPlaybackHandle> {
        if !self.config.smart_transitions {
            return None;
        }
        let current = self.current.as_mut()?;
        let idx = current.background_handle?;
        let handle = current.handles.get(idx)?;
        if handle.asset() != asset || handle.state() != PlaybackState::Playing {
            return None;
        }
        current.background_handle = None;
        Some(current.handles.remove(idx))
    }

    fn apply_clear(&mut self, spec: TransitionSpec) -> LimelightResult<()> {
        match self.phase {
            // Already empty or already on its way out: idempotent no-op.
            Phase::Idle | Phase::TransitioningOut => Ok(()),
            Phase::Showing | Phase::TransitioningIn => {
                spec.validate()?;
                if self.phase == Phase::TransitioningIn {
                    self.force_finish_transition();
                }
                if spec.is_immediate() {
                    release_all(self.retire_current());
                    self.phase = Phase::Idle;
                } else {
                    self.phase = Phase::TransitioningOut;
                    self.transition = Some(ActiveTransition {
                        clock: TransitionClock::start(spec.duration_millis),
                        spec,
                    });
                    self.transition_background = true;
                }
                self.repaint.raise();
                Ok(())
            }
        }
    }

    /// Complete the in-flight transition: promote or retire, then hand the
    /// retired handles to the gate thread for release. Releasing happens
    /// only after the transition has fully completed and never on the
    /// render thread while it may still be compositing.
    fn finish_transition(&mut self) {
        let retired = match self.phase {
            Phase::TransitioningIn => {
                let retired = self.promote_incoming();
                self.phase = Phase::Showing;
                retired
            }
            Phase::TransitioningOut => {
                let retired = self.retire_current();
                self.phase = Phase::Idle;
                retired
            }
            Phase::Idle | Phase::Showing => Vec::new(),
        };
        self.transition = None;

        match &self.completion {
            Some(completion) => {
                if let Err(mpsc::SendError(GateEvent::TransitionComplete { retired })) =
                    completion.send(GateEvent::TransitionComplete { retired })
                {
                    // Gate already gone; release locally instead.
                    release_all(retired);
                }
            }
            None => release_all(retired),
        }
        self.repaint.raise();
        tracing::debug!(phase = ?self.phase, "transition complete");
    }

    /// Atomically make the incoming slide current. Returns the outgoing
    /// slide's handles for release (a carried-over background handle has
    /// already been moved to the incoming slide and is not among them).
    #[must_use]
    fn promote_incoming(&mut self) -> Vec<MediaPlaybackHandle> {
        let _ = self.current_buffer.copy_from(&self.incoming_buffer);
        let retired = self
            .current
            .take()
            .map(|outgoing| outgoing.handles)
            .unwrap_or_default();
        self.current = self.incoming.take();
        self.transition = None;
        self.transition_background = true;
        retired
    }

    #[must_use]
    fn retire_current(&mut self) -> Vec<MediaPlaybackHandle> {
        let retired = self
            .current
            .take()
            .map(|outgoing| outgoing.handles)
            .unwrap_or_default();
        self.current_buffer.clear();
        self.incoming_buffer.clear();
        self.transition = None;
        self.transition_background = true;
        retired
    }

    fn render_current(&mut self, with_background: bool) {
        match &self.current {
            Some(live) => {
                if let Err(err) = self.compositor.render(
                    &live.groups,
                    &live.background,
                    &mut self.current_buffer,
                    with_background,
                ) {
                    tracing::warn!(%err, "current slide render degraded");
                }
            }
            None => self.current_buffer.clear(),
        }
    }

    fn render_incoming(&mut self, with_background: bool) {
        match &self.incoming {
            Some(live) => {
                if let Err(err) = self.compositor.render(
                    &live.groups,
                    &live.background,
                    &mut self.incoming_buffer,
                    with_background,
                ) {
                    tracing::warn!(%err, "incoming slide render degraded");
                }
            }
            None => self.incoming_buffer.clear(),
        }
    }

    pub(crate) fn paint_at(&mut self, target: &mut Pixmap, now: Instant) -> LimelightResult<()> {
        if target.width() != self.width || target.height() != self.height {
            return Err(LimelightError::validation(
                "paint target does not match surface dimensions",
            ));
        }

        // Acknowledge the coalesced repaint; anything arriving from here on
        // raises a fresh one.
        self.repaint.take();

        if let Some(active) = &self.transition
            && active.clock.is_complete_at(now)
        {
            self.finish_transition();
        }

        match self.phase {
            Phase::Idle => {
                target.clear();
            }
            Phase::Showing => {
                self.render_current(true);
                target.copy_from(&self.current_buffer)?;
            }
            Phase::TransitioningIn => {
                let Some(active) = &self.transition else {
                    return Err(LimelightError::concurrency(
                        "transitioning without an active clock",
                    ));
                };
                let spec = active.spec;
                let t = spec.ease.apply(active.clock.progress_at(now));
                let animate_background = self.transition_background;

                self.render_current(animate_background);
                self.render_incoming(animate_background);

                if animate_background {
                    transition::blend(
                        &self.current_buffer,
                        &self.incoming_buffer,
                        target,
                        spec.kind,
                        t,
                    )?;
                } else {
                    // Shared live background: paint it once, unblended, and
                    // animate only the foregrounds above it.
                    transition::blend(
                        &self.current_buffer,
                        &self.incoming_buffer,
                        &mut self.scratch,
                        spec.kind,
                        t,
                    )?;
                    target.clear();
                    if let Some(live) = &self.incoming {
                        self.compositor
                            .render_background(&live.background, target)?;
                    }
                    composite::over_buffers(target.data_mut(), self.scratch.data())?;
                }
                // Animation frames are host-driven: each in-flight paint
                // requests the next.
                self.repaint.raise();
            }
            Phase::TransitioningOut => {
                let Some(active) = &self.transition else {
                    return Err(LimelightError::concurrency(
                        "transitioning without an active clock",
                    ));
                };
                let spec = active.spec;
                let t = spec.ease.apply(active.clock.progress_at(now));

                self.render_current(true);
                self.incoming_buffer.clear();
                transition::blend(
                    &self.current_buffer,
                    &self.incoming_buffer,
                    target,
                    spec.kind,
                    t,
                )?;
                self.repaint.raise();
            }
        }
        Ok(())
    }

    pub(crate) fn resize(&mut self, width: u32, height: u32) -> LimelightResult<()> {
        if width == self.width && height == self.height {
            return Ok(());
        }

        // Allocate every replacement buffer before mutating anything.
        let current_buffer = Pixmap::new(width, height)?;
        let incoming_buffer = Pixmap::new(width, height)?;
        let scratch = Pixmap::new(width, height)?;

        // An in-flight transition is treated as instantly complete; its
        // remaining visual state is discarded but handle release ordering
        // is the same as a natural completion.
        self.force_finish_transition();

        // Rebuild the surviving slide's cached groups at the new size,
        // re-pointing live feeds at the handles that kept playing.
        let rebuilt = match &self.current {
            Some(live) => Some(self.rebuild_groups(live, width, height)?),
            None => None,
        };

        self.width = width;
        self.height = height;
        self.current_buffer = current_buffer;
        self.incoming_buffer = incoming_buffer;
        self.scratch = scratch;
        if let (Some(live), Some((groups, background))) = (self.current.as_mut(), rebuilt) {
            live.groups = groups;
            live.background = background;
        }
        self.repaint.raise();
        tracing::debug!(width, height, "surface reset");
        Ok(())
    }

    fn rebuild_groups(
        &self,
        live: &LiveSlide,
        width: u32,
        height: u32,
    ) -> LimelightResult<(Vec<RenderGroup>, BackgroundLayer)> {
        let mut groups = self.compositor.build(&live.slide, width, height)?;
        let mut background = self
            .compositor
            .build_background(&live.slide, width, height)?;

        if let Some(idx) = live.background_handle
            && let Some(handle) = live.handles.get(idx)
        {
            background.attach_feed(handle.frame_cell());
        }
        for group in &mut groups {
            let RenderGroup::LivePassthrough {
                component, feed, ..
            } = group
            else {
                continue;
            };
            let Some(binding) = component.media() else {
                continue;
            };
            *feed = live
                .handles
                .iter()
                .enumerate()
                .filter(|(i, _)| Some(*i) != live.background_handle)
                .map(|(_, h)| h)
                .find(|h| h.asset() == &binding.asset)
                .map(MediaPlaybackHandle::frame_cell);
        }
        Ok((groups, background))
    }
}

impl Drop for SurfaceCore {
    fn drop(&mut self) {
        if let Some(mut live) = self.incoming.take() {
            live.release_handles();
        }
        if let Some(mut live) = self.current.take() {
            live.release_handles();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::SolidComponent;
    use kurbo::Rect;

    fn slide(id: &str, color: [u8; 4]) -> Slide {
        let bg = SolidComponent::new(
            format!("{id}/bg"),
            Rect::new(0.0, 0.0, 32.0, 18.0),
            color,
        );
        Slide::new(id, 32, 18, bg).unwrap()
    }

    fn surface() -> DisplaySurface {
        DisplaySurface::new(
            EngineConfig::default(),
            Arc::new(MediaRegistry::new()),
            32,
            18,
        )
        .unwrap()
    }

    #[test]
    fn starts_idle() {
        let s = surface();
        assert_eq!(s.phase().unwrap(), Phase::Idle);
        assert!(s.current_slide_id().unwrap().is_none());
        assert!(!s.is_transitioning().unwrap());
    }

    #[test]
    fn immediate_show_is_synchronous() {
        let s = surface();
        s.show(slide("a", [200, 0, 0, 255]), TransitionSpec::cut())
            .unwrap();
        assert_eq!(s.phase().unwrap(), Phase::Showing);
        assert_eq!(s.current_slide_id().unwrap().as_deref(), Some("a"));

        let mut target = Pixmap::new(32, 18).unwrap();
        s.paint(&mut target).unwrap();
        assert_eq!(target.pixel(4, 4), [200, 0, 0, 255]);
    }

    #[test]
    fn long_transition_holds_until_painted_past_completion() {
        let s = surface();
        s.show(slide("a", [200, 0, 0, 255]), TransitionSpec::fade(60_000))
            .unwrap();
        assert_eq!(s.phase().unwrap(), Phase::TransitioningIn);

        // Painting before the clock completes keeps transitioning and
        // requests the next animation frame.
        let mut target = Pixmap::new(32, 18).unwrap();
        s.paint(&mut target).unwrap();
        assert_eq!(s.phase().unwrap(), Phase::TransitioningIn);
        assert!(s.repaint_signal().is_pending());
    }

    #[test]
    fn default_transition_comes_from_config() {
        let s = surface();
        s.show_default(slide("a", [200, 0, 0, 255])).unwrap();
        // The stock config animates by default.
        assert_eq!(s.phase().unwrap(), Phase::TransitioningIn);
    }

    #[test]
    fn clear_from_idle_is_a_no_op() {
        let s = surface();
        s.clear(TransitionSpec::fade(100)).unwrap();
        assert_eq!(s.phase().unwrap(), Phase::Idle);
    }

    #[test]
    fn immediate_clear_empties_the_surface() {
        let s = surface();
        s.show(slide("a", [200, 0, 0, 255]), TransitionSpec::cut())
            .unwrap();
        s.clear(TransitionSpec::cut()).unwrap();
        assert_eq!(s.phase().unwrap(), Phase::Idle);
        assert!(s.current_slide_id().unwrap().is_none());

        let mut target = Pixmap::new(32, 18).unwrap();
        s.paint(&mut target).unwrap();
        assert_eq!(target.pixel(4, 4), [0, 0, 0, 0]);
    }

    #[test]
    fn resize_to_same_dimensions_is_a_no_op() {
        let s = surface();
        s.show(slide("a", [200, 0, 0, 255]), TransitionSpec::fade(60_000))
            .unwrap();
        s.resize(32, 18).unwrap();
        // Same-size resize must not complete the in-flight transition.
        assert_eq!(s.phase().unwrap(), Phase::TransitioningIn);
    }
}
