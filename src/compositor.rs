use std::sync::Arc;

use crate::{
    component::{Component, RenderFrame},
    error::LimelightResult,
    media::FrameCell,
    pixmap::{PixelRect, Pixmap, ScaleFilter},
    slide::Slide,
};

/// One renderable unit of a partitioned slide.
///
/// Consecutive static components collapse into a single pre-rendered
/// bitmap; each video component stays live so its frames pass straight
/// through on every paint. The bitmap is exclusively owned — rebuilding a
/// slide always starts from scratch, there is no partial invalidation.
pub enum RenderGroup {
    CachedBitmap {
        image: Pixmap,
    },
    LivePassthrough {
        component: Arc<dyn Component>,
        frame: RenderFrame,
        feed: Option<FrameCell>,
    },
}

impl RenderGroup {
    /// Attach the live frame feed opened for this group's component.
    pub fn attach_feed(&mut self, cell: FrameCell) {
        if let Self::LivePassthrough { feed, .. } = self {
            *feed = Some(cell);
        }
    }
}

/// The background renders independently of the component groups so a
/// transition can choose to animate it or hold it static (smart
/// transitions).
pub enum BackgroundLayer {
    Static {
        image: Pixmap,
    },
    Live {
        component: Arc<dyn Component>,
        frame: RenderFrame,
        feed: Option<FrameCell>,
    },
}

impl BackgroundLayer {
    pub fn attach_feed(&mut self, cell: FrameCell) {
        if let Self::Live { feed, .. } = self {
            *feed = Some(cell);
        }
    }
}

/// Partitions slides into render groups and renders group sequences into
/// caller-supplied buffers.
pub struct SlideCompositor {
    filter: ScaleFilter,
}

impl SlideCompositor {
    pub fn new(filter: ScaleFilter) -> Self {
        Self { filter }
    }

    fn frame_for(&self, slide: &Slide, component: &dyn Component, w: u32, h: u32) -> RenderFrame {
        RenderFrame {
            region: PixelRect::from_slide_region(
                component.region(),
                slide.width(),
                slide.height(),
                w,
                h,
            ),
            scale_x: f64::from(w) / f64::from(slide.width()),
            scale_y: f64::from(h) / f64::from(slide.height()),
            filter: self.filter,
        }
    }

    /// Partition a slide's components (background excluded) into an ordered
    /// minimal group sequence for a surface of the given pixel dimensions.
    #[tracing::instrument(skip(self, slide), fields(slide = slide.id()))]
    pub fn build(&self, slide: &Slide, w: u32, h: u32) -> LimelightResult<Vec<RenderGroup>> {
        let mut groups = Vec::new();
        let mut static_run: Vec<Arc<dyn Component>> = Vec::new();

        for component in slide.components() {
            if component.media().is_some() {
                self.flush_static_run(slide, &mut static_run, &mut groups, w, h)?;
                groups.push(RenderGroup::LivePassthrough {
                    component: component.clone(),
                    frame: self.frame_for(slide, component.as_ref(), w, h),
                    feed: None,
                });
            } else {
                static_run.push(component.clone());
            }
        }
        self.flush_static_run(slide, &mut static_run, &mut groups, w, h)?;

        tracing::debug!(groups = groups.len(), "slide partitioned");
        Ok(groups)
    }

    fn flush_static_run(
        &self,
        slide: &Slide,
        run: &mut Vec<Arc<dyn Component>>,
        groups: &mut Vec<RenderGroup>,
        w: u32,
        h: u32,
    ) -> LimelightResult<()> {
        if run.is_empty() {
            return Ok(());
        }
        let mut image = Pixmap::new(w, h)?;
        for component in run.drain(..) {
            let frame = self.frame_for(slide, component.as_ref(), w, h);
            degrade_on_media_error(component.render(&mut image, &frame));
        }
        groups.push(RenderGroup::CachedBitmap { image });
        Ok(())
    }

    /// Pre-render or wrap the background. Video backgrounds stay live;
    /// everything else is cached exactly once per build.
    pub fn build_background(&self, slide: &Slide, w: u32, h: u32) -> LimelightResult<BackgroundLayer> {
        let background = slide.background().clone();
        let frame = self.frame_for(slide, background.as_ref(), w, h);
        if background.media().is_some() {
            return Ok(BackgroundLayer::Live {
                component: background,
                frame,
                feed: None,
            });
        }
        let mut image = Pixmap::new(w, h)?;
        degrade_on_media_error(background.render(&mut image, &frame));
        Ok(BackgroundLayer::Static { image })
    }

    /// Paint the background layer over the target's existing content.
    pub fn render_background(
        &self,
        background: &BackgroundLayer,
        target: &mut Pixmap,
    ) -> LimelightResult<()> {
        match background {
            BackgroundLayer::Static { image } => {
                target.blit_over(image, 0, 0);
            }
            BackgroundLayer::Live {
                component,
                frame,
                feed,
            } => {
                let painted_live = feed.as_ref().is_some_and(|cell| {
                    cell.with_latest(|latest| match latest {
                        Some(pm) => {
                            target.blit_scaled_over(pm, frame.region, frame.filter, 1.0);
                            true
                        }
                        None => false,
                    })
                });
                if !painted_live {
                    degrade_on_media_error(component.render(target, frame));
                }
            }
        }
        Ok(())
    }

    /// Render a full slide: clear, optionally paint the background, then
    /// each group in order. Cached groups blit; live groups re-render from
    /// their latest frame (or the component's own still fallback) on every
    /// call.
    pub fn render(
        &self,
        groups: &[RenderGroup],
        background: &BackgroundLayer,
        target: &mut Pixmap,
        render_background: bool,
    ) -> LimelightResult<()> {
        target.clear();
        if render_background {
            self.render_background(background, target)?;
        }
        for group in groups {
            match group {
                RenderGroup::CachedBitmap { image } => {
                    target.blit_over(image, 0, 0);
                }
                RenderGroup::LivePassthrough {
                    component,
                    frame,
                    feed,
                } => {
                    let painted_live = feed.as_ref().is_some_and(|cell| {
                        cell.with_latest(|latest| match latest {
                            Some(pm) => {
                                target.blit_scaled_over(pm, frame.region, frame.filter, 1.0);
                                true
                            }
                            None => false,
                        })
                    });
                    if !painted_live {
                        degrade_on_media_error(component.render(target, frame));
                    }
                }
            }
        }
        Ok(())
    }
}

// Media failures degrade one component to its still fallback; they never
// abort the surrounding render.
fn degrade_on_media_error(result: LimelightResult<()>) {
    if let Err(err) = result {
        tracing::warn!(%err, "component degraded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        component::{SolidComponent, VideoComponent},
        media::AssetId,
        slide::Slide,
    };
    use kurbo::Rect;

    fn solid(id: &str, x: f64, color: [u8; 4]) -> Arc<dyn Component> {
        SolidComponent::new(id, Rect::new(x, 0.0, x + 4.0, 4.0), color)
    }

    fn video(id: &str) -> Arc<dyn Component> {
        VideoComponent::new(id, Rect::new(0.0, 0.0, 16.0, 16.0), AssetId::new("v1"))
    }

    fn slide_with(components: Vec<Arc<dyn Component>>) -> Slide {
        let bg = SolidComponent::new("bg", Rect::new(0.0, 0.0, 16.0, 16.0), [8, 8, 8, 255]);
        let mut slide = Slide::new("s", 16, 16, bg).unwrap();
        for c in components {
            slide = slide.with_component(c);
        }
        slide
    }

    #[test]
    fn consecutive_statics_merge_into_one_group() {
        let slide = slide_with(vec![
            solid("a", 0.0, [255, 0, 0, 255]),
            solid("b", 4.0, [0, 255, 0, 255]),
            solid("c", 8.0, [0, 0, 255, 255]),
        ]);
        let compositor = SlideCompositor::new(ScaleFilter::Nearest);
        let groups = compositor.build(&slide, 16, 16).unwrap();
        assert_eq!(groups.len(), 1);
        assert!(matches!(groups[0], RenderGroup::CachedBitmap { .. }));
    }

    #[test]
    fn video_splits_static_runs() {
        let slide = slide_with(vec![
            solid("a", 0.0, [255, 0, 0, 255]),
            video("v"),
            solid("b", 4.0, [0, 255, 0, 255]),
            solid("c", 8.0, [0, 0, 255, 255]),
        ]);
        let compositor = SlideCompositor::new(ScaleFilter::Nearest);
        let groups = compositor.build(&slide, 16, 16).unwrap();
        assert_eq!(groups.len(), 3);
        assert!(matches!(groups[0], RenderGroup::CachedBitmap { .. }));
        assert!(matches!(groups[1], RenderGroup::LivePassthrough { .. }));
        assert!(matches!(groups[2], RenderGroup::CachedBitmap { .. }));
    }

    #[test]
    fn group_render_matches_individual_component_render() {
        let slide = slide_with(vec![
            solid("a", 0.0, [255, 0, 0, 255]),
            solid("b", 2.0, [0, 255, 0, 200]),
            solid("c", 8.0, [0, 0, 255, 255]),
        ]);
        let compositor = SlideCompositor::new(ScaleFilter::Nearest);
        let groups = compositor.build(&slide, 16, 16).unwrap();
        let background = compositor.build_background(&slide, 16, 16).unwrap();

        let mut grouped = Pixmap::new(16, 16).unwrap();
        compositor
            .render(&groups, &background, &mut grouped, true)
            .unwrap();

        let mut direct = Pixmap::new(16, 16).unwrap();
        direct.clear();
        compositor
            .render_background(&background, &mut direct)
            .unwrap();
        for component in slide.components() {
            let frame = compositor.frame_for(&slide, component.as_ref(), 16, 16);
            component.render(&mut direct, &frame).unwrap();
        }

        assert_eq!(grouped.data(), direct.data());
    }

    #[test]
    fn live_group_without_feed_falls_back_to_component_still() {
        let slide = slide_with(vec![video("v")]);
        let compositor = SlideCompositor::new(ScaleFilter::Nearest);
        let groups = compositor.build(&slide, 16, 16).unwrap();
        let background = compositor.build_background(&slide, 16, 16).unwrap();

        let mut out = Pixmap::new(16, 16).unwrap();
        compositor.render(&groups, &background, &mut out, true).unwrap();
        // Poster-less video renders opaque black over the grey background.
        assert_eq!(out.pixel(8, 8), [0, 0, 0, 255]);
    }
}
