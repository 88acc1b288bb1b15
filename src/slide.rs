use std::sync::Arc;

use crate::{
    component::{Component, MediaBinding},
    error::{LimelightError, LimelightResult},
};

/// Immutable snapshot of presentable content: a background plus an ordered
/// component list, in slide-space dimensions.
///
/// The engine clones the slide at submit time; because components are
/// immutable and `Arc`-shared, the clone is cheap and never aliases state
/// the caller could later mutate.
#[derive(Clone)]
pub struct Slide {
    id: String,
    width: u32,
    height: u32,
    background: Arc<dyn Component>,
    components: Vec<Arc<dyn Component>>,
}

impl Slide {
    pub fn new(
        id: impl Into<String>,
        width: u32,
        height: u32,
        background: Arc<dyn Component>,
    ) -> LimelightResult<Self> {
        if width == 0 || height == 0 {
            return Err(LimelightError::validation(
                "slide dimensions must be non-zero",
            ));
        }
        Ok(Self {
            id: id.into(),
            width,
            height,
            background,
            components: Vec::new(),
        })
    }

    /// Append a component above everything added so far (z-order is list
    /// order).
    pub fn with_component(mut self, component: Arc<dyn Component>) -> Self {
        self.components.push(component);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn background(&self) -> &Arc<dyn Component> {
        &self.background
    }

    pub fn components(&self) -> &[Arc<dyn Component>] {
        &self.components
    }

    pub fn background_media(&self) -> Option<&MediaBinding> {
        self.background.media()
    }
}

impl std::fmt::Debug for Slide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slide")
            .field("id", &self.id)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("components", &self.components.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::SolidComponent;
    use kurbo::Rect;

    #[test]
    fn rejects_zero_dimensions() {
        let bg = SolidComponent::new("bg", Rect::new(0.0, 0.0, 1.0, 1.0), [0, 0, 0, 255]);
        assert!(Slide::new("s", 0, 1080, bg).is_err());
    }

    #[test]
    fn components_keep_insertion_order() {
        let bg = SolidComponent::new("bg", Rect::new(0.0, 0.0, 16.0, 9.0), [0, 0, 0, 255]);
        let slide = Slide::new("s", 16, 9, bg)
            .unwrap()
            .with_component(SolidComponent::new(
                "a",
                Rect::new(0.0, 0.0, 1.0, 1.0),
                [255, 0, 0, 255],
            ))
            .with_component(SolidComponent::new(
                "b",
                Rect::new(1.0, 0.0, 2.0, 1.0),
                [0, 255, 0, 255],
            ));
        let ids: Vec<&str> = slide.components().iter().map(|c| c.id()).collect();
        assert_eq!(ids, ["a", "b"]);
    }
}
