use std::sync::Arc;

use kurbo::Rect;

use crate::{
    composite,
    error::LimelightResult,
    media::AssetId,
    pixmap::{PixelRect, Pixmap, ScaleFilter},
};

/// Media capability of a component: which asset it plays and how.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaBinding {
    pub asset: AssetId,
    pub looping: bool,
    pub muted: bool,
}

/// Pixel-space placement handed to a component when it renders: the mapped
/// region plus the slide-to-surface scale factors (needed by anything that
/// rasterizes at a nominal slide-space size, like text).
#[derive(Clone, Copy, Debug)]
pub struct RenderFrame {
    pub region: PixelRect,
    pub scale_x: f64,
    pub scale_y: f64,
    pub filter: ScaleFilter,
}

/// A single visual element of a slide.
///
/// Components are immutable once constructed and shared by `Arc`, which is
/// what makes a [`crate::slide::Slide`] a true snapshot. The `media`
/// accessor is the capability check the compositor performs once at
/// group-build time; everything without a binding is cacheable.
pub trait Component: Send + Sync {
    fn id(&self) -> &str;

    /// Placement in slide space.
    fn region(&self) -> Rect;

    fn render(&self, target: &mut Pixmap, frame: &RenderFrame) -> LimelightResult<()>;

    fn media(&self) -> Option<&MediaBinding> {
        None
    }
}

/// Full-bleed or boxed solid color. The usual background for text slides.
pub struct SolidComponent {
    pub id: String,
    pub region: Rect,
    /// Straight-alpha RGBA.
    pub color: [u8; 4],
}

impl SolidComponent {
    pub fn new(id: impl Into<String>, region: Rect, color: [u8; 4]) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            region,
            color,
        })
    }
}

impl Component for SolidComponent {
    fn id(&self) -> &str {
        &self.id
    }

    fn region(&self) -> Rect {
        self.region
    }

    fn render(&self, target: &mut Pixmap, frame: &RenderFrame) -> LimelightResult<()> {
        target.fill_rect_over(frame.region, composite::premultiply(self.color));
        Ok(())
    }
}

/// A pre-decoded still image stretched into its region.
pub struct ImageComponent {
    pub id: String,
    pub region: Rect,
    pub image: Arc<Pixmap>,
    pub opacity: f32,
}

impl ImageComponent {
    pub fn new(id: impl Into<String>, region: Rect, image: Arc<Pixmap>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            region,
            image,
            opacity: 1.0,
        })
    }
}

impl Component for ImageComponent {
    fn id(&self) -> &str {
        &self.id
    }

    fn region(&self) -> Rect {
        self.region
    }

    fn render(&self, target: &mut Pixmap, frame: &RenderFrame) -> LimelightResult<()> {
        target.blit_scaled_over(&self.image, frame.region, frame.filter, self.opacity);
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

/// Rasterized text block. Lines are stacked and the block is centered
/// vertically in its region; size is nominal slide-space pixels and scales
/// with the surface.
pub struct TextComponent {
    pub id: String,
    pub region: Rect,
    pub text: String,
    pub font: Arc<fontdue::Font>,
    pub size_px: f32,
    /// Straight-alpha RGBA.
    pub color: [u8; 4],
    pub align: TextAlign,
}

impl TextComponent {
    pub fn new(
        id: impl Into<String>,
        region: Rect,
        text: impl Into<String>,
        font: Arc<fontdue::Font>,
        size_px: f32,
        color: [u8; 4],
    ) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            region,
            text: text.into(),
            font,
            size_px,
            color,
            align: TextAlign::Center,
        })
    }

    fn rasterize_line(&self, line: &str, size: f32) -> Option<Pixmap> {
        let font = self.font.as_ref();

        let mut total_width: i32 = 0;
        let mut max_ascent: i32 = 0;
        let mut max_descent: i32 = 0;
        for ch in line.chars() {
            let metrics = font.metrics(ch, size);
            let ascent = metrics.height as i32 + metrics.ymin;
            let descent = -metrics.ymin;
            max_ascent = max_ascent.max(ascent);
            max_descent = max_descent.max(descent);
            total_width += metrics.advance_width.ceil() as i32;
        }
        if total_width <= 0 || max_ascent + max_descent <= 0 {
            return None;
        }

        let mut out = Pixmap::new(total_width as u32, (max_ascent + max_descent) as u32).ok()?;
        let [r, g, b, a] = self.color;

        let mut cursor_x: i32 = 0;
        for ch in line.chars() {
            let (metrics, coverage) = font.rasterize(ch, size);
            let glyph_x = cursor_x + metrics.xmin;
            let glyph_y = max_ascent - (metrics.height as i32 + metrics.ymin);

            for gy in 0..metrics.height {
                for gx in 0..metrics.width {
                    let c = coverage[gy * metrics.width + gx];
                    if c == 0 {
                        continue;
                    }
                    let px = glyph_x + gx as i32;
                    let py = glyph_y + gy as i32;
                    if px < 0 || py < 0 || px >= out.width() as i32 || py >= out.height() as i32 {
                        continue;
                    }
                    let alpha =
                        ((u32::from(c) * u32::from(a) + 127) / 255).min(255) as u8;
                    let premul = composite::premultiply([r, g, b, alpha]);
                    let existing = out.pixel(px as u32, py as u32);
                    out.set_pixel(px as u32, py as u32, composite::over(existing, premul));
                }
            }
            cursor_x += metrics.advance_width.ceil() as i32;
        }
        Some(out)
    }
}

impl Component for TextComponent {
    fn id(&self) -> &str {
        &self.id
    }

    fn region(&self) -> Rect {
        self.region
    }

    fn render(&self, target: &mut Pixmap, frame: &RenderFrame) -> LimelightResult<()> {
        let size = (self.size_px * frame.scale_y as f32).max(1.0);
        let rasterized: Vec<Pixmap> = self
            .text
            .lines()
            .filter_map(|line| self.rasterize_line(line, size))
            .collect();
        if rasterized.is_empty() {
            return Ok(());
        }

        let total_h: u32 = rasterized.iter().map(Pixmap::height).sum();
        let region = frame.region;
        let mut y = region.y + (region.height as i32 - total_h as i32) / 2;

        for line in &rasterized {
            let x = match self.align {
                TextAlign::Left => region.x,
                TextAlign::Center => region.x + (region.width as i32 - line.width() as i32) / 2,
                TextAlign::Right => region.x + region.width as i32 - line.width() as i32,
            };
            target.blit_over_clipped(line, x, y, region);
            y += line.height() as i32;
        }
        Ok(())
    }
}

/// Embedded video placeholder. The live frames are painted by the
/// compositor's pass-through path; this renders the poster (or black) when
/// no frame has arrived yet, which is also the degraded state after a media
/// failure.
pub struct VideoComponent {
    pub id: String,
    pub region: Rect,
    pub binding: MediaBinding,
    pub poster: Option<Arc<Pixmap>>,
}

impl VideoComponent {
    pub fn new(id: impl Into<String>, region: Rect, asset: AssetId) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            region,
            binding: MediaBinding {
                asset,
                looping: true,
                muted: false,
            },
            poster: None,
        })
    }
}

impl Component for VideoComponent {
    fn id(&self) -> &str {
        &self.id
    }

    fn region(&self) -> Rect {
        self.region
    }

    fn render(&self, target: &mut Pixmap, frame: &RenderFrame) -> LimelightResult<()> {
        match &self.poster {
            Some(poster) => {
                target.blit_scaled_over(poster, frame.region, frame.filter, 1.0);
            }
            None => {
                target.fill_rect_over(frame.region, [0, 0, 0, 255]);
            }
        }
        Ok(())
    }

    fn media(&self) -> Option<&MediaBinding> {
        Some(&self.binding)
    }
}
