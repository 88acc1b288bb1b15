use kurbo::Rect;

use crate::{
    composite,
    error::{LimelightError, LimelightResult},
};

/// Scaling filter used when a source image is stretched into a destination
/// rectangle. `Nearest` is the draft-quality path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ScaleFilter {
    Nearest,
    Bilinear,
}

/// Integer pixel rectangle in surface space. May extend past buffer bounds;
/// all drawing operations clip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Map a slide-space region onto a surface of the given pixel
    /// dimensions. Slides and surfaces may disagree on size; components are
    /// placed proportionally.
    pub fn from_slide_region(
        region: Rect,
        slide_w: u32,
        slide_h: u32,
        surf_w: u32,
        surf_h: u32,
    ) -> Self {
        let sx = if slide_w == 0 {
            1.0
        } else {
            f64::from(surf_w) / f64::from(slide_w)
        };
        let sy = if slide_h == 0 {
            1.0
        } else {
            f64::from(surf_h) / f64::from(slide_h)
        };

        let x0 = (region.x0 * sx).round();
        let y0 = (region.y0 * sy).round();
        let x1 = (region.x1 * sx).round();
        let y1 = (region.y1 * sy).round();

        Self {
            x: x0 as i32,
            y: y0 as i32,
            width: (x1 - x0).max(0.0) as u32,
            height: (y1 - y0).max(0.0) as u32,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    fn clipped_to(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let x0 = self.x.max(0) as u32;
        let y0 = self.y.max(0) as u32;
        let x1 = (self.x.saturating_add(self.width as i32)).clamp(0, width as i32) as u32;
        let y1 = (self.y.saturating_add(self.height as i32)).clamp(0, height as i32) as u32;
        if x0 >= x1.min(width) || y0 >= y1.min(height) {
            return None;
        }
        Some((x0, y0, x1.min(width), y1.min(height)))
    }
}

/// Owned premultiplied RGBA8 pixel buffer, row-major, tightly packed.
///
/// Allocation is fallible: a failed reserve maps to a `Resource` error so a
/// surface can refuse a request without partially mutating itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pixmap {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Pixmap {
    pub fn new(width: u32, height: u32) -> LimelightResult<Self> {
        if width == 0 || height == 0 {
            return Err(LimelightError::validation(
                "pixmap dimensions must be non-zero",
            ));
        }
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| LimelightError::resource("pixel buffer size overflows usize"))?;

        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|_| {
            LimelightError::resource(format!("pixel buffer allocation failed ({width}x{height})"))
        })?;
        data.resize(len, 0);

        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn from_rgba8(width: u32, height: u32, straight: &[u8]) -> LimelightResult<Self> {
        if straight.len() != (width as usize) * (height as usize) * 4 {
            return Err(LimelightError::validation(
                "rgba8 byte length does not match dimensions",
            ));
        }
        let mut out = Self::new(width, height)?;
        for (dst, src) in out.data.chunks_exact_mut(4).zip(straight.chunks_exact(4)) {
            let px = composite::premultiply([src[0], src[1], src[2], src[3]]);
            dst.copy_from_slice(&px);
        }
        Ok(out)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * self.width + x) * 4) as usize;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, px: [u8; 4]) {
        let i = ((y * self.width + x) * 4) as usize;
        self.data[i..i + 4].copy_from_slice(&px);
    }

    /// Reset every pixel to transparent black.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    pub fn fill(&mut self, premul: [u8; 4]) {
        for px in self.data.chunks_exact_mut(4) {
            px.copy_from_slice(&premul);
        }
    }

    /// Composite a premultiplied color over a clipped rectangle.
    pub fn fill_rect_over(&mut self, rect: PixelRect, premul: [u8; 4]) {
        let Some((x0, y0, x1, y1)) = rect.clipped_to(self.width, self.height) else {
            return;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                let dst = self.pixel(x, y);
                self.set_pixel(x, y, composite::over(dst, premul));
            }
        }
    }

    /// Replace this buffer's contents with `src`. Dimensions must match.
    pub fn copy_from(&mut self, src: &Pixmap) -> LimelightResult<()> {
        if self.width != src.width || self.height != src.height {
            return Err(LimelightError::validation(
                "copy_from requires matching pixmap dimensions",
            ));
        }
        self.data.copy_from_slice(&src.data);
        Ok(())
    }

    /// Composite `src` over this buffer at an offset, clipped.
    pub fn blit_over(&mut self, src: &Pixmap, x: i32, y: i32) {
        self.blit_over_clipped(src, x, y, PixelRect::full(self.width, self.height));
    }

    /// Composite `src` at an offset, additionally clipped to `clip`.
    pub fn blit_over_clipped(&mut self, src: &Pixmap, x: i32, y: i32, clip: PixelRect) {
        let rect = PixelRect::new(x, y, src.width, src.height);
        let Some((x0, y0, x1, y1)) = rect.clipped_to(self.width, self.height) else {
            return;
        };
        let Some((cx0, cy0, cx1, cy1)) = clip.clipped_to(self.width, self.height) else {
            return;
        };
        for dy in y0.max(cy0)..y1.min(cy1) {
            let sy = (dy as i32 - y) as u32;
            for dx in x0.max(cx0)..x1.min(cx1) {
                let sx = (dx as i32 - x) as u32;
                let s = src.pixel(sx, sy);
                if s == [0, 0, 0, 0] {
                    continue;
                }
                let d = self.pixel(dx, dy);
                self.set_pixel(dx, dy, composite::over(d, s));
            }
        }
    }

    /// Composite `src` scaled into `dest` at the given opacity, clipped to
    /// this buffer.
    pub fn blit_scaled_over(
        &mut self,
        src: &Pixmap,
        dest: PixelRect,
        filter: ScaleFilter,
        opacity: f32,
    ) {
        if dest.is_empty() || src.width == 0 || src.height == 0 || opacity <= 0.0 {
            return;
        }
        let Some((x0, y0, x1, y1)) = dest.clipped_to(self.width, self.height) else {
            return;
        };

        let unscaled = dest.width == src.width && dest.height == src.height;
        let sx = f64::from(src.width) / f64::from(dest.width);
        let sy = f64::from(src.height) / f64::from(dest.height);

        for dy in y0..y1 {
            let v = ((f64::from(dy as i32 - dest.y) + 0.5) * sy - 0.5).max(0.0);
            for dx in x0..x1 {
                let s = if unscaled {
                    src.pixel((dx as i32 - dest.x) as u32, (dy as i32 - dest.y) as u32)
                } else {
                    let u = ((f64::from(dx as i32 - dest.x) + 0.5) * sx - 0.5).max(0.0);
                    match filter {
                        ScaleFilter::Nearest => {
                            let px = (u.round() as u32).min(src.width - 1);
                            let py = (v.round() as u32).min(src.height - 1);
                            src.pixel(px, py)
                        }
                        ScaleFilter::Bilinear => sample_bilinear(src, u, v),
                    }
                };
                let s = composite::scale_opacity(s, opacity);
                if s == [0, 0, 0, 0] {
                    continue;
                }
                let d = self.pixel(dx, dy);
                self.set_pixel(dx, dy, composite::over(d, s));
            }
        }
    }

    /// Convert to straight-alpha RGBA8 for export.
    pub fn to_unpremultiplied(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data.len());
        for px in self.data.chunks_exact(4) {
            let straight = composite::unpremultiply([px[0], px[1], px[2], px[3]]);
            out.extend_from_slice(&straight);
        }
        out
    }
}

fn sample_bilinear(src: &Pixmap, u: f64, v: f64) -> [u8; 4] {
    let x0 = (u.floor() as u32).min(src.width - 1);
    let y0 = (v.floor() as u32).min(src.height - 1);
    let x1 = (x0 + 1).min(src.width - 1);
    let y1 = (y0 + 1).min(src.height - 1);
    let fx = (u - u.floor()).clamp(0.0, 1.0);
    let fy = (v - v.floor()).clamp(0.0, 1.0);

    let p00 = src.pixel(x0, y0);
    let p10 = src.pixel(x1, y0);
    let p01 = src.pixel(x0, y1);
    let p11 = src.pixel(x1, y1);

    let mut out = [0u8; 4];
    for (i, slot) in out.iter_mut().enumerate() {
        let top = f64::from(p00[i]) * (1.0 - fx) + f64::from(p10[i]) * fx;
        let bot = f64::from(p01[i]) * (1.0 - fx) + f64::from(p11[i]) * fx;
        *slot = (top * (1.0 - fy) + bot * fy).round().clamp(0.0, 255.0) as u8;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_zero_dimensions() {
        assert!(Pixmap::new(0, 4).is_err());
        assert!(Pixmap::new(4, 0).is_err());
    }

    #[test]
    fn fill_rect_clips_to_bounds() {
        let mut pm = Pixmap::new(4, 4).unwrap();
        pm.fill_rect_over(PixelRect::new(-2, -2, 4, 4), [255, 0, 0, 255]);
        assert_eq!(pm.pixel(0, 0), [255, 0, 0, 255]);
        assert_eq!(pm.pixel(1, 1), [255, 0, 0, 255]);
        assert_eq!(pm.pixel(2, 2), [0, 0, 0, 0]);
    }

    #[test]
    fn blit_over_respects_alpha() {
        let mut dst = Pixmap::new(2, 1).unwrap();
        dst.fill([0, 0, 255, 255]);
        let mut src = Pixmap::new(1, 1).unwrap();
        src.set_pixel(0, 0, [255, 0, 0, 255]);
        dst.blit_over(&src, 0, 0);
        assert_eq!(dst.pixel(0, 0), [255, 0, 0, 255]);
        assert_eq!(dst.pixel(1, 0), [0, 0, 255, 255]);
    }

    #[test]
    fn scaled_blit_covers_destination() {
        let mut src = Pixmap::new(2, 2).unwrap();
        src.fill([0, 255, 0, 255]);
        let mut dst = Pixmap::new(8, 8).unwrap();
        dst.blit_scaled_over(&src, PixelRect::full(8, 8), ScaleFilter::Nearest, 1.0);
        assert_eq!(dst.pixel(0, 0), [0, 255, 0, 255]);
        assert_eq!(dst.pixel(7, 7), [0, 255, 0, 255]);
    }

    #[test]
    fn slide_region_mapping_scales_proportionally() {
        let region = Rect::new(0.0, 0.0, 960.0, 540.0);
        let px = PixelRect::from_slide_region(region, 1920, 1080, 960, 540);
        assert_eq!(px, PixelRect::new(0, 0, 480, 270));
    }

    #[test]
    fn unpremultiply_round_trips_opaque() {
        let mut pm = Pixmap::new(1, 1).unwrap();
        pm.set_pixel(0, 0, [10, 20, 30, 255]);
        assert_eq!(pm.to_unpremultiplied(), vec![10, 20, 30, 255]);
    }
}
