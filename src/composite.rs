//! Premultiplied-alpha pixel primitives shared by the compositor and the
//! transition blender. Integer math throughout; no float per-channel work.

use crate::error::{LimelightError, LimelightResult};

pub type PremulRgba8 = [u8; 4];

/// Source-over in premultiplied space.
pub fn over(dst: PremulRgba8, src: PremulRgba8) -> PremulRgba8 {
    if src[3] == 255 {
        return src;
    }
    let inv = 255u16 - u16::from(src[3]);
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = u16::from(src[i])
            .saturating_add(mul_div255(u16::from(dst[i]), inv))
            .min(255) as u8;
    }
    out
}

/// Linear mix of two premultiplied pixels; `t == 0` yields `a`, `t == 1`
/// yields `b`.
pub fn mix(a: PremulRgba8, b: PremulRgba8, t: f32) -> PremulRgba8 {
    let t = t.clamp(0.0, 1.0);
    let tb = ((t * 255.0).round() as i32).clamp(0, 255) as u16;
    let ta = 255u16 - tb;

    let mut out = [0u8; 4];
    for i in 0..4 {
        let av = mul_div255(u16::from(a[i]), ta);
        let bv = mul_div255(u16::from(b[i]), tb);
        out[i] = av.saturating_add(bv).min(255) as u8;
    }
    out
}

/// Whole-buffer crossfade: `out = mix(a, b, t)` per pixel.
pub fn crossfade_buffers(out: &mut [u8], a: &[u8], b: &[u8], t: f32) -> LimelightResult<()> {
    check_parallel(out.len(), a.len(), b.len())?;
    for ((o, pa), pb) in out
        .chunks_exact_mut(4)
        .zip(a.chunks_exact(4))
        .zip(b.chunks_exact(4))
    {
        let px = mix(
            [pa[0], pa[1], pa[2], pa[3]],
            [pb[0], pb[1], pb[2], pb[3]],
            t,
        );
        o.copy_from_slice(&px);
    }
    Ok(())
}

/// Whole-buffer source-over: composite `src` onto `dst` in place.
pub fn over_buffers(dst: &mut [u8], src: &[u8]) -> LimelightResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(LimelightError::validation(
            "over_buffers expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let px = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]]);
        d.copy_from_slice(&px);
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WipeDir {
    LeftToRight,
    RightToLeft,
    TopToBottom,
    BottomToTop,
}

/// Whole-buffer directional wipe from `a` to `b`. `soft_edge` widens the
/// reveal boundary as a fraction of the wipe axis; 0 is a hard edge.
pub fn wipe_buffers(
    out: &mut [u8],
    a: &[u8],
    b: &[u8],
    width: u32,
    height: u32,
    t: f32,
    dir: WipeDir,
    soft_edge: f32,
) -> LimelightResult<()> {
    check_parallel(out.len(), a.len(), b.len())?;
    if out.len() != (width as usize) * (height as usize) * 4 {
        return Err(LimelightError::validation(
            "wipe_buffers dimensions do not match buffer length",
        ));
    }

    let t = t.clamp(0.0, 1.0);
    let soft = soft_edge.clamp(0.0, 1.0);
    // The edge sweeps through [0, 1 + soft] so coverage reaches 1 at every
    // position even with a soft edge.
    let edge = t * (1.0 + soft);

    for y in 0..height {
        for x in 0..width {
            let along = match dir {
                WipeDir::LeftToRight => position_along(x, width),
                WipeDir::RightToLeft => 1.0 - position_along(x, width),
                WipeDir::TopToBottom => position_along(y, height),
                WipeDir::BottomToTop => 1.0 - position_along(y, height),
            };
            let coverage = if soft > 0.0 {
                ((edge - along) / soft).clamp(0.0, 1.0)
            } else if along <= edge {
                1.0
            } else {
                0.0
            };

            let i = ((y * width + x) * 4) as usize;
            let pa = [a[i], a[i + 1], a[i + 2], a[i + 3]];
            let pb = [b[i], b[i + 1], b[i + 2], b[i + 3]];
            let px = mix(pa, pb, coverage);
            out[i..i + 4].copy_from_slice(&px);
        }
    }
    Ok(())
}

/// Multiply a premultiplied pixel by a scalar opacity.
pub fn scale_opacity(px: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity >= 1.0 {
        return px;
    }
    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    [
        mul_div255(u16::from(px[0]), op).min(255) as u8,
        mul_div255(u16::from(px[1]), op).min(255) as u8,
        mul_div255(u16::from(px[2]), op).min(255) as u8,
        mul_div255(u16::from(px[3]), op).min(255) as u8,
    ]
}

pub fn premultiply(straight: [u8; 4]) -> PremulRgba8 {
    let a = u16::from(straight[3]);
    [
        mul_div255(u16::from(straight[0]), a).min(255) as u8,
        mul_div255(u16::from(straight[1]), a).min(255) as u8,
        mul_div255(u16::from(straight[2]), a).min(255) as u8,
        straight[3],
    ]
}

pub fn unpremultiply(premul: PremulRgba8) -> [u8; 4] {
    let a = premul[3];
    if a == 0 {
        return [0, 0, 0, 0];
    }
    let a32 = u32::from(a);
    [
        ((u32::from(premul[0]) * 255 + a32 / 2) / a32).min(255) as u8,
        ((u32::from(premul[1]) * 255 + a32 / 2) / a32).min(255) as u8,
        ((u32::from(premul[2]) * 255 + a32 / 2) / a32).min(255) as u8,
        a,
    ]
}

// Pixel-center position so progress 0 and 1 select whole frames exactly.
fn position_along(i: u32, extent: u32) -> f32 {
    (i as f32 + 0.5) / extent as f32
}

fn mul_div255(x: u16, y: u16) -> u16 {
    ((u32::from(x) * u32::from(y) + 127) / 255) as u16
}

fn check_parallel(out: usize, a: usize, b: usize) -> LimelightResult<()> {
    if out != a || out != b || !out.is_multiple_of(4) {
        return Err(LimelightError::validation(
            "blend expects three equal-length rgba8 buffers",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn over_opaque_src_replaces_dst() {
        assert_eq!(over([0, 0, 0, 255], [255, 0, 0, 255]), [255, 0, 0, 255]);
    }

    #[test]
    fn over_transparent_src_is_noop() {
        let dst = [10, 20, 30, 40];
        assert_eq!(over(dst, [0, 0, 0, 0]), dst);
    }

    #[test]
    fn mix_endpoints_are_exact() {
        let a = [10, 20, 30, 40];
        let b = [200, 210, 220, 230];
        assert_eq!(mix(a, b, 0.0), a);
        assert_eq!(mix(a, b, 1.0), b);
    }

    #[test]
    fn premultiply_round_trip() {
        let straight = [200, 100, 50, 128];
        let back = unpremultiply(premultiply(straight));
        for i in 0..3 {
            assert!((i32::from(back[i]) - i32::from(straight[i])).abs() <= 2);
        }
        assert_eq!(back[3], straight[3]);
    }

    #[test]
    fn wipe_endpoints_select_whole_frames() {
        let a = vec![255u8, 0, 0, 255, 255, 0, 0, 255];
        let b = vec![0u8, 255, 0, 255, 0, 255, 0, 255];
        let mut out = vec![0u8; 8];

        wipe_buffers(&mut out, &a, &b, 2, 1, 0.0, WipeDir::LeftToRight, 0.0).unwrap();
        assert_eq!(out, a);

        wipe_buffers(&mut out, &a, &b, 2, 1, 1.0, WipeDir::LeftToRight, 0.0).unwrap();
        assert_eq!(out, b);
    }

    #[test]
    fn wipe_half_way_splits_rows() {
        let a = vec![255u8, 0, 0, 255].repeat(3);
        let b = vec![0u8, 255, 0, 255].repeat(3);
        let mut out = vec![0u8; 12];
        wipe_buffers(&mut out, &a, &b, 1, 3, 0.5, WipeDir::TopToBottom, 0.0).unwrap();
        assert_eq!(&out[0..4], &b[0..4]);
        assert_eq!(&out[4..8], &b[4..8]);
        assert_eq!(&out[8..12], &a[8..12]);
    }

    #[test]
    fn mismatched_buffers_are_rejected() {
        let mut out = vec![0u8; 8];
        assert!(crossfade_buffers(&mut out, &[0; 8], &[0; 4], 0.5).is_err());
        assert!(over_buffers(&mut out, &[0; 4]).is_err());
    }
}
