use crate::{
    composite::{self, WipeDir},
    ease::Ease,
    error::{LimelightError, LimelightResult},
    pixmap::Pixmap,
};

/// Visual style of a transition. The engine treats each kind as an opaque
/// function of two frames and a progress fraction; adding a kind means
/// adding one arm to [`blend`].
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransitionKind {
    /// Hard swap, never animated regardless of duration.
    Cut,
    Fade,
    Wipe { dir: WipeDir, soft_edge: f32 },
}

/// A requested transition: style, wall-clock duration, easing.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TransitionSpec {
    #[serde(flatten)]
    pub kind: TransitionKind,
    pub duration_millis: u64,
    #[serde(default)]
    pub ease: Ease,
}

impl TransitionSpec {
    pub fn cut() -> Self {
        Self {
            kind: TransitionKind::Cut,
            duration_millis: 0,
            ease: Ease::Linear,
        }
    }

    pub fn fade(duration_millis: u64) -> Self {
        Self {
            kind: TransitionKind::Fade,
            duration_millis,
            ease: Ease::default(),
        }
    }

    pub fn wipe(dir: WipeDir, duration_millis: u64) -> Self {
        Self {
            kind: TransitionKind::Wipe {
                dir,
                soft_edge: 0.0,
            },
            duration_millis,
            ease: Ease::default(),
        }
    }

    /// An immediate spec swaps frames without a clock or animation.
    pub fn is_immediate(&self) -> bool {
        self.duration_millis == 0 || matches!(self.kind, TransitionKind::Cut)
    }

    pub fn validate(&self) -> LimelightResult<()> {
        if let TransitionKind::Wipe { soft_edge, .. } = self.kind {
            if !soft_edge.is_finite() || !(0.0..=1.0).contains(&soft_edge) {
                return Err(LimelightError::validation(
                    "wipe soft_edge must be finite and within [0, 1]",
                ));
            }
        }
        Ok(())
    }
}

impl Default for TransitionSpec {
    fn default() -> Self {
        Self::fade(400)
    }
}

/// Blend `from` and `to` into `out` at eased progress `t` in [0, 1].
///
/// All three buffers must share the surface dimensions. `Cut` resolves to
/// whichever side `t` has reached, so even a mis-scheduled cut never shows
/// a blended frame.
pub fn blend(
    from: &Pixmap,
    to: &Pixmap,
    out: &mut Pixmap,
    kind: TransitionKind,
    t: f64,
) -> LimelightResult<()> {
    let t = t.clamp(0.0, 1.0) as f32;
    match kind {
        TransitionKind::Cut => {
            if t < 1.0 {
                out.copy_from(from)
            } else {
                out.copy_from(to)
            }
        }
        TransitionKind::Fade => {
            composite::crossfade_buffers(out.data_mut(), from.data(), to.data(), t)
        }
        TransitionKind::Wipe { dir, soft_edge } => {
            let (w, h) = (out.width(), out.height());
            composite::wipe_buffers(
                out.data_mut(),
                from.data(),
                to.data(),
                w,
                h,
                t,
                dir,
                soft_edge,
            )
        }
    }
}
