//! JSON deck documents: the declarative input the CLI lowers into engine
//! slides, a media registry, and per-slide transition specs.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use kurbo::Rect;

use crate::{
    component::{
        Component, ImageComponent, MediaBinding, SolidComponent, TextAlign, TextComponent,
        VideoComponent,
    },
    composite::WipeDir,
    ease::Ease,
    error::{LimelightError, LimelightResult},
    media::{AssetId, MediaRegistry, TestPatternSource},
    pixmap::Pixmap,
    slide::Slide,
    transition::{TransitionKind, TransitionSpec},
};

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct DeckDoc {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub assets: BTreeMap<String, AssetDoc>,
    pub slides: Vec<SlideDoc>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssetDoc {
    /// Video file decoded through ffmpeg (requires the `media-ffmpeg`
    /// feature).
    Video { source: PathBuf },
    /// Built-in deterministic pattern, sized to the deck.
    TestPattern {
        #[serde(default = "default_fps")]
        fps: u32,
    },
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct SlideDoc {
    #[serde(default)]
    pub id: Option<String>,
    pub background: ComponentDoc,
    #[serde(default)]
    pub components: Vec<ComponentDoc>,
    #[serde(default)]
    pub transition: Option<TransitionDoc>,
    /// How long the slide stays up in `limelight run`.
    #[serde(default = "default_hold")]
    pub hold_millis: u64,
}

#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct RegionDoc {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl RegionDoc {
    fn to_rect(self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComponentDoc {
    Solid {
        #[serde(default)]
        id: Option<String>,
        color: [u8; 4],
        #[serde(default)]
        region: Option<RegionDoc>,
    },
    Image {
        #[serde(default)]
        id: Option<String>,
        source: PathBuf,
        region: RegionDoc,
        #[serde(default = "default_opacity")]
        opacity: f32,
    },
    Text {
        #[serde(default)]
        id: Option<String>,
        text: String,
        font: PathBuf,
        size_px: f32,
        color: [u8; 4],
        region: RegionDoc,
        #[serde(default = "default_align")]
        align: TextAlign,
    },
    Video {
        #[serde(default)]
        id: Option<String>,
        asset: String,
        #[serde(default)]
        region: Option<RegionDoc>,
        #[serde(default = "default_true")]
        looping: bool,
        #[serde(default)]
        muted: bool,
        #[serde(default)]
        poster: Option<PathBuf>,
    },
}

impl ComponentDoc {
    fn asset_key(&self) -> Option<&str> {
        match self {
            Self::Video { asset, .. } => Some(asset),
            _ => None,
        }
    }
}

/// Transition described loosely, with the aliases people actually type.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TransitionDoc {
    pub kind: String,
    #[serde(default = "default_duration")]
    pub duration_millis: u64,
    #[serde(default)]
    pub ease: Option<String>,
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub soft_edge: Option<f64>,
}

impl TransitionDoc {
    pub fn lower(&self) -> LimelightResult<TransitionSpec> {
        let kind = self.kind.trim().to_ascii_lowercase();
        if kind.is_empty() {
            return Err(LimelightError::validation("transition kind must be non-empty"));
        }

        let kind = match kind.as_str() {
            "cut" => TransitionKind::Cut,
            "fade" | "crossfade" => TransitionKind::Fade,
            "wipe" => {
                let dir = match self.dir.as_deref() {
                    None => WipeDir::LeftToRight,
                    Some(s) => match s.trim().to_ascii_lowercase().as_str() {
                        "left_to_right" | "lefttoright" | "ltr" => WipeDir::LeftToRight,
                        "right_to_left" | "righttoleft" | "rtl" => WipeDir::RightToLeft,
                        "top_to_bottom" | "toptobottom" | "ttb" => WipeDir::TopToBottom,
                        "bottom_to_top" | "bottomtotop" | "btt" => WipeDir::BottomToTop,
                        other => {
                            return Err(LimelightError::validation(format!(
                                "unknown wipe dir '{other}'"
                            )));
                        }
                    },
                };
                let soft_edge = match self.soft_edge {
                    None => 0.0,
                    Some(v) => {
                        let f = v as f32;
                        if !f.is_finite() {
                            return Err(LimelightError::validation(
                                "wipe soft_edge must be finite when set",
                            ));
                        }
                        f.clamp(0.0, 1.0)
                    }
                };
                TransitionKind::Wipe { dir, soft_edge }
            }
            other => {
                return Err(LimelightError::validation(format!(
                    "unknown transition kind '{other}'"
                )));
            }
        };

        let ease = match self.ease.as_deref() {
            None => Ease::default(),
            Some(s) => parse_ease(s)?,
        };

        Ok(TransitionSpec {
            kind,
            duration_millis: self.duration_millis,
            ease,
        })
    }
}

fn parse_ease(s: &str) -> LimelightResult<Ease> {
    match s.trim().to_ascii_lowercase().as_str() {
        "linear" => Ok(Ease::Linear),
        "in_quad" | "inquad" => Ok(Ease::InQuad),
        "out_quad" | "outquad" => Ok(Ease::OutQuad),
        "in_out_quad" | "inoutquad" => Ok(Ease::InOutQuad),
        "in_cubic" | "incubic" => Ok(Ease::InCubic),
        "out_cubic" | "outcubic" => Ok(Ease::OutCubic),
        "smooth_step" | "smoothstep" => Ok(Ease::SmoothStep),
        other => Err(LimelightError::validation(format!("unknown ease '{other}'"))),
    }
}

/// A deck ready to present: registry plus slides paired with their
/// transitions.
pub struct LoweredDeck {
    pub registry: Arc<MediaRegistry>,
    pub slides: Vec<DeckSlide>,
}

pub struct DeckSlide {
    pub slide: Slide,
    pub transition: TransitionSpec,
    pub hold_millis: u64,
}

impl DeckDoc {
    pub fn validate(&self) -> LimelightResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(LimelightError::validation(
                "deck width/height must be > 0",
            ));
        }
        if self.slides.is_empty() {
            return Err(LimelightError::validation("deck has no slides"));
        }

        for (i, slide) in self.slides.iter().enumerate() {
            for doc in std::iter::once(&slide.background).chain(slide.components.iter()) {
                if let Some(key) = doc.asset_key()
                    && !self.assets.contains_key(key)
                {
                    return Err(LimelightError::validation(format!(
                        "slide {i} references missing asset key '{key}'"
                    )));
                }
                if let ComponentDoc::Text { size_px, .. } = doc
                    && (!size_px.is_finite() || *size_px <= 0.0)
                {
                    return Err(LimelightError::validation(format!(
                        "slide {i} has a text component with invalid size_px"
                    )));
                }
            }
            if let Some(tr) = &slide.transition {
                tr.lower()?;
            }
        }
        Ok(())
    }

    /// Build the registry and slides. Relative asset paths resolve against
    /// `base_dir` (usually the deck file's directory).
    pub fn lower(&self, base_dir: &Path) -> LimelightResult<LoweredDeck> {
        self.validate()?;

        let registry = Arc::new(MediaRegistry::new());
        for (key, asset) in &self.assets {
            match asset {
                AssetDoc::TestPattern { fps } => {
                    let mut source = TestPatternSource::new(self.width, self.height);
                    source.fps = *fps;
                    registry.insert(AssetId::new(key.clone()), Arc::new(source));
                }
                AssetDoc::Video { source } => {
                    register_video(&registry, key, &resolve(base_dir, source))?;
                }
            }
        }

        let mut fonts: BTreeMap<PathBuf, Arc<fontdue::Font>> = BTreeMap::new();
        let mut slides = Vec::with_capacity(self.slides.len());
        for (i, doc) in self.slides.iter().enumerate() {
            let id = doc
                .id
                .clone()
                .unwrap_or_else(|| format!("slide-{i}"));
            let full = RegionDoc {
                x: 0.0,
                y: 0.0,
                width: f64::from(self.width),
                height: f64::from(self.height),
            };

            let background =
                self.lower_component(&doc.background, &id, 0, full, base_dir, &mut fonts)?;
            let mut slide = Slide::new(&id, self.width, self.height, background)?;
            for (j, c) in doc.components.iter().enumerate() {
                slide = slide
                    .with_component(self.lower_component(c, &id, j + 1, full, base_dir, &mut fonts)?);
            }

            let transition = match &doc.transition {
                Some(tr) => tr.lower()?,
                None => TransitionSpec::default(),
            };
            slides.push(DeckSlide {
                slide,
                transition,
                hold_millis: doc.hold_millis,
            });
        }

        Ok(LoweredDeck { registry, slides })
    }

    fn lower_component(
        &self,
        doc: &ComponentDoc,
        slide_id: &str,
        index: usize,
        full: RegionDoc,
        base_dir: &Path,
        fonts: &mut BTreeMap<PathBuf, Arc<fontdue::Font>>,
    ) -> LimelightResult<Arc<dyn Component>> {
        let default_id = |kind: &str| format!("{slide_id}/{kind}-{index}");
        let component: Arc<dyn Component> = match doc {
            ComponentDoc::Solid { id, color, region } => SolidComponent::new(
                id.clone().unwrap_or_else(|| default_id("solid")),
                region.unwrap_or(full).to_rect(),
                *color,
            ),
            ComponentDoc::Image {
                id,
                source,
                region,
                opacity,
            } => {
                let image = load_image(&resolve(base_dir, source))?;
                Arc::new(ImageComponent {
                    id: id.clone().unwrap_or_else(|| default_id("image")),
                    region: region.to_rect(),
                    image: Arc::new(image),
                    opacity: *opacity,
                })
            }
            ComponentDoc::Text {
                id,
                text,
                font,
                size_px,
                color,
                region,
                align,
            } => {
                let font = load_font(fonts, &resolve(base_dir, font))?;
                Arc::new(TextComponent {
                    id: id.clone().unwrap_or_else(|| default_id("text")),
                    region: region.to_rect(),
                    text: text.clone(),
                    font,
                    size_px: *size_px,
                    color: *color,
                    align: *align,
                })
            }
            ComponentDoc::Video {
                id,
                asset,
                region,
                looping,
                muted,
                poster,
            } => {
                let poster = match poster {
                    Some(p) => Some(Arc::new(load_image(&resolve(base_dir, p))?)),
                    None => None,
                };
                Arc::new(VideoComponent {
                    id: id.clone().unwrap_or_else(|| default_id("video")),
                    region: region.unwrap_or(full).to_rect(),
                    binding: MediaBinding {
                        asset: AssetId::new(asset.clone()),
                        looping: *looping,
                        muted: *muted,
                    },
                    poster,
                })
            }
        };
        Ok(component)
    }
}

#[cfg(feature = "media-ffmpeg")]
fn register_video(registry: &MediaRegistry, key: &str, path: &Path) -> LimelightResult<()> {
    registry.insert(
        AssetId::new(key),
        Arc::new(crate::media::FfmpegVideoSource::new(path)),
    );
    Ok(())
}

#[cfg(not(feature = "media-ffmpeg"))]
fn register_video(_registry: &MediaRegistry, key: &str, _path: &Path) -> LimelightResult<()> {
    Err(LimelightError::validation(format!(
        "asset '{key}' is a video file; rebuild with the 'media-ffmpeg' feature"
    )))
}

fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn load_image(path: &Path) -> LimelightResult<Pixmap> {
    let img = image::open(path)
        .map_err(|e| {
            LimelightError::validation(format!("load image '{}': {e}", path.display()))
        })?
        .to_rgba8();
    let (w, h) = img.dimensions();
    Pixmap::from_rgba8(w, h, img.as_raw())
}

fn load_font(
    fonts: &mut BTreeMap<PathBuf, Arc<fontdue::Font>>,
    path: &Path,
) -> LimelightResult<Arc<fontdue::Font>> {
    if let Some(font) = fonts.get(path) {
        return Ok(font.clone());
    }
    let bytes = std::fs::read(path)
        .map_err(|e| LimelightError::validation(format!("read font '{}': {e}", path.display())))?;
    let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
        .map_err(|e| LimelightError::validation(format!("parse font '{}': {e}", path.display())))?;
    let font = Arc::new(font);
    fonts.insert(path.to_path_buf(), font.clone());
    Ok(font)
}

fn default_fps() -> u32 {
    30
}

fn default_hold() -> u64 {
    3000
}

fn default_duration() -> u64 {
    400
}

fn default_opacity() -> f32 {
    1.0
}

fn default_align() -> TextAlign {
    TextAlign::Center
}

fn default_true() -> bool {
    true
}
