#![forbid(unsafe_code)]

// Component regions are kurbo rects; re-export so hosts don't need to pin
// the same kurbo version themselves.
pub use kurbo;

pub mod clock;
pub mod component;
pub mod composite;
pub mod compositor;
pub mod config;
pub mod deck;
pub mod ease;
pub mod error;
pub mod gate;
pub mod media;
pub mod pixmap;
pub mod signal;
pub mod slide;
pub mod surface;
pub mod transition;

pub use clock::TransitionClock;
pub use component::{
    Component, ImageComponent, MediaBinding, RenderFrame, SolidComponent, TextAlign,
    TextComponent, VideoComponent,
};
pub use composite::WipeDir;
pub use compositor::{BackgroundLayer, RenderGroup, SlideCompositor};
pub use config::{EngineConfig, RenderQuality};
pub use ease::Ease;
pub use error::{LimelightError, LimelightResult};
pub use gate::{PresentationRequest, SubmitOutcome, TransitionGate, WaitPolicy};
pub use media::{
    AssetId, FrameCell, FrameSink, MediaPlaybackHandle, MediaPlayer, MediaRegistry, MediaSource,
    PlaybackConfig, PlaybackState, TestPatternSource,
};
pub use pixmap::{PixelRect, Pixmap, ScaleFilter};
pub use signal::RepaintSignal;
pub use slide::Slide;
pub use surface::{DisplaySurface, Phase};
pub use transition::{TransitionKind, TransitionSpec};

#[cfg(feature = "media-ffmpeg")]
pub use media::FfmpegVideoSource;
