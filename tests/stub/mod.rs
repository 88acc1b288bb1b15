//! In-process media stubs shared by the integration tests, so no test
//! needs ffmpeg or a display.

#![allow(dead_code)]

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use kurbo::Rect;
use limelight::{
    AssetId, FrameSink, LimelightResult, MediaPlayer, MediaRegistry, MediaSource, PlaybackConfig,
    Slide, VideoComponent,
};

/// Counters observing every player the registry hands out for one asset.
#[derive(Clone, Default)]
pub struct StubStats(Arc<Counters>);

#[derive(Default)]
struct Counters {
    opens: AtomicUsize,
    plays: AtomicUsize,
    stops: AtomicUsize,
}

impl StubStats {
    pub fn opens(&self) -> usize {
        self.0.opens.load(Ordering::SeqCst)
    }

    pub fn plays(&self) -> usize {
        self.0.plays.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.0.stops.load(Ordering::SeqCst)
    }
}

struct StubSource {
    stats: StubStats,
}

impl MediaSource for StubSource {
    fn open(&self, _cfg: &PlaybackConfig, _sink: FrameSink) -> LimelightResult<Box<dyn MediaPlayer>> {
        self.stats.0.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubPlayer {
            stats: self.stats.clone(),
        }))
    }
}

struct StubPlayer {
    stats: StubStats,
}

impl MediaPlayer for StubPlayer {
    fn play(&mut self) -> LimelightResult<()> {
        self.stats.0.plays.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&mut self) -> LimelightResult<()> {
        Ok(())
    }

    fn stop(&mut self) -> LimelightResult<()> {
        self.stats.0.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn seek(&mut self, _position: Duration) -> LimelightResult<()> {
        Ok(())
    }
}

pub fn register_stub(registry: &MediaRegistry, key: &str, stats: &StubStats) {
    registry.insert(
        AssetId::new(key),
        Arc::new(StubSource {
            stats: stats.clone(),
        }),
    );
}

/// A slide whose background is a video bound to `asset`.
pub fn video_slide(id: &str, w: u32, h: u32, asset: &str) -> Slide {
    let bg = VideoComponent::new(
        format!("{id}/bg-video"),
        Rect::new(0.0, 0.0, f64::from(w), f64::from(h)),
        AssetId::new(asset),
    );
    Slide::new(id, w, h, bg).unwrap()
}
