use std::{
    collections::HashMap,
    sync::{Arc, Mutex, mpsc},
    thread,
    time::Duration,
};

use crate::{
    component::MediaBinding,
    error::{LimelightError, LimelightResult},
    pixmap::Pixmap,
    signal::RepaintSignal,
};

/// Stable identifier of a playable media asset within the host-owned
/// registry.
#[derive(
    Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PlaybackConfig {
    pub looping: bool,
    pub muted: bool,
}

/// Write side of the per-player frame hand-off. Delivery stores the frame
/// and raises the coalesced repaint signal; it never renders.
#[derive(Clone)]
pub struct FrameSink {
    cell: Arc<Mutex<Option<Pixmap>>>,
    repaint: RepaintSignal,
}

impl FrameSink {
    pub fn deliver(&self, frame: Pixmap) {
        if let Ok(mut slot) = self.cell.lock() {
            *slot = Some(frame);
        }
        self.repaint.raise();
    }
}

/// Read side: the compositor borrows the latest frame under the lock while
/// blitting, so full frames are never cloned per paint.
#[derive(Clone)]
pub struct FrameCell {
    cell: Arc<Mutex<Option<Pixmap>>>,
}

impl FrameCell {
    pub fn with_latest<R>(&self, f: impl FnOnce(Option<&Pixmap>) -> R) -> R {
        match self.cell.lock() {
            Ok(slot) => f(slot.as_ref()),
            Err(_) => f(None),
        }
    }

    pub fn has_frame(&self) -> bool {
        self.cell.lock().map(|s| s.is_some()).unwrap_or(false)
    }
}

pub fn frame_channel(repaint: RepaintSignal) -> (FrameSink, FrameCell) {
    let cell = Arc::new(Mutex::new(None));
    (
        FrameSink {
            cell: cell.clone(),
            repaint,
        },
        FrameCell { cell },
    )
}

/// One opened playback session. Implementations own their decode/pacing
/// machinery (usually a thread) and push frames through the sink they were
/// opened with.
pub trait MediaPlayer: Send {
    fn play(&mut self) -> LimelightResult<()>;
    fn pause(&mut self) -> LimelightResult<()>;
    fn stop(&mut self) -> LimelightResult<()>;
    fn seek(&mut self, position: Duration) -> LimelightResult<()>;
}

/// A playable asset registered with the host's media registry.
pub trait MediaSource: Send + Sync {
    fn open(&self, cfg: &PlaybackConfig, sink: FrameSink) -> LimelightResult<Box<dyn MediaPlayer>>;
}

/// Host-owned asset registry. The engine only ever holds a shared handle;
/// there is no process-global media state.
#[derive(Default)]
pub struct MediaRegistry {
    sources: Mutex<HashMap<AssetId, Arc<dyn MediaSource>>>,
}

impl MediaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: AssetId, source: Arc<dyn MediaSource>) {
        if let Ok(mut sources) = self.sources.lock() {
            sources.insert(id, source);
        }
    }

    pub fn contains(&self, id: &AssetId) -> bool {
        self.sources
            .lock()
            .map(|s| s.contains_key(id))
            .unwrap_or(false)
    }

    pub fn open(
        &self,
        id: &AssetId,
        cfg: &PlaybackConfig,
        sink: FrameSink,
    ) -> LimelightResult<Box<dyn MediaPlayer>> {
        let source = {
            let sources = self
                .sources
                .lock()
                .map_err(|_| LimelightError::concurrency("media registry lock poisoned"))?;
            sources.get(id).cloned()
        };
        match source {
            Some(source) => source.open(cfg, sink),
            None => Err(LimelightError::validation(format!(
                "asset '{id}' is not registered"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
    Released,
}

/// Wraps one player and enforces the handle lifecycle: release happens at
/// most once, is a no-op afterwards, and drops the player (which tears down
/// its playback thread). The surface guarantees release is never called
/// while the handle still feeds an active transition.
pub struct MediaPlaybackHandle {
    asset: AssetId,
    slide: String,
    component: String,
    state: PlaybackState,
    player: Option<Box<dyn MediaPlayer>>,
    cell: FrameCell,
}

impl MediaPlaybackHandle {
    pub fn open(
        registry: &MediaRegistry,
        slide: &str,
        component: &str,
        binding: &MediaBinding,
        repaint: RepaintSignal,
    ) -> LimelightResult<Self> {
        let (sink, cell) = frame_channel(repaint);
        let cfg = PlaybackConfig {
            looping: binding.looping,
            muted: binding.muted,
        };
        let player = registry.open(&binding.asset, &cfg, sink).map_err(|e| {
            LimelightError::media(slide, component, binding.asset.as_str(), e.to_string())
        })?;
        Ok(Self {
            asset: binding.asset.clone(),
            slide: slide.to_string(),
            component: component.to_string(),
            state: PlaybackState::Stopped,
            player: Some(player),
            cell,
        })
    }

    pub fn asset(&self) -> &AssetId {
        &self.asset
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn frame_cell(&self) -> FrameCell {
        self.cell.clone()
    }

    pub fn play(&mut self) -> LimelightResult<()> {
        match self.state {
            PlaybackState::Released => Err(self.released_error("play")),
            PlaybackState::Playing => Ok(()),
            _ => {
                self.player_mut()?.play()?;
                self.state = PlaybackState::Playing;
                Ok(())
            }
        }
    }

    pub fn pause(&mut self) -> LimelightResult<()> {
        match self.state {
            PlaybackState::Released => Err(self.released_error("pause")),
            PlaybackState::Playing => {
                self.player_mut()?.pause()?;
                self.state = PlaybackState::Paused;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    pub fn stop(&mut self) -> LimelightResult<()> {
        match self.state {
            PlaybackState::Released => Err(self.released_error("stop")),
            PlaybackState::Stopped => Ok(()),
            _ => {
                self.player_mut()?.stop()?;
                self.state = PlaybackState::Stopped;
                Ok(())
            }
        }
    }

    pub fn seek(&mut self, position: Duration) -> LimelightResult<()> {
        match self.state {
            PlaybackState::Released => Err(self.released_error("seek")),
            _ => self.player_mut()?.seek(position),
        }
    }

    /// Stop playback and drop the player. Safe to call repeatedly; only the
    /// first call does anything.
    pub fn release(&mut self) {
        if self.state == PlaybackState::Released {
            return;
        }
        if let Some(mut player) = self.player.take() {
            if let Err(err) = player.stop() {
                tracing::warn!(asset = %self.asset, %err, "player stop during release failed");
            }
        }
        self.state = PlaybackState::Released;
    }

    fn player_mut(&mut self) -> LimelightResult<&mut Box<dyn MediaPlayer>> {
        let Self {
            player,
            slide,
            component,
            asset,
            ..
        } = self;
        player.as_mut().ok_or_else(|| {
            LimelightError::media(
                slide.as_str(),
                component.as_str(),
                asset.as_str(),
                "player is gone",
            )
        })
    }

    fn released_error(&self, op: &str) -> LimelightError {
        LimelightError::media(
            &self.slide,
            &self.component,
            self.asset.as_str(),
            format!("{op} on released handle"),
        )
    }
}

impl Drop for MediaPlaybackHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for MediaPlaybackHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaPlaybackHandle")
            .field("asset", &self.asset)
            .field("state", &self.state)
            .finish()
    }
}

enum PatternCtl {
    Play,
    Pause,
    Stop,
    Seek(Duration),
    Shutdown,
}

/// Deterministic in-process video source: one solid color per second from a
/// fixed palette, with a sweeping vertical bar so motion is visible. Used
/// by the demo deck and anything that needs live frames without external
/// decoders.
pub struct TestPatternSource {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub colors: Vec<[u8; 4]>,
}

impl TestPatternSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            fps: 30,
            colors: vec![
                [32, 48, 96, 255],
                [96, 32, 48, 255],
                [48, 96, 32, 255],
            ],
        }
    }
}

impl MediaSource for TestPatternSource {
    fn open(&self, cfg: &PlaybackConfig, sink: FrameSink) -> LimelightResult<Box<dyn MediaPlayer>> {
        if self.fps == 0 || self.colors.is_empty() {
            return Err(LimelightError::validation(
                "test pattern needs fps > 0 and at least one color",
            ));
        }
        let (tx, rx) = mpsc::channel();
        let pattern = PatternSpec {
            width: self.width,
            height: self.height,
            fps: self.fps,
            colors: self.colors.clone(),
            looping: cfg.looping,
        };
        let join = thread::Builder::new()
            .name("limelight-test-pattern".into())
            .spawn(move || pattern_thread(pattern, rx, sink))
            .map_err(|e| LimelightError::resource(format!("spawn pattern thread: {e}")))?;
        Ok(Box::new(ThreadedPlayer {
            tx,
            join: Some(join),
        }))
    }
}

struct PatternSpec {
    width: u32,
    height: u32,
    fps: u32,
    colors: Vec<[u8; 4]>,
    looping: bool,
}

fn pattern_frame(spec: &PatternSpec, frame: u64) -> Option<Pixmap> {
    let second = (frame / u64::from(spec.fps)) as usize;
    let color = if spec.looping {
        spec.colors[second % spec.colors.len()]
    } else {
        *spec.colors.get(second)?
    };
    let mut pm = Pixmap::new(spec.width, spec.height).ok()?;
    pm.fill(color);
    let bar_x = (frame % u64::from(spec.width.max(1))) as u32;
    for y in 0..pm.height() {
        pm.set_pixel(bar_x.min(pm.width() - 1), y, [255, 255, 255, 255]);
    }
    Some(pm)
}

fn pattern_thread(spec: PatternSpec, rx: mpsc::Receiver<PatternCtl>, sink: FrameSink) {
    let interval = Duration::from_secs_f64(1.0 / f64::from(spec.fps));
    let mut playing = false;
    let mut frame: u64 = 0;

    loop {
        let msg = if playing {
            match rx.recv_timeout(interval) {
                Ok(msg) => Some(msg),
                Err(mpsc::RecvTimeoutError::Timeout) => None,
                Err(mpsc::RecvTimeoutError::Disconnected) => return,
            }
        } else {
            match rx.recv() {
                Ok(msg) => Some(msg),
                Err(_) => return,
            }
        };

        match msg {
            Some(PatternCtl::Play) => playing = true,
            Some(PatternCtl::Pause) => playing = false,
            Some(PatternCtl::Stop) => {
                playing = false;
                frame = 0;
            }
            Some(PatternCtl::Seek(pos)) => {
                frame = (pos.as_secs_f64() * f64::from(spec.fps)) as u64;
            }
            Some(PatternCtl::Shutdown) => return,
            None => match pattern_frame(&spec, frame) {
                Some(pm) => {
                    sink.deliver(pm);
                    frame += 1;
                }
                // Non-looping pattern ran out; hold the last frame.
                None => playing = false,
            },
        }
    }
}

struct ThreadedPlayer {
    tx: mpsc::Sender<PatternCtl>,
    join: Option<thread::JoinHandle<()>>,
}

impl ThreadedPlayer {
    fn send(&self, ctl: PatternCtl) -> LimelightResult<()> {
        self.tx
            .send(ctl)
            .map_err(|_| LimelightError::concurrency("playback thread is gone"))
    }
}

impl MediaPlayer for ThreadedPlayer {
    fn play(&mut self) -> LimelightResult<()> {
        self.send(PatternCtl::Play)
    }

    fn pause(&mut self) -> LimelightResult<()> {
        self.send(PatternCtl::Pause)
    }

    fn stop(&mut self) -> LimelightResult<()> {
        self.send(PatternCtl::Stop)
    }

    fn seek(&mut self, position: Duration) -> LimelightResult<()> {
        self.send(PatternCtl::Seek(position))
    }
}

impl Drop for ThreadedPlayer {
    fn drop(&mut self) {
        let _ = self.tx.send(PatternCtl::Shutdown);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

#[cfg(feature = "media-ffmpeg")]
pub use self::ffmpeg::FfmpegVideoSource;

#[cfg(feature = "media-ffmpeg")]
mod ffmpeg {
    use std::{
        io::Read,
        path::{Path, PathBuf},
        process::{Child, Command, Stdio},
        sync::mpsc,
        thread,
        time::Duration,
    };

    use super::{FrameSink, MediaPlayer, MediaSource, PlaybackConfig};
    use crate::{
        error::{LimelightError, LimelightResult},
        pixmap::Pixmap,
    };

    /// Video file decoded through the `ffmpeg`/`ffprobe` CLI on PATH.
    /// Frames are streamed as raw RGBA and paced to the source frame rate
    /// on a playback thread.
    pub struct FfmpegVideoSource {
        path: PathBuf,
    }

    #[derive(Clone, Debug)]
    struct SourceInfo {
        width: u32,
        height: u32,
        fps: f64,
    }

    impl FfmpegVideoSource {
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self { path: path.into() }
        }
    }

    impl MediaSource for FfmpegVideoSource {
        fn open(
            &self,
            cfg: &PlaybackConfig,
            sink: FrameSink,
        ) -> LimelightResult<Box<dyn MediaPlayer>> {
            let info = probe(&self.path)?;
            let (tx, rx) = mpsc::channel();
            let path = self.path.clone();
            let looping = cfg.looping;
            let join = thread::Builder::new()
                .name("limelight-ffmpeg".into())
                .spawn(move || decode_thread(path, info, looping, rx, sink))
                .map_err(|e| LimelightError::resource(format!("spawn decode thread: {e}")))?;
            Ok(Box::new(FfmpegPlayer {
                tx,
                join: Some(join),
            }))
        }
    }

    fn probe(path: &Path) -> LimelightResult<SourceInfo> {
        #[derive(serde::Deserialize)]
        struct ProbeStream {
            codec_type: Option<String>,
            width: Option<u32>,
            height: Option<u32>,
            r_frame_rate: Option<String>,
        }
        #[derive(serde::Deserialize)]
        struct ProbeOut {
            streams: Vec<ProbeStream>,
        }

        let out = Command::new("ffprobe")
            .args(["-v", "error", "-print_format", "json", "-show_streams"])
            .arg(path)
            .output()
            .map_err(|e| LimelightError::validation(format!("failed to run ffprobe: {e}")))?;
        if !out.status.success() {
            return Err(LimelightError::validation(format!(
                "ffprobe failed for '{}': {}",
                path.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
            .map_err(|e| LimelightError::validation(format!("ffprobe json parse failed: {e}")))?;
        let stream = parsed
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
            .ok_or_else(|| LimelightError::validation("no video stream found"))?;

        let width = stream
            .width
            .ok_or_else(|| LimelightError::validation("missing video width from ffprobe"))?;
        let height = stream
            .height
            .ok_or_else(|| LimelightError::validation("missing video height from ffprobe"))?;
        let fps = stream
            .r_frame_rate
            .as_deref()
            .and_then(parse_ratio)
            .filter(|f| *f > 0.0)
            .ok_or_else(|| LimelightError::validation("invalid video r_frame_rate"))?;

        Ok(SourceInfo { width, height, fps })
    }

    fn parse_ratio(s: &str) -> Option<f64> {
        let mut parts = s.split('/');
        let num = parts.next()?.parse::<f64>().ok()?;
        let den = parts.next()?.parse::<f64>().ok()?;
        if den == 0.0 { None } else { Some(num / den) }
    }

    fn spawn_decoder(path: &Path, start_sec: f64) -> LimelightResult<Child> {
        Command::new("ffmpeg")
            .args(["-v", "error", "-ss", &format!("{start_sec:.6}")])
            .arg("-i")
            .arg(path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgba", "pipe:1"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| LimelightError::validation(format!("failed to run ffmpeg: {e}")))
    }

    enum FfmpegCtl {
        Play,
        Pause,
        Stop,
        Seek(Duration),
        Shutdown,
    }

    struct FfmpegPlayer {
        tx: mpsc::Sender<FfmpegCtl>,
        join: Option<thread::JoinHandle<()>>,
    }

    impl MediaPlayer for FfmpegPlayer {
        fn play(&mut self) -> LimelightResult<()> {
            self.send(FfmpegCtl::Play)
        }

        fn pause(&mut self) -> LimelightResult<()> {
            self.send(FfmpegCtl::Pause)
        }

        fn stop(&mut self) -> LimelightResult<()> {
            self.send(FfmpegCtl::Stop)
        }

        fn seek(&mut self, position: Duration) -> LimelightResult<()> {
            self.send(FfmpegCtl::Seek(position))
        }
    }

    impl FfmpegPlayer {
        fn send(&self, ctl: FfmpegCtl) -> LimelightResult<()> {
            self.tx
                .send(ctl)
                .map_err(|_| LimelightError::concurrency("decode thread is gone"))
        }
    }

    impl Drop for FfmpegPlayer {
        fn drop(&mut self) {
            let _ = self.tx.send(FfmpegCtl::Shutdown);
            if let Some(join) = self.join.take() {
                let _ = join.join();
            }
        }
    }

    fn decode_thread(
        path: PathBuf,
        info: SourceInfo,
        looping: bool,
        rx: mpsc::Receiver<FfmpegCtl>,
        sink: FrameSink,
    ) {
        let interval = Duration::from_secs_f64(1.0 / info.fps);
        let frame_len = (info.width as usize) * (info.height as usize) * 4;
        let mut child: Option<Child> = None;
        let mut buf = vec![0u8; frame_len];
        let mut playing = false;

        loop {
            let msg = if playing {
                match rx.recv_timeout(interval) {
                    Ok(msg) => Some(msg),
                    Err(mpsc::RecvTimeoutError::Timeout) => None,
                    Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }
            } else {
                match rx.recv() {
                    Ok(msg) => Some(msg),
                    Err(_) => break,
                }
            };

            match msg {
                Some(FfmpegCtl::Play) => playing = true,
                Some(FfmpegCtl::Pause) => playing = false,
                Some(FfmpegCtl::Stop) => {
                    playing = false;
                    kill(&mut child);
                }
                Some(FfmpegCtl::Seek(pos)) => {
                    kill(&mut child);
                    match spawn_decoder(&path, pos.as_secs_f64()) {
                        Ok(c) => child = Some(c),
                        Err(err) => tracing::warn!(%err, "ffmpeg seek respawn failed"),
                    }
                }
                Some(FfmpegCtl::Shutdown) => break,
                None => {
                    if child.is_none() {
                        match spawn_decoder(&path, 0.0) {
                            Ok(c) => child = Some(c),
                            Err(err) => {
                                tracing::warn!(%err, "ffmpeg spawn failed");
                                playing = false;
                                continue;
                            }
                        }
                    }
                    let exhausted = match read_frame(child.as_mut(), &mut buf) {
                        Ok(true) => {
                            match Pixmap::from_rgba8(info.width, info.height, &buf) {
                                Ok(pm) => sink.deliver(pm),
                                Err(err) => tracing::warn!(%err, "bad decoded frame"),
                            }
                            false
                        }
                        Ok(false) => true,
                        Err(err) => {
                            tracing::warn!(%err, "ffmpeg read failed");
                            true
                        }
                    };
                    if exhausted {
                        kill(&mut child);
                        if !looping {
                            playing = false;
                        }
                    }
                }
            }
        }
        kill(&mut child);
    }

    fn read_frame(child: Option<&mut Child>, buf: &mut [u8]) -> std::io::Result<bool> {
        let Some(child) = child else {
            return Ok(false);
        };
        let Some(stdout) = child.stdout.as_mut() else {
            return Ok(false);
        };
        match stdout.read_exact(buf) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn kill(child: &mut Option<Child>) {
        if let Some(mut c) = child.take() {
            let _ = c.kill();
            let _ = c.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::MediaBinding;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingPlayer {
        stops: Arc<AtomicUsize>,
    }

    impl MediaPlayer for RecordingPlayer {
        fn play(&mut self) -> LimelightResult<()> {
            Ok(())
        }
        fn pause(&mut self) -> LimelightResult<()> {
            Ok(())
        }
        fn stop(&mut self) -> LimelightResult<()> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn seek(&mut self, _position: Duration) -> LimelightResult<()> {
            Ok(())
        }
    }

    struct RecordingSource {
        opens: Arc<AtomicUsize>,
        stops: Arc<AtomicUsize>,
    }

    impl MediaSource for RecordingSource {
        fn open(
            &self,
            _cfg: &PlaybackConfig,
            _sink: FrameSink,
        ) -> LimelightResult<Box<dyn MediaPlayer>> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(RecordingPlayer {
                stops: self.stops.clone(),
            }))
        }
    }

    fn recording_registry() -> (MediaRegistry, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let opens = Arc::new(AtomicUsize::new(0));
        let stops = Arc::new(AtomicUsize::new(0));
        let registry = MediaRegistry::new();
        registry.insert(
            AssetId::new("v1"),
            Arc::new(RecordingSource {
                opens: opens.clone(),
                stops: stops.clone(),
            }),
        );
        (registry, opens, stops)
    }

    fn binding() -> MediaBinding {
        MediaBinding {
            asset: AssetId::new("v1"),
            looping: true,
            muted: false,
        }
    }

    #[test]
    fn unknown_asset_is_a_contextual_media_error() {
        let registry = MediaRegistry::new();
        let err = MediaPlaybackHandle::open(
            &registry,
            "slide-1",
            "bg-video",
            &binding(),
            RepaintSignal::new(),
        )
        .unwrap_err();
        assert!(err.is_media());
        assert!(err.to_string().contains("slide-1"));
        assert!(err.to_string().contains("bg-video"));
    }

    #[test]
    fn handle_state_machine_walk() {
        let (registry, opens, _) = recording_registry();
        let mut handle = MediaPlaybackHandle::open(
            &registry,
            "s",
            "c",
            &binding(),
            RepaintSignal::new(),
        )
        .unwrap();

        assert_eq!(handle.state(), PlaybackState::Stopped);
        handle.play().unwrap();
        assert_eq!(handle.state(), PlaybackState::Playing);
        handle.pause().unwrap();
        assert_eq!(handle.state(), PlaybackState::Paused);
        handle.play().unwrap();
        handle.stop().unwrap();
        assert_eq!(handle.state(), PlaybackState::Stopped);
        assert_eq!(opens.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn release_is_idempotent_and_stops_playback() {
        let (registry, _, stops) = recording_registry();
        let mut handle = MediaPlaybackHandle::open(
            &registry,
            "s",
            "c",
            &binding(),
            RepaintSignal::new(),
        )
        .unwrap();
        handle.play().unwrap();

        handle.release();
        handle.release();
        assert_eq!(handle.state(), PlaybackState::Released);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert!(handle.play().is_err());
    }

    #[test]
    fn drop_releases_once() {
        let (registry, _, stops) = recording_registry();
        {
            let mut handle = MediaPlaybackHandle::open(
                &registry,
                "s",
                "c",
                &binding(),
                RepaintSignal::new(),
            )
            .unwrap();
            handle.play().unwrap();
        }
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn frame_delivery_raises_coalesced_repaint() {
        let repaint = RepaintSignal::new();
        let (sink, cell) = frame_channel(repaint.clone());
        assert!(!cell.has_frame());

        sink.deliver(Pixmap::new(2, 2).unwrap());
        sink.deliver(Pixmap::new(2, 2).unwrap());
        assert!(cell.has_frame());
        assert!(repaint.take());
        assert!(!repaint.take());
    }

    #[test]
    fn pattern_frames_advance_and_terminate() {
        let spec = PatternSpec {
            width: 8,
            height: 4,
            fps: 2,
            colors: vec![[10, 0, 0, 255], [0, 10, 0, 255]],
            looping: false,
        };
        // Second 0 -> first color, second 1 -> second color, then exhausted.
        assert!(pattern_frame(&spec, 0).is_some());
        assert!(pattern_frame(&spec, 3).is_some());
        assert!(pattern_frame(&spec, 4).is_none());

        let looping = PatternSpec {
            looping: true,
            ..spec
        };
        assert!(pattern_frame(&looping, 400).is_some());
    }
}
