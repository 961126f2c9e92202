//! Scripted devices and a manual clock for exercising sessions and the
//! supervisor without hardware or FFmpeg.

use crate::capture::traits::{CaptureHints, Frame, FrameSource, Resolution};
use crate::config::CameraConfig;
use crate::recorder::annotate::load_font;
use crate::recorder::backend::{Clock, MediaBackend};
use crate::recorder::writer::{SegmentSpec, SegmentWriter};
use crate::utils::error::{RecorderError, RecorderResult};
use ab_glyph::FontArc;
use chrono::{DateTime, Local, TimeZone};
use image::Rgb;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub fn font() -> FontArc {
    load_font(None).unwrap()
}

pub fn camera(label: u32, device_index: u32) -> CameraConfig {
    CameraConfig {
        label,
        device_index,
        resolution: Resolution::new(64, 48),
        frame_rate: 30,
        codec: crate::capture::traits::FourCc::MJPG,
    }
}

#[derive(Debug)]
struct ClockState {
    wall: DateTime<Local>,
    elapsed: Duration,
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    base: Instant,
    state: Arc<Mutex<ClockState>>,
}

impl ManualClock {
    /// Starts at 2024-06-01 12:00:00 local time
    pub fn new() -> Self {
        let wall = Local
            .with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .earliest()
            .unwrap();
        Self {
            base: Instant::now(),
            state: Arc::new(Mutex::new(ClockState {
                wall,
                elapsed: Duration::ZERO,
            })),
        }
    }

    /// Let real time pass: both clocks move
    pub fn advance_secs(&self, secs: u64) {
        let mut state = self.state.lock();
        state.wall += chrono::Duration::seconds(secs as i64);
        state.elapsed += Duration::from_secs(secs);
    }

    /// Wall clock set forward, e.g. by NTP
    pub fn advance_wall_secs(&self, secs: i64) {
        self.state.lock().wall += chrono::Duration::seconds(secs);
    }

    /// Wall clock set back, e.g. at DST fall-back
    pub fn set_wall_back_secs(&self, secs: i64) {
        self.state.lock().wall -= chrono::Duration::seconds(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        self.state.lock().wall
    }

    fn instant(&self) -> Instant {
        self.base + self.state.lock().elapsed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriterEvent {
    Closed { frames: u64 },
}

#[derive(Default)]
struct Script {
    open_failures: HashSet<u32>,
    /// label -> frames delivered before end of stream
    eof_after: HashMap<u32, u64>,
    /// label -> zero-based writer creation that fails
    create_failures: HashMap<u32, usize>,
    /// label -> frames accepted per segment before writes fail
    write_failures: HashMap<u32, u64>,
    /// label -> frame rate the device reports instead of the requested one
    device_rates: HashMap<u32, u32>,
}

#[derive(Default)]
struct Log {
    frames_read: HashMap<u32, u64>,
    released_sources: HashSet<u32>,
    writers: HashMap<u32, Vec<PathBuf>>,
    specs: HashMap<PathBuf, SegmentSpec>,
    appended: HashMap<PathBuf, u64>,
    writer_events: HashMap<PathBuf, Vec<WriterEvent>>,
    open_writers: HashMap<u32, i64>,
}

/// Backend whose devices and files behave according to a script
#[derive(Clone, Default)]
pub struct FakeBackend {
    script: Arc<Mutex<Script>>,
    log: Arc<Mutex<Log>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_open(self, label: u32) -> Self {
        self.script.lock().open_failures.insert(label);
        self
    }

    pub fn frames_before_eof(self, label: u32, frames: u64) -> Self {
        self.script.lock().eof_after.insert(label, frames);
        self
    }

    pub fn fail_create(self, label: u32, nth: usize) -> Self {
        self.script.lock().create_failures.insert(label, nth);
        self
    }

    pub fn fail_write_after(self, label: u32, frames: u64) -> Self {
        self.script.lock().write_failures.insert(label, frames);
        self
    }

    pub fn device_rate(self, label: u32, frame_rate: u32) -> Self {
        self.script.lock().device_rates.insert(label, frame_rate);
        self
    }

    pub fn frames_read(&self, label: u32) -> u64 {
        self.log.lock().frames_read.get(&label).copied().unwrap_or(0)
    }

    pub fn source_released(&self, label: u32) -> bool {
        self.log.lock().released_sources.contains(&label)
    }

    pub fn writers(&self, label: u32) -> Vec<PathBuf> {
        self.log.lock().writers.get(&label).cloned().unwrap_or_default()
    }

    pub fn writer_spec(&self, path: &Path) -> Option<SegmentSpec> {
        self.log.lock().specs.get(path).copied()
    }

    pub fn frames_appended(&self, path: &Path) -> u64 {
        self.log.lock().appended.get(path).copied().unwrap_or(0)
    }

    pub fn writer_events(&self, path: &Path) -> Vec<WriterEvent> {
        self.log.lock().writer_events.get(path).cloned().unwrap_or_default()
    }

    pub fn open_writers(&self, label: u32) -> i64 {
        self.log.lock().open_writers.get(&label).copied().unwrap_or(0)
    }
}

impl MediaBackend for FakeBackend {
    fn open_source(
        &self,
        camera: &CameraConfig,
        hints: &CaptureHints,
    ) -> RecorderResult<Box<dyn FrameSource>> {
        let script = self.script.lock();
        if script.open_failures.contains(&camera.label) {
            return Err(RecorderError::DeviceOpenFailed {
                label: camera.label,
                device_index: camera.device_index,
                reason: "no such device".to_string(),
            });
        }
        Ok(Box::new(FakeSource {
            label: camera.label,
            resolution: hints.resolution,
            frame_rate: script
                .device_rates
                .get(&camera.label)
                .copied()
                .unwrap_or(hints.frame_rate),
            remaining: script.eof_after.get(&camera.label).copied(),
            released: false,
            log: self.log.clone(),
        }))
    }

    fn create_writer(
        &self,
        label: u32,
        path: &Path,
        spec: SegmentSpec,
    ) -> RecorderResult<Box<dyn SegmentWriter>> {
        let script = self.script.lock();
        let mut log = self.log.lock();
        let created = log.writers.get(&label).map(Vec::len).unwrap_or(0);
        if script.create_failures.get(&label) == Some(&created) {
            return Err(RecorderError::SegmentCreateFailed {
                label,
                path: path.to_path_buf(),
                reason: "disk unavailable".to_string(),
            });
        }
        log.writers.entry(label).or_default().push(path.to_path_buf());
        log.specs.insert(path.to_path_buf(), spec);
        *log.open_writers.entry(label).or_default() += 1;
        Ok(Box::new(FakeWriter {
            label,
            path: path.to_path_buf(),
            resolution: spec.resolution,
            accept: script.write_failures.get(&label).copied(),
            frames: 0,
            closed: false,
            log: self.log.clone(),
        }))
    }

    fn segment_exists(&self, path: &Path) -> bool {
        self.log.lock().specs.contains_key(path)
    }
}

struct FakeSource {
    label: u32,
    resolution: Resolution,
    frame_rate: u32,
    remaining: Option<u64>,
    released: bool,
    log: Arc<Mutex<Log>>,
}

impl FrameSource for FakeSource {
    fn read(&mut self) -> RecorderResult<Frame> {
        if self.released || self.remaining == Some(0) {
            return Err(RecorderError::FrameReadFailed {
                label: self.label,
                reason: "end of stream".to_string(),
            });
        }
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        *self.log.lock().frames_read.entry(self.label).or_default() += 1;
        Ok(Frame::from_pixel(
            self.resolution.width,
            self.resolution.height,
            Rgb([40, 40, 40]),
        ))
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.log.lock().released_sources.insert(self.label);
        }
    }
}

struct FakeWriter {
    label: u32,
    path: PathBuf,
    resolution: Resolution,
    accept: Option<u64>,
    frames: u64,
    closed: bool,
    log: Arc<Mutex<Log>>,
}

impl SegmentWriter for FakeWriter {
    fn append(&mut self, frame: &Frame) -> RecorderResult<()> {
        let refused = self.closed
            || Resolution::of(frame) != self.resolution
            || self.accept.is_some_and(|limit| self.frames >= limit);
        if refused {
            return Err(RecorderError::SegmentWriteFailed {
                label: self.label,
                reason: "device full".to_string(),
            });
        }
        self.frames += 1;
        *self.log.lock().appended.entry(self.path.clone()).or_default() += 1;
        Ok(())
    }

    fn close(&mut self) -> RecorderResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let mut log = self.log.lock();
        log.writer_events
            .entry(self.path.clone())
            .or_default()
            .push(WriterEvent::Closed {
                frames: self.frames,
            });
        *log.open_writers.entry(self.label).or_default() -= 1;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames
    }

    fn path(&self) -> &Path {
        &self.path
    }
}
