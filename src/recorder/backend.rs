//! Device and file seams
//!
//! Sessions never touch nokhwa or FFmpeg directly; they go through a
//! [`MediaBackend`] and read time from a [`Clock`], so the state machine runs
//! the same against real hardware and against scripted fakes.

use crate::capture::traits::{CaptureHints, FrameSource};
use crate::capture::webcam::WebcamSource;
use crate::config::CameraConfig;
use crate::recorder::writer::{FfmpegSegmentWriter, SegmentSpec, SegmentWriter};
use crate::utils::error::RecorderResult;
use chrono::{DateTime, Local};
use std::path::Path;
use std::time::{Duration, Instant};

/// Time source. `now` names files and stamps frames; `instant` times rotation
/// and never runs backwards.
pub trait Clock {
    fn now(&self) -> DateTime<Local>;

    fn instant(&self) -> Instant;
}

/// The real clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }
}

/// Opens frame sources and creates segment writers
pub trait MediaBackend {
    /// Acquire the camera once. No retries.
    fn open_source(
        &self,
        camera: &CameraConfig,
        hints: &CaptureHints,
    ) -> RecorderResult<Box<dyn FrameSource>>;

    fn create_writer(
        &self,
        label: u32,
        path: &Path,
        spec: SegmentSpec,
    ) -> RecorderResult<Box<dyn SegmentWriter>>;

    /// Whether a segment already occupies `path`
    fn segment_exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// nokhwa cameras feeding FFmpeg encoders
#[derive(Debug, Clone)]
pub struct NativeBackend {
    warmup: Duration,
}

impl NativeBackend {
    pub fn new(warmup: Duration) -> Self {
        Self { warmup }
    }
}

impl MediaBackend for NativeBackend {
    fn open_source(
        &self,
        camera: &CameraConfig,
        hints: &CaptureHints,
    ) -> RecorderResult<Box<dyn FrameSource>> {
        let source = WebcamSource::open(camera.label, camera.device_index, hints, self.warmup)?;
        Ok(Box::new(source))
    }

    fn create_writer(
        &self,
        label: u32,
        path: &Path,
        spec: SegmentSpec,
    ) -> RecorderResult<Box<dyn SegmentWriter>> {
        let writer = FfmpegSegmentWriter::create(label, path, spec)?;
        Ok(Box::new(writer))
    }
}
