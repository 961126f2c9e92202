//! Camera session
//!
//! One camera's capture-to-disk pipeline: a frame source, the open segment,
//! the annotator and the rotation timer. Sessions move through
//! `Initializing -> Active -> {Stopped, Failed}` and never leave a terminal
//! state. Handles are released on every transition out of `Active`.

use crate::capture::traits::FrameSource;
use crate::config::{CameraConfig, RecorderConfig};
use crate::recorder::annotate::{overlay_timestamp, Annotator};
use crate::recorder::backend::{Clock, MediaBackend};
use crate::recorder::writer::{unique_segment_path, SegmentWriter};
use crate::utils::error::{FailureKind, RecorderError, RecorderResult};
use ab_glyph::FontArc;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Lifecycle of a camera session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Initializing,
    Active,
    Stopped,
    Failed(FailureKind),
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Stopped | SessionState::Failed(_))
    }
}

/// One output file written by a session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputSegment {
    pub path: PathBuf,
    pub started_at: DateTime<Local>,
    pub frames: u64,
}

/// Settings every session of a run shares
#[derive(Clone)]
pub struct SessionSettings {
    pub output_dir: PathBuf,
    pub container: String,
    /// `None` disables rotation
    pub rotation_interval: Option<Duration>,
    pub font: FontArc,
}

impl SessionSettings {
    pub fn from_config(config: &RecorderConfig, font: FontArc) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            container: config.container.clone(),
            rotation_interval: config.rotation.interval(),
            font,
        }
    }
}

/// Final account of a session, for the run summary
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub label: u32,
    pub device_index: u32,
    pub state: SessionState,
    pub error: Option<String>,
    pub segments: Vec<OutputSegment>,
}

impl SessionReport {
    pub fn total_frames(&self) -> u64 {
        self.segments.iter().map(|s| s.frames).sum()
    }

    pub fn rotations(&self) -> usize {
        self.segments.len().saturating_sub(1)
    }
}

pub struct CameraSession {
    config: CameraConfig,
    settings: SessionSettings,
    annotator: Annotator,
    source: Option<Box<dyn FrameSource>>,
    writer: Option<Box<dyn SegmentWriter>>,
    segment_start: Option<Instant>,
    segments: Vec<OutputSegment>,
    state: SessionState,
    error: Option<String>,
}

impl CameraSession {
    fn new(config: CameraConfig, settings: SessionSettings) -> Self {
        let annotator = Annotator::new(config.label, settings.font.clone());
        Self {
            config,
            settings,
            annotator,
            source: None,
            writer: None,
            segment_start: None,
            segments: Vec::new(),
            state: SessionState::Initializing,
            error: None,
        }
    }

    /// Open the camera and the first segment.
    ///
    /// Always returns a session: `Active` if both succeeded, otherwise
    /// `Failed` with anything partially acquired already released.
    pub fn start(
        config: CameraConfig,
        settings: SessionSettings,
        backend: &dyn MediaBackend,
        clock: &dyn Clock,
    ) -> Self {
        let mut session = Self::new(config, settings);
        match session.initialize(backend, clock) {
            Ok(()) => {
                session.state = SessionState::Active;
                if let Some(segment) = session.segments.last() {
                    tracing::info!(
                        "Recording started on Camera {}: {}",
                        session.config.label,
                        segment.path.display()
                    );
                }
            }
            Err(e) => session.fail(e),
        }
        session
    }

    fn initialize(&mut self, backend: &dyn MediaBackend, clock: &dyn Clock) -> RecorderResult<()> {
        let source = backend.open_source(&self.config, &self.config.hints())?;
        self.source = Some(source);
        self.open_segment(backend, clock)
    }

    /// Create a new segment named after the current time and make it current
    fn open_segment(&mut self, backend: &dyn MediaBackend, clock: &dyn Clock) -> RecorderResult<()> {
        let label = self.config.label;
        let (resolution, frame_rate) = match &self.source {
            Some(source) => (source.resolution(), source.frame_rate()),
            None => (self.config.resolution, self.config.frame_rate),
        };
        let now = clock.now();
        let path = unique_segment_path(
            &self.settings.output_dir,
            label,
            &self.settings.container,
            &now,
            |candidate: &Path| {
                self.segments.iter().any(|s| s.path == candidate)
                    || backend.segment_exists(candidate)
            },
        );
        let spec = self.config.segment_spec(resolution, frame_rate);
        let writer = backend.create_writer(label, &path, spec)?;

        self.writer = Some(writer);
        self.segment_start = Some(clock.instant());
        self.segments.push(OutputSegment {
            path,
            started_at: now,
            frames: 0,
        });
        Ok(())
    }

    /// Read, stamp and write one frame, then rotate if the segment is due.
    ///
    /// Does nothing unless the session is `Active`.
    pub fn tick(&mut self, backend: &dyn MediaBackend, clock: &dyn Clock) -> SessionState {
        if self.state != SessionState::Active {
            return self.state;
        }
        if let Err(e) = self.step(backend, clock) {
            self.fail(e);
        }
        self.state
    }

    fn step(&mut self, backend: &dyn MediaBackend, clock: &dyn Clock) -> RecorderResult<()> {
        let label = self.config.label;
        let source = self.source.as_mut().ok_or_else(|| RecorderError::FrameReadFailed {
            label,
            reason: "no open device".to_string(),
        })?;
        let mut frame = source.read()?;

        let now = clock.now();
        self.annotator.annotate(&mut frame, &overlay_timestamp(&now));

        let writer = self.writer.as_mut().ok_or_else(|| RecorderError::SegmentWriteFailed {
            label,
            reason: "no open segment".to_string(),
        })?;
        writer.append(&frame)?;
        let written = writer.frames_written();
        if let Some(segment) = self.segments.last_mut() {
            segment.frames = written;
        }

        if self.rotation_due(clock.instant()) {
            self.rotate(backend, clock)?;
        }
        Ok(())
    }

    /// Measured on the monotonic clock, so wall-clock jumps neither hold back
    /// nor force a rotation.
    fn rotation_due(&self, now: Instant) -> bool {
        let (Some(interval), Some(start)) = (self.settings.rotation_interval, self.segment_start)
        else {
            return false;
        };
        now.saturating_duration_since(start) >= interval
    }

    /// Finalize the current segment and open the next one
    fn rotate(&mut self, backend: &dyn MediaBackend, clock: &dyn Clock) -> RecorderResult<()> {
        self.close_writer();
        self.open_segment(backend, clock)?;
        if let Some(segment) = self.segments.last() {
            tracing::info!(
                "Started new clip for Camera {}: {}",
                self.config.label,
                segment.path.display()
            );
        }
        Ok(())
    }

    /// External stop. Only an `Active` (or still initializing) session moves.
    pub fn stop(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        tracing::info!("Stopping Camera {}...", self.config.label);
        self.release();
        self.state = SessionState::Stopped;
        tracing::info!("Saved recording from Camera {}.", self.config.label);
    }

    fn fail(&mut self, error: RecorderError) {
        let kind = error.kind();
        tracing::error!(
            "Camera {} failed ({}): {}",
            self.config.label,
            kind,
            error
        );
        self.release();
        self.error = Some(error.to_string());
        self.state = SessionState::Failed(kind);
    }

    fn close_writer(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let frames = writer.frames_written();
            if let Some(segment) = self.segments.last_mut() {
                segment.frames = frames;
            }
            if let Err(e) = writer.close() {
                tracing::warn!(
                    "Camera {}: failed to finalize {}: {}",
                    self.config.label,
                    writer.path().display(),
                    e
                );
            }
        }
    }

    /// Release the segment and the device. Idempotent.
    fn release(&mut self) {
        self.close_writer();
        if let Some(mut source) = self.source.take() {
            source.release();
        }
        self.segment_start = None;
    }

    pub fn label(&self) -> u32 {
        self.config.label
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn segments(&self) -> &[OutputSegment] {
        &self.segments
    }

    /// Whether device or file handles are still held
    pub fn holds_handles(&self) -> bool {
        self.source.is_some() || self.writer.is_some()
    }

    pub fn report(&self) -> SessionReport {
        SessionReport {
            label: self.config.label,
            device_index: self.config.device_index,
            state: self.state,
            error: self.error.clone(),
            segments: self.segments.clone(),
        }
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.release();
    }
}
