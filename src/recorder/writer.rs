//! Segment writer
//!
//! One output video file per segment. Frames arrive as packed RGB24 and are
//! piped into an FFmpeg process that encodes them with the configured codec.

use crate::capture::traits::{FourCc, Frame, Resolution};
use crate::utils::error::{RecorderError, RecorderResult};
use chrono::{DateTime, TimeZone};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

/// Timestamp format used in segment filenames
pub const SEGMENT_TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Directory holding every segment of one camera
pub fn camera_dir(base: &Path, label: u32) -> PathBuf {
    base.join(format!("cam{label}"))
}

/// Create the directory a segment lives in. Succeeds if it already exists.
pub fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir),
        _ => Ok(()),
    }
}

/// `<base>/cam<label>/recording_cam<label>_<YYYY-MM-DD_HH-MM-SS>.<ext>`
pub fn segment_path<Tz: TimeZone>(
    base: &Path,
    label: u32,
    extension: &str,
    created_at: &DateTime<Tz>,
) -> PathBuf
where
    Tz::Offset: std::fmt::Display,
{
    camera_dir(base, label).join(format!(
        "recording_cam{}_{}.{}",
        label,
        created_at.format(SEGMENT_TIME_FORMAT),
        extension
    ))
}

/// First path for this segment that `taken` does not claim.
///
/// Wall-clock seconds repeat across DST fall-back and quick restarts, so a
/// clashing name gets a `_1`, `_2`, ... suffix instead of replacing a recording.
pub fn unique_segment_path<Tz, F>(
    base: &Path,
    label: u32,
    extension: &str,
    created_at: &DateTime<Tz>,
    taken: F,
) -> PathBuf
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
    F: Fn(&Path) -> bool,
{
    let path = segment_path(base, label, extension, created_at);
    if !taken(&path) {
        return path;
    }
    let stem = format!("recording_cam{}_{}", label, created_at.format(SEGMENT_TIME_FORMAT));
    let dir = camera_dir(base, label);
    (1u32..)
        .map(|n| dir.join(format!("{stem}_{n}.{extension}")))
        .find(|candidate| !taken(candidate))
        .unwrap_or(path)
}

/// Encoding parameters shared by every segment of a camera
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentSpec {
    pub codec: FourCc,
    pub frame_rate: u32,
    pub resolution: Resolution,
}

/// One open output file
pub trait SegmentWriter {
    /// Append one frame. Any error is terminal for the segment.
    fn append(&mut self, frame: &Frame) -> RecorderResult<()>;

    /// Flush and release the file. Safe to call repeatedly and with no frames written.
    fn close(&mut self) -> RecorderResult<()>;

    fn frames_written(&self) -> u64;

    fn path(&self) -> &Path;
}

/// FFmpeg video encoder arguments for a codec
pub fn encoder_args(codec: FourCc) -> Vec<String> {
    let args: &[&str] = match codec.as_str() {
        "MJPG" => &["-c:v", "mjpeg"],
        "XVID" => &["-c:v", "mpeg4", "-vtag", "xvid"],
        "DIVX" => &["-c:v", "mpeg4", "-vtag", "DIVX"],
        "H264" | "AVC1" | "X264" => &["-c:v", "libx264", "-pix_fmt", "yuv420p"],
        "MP4V" => &["-c:v", "mpeg4"],
        other => {
            return vec![
                "-c:v".to_string(),
                "mpeg4".to_string(),
                "-vtag".to_string(),
                other.to_string(),
            ]
        }
    };
    args.iter().map(|s| s.to_string()).collect()
}

/// Full FFmpeg command line for one segment
pub fn ffmpeg_args(spec: &SegmentSpec, output: &Path) -> Vec<String> {
    // Never overwrite: an existing file makes the encoder exit instead.
    let mut args = vec![
        "-n".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pixel_format".to_string(),
        "rgb24".to_string(),
        "-video_size".to_string(),
        spec.resolution.to_string(),
        "-framerate".to_string(),
        spec.frame_rate.to_string(),
        "-i".to_string(),
        "-".to_string(),
    ];
    args.extend(encoder_args(spec.codec));
    args.push(output.to_string_lossy().to_string());
    args
}

/// Check whether an `ffmpeg` binary can be run
pub fn ffmpeg_available() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Segment encoded by an FFmpeg child process
pub struct FfmpegSegmentWriter {
    label: u32,
    path: PathBuf,
    spec: SegmentSpec,
    process: Option<Child>,
    stdin: Option<ChildStdin>,
    frames_written: u64,
}

impl FfmpegSegmentWriter {
    /// Start an encoder writing to `path`. The parent directory is created on demand.
    pub fn create(label: u32, path: &Path, spec: SegmentSpec) -> RecorderResult<Self> {
        let mut command = Command::new("ffmpeg");
        command.args(ffmpeg_args(&spec, path));
        Self::spawn(label, path, spec, command)
    }

    /// Run `command` as the encoder; it receives raw frames on stdin
    fn spawn(label: u32, path: &Path, spec: SegmentSpec, mut command: Command) -> RecorderResult<Self> {
        let create_failed = |reason: String| RecorderError::SegmentCreateFailed {
            label,
            path: path.to_path_buf(),
            reason,
        };

        ensure_parent_dir(path).map_err(|e| create_failed(e.to_string()))?;

        let mut process = command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| create_failed(format!("failed to start encoder: {e}")))?;

        let stdin = match process.stdin.take() {
            Some(stdin) => stdin,
            None => {
                let _ = process.kill();
                let _ = process.wait();
                return Err(create_failed("failed to capture encoder stdin".to_string()));
            }
        };

        tracing::debug!(
            "Started segment encoder: {} @ {}fps, codec {}, output: {}",
            spec.resolution,
            spec.frame_rate,
            spec.codec,
            path.display()
        );

        Ok(Self {
            label,
            path: path.to_path_buf(),
            spec,
            process: Some(process),
            stdin: Some(stdin),
            frames_written: 0,
        })
    }
}

impl SegmentWriter for FfmpegSegmentWriter {
    fn append(&mut self, frame: &Frame) -> RecorderResult<()> {
        let label = self.label;
        let write_failed = |reason: String| RecorderError::SegmentWriteFailed { label, reason };

        if Resolution::of(frame) != self.spec.resolution {
            return Err(write_failed(format!(
                "frame is {} but segment expects {}",
                Resolution::of(frame),
                self.spec.resolution
            )));
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| write_failed("segment already closed".to_string()))?;
        stdin
            .write_all(frame.as_raw())
            .map_err(|e| write_failed(e.to_string()))?;
        self.frames_written += 1;
        Ok(())
    }

    fn close(&mut self) -> RecorderResult<()> {
        // Closing stdin signals EOF so the encoder can finalize the container.
        drop(self.stdin.take());

        let Some(process) = self.process.take() else {
            return Ok(());
        };
        let output = process.wait_with_output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if self.frames_written == 0 {
                tracing::debug!(
                    "FFmpeg exited with {} on empty segment {}: {}",
                    output.status,
                    self.path.display(),
                    stderr.trim()
                );
            } else {
                tracing::warn!(
                    "FFmpeg exited with {} for {}: {}",
                    output.status,
                    self.path.display(),
                    stderr.trim()
                );
            }
        }

        tracing::debug!(
            "Closed segment {} ({} frames)",
            self.path.display(),
            self.frames_written
        );
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames_written
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FfmpegSegmentWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("Failed to close segment {}: {}", self.path.display(), e);
        }
    }
}
