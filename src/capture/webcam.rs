//! Native webcam capture using nokhwa
//!
//! Opens a camera by index, applies the requested format as a hint and
//! decodes every frame to packed RGB24 for the annotator.

use crate::capture::traits::{CameraInfo, CaptureHints, FourCc, Frame, FrameSource, Resolution};
use crate::utils::error::{RecorderError, RecorderResult};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution as DeviceResolution,
};
use nokhwa::Camera;
use std::time::Duration;

/// Get list of available cameras
pub fn list_cameras() -> Vec<CameraInfo> {
    match nokhwa::query(ApiBackend::Auto) {
        Ok(cameras) => cameras
            .into_iter()
            .map(|info| {
                let index = match info.index() {
                    CameraIndex::Index(i) => i.to_string(),
                    CameraIndex::String(s) => s.to_string(),
                };
                CameraInfo {
                    index,
                    name: info.human_name(),
                    description: info.description().to_string(),
                }
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate cameras: {:?}", e);
            Vec::new()
        }
    }
}

/// Device frame format requested for a codec hint
pub fn frame_format_for(codec: FourCc) -> FrameFormat {
    match codec.as_str() {
        "MJPG" => FrameFormat::MJPEG,
        "YUYV" | "YUY2" => FrameFormat::YUYV,
        "NV12" => FrameFormat::NV12,
        "GRAY" | "Y800" => FrameFormat::GRAY,
        other => {
            tracing::warn!("No device format for codec {}, requesting MJPEG", other);
            FrameFormat::MJPEG
        }
    }
}

/// Camera opened through nokhwa
pub struct WebcamSource {
    label: u32,
    camera: Option<Camera>,
    resolution: Resolution,
    frame_rate: u32,
}

impl WebcamSource {
    /// Open device `device_index` and start streaming.
    ///
    /// Hints the device cannot honour are reported as warnings; the
    /// negotiated format is used from then on.
    pub fn open(
        label: u32,
        device_index: u32,
        hints: &CaptureHints,
        warmup: Duration,
    ) -> RecorderResult<Self> {
        let open_failed = |reason: String| RecorderError::DeviceOpenFailed {
            label,
            device_index,
            reason,
        };

        let requested_format = frame_format_for(hints.codec);
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new(
                DeviceResolution::new(hints.resolution.width, hints.resolution.height),
                requested_format,
                hints.frame_rate,
            ),
        ));

        let mut camera = Camera::new(CameraIndex::Index(device_index), requested)
            .map_err(|e| open_failed(e.to_string()))?;
        camera
            .open_stream()
            .map_err(|e| open_failed(e.to_string()))?;

        // Some UVC devices deliver garbage until exposure settles.
        if !warmup.is_zero() {
            std::thread::sleep(warmup);
        }

        let negotiated = camera.resolution();
        let resolution = Resolution::new(negotiated.width(), negotiated.height());
        let frame_rate = camera.frame_rate();
        let format = camera.frame_format();

        if resolution != hints.resolution {
            tracing::warn!(
                "Camera {} ignored resolution hint {}, using {}",
                label,
                hints.resolution,
                resolution
            );
        }
        if frame_rate != hints.frame_rate {
            tracing::warn!(
                "Camera {} ignored frame rate hint {}fps, using {}fps",
                label,
                hints.frame_rate,
                frame_rate
            );
        }
        if format != requested_format {
            tracing::warn!(
                "Camera {} ignored codec hint {}, delivering {:?}",
                label,
                hints.codec,
                format
            );
        }

        tracing::debug!(
            "Camera {} (device {}) streaming {} @ {}fps {:?}",
            label,
            device_index,
            resolution,
            frame_rate,
            format
        );

        Ok(Self {
            label,
            camera: Some(camera),
            resolution,
            frame_rate,
        })
    }
}

impl FrameSource for WebcamSource {
    fn read(&mut self) -> RecorderResult<Frame> {
        let label = self.label;
        let read_failed = |reason: String| RecorderError::FrameReadFailed { label, reason };

        let camera = self
            .camera
            .as_mut()
            .ok_or_else(|| read_failed("device released".to_string()))?;
        let buffer = camera.frame().map_err(|e| read_failed(e.to_string()))?;
        let image = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| read_failed(e.to_string()))?;
        let (width, height) = (image.width(), image.height());

        // nokhwa may link a different `image` release; rebuild from the raw buffer.
        Frame::from_raw(width, height, image.into_raw())
            .ok_or_else(|| read_failed(format!("decoder returned a short {width}x{height} frame")))
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    fn release(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(e) = camera.stop_stream() {
                tracing::warn!("Error stopping camera {} stream: {:?}", self.label, e);
            }
        }
    }
}

impl Drop for WebcamSource {
    fn drop(&mut self) {
        self.release();
    }
}
