//! Capture trait definitions
//!
//! Device-agnostic types shared by frame sources and the recorder.

use crate::utils::error::RecorderResult;
use serde::{Deserialize, Serialize};

/// Information about a camera/webcam
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraInfo {
    /// Device index as understood by the capture backend
    pub index: String,

    /// Device name
    pub name: String,

    /// Driver-provided description
    pub description: String,
}

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Dimensions of a frame
    pub fn of(frame: &Frame) -> Self {
        Self::new(frame.width(), frame.height())
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Four-character codec identifier (e.g. `MJPG`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FourCc([u8; 4]);

impl FourCc {
    pub const MJPG: FourCc = FourCc(*b"MJPG");

    pub fn as_str(&self) -> &str {
        // Construction only admits ASCII.
        std::str::from_utf8(&self.0).unwrap_or("????")
    }
}

impl std::str::FromStr for FourCc {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 4 || !bytes.iter().all(|b| b.is_ascii_graphic()) {
            return Err(format!("codec must be four ASCII characters, got {s:?}"));
        }
        let mut code = [0u8; 4];
        code.copy_from_slice(bytes);
        Ok(FourCc(code))
    }
}

impl TryFrom<String> for FourCc {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FourCc> for String {
    fn from(code: FourCc) -> Self {
        code.as_str().to_string()
    }
}

impl std::fmt::Display for FourCc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded camera frame, packed RGB24
pub type Frame = image::RgbImage;

/// Capture hints applied when a device is opened. Devices may ignore them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureHints {
    pub resolution: Resolution,
    pub frame_rate: u32,
    pub codec: FourCc,
}

/// One opened camera device
///
/// Native device handles are not `Send`, so sources live on the thread that
/// opened them.
pub trait FrameSource {
    /// Read the next decoded frame. Any error is terminal for the source.
    fn read(&mut self) -> RecorderResult<Frame>;

    /// Resolution actually negotiated with the device
    fn resolution(&self) -> Resolution;

    /// Frame rate actually negotiated with the device
    fn frame_rate(&self) -> u32;

    /// Release the device. Safe to call more than once.
    fn release(&mut self);
}
