//! Camera capture
//!
//! This module provides the frame source abstraction and the native webcam
//! implementation behind it.

pub mod traits;
pub mod webcam;

pub use traits::{CameraInfo, CaptureHints, FourCc, Frame, FrameSource, Resolution};
pub use webcam::{list_cameras, WebcamSource};
