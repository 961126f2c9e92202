//! Recording pipeline
//!
//! This module implements the capture-to-disk pipeline:
//! - Annotator stamping label and time onto frames
//! - Segment writer for time-boxed output files
//! - CameraSession state machine per camera
//! - RecordingSupervisor driving all sessions from one loop

pub mod annotate;
pub mod backend;
pub mod control;
pub mod session;
pub mod supervisor;
pub mod writer;

pub use annotate::Annotator;
pub use backend::{Clock, MediaBackend, NativeBackend, SystemClock};
pub use control::ControlEvent;
pub use session::{CameraSession, OutputSegment, SessionReport, SessionSettings, SessionState};
pub use supervisor::{RecordingSupervisor, RunSummary};
pub use writer::{FfmpegSegmentWriter, SegmentSpec, SegmentWriter};
