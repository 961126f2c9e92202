//! Recording supervisor
//!
//! Owns every camera session, keyed by label, and drives them round-robin
//! from a single loop: each pass gives every active session exactly one
//! read and one write. Only the supervisor mutates the active set.

use crate::config::CameraConfig;
use crate::recorder::backend::{Clock, MediaBackend};
use crate::recorder::control::ControlEvent;
use crate::recorder::session::{CameraSession, SessionReport, SessionSettings, SessionState};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::UnboundedReceiver;

/// Outcome of a whole run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub iterations: u64,
    pub sessions: Vec<SessionReport>,
}

impl RunSummary {
    pub fn log(&self) {
        for report in &self.sessions {
            match (&report.state, &report.error) {
                (SessionState::Failed(kind), Some(error)) => tracing::info!(
                    "Camera {}: failed ({}) after {} frames in {} segment(s): {}",
                    report.label,
                    kind,
                    report.total_frames(),
                    report.segments.len(),
                    error
                ),
                _ => tracing::info!(
                    "Camera {}: {:?}, {} frames in {} segment(s)",
                    report.label,
                    report.state,
                    report.total_frames(),
                    report.segments.len()
                ),
            }
        }
        tracing::info!("All recordings finished. Exiting.");
    }
}

pub struct RecordingSupervisor<B, C> {
    backend: B,
    clock: C,
    settings: SessionSettings,
    sessions: BTreeMap<u32, CameraSession>,
    active: BTreeSet<u32>,
    iterations: u64,
}

impl<B: MediaBackend, C: Clock> RecordingSupervisor<B, C> {
    pub fn new(backend: B, clock: C, settings: SessionSettings) -> Self {
        Self {
            backend,
            clock,
            settings,
            sessions: BTreeMap::new(),
            active: BTreeSet::new(),
            iterations: 0,
        }
    }

    /// Open every configured camera. Cameras that fail stay in the
    /// session map for the summary but never join the active set.
    pub fn start(&mut self, cameras: &[CameraConfig]) {
        tracing::info!("Starting video recording from {} camera(s)", cameras.len());
        for camera in cameras {
            let label = camera.label;
            let session =
                CameraSession::start(camera.clone(), self.settings.clone(), &self.backend, &self.clock);
            if session.state() == SessionState::Active {
                self.active.insert(label);
            }
            self.sessions.insert(label, session);
        }
    }

    /// One pass over the active set. Returns how many sessions remain active.
    pub fn tick(&mut self) -> usize {
        let labels: Vec<u32> = self.active.iter().copied().collect();
        for label in labels {
            let Some(session) = self.sessions.get_mut(&label) else {
                self.active.remove(&label);
                continue;
            };
            if session.tick(&self.backend, &self.clock).is_terminal() {
                self.active.remove(&label);
            }
        }
        self.iterations += 1;
        self.active.len()
    }

    /// Stop one camera. Returns false if it was not recording.
    pub fn stop(&mut self, label: u32) -> bool {
        if !self.active.remove(&label) {
            tracing::warn!("Camera {} is not recording", label);
            return false;
        }
        if let Some(session) = self.sessions.get_mut(&label) {
            session.stop();
        }
        true
    }

    /// Stop the lowest-labelled active camera
    pub fn stop_next(&mut self) -> Option<u32> {
        let label = self.active.first().copied()?;
        self.stop(label);
        Some(label)
    }

    pub fn stop_all(&mut self) {
        let labels: Vec<u32> = self.active.iter().copied().collect();
        for label in labels {
            self.stop(label);
        }
    }

    pub fn handle(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::Stop(label) => {
                self.stop(label);
            }
            ControlEvent::StopNext => {
                if self.stop_next().is_none() {
                    tracing::warn!("No camera is recording");
                }
            }
            ControlEvent::StopAll => self.stop_all(),
        }
    }

    /// Apply every stop request already queued
    fn drain_controls(&mut self, controls: &mut UnboundedReceiver<ControlEvent>) {
        loop {
            match controls.try_recv() {
                Ok(event) => self.handle(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    /// Tick until no session is active, honouring stop requests between passes
    pub fn run(&mut self, controls: &mut UnboundedReceiver<ControlEvent>) -> RunSummary {
        loop {
            self.drain_controls(controls);
            if self.active.is_empty() {
                break;
            }
            self.tick();
        }
        self.finish()
    }

    /// Release anything still held and summarize the run
    pub fn finish(&mut self) -> RunSummary {
        self.stop_all();
        let summary = self.summary();
        summary.log();
        summary
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            iterations: self.iterations,
            sessions: self.sessions.values().map(CameraSession::report).collect(),
        }
    }

    pub fn active_labels(&self) -> Vec<u32> {
        self.active.iter().copied().collect()
    }

    pub fn session(&self, label: u32) -> Option<&CameraSession> {
        self.sessions.get(&label)
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }
}
