//! Stop control
//!
//! Stop requests reach the capture loop as [`ControlEvent`]s over an mpsc
//! channel. Interactive runs read commands from stdin; every run turns
//! Ctrl-C and SIGTERM into a global stop.

use tokio::sync::mpsc::UnboundedSender;

/// A stop request for the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// Stop one camera
    Stop(u32),
    /// Stop the lowest-labelled camera still recording
    StopNext,
    /// Stop every camera and end the run
    StopAll,
}

/// Parse one line of interactive input.
///
/// `q` stops the next camera, a number stops that camera, `all` stops
/// everything. Anything else is ignored.
pub fn parse_command(line: &str) -> Option<ControlEvent> {
    let line = line.trim();
    match line.to_ascii_lowercase().as_str() {
        "q" => Some(ControlEvent::StopNext),
        "all" | "quit" | "exit" => Some(ControlEvent::StopAll),
        other => other.parse().ok().map(ControlEvent::Stop),
    }
}

/// Read stop commands from stdin on a detached thread.
///
/// A plain thread is used so a pending read never holds up process exit.
pub fn spawn_stdin_reader(tx: UnboundedSender<ControlEvent>) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("camrec-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lines() {
                let Ok(line) = line else { break };
                match parse_command(&line) {
                    Some(event) => {
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    None if !line.trim().is_empty() => {
                        tracing::warn!("Unknown command {:?} (use q, a camera label, or all)", line.trim());
                    }
                    None => {}
                }
            }
            tracing::debug!("stdin closed, interactive control ended");
        })?;
    Ok(())
}

/// Turn Ctrl-C (and SIGTERM on unix) into a global stop
pub async fn forward_shutdown_signals(tx: UnboundedSender<ControlEvent>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("Cannot listen for SIGTERM: {}", e);
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Interrupt received, stopping all cameras");
                    let _ = tx.send(ControlEvent::StopAll);
                }
                return;
            }
        };
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                if res.is_err() {
                    return;
                }
                tracing::info!("Interrupt received, stopping all cameras");
            }
            _ = terminate.recv() => {
                tracing::info!("Termination requested, stopping all cameras");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::info!("Interrupt received, stopping all cameras");
    }

    let _ = tx.send(ControlEvent::StopAll);
}
