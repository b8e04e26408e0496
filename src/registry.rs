use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver};
use tracing::{info, warn};

use crate::error::{PreviewError, Result};
use crate::monitor::MonitorLayout;
use crate::normalize::CanonicalImage;
use crate::session::{lock_session, run_session, SessionState, SharedSession};
use crate::settings::{DisplayMode, DisplaySettings, PowerState, SubmitMode};

/// Bounded wait for a stopping render thread. A timeout is tolerated: the
/// entry is removed regardless and the OS reclaims the thread at exit.
const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_millis(500);
/// Bounded wait for the render thread to report its window came up.
const INIT_TIMEOUT: Duration = Duration::from_secs(3);

/// One invocation's worth of content and policy for a monitor.
#[derive(Debug)]
pub struct SessionUpdate {
    pub monitor_index: usize,
    pub images: Vec<CanonicalImage>,
    pub compare_images: Vec<CanonicalImage>,
    pub settings: DisplaySettings,
    pub display_mode: DisplayMode,
    pub submit_mode: SubmitMode,
    pub power_state: PowerState,
}

struct SessionHandle {
    shared: SharedSession,
    thread: JoinHandle<()>,
    done_rx: Receiver<()>,
}

impl SessionHandle {
    fn is_live(&self) -> bool {
        !self.thread.is_finished()
    }
}

/// Process-wide table of monitor sessions.
///
/// Two lock tiers: this registry's own mutex guards table membership;
/// each session's mutex guards that session's fields. The registry lock is
/// never held while waiting on a session's render work, only across
/// microsecond-scale field updates and bounded joins during teardown.
pub struct SessionRegistry {
    layout: MonitorLayout,
    single_active: bool,
    join_timeout: Duration,
    sessions: Mutex<HashMap<usize, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new(layout: MonitorLayout) -> Self {
        Self::with_policy(layout, true, DEFAULT_JOIN_TIMEOUT)
    }

    /// `single_active` powers off any session on a different monitor before
    /// creating a new one (one visible monitor at a time).
    pub fn with_policy(layout: MonitorLayout, single_active: bool, join_timeout: Duration) -> Self {
        Self {
            layout,
            single_active,
            join_timeout,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn layout(&self) -> &MonitorLayout {
        &self.layout
    }

    /// Monitor indices with a registered (possibly already dead) session.
    pub fn active_monitors(&self) -> Vec<usize> {
        let sessions = self.lock_table();
        let mut indices: Vec<usize> = sessions.keys().copied().collect();
        indices.sort_unstable();
        indices
    }

    /// Create a session for the update's monitor or apply the update to the
    /// existing one; `power_state = Off` tears the session down instead.
    pub fn create_or_update(&self, update: SessionUpdate) -> Result<()> {
        let mut sessions = self.lock_table();
        let idx = update.monitor_index;

        if update.power_state == PowerState::Off {
            self.stop_entry(&mut sessions, idx);
            return Ok(());
        }

        if self.single_active {
            let others: Vec<usize> = sessions.keys().copied().filter(|&m| m != idx).collect();
            for other in others {
                info!(from = other, to = idx, "switching monitors, powering off previous");
                self.stop_entry(&mut sessions, other);
            }
        }

        // A session whose thread already exited is treated as absent.
        if sessions.get(&idx).is_some_and(|h| !h.is_live()) {
            warn!(monitor = idx, "discarding terminated session entry");
            sessions.remove(&idx);
        }

        if let Some(handle) = sessions.get(&idx) {
            let mut state = lock_session(&handle.shared);
            state.queue.submit(
                update.images,
                update.compare_images,
                update.display_mode,
                update.submit_mode,
            );
            if state.settings.target_resolution != update.settings.target_resolution {
                info!(
                    monitor = idx,
                    "target resolution change takes effect when the session is recreated"
                );
            }
            state.settings = update.settings;
            state.display_mode = update.display_mode;
            state.visible = true;
            return Ok(());
        }

        self.spawn_session(&mut sessions, update)
    }

    fn spawn_session(
        &self,
        sessions: &mut HashMap<usize, SessionHandle>,
        update: SessionUpdate,
    ) -> Result<()> {
        let idx = update.monitor_index;
        let monitor = self.layout.resolve(idx);
        let (res_w, res_h) = update.settings.target_resolution;
        let canvas_w = res_w.min(monitor.width).max(1);
        let canvas_h = res_h.min(monitor.height).max(1);

        let mut state = SessionState::new(update.settings, update.display_mode);
        state.queue.submit(
            update.images,
            update.compare_images,
            update.display_mode,
            update.submit_mode,
        );
        let shared: SharedSession = Arc::new(Mutex::new(state));

        let (init_tx, init_rx) = bounded(1);
        let (done_tx, done_rx) = bounded(1);
        let loop_shared = shared.clone();
        let thread = thread::Builder::new()
            .name(format!("preview-monitor-{idx}"))
            .spawn(move || run_session(monitor, canvas_w, canvas_h, loop_shared, init_tx, done_tx))
            .map_err(|e| PreviewError::SessionInit {
                monitor: idx,
                reason: e.to_string(),
            })?;

        match init_rx.recv_timeout(INIT_TIMEOUT) {
            Ok(Ok(())) => {
                sessions.insert(
                    idx,
                    SessionHandle {
                        shared,
                        thread,
                        done_rx,
                    },
                );
                info!(monitor = idx, "session created");
                Ok(())
            }
            Ok(Err(reason)) => {
                let _ = thread.join();
                Err(PreviewError::SessionInit {
                    monitor: idx,
                    reason,
                })
            }
            Err(_) => Err(PreviewError::SessionInit {
                monitor: idx,
                reason: "timed out waiting for window creation".to_string(),
            }),
        }
    }

    /// Stop every session with a bounded join and clear the table. Used at
    /// process shutdown.
    pub fn shutdown_all(&self) {
        let mut sessions = self.lock_table();
        if sessions.is_empty() {
            return;
        }
        info!(count = sessions.len(), "shutting down all sessions");
        let indices: Vec<usize> = sessions.keys().copied().collect();
        for idx in indices {
            self.stop_entry(&mut sessions, idx);
        }
    }

    /// PNG bytes for an entry on a monitor, read-consistent with that
    /// session's queue. Contract point for the external HTTP front-end.
    pub fn png_bytes(&self, monitor_index: usize, image_index: u64) -> Result<Vec<u8>> {
        let sessions = self.lock_table();
        let handle = sessions
            .get(&monitor_index)
            .ok_or_else(|| PreviewError::SessionInit {
                monitor: monitor_index,
                reason: "no active session".to_string(),
            })?;
        let state = lock_session(&handle.shared);
        state.queue.png_bytes(image_index)
    }

    fn stop_entry(&self, sessions: &mut HashMap<usize, SessionHandle>, idx: usize) {
        let Some(handle) = sessions.remove(&idx) else {
            return;
        };
        lock_session(&handle.shared).running = false;
        match handle.done_rx.recv_timeout(self.join_timeout) {
            Ok(()) => {
                let _ = handle.thread.join();
                info!(monitor = idx, "session stopped");
            }
            Err(_) => {
                // Cooperative stop missed the deadline; abandon the thread.
                warn!(
                    monitor = idx,
                    timeout_ms = self.join_timeout.as_millis() as u64,
                    "session did not stop in time, removing entry anyway"
                );
            }
        }
    }

    fn lock_table(&self) -> std::sync::MutexGuard<'_, HashMap<usize, SessionHandle>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        self.shutdown_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update_off(monitor_index: usize) -> SessionUpdate {
        SessionUpdate {
            monitor_index,
            images: vec![],
            compare_images: vec![],
            settings: DisplaySettings::default(),
            display_mode: DisplayMode::Single,
            submit_mode: SubmitMode::New,
            power_state: PowerState::Off,
        }
    }

    #[test]
    fn power_off_without_session_is_a_noop() {
        let registry = SessionRegistry::new(MonitorLayout::default());
        registry.create_or_update(update_off(0)).unwrap();
        assert!(registry.active_monitors().is_empty());
    }

    #[test]
    fn shutdown_all_on_empty_registry_is_quiet() {
        let registry = SessionRegistry::new(MonitorLayout::default());
        registry.shutdown_all();
        assert!(registry.active_monitors().is_empty());
    }

    #[test]
    fn png_bytes_without_session_reports_missing() {
        let registry = SessionRegistry::new(MonitorLayout::default());
        assert!(registry.png_bytes(0, 1).is_err());
    }
}
