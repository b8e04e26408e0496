use serde::Deserialize;
use tracing::warn;

use crate::error::{PreviewError, Result};
use crate::settings::DEFAULT_RESOLUTION;

/// Number of monitor slots always present in the selector list, so a
/// pipeline UI can target a display that is not plugged in yet.
const MONITOR_SLOTS: usize = 6;

/// Geometry of one physical display, as reported by an external topology
/// query. The core never talks to the windowing system to discover this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MonitorInfo {
    pub index: usize,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
}

impl MonitorInfo {
    pub fn label(&self) -> String {
        format!("Monitor {} ({}x{})", self.index, self.width, self.height)
    }
}

/// The set of known displays. Constructed from whatever topology source the
/// host provides; defaults to a single synthetic 1920x1080 display at the
/// origin when nothing is available.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct MonitorLayout {
    monitors: Vec<MonitorInfo>,
}

impl Default for MonitorLayout {
    fn default() -> Self {
        let (w, h) = DEFAULT_RESOLUTION;
        Self {
            monitors: vec![MonitorInfo {
                index: 0,
                width: w,
                height: h,
                x: 0,
                y: 0,
            }],
        }
    }
}

impl MonitorLayout {
    pub fn new(monitors: Vec<MonitorInfo>) -> Self {
        if monitors.is_empty() {
            return Self::default();
        }
        Self { monitors }
    }

    pub fn get(&self, index: usize) -> Option<MonitorInfo> {
        self.monitors.iter().find(|m| m.index == index).copied()
    }

    /// Geometry for `index`, falling back to the default display geometry
    /// (at the origin) for unknown indices.
    pub fn resolve(&self, index: usize) -> MonitorInfo {
        self.get(index).unwrap_or_else(|| {
            warn!(index, "unknown monitor index, using default geometry");
            let (w, h) = DEFAULT_RESOLUTION;
            MonitorInfo {
                index,
                width: w,
                height: h,
                x: 0,
                y: 0,
            }
        })
    }

    /// Selector strings of the form `"Monitor {i} ({w}x{h})"`, padded to six
    /// entries with unknown-resolution placeholders.
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.monitors.iter().map(MonitorInfo::label).collect();
        for i in labels.len()..MONITOR_SLOTS {
            labels.push(format!("Monitor {i} (unknown resolution)"));
        }
        labels
    }
}

/// Recover the monitor index from a selector. Accepts the label form
/// `"Monitor 2 (2560x1440)"` or a bare integer.
pub fn parse_monitor_selector(selector: &str) -> Result<usize> {
    let trimmed = selector.trim();
    if let Ok(idx) = trimmed.parse::<usize>() {
        return Ok(idx);
    }
    trimmed
        .strip_prefix("Monitor ")
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|tok| tok.trim_end_matches(':').parse::<usize>().ok())
        .ok_or_else(|| PreviewError::MonitorResolution(selector.to_string()))
}

/// Like [`parse_monitor_selector`] but recovers with index 0 on malformed
/// input instead of propagating.
pub fn monitor_index_or_default(selector: &str) -> usize {
    match parse_monitor_selector(selector) {
        Ok(idx) => idx,
        Err(_) => {
            warn!(selector, "malformed monitor selector, using monitor 0");
            0
        }
    }
}

/// Check that a display backend is reachable before attempting to open
/// windows. On Unix this means a running X11 or Wayland server.
pub fn backend_available() -> Result<()> {
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        let has_display = std::env::var_os("DISPLAY").is_some()
            || std::env::var_os("WAYLAND_DISPLAY").is_some();
        if !has_display {
            return Err(PreviewError::BackendUnavailable(
                "no DISPLAY or WAYLAND_DISPLAY in environment".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_pad_to_six_entries() {
        let layout = MonitorLayout::default();
        let labels = layout.labels();
        assert_eq!(labels.len(), 6);
        assert_eq!(labels[0], "Monitor 0 (1920x1080)");
        assert_eq!(labels[5], "Monitor 5 (unknown resolution)");
    }

    #[test]
    fn selector_round_trips_through_label() {
        let mon = MonitorInfo {
            index: 2,
            width: 2560,
            height: 1440,
            x: 1920,
            y: 0,
        };
        assert_eq!(parse_monitor_selector(&mon.label()).unwrap(), 2);
    }

    #[test]
    fn selector_accepts_bare_index_and_recovers_garbage() {
        assert_eq!(parse_monitor_selector("3").unwrap(), 3);
        assert_eq!(monitor_index_or_default("garbage"), 0);
        assert_eq!(monitor_index_or_default("Monitor 1: 1080x1920"), 1);
    }
}
