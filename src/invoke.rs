use std::sync::Once;

use tracing::warn;

use crate::error::Result;
use crate::monitor::{self, monitor_index_or_default};
use crate::normalize::normalize_batch;
use crate::registry::{SessionRegistry, SessionUpdate};
use crate::settings::{
    resolution_or_default, DisplayMode, DisplaySettings, FitMode, FpsMode, PowerState, SubmitMode,
};
use crate::tensor::ImageTensor;

/// One pipeline call's worth of inputs at the invocation boundary.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub images: ImageTensor,
    pub compare_images: Option<ImageTensor>,
    /// Monitor selector: a label like `"Monitor 1 (1920x1080)"` or a bare
    /// index. Malformed selectors resolve to monitor 0.
    pub monitor: String,
    pub power_state: PowerState,
    pub submit_mode: SubmitMode,
    /// Explicit display mode; when absent, comparison is inferred from the
    /// presence of `compare_images`.
    pub display_mode: Option<DisplayMode>,
    pub fit_mode: FitMode,
    /// `"WxH"`; malformed values fall back to 1920x1080.
    pub target_resolution: String,
    pub gain: f32,
    pub gamma: f32,
    pub saturation: f32,
    pub white_matte: bool,
    pub fps_mode: FpsMode,
}

impl Invocation {
    pub fn new(images: ImageTensor) -> Self {
        Self {
            images,
            compare_images: None,
            monitor: "Monitor 0 (1920x1080)".to_string(),
            power_state: PowerState::On,
            submit_mode: SubmitMode::New,
            display_mode: None,
            fit_mode: FitMode::Fit,
            target_resolution: "1920x1080".to_string(),
            gain: 1.0,
            gamma: 1.0,
            saturation: 1.0,
            white_matte: false,
            fps_mode: FpsMode::Smart,
        }
    }
}

/// Boundary function invoked once per pipeline run.
///
/// This is a side-effecting sink, not a transform: the input batch is
/// always handed back unchanged, and no failure mode inside the display
/// subsystem may surface to the calling pipeline. Everything degrades to
/// "display skipped, data passed through" with a log record.
pub fn invoke(registry: &SessionRegistry, invocation: Invocation) -> ImageTensor {
    let images = invocation.images.clone();
    if let Err(e) = run(registry, invocation) {
        warn!(error = %e, "preview display skipped");
    }
    images
}

fn run(registry: &SessionRegistry, invocation: Invocation) -> Result<()> {
    if !backend_ok() {
        return Ok(());
    }

    let monitor_index = monitor_index_or_default(&invocation.monitor);

    if invocation.power_state == PowerState::Off {
        // No normalization work for a power-off call.
        return registry.create_or_update(SessionUpdate {
            monitor_index,
            images: vec![],
            compare_images: vec![],
            settings: DisplaySettings::default(),
            display_mode: DisplayMode::Single,
            submit_mode: invocation.submit_mode,
            power_state: PowerState::Off,
        });
    }

    let settings = DisplaySettings {
        fit_mode: invocation.fit_mode,
        target_resolution: resolution_or_default(&invocation.target_resolution),
        gain: invocation.gain,
        gamma: invocation.gamma,
        saturation: invocation.saturation,
        white_matte: invocation.white_matte,
        fps_mode: invocation.fps_mode,
    };
    settings.validate()?;

    let images = normalize_batch(&invocation.images, &settings)?;
    let compare_images = match &invocation.compare_images {
        Some(tensor) => normalize_batch(tensor, &settings)?,
        None => vec![],
    };

    let display_mode = invocation.display_mode.unwrap_or(if compare_images.is_empty() {
        DisplayMode::Single
    } else {
        DisplayMode::Comparison
    });

    registry.create_or_update(SessionUpdate {
        monitor_index,
        images,
        compare_images,
        settings,
        display_mode,
        submit_mode: invocation.submit_mode,
        power_state: PowerState::On,
    })
}

/// Probe the display backend, logging its absence once per process.
fn backend_ok() -> bool {
    static WARN_ONCE: Once = Once::new();
    match monitor::backend_available() {
        Ok(()) => true,
        Err(e) => {
            WARN_ONCE.call_once(|| {
                warn!(error = %e, "display backend unavailable, preview disabled");
            });
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::MonitorLayout;
    use crate::tensor::TensorData;

    #[test]
    fn power_off_returns_input_unchanged() {
        let registry = SessionRegistry::new(MonitorLayout::default());
        let tensor = ImageTensor::new(vec![1, 1, 3], TensorData::U8(vec![1, 2, 3])).unwrap();
        let mut inv = Invocation::new(tensor.clone());
        inv.power_state = PowerState::Off;
        let out = invoke(&registry, inv);
        assert_eq!(out, tensor);
        assert!(registry.active_monitors().is_empty());
    }

    #[test]
    fn bad_shape_never_escapes_the_boundary() {
        let registry = SessionRegistry::new(MonitorLayout::default());
        // 4 channels: the normalizer rejects this, the boundary swallows it.
        let tensor = ImageTensor::new(vec![2, 2, 4], TensorData::U8(vec![0; 16])).unwrap();
        let out = invoke(&registry, Invocation::new(tensor.clone()));
        assert_eq!(out, tensor);
        assert!(registry.active_monitors().is_empty());
    }

    #[test]
    fn malformed_selectors_resolve_to_defaults() {
        let mut inv = Invocation::new(
            ImageTensor::new(vec![1, 1, 3], TensorData::U8(vec![0; 3])).unwrap(),
        );
        inv.monitor = "not a monitor".to_string();
        inv.target_resolution = "huge".to_string();
        inv.power_state = PowerState::Off;
        let registry = SessionRegistry::new(MonitorLayout::default());
        // Must not error or panic; Off on monitor 0 is a no-op.
        let _ = invoke(&registry, inv);
        assert!(registry.active_monitors().is_empty());
    }
}
