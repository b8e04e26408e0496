use std::fs;

use preview_monitor::settings::{self, FitMode, FpsMode};
use preview_monitor::{
    invoke, ImageTensor, Invocation, MonitorInfo, MonitorLayout, PowerState, SessionRegistry,
    TensorData,
};
use tempfile::tempdir;

fn batch(n: usize, w: usize, h: usize) -> ImageTensor {
    let data: Vec<f32> = (0..n * h * w * 3).map(|i| (i % 256) as f32 / 255.0).collect();
    ImageTensor::new(vec![n, h, w, 3], TensorData::F32(data)).unwrap()
}

fn two_monitor_layout() -> MonitorLayout {
    MonitorLayout::new(vec![
        MonitorInfo {
            index: 0,
            width: 1920,
            height: 1080,
            x: 0,
            y: 0,
        },
        MonitorInfo {
            index: 1,
            width: 2560,
            height: 1440,
            x: 1920,
            y: 0,
        },
    ])
}

#[test]
fn invocation_always_returns_the_input_batch() {
    let registry = SessionRegistry::new(two_monitor_layout());
    let tensor = batch(3, 8, 6);

    let mut inv = Invocation::new(tensor.clone());
    inv.monitor = "Monitor 1 (2560x1440)".to_string();
    inv.power_state = PowerState::Off;
    let out = invoke(&registry, inv);
    assert_eq!(out, tensor);

    // Malformed everything still passes the batch through untouched.
    let mut inv = Invocation::new(tensor.clone());
    inv.monitor = "display?".to_string();
    inv.target_resolution = "not-a-size".to_string();
    inv.gamma = -1.0;
    let out = invoke(&registry, inv);
    assert_eq!(out, tensor);
}

#[test]
fn power_off_tears_down_rather_than_creates() {
    let registry = SessionRegistry::new(two_monitor_layout());
    let mut inv = Invocation::new(batch(1, 4, 4));
    inv.monitor = "1".to_string();
    inv.power_state = PowerState::Off;
    invoke(&registry, inv);
    assert!(registry.active_monitors().is_empty());
}

#[test]
fn settings_load_from_yaml_file() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("preview.yaml");
    fs::write(
        &path,
        r#"
fit-mode: fill
target-resolution: "2560x1440"
gamma: 2.2
fps-mode: 30fps
"#,
    )
    .unwrap();

    let s = settings::from_yaml_file(&path).unwrap();
    assert_eq!(s.fit_mode, FitMode::Fill);
    assert_eq!(s.target_resolution, (2560, 1440));
    assert!((s.gamma - 2.2).abs() < f32::EPSILON);
    assert_eq!(s.fps_mode, FpsMode::Fixed30);
    assert_eq!(s.gain, 1.0);
    s.validate().unwrap();
}

#[test]
fn layout_yaml_matches_selector_labels() {
    let yaml = r#"
- index: 0
  width: 1920
  height: 1080
- index: 1
  width: 2560
  height: 1440
  x: 1920
"#;
    let layout = MonitorLayout::new(serde_yaml::from_str(yaml).unwrap());
    let labels = layout.labels();
    assert_eq!(labels[0], "Monitor 0 (1920x1080)");
    assert_eq!(labels[1], "Monitor 1 (2560x1440)");
    assert_eq!(
        preview_monitor::monitor::monitor_index_or_default(&labels[1]),
        1
    );
}
