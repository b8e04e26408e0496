use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use minifb::{Key, KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};
use tracing::{debug, error, info, warn};

use crate::compose::{compose, to_argb_buffer, ComposeParams};
use crate::monitor::MonitorInfo;
use crate::normalize::CanonicalImage;
use crate::queue::ImageQueue;
use crate::settings::{DisplayMode, DisplaySettings};

pub const MIN_ZOOM: f32 = 0.1;
pub const MAX_ZOOM: f32 = 10.0;
pub const WHEEL_ZOOM_IN: f32 = 1.1;
pub const WHEEL_ZOOM_OUT: f32 = 0.9;
pub const KEY_ZOOM_IN: f32 = 1.2;
pub const KEY_ZOOM_OUT: f32 = 0.8;

/// Mouse-move processing interval while the loop keeps up with its target.
const MOUSE_INTERVAL_NORMAL: Duration = Duration::from_millis(16);
/// Widened interval once measured FPS falls below 70% of target.
const MOUSE_INTERVAL_DEGRADED: Duration = Duration::from_millis(33);
/// How long typed digits wait for more input before the jump commits.
const NUMBER_JUMP_TIMEOUT: Duration = Duration::from_secs(2);

/// Mutable state of one monitor session, guarded by the session mutex.
///
/// Writer discipline: the render thread owns the interactive fields (zoom,
/// pan, current entry, visibility via Escape); the invocation thread owns
/// the content fields (queue entries, settings, display mode). Both sides
/// take the lock only for the duration of a snapshot or a single mutation.
#[derive(Debug)]
pub struct SessionState {
    pub queue: ImageQueue,
    pub display_mode: DisplayMode,
    pub settings: DisplaySettings,
    pub zoom: f32,
    pub pan_x: f32,
    pub pan_y: f32,
    pub visible: bool,
    pub running: bool,
}

impl SessionState {
    pub fn new(settings: DisplaySettings, display_mode: DisplayMode) -> Self {
        Self {
            queue: ImageQueue::new(),
            display_mode,
            settings,
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
            visible: true,
            running: true,
        }
    }

    pub fn zoom_by(&mut self, factor: f32) {
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        self.pan_x += dx;
        self.pan_y += dy;
    }

    pub fn reset_view(&mut self) {
        self.zoom = 1.0;
        self.pan_x = 0.0;
        self.pan_y = 0.0;
    }

    pub fn toggle_comparison(&mut self) {
        self.display_mode = if self.display_mode == DisplayMode::Comparison {
            DisplayMode::Single
        } else {
            DisplayMode::Comparison
        };
    }

    pub fn toggle_slideshow(&mut self) {
        self.display_mode = if self.display_mode == DisplayMode::Slideshow {
            DisplayMode::Single
        } else {
            DisplayMode::Slideshow
        };
    }
}

pub type SharedSession = Arc<Mutex<SessionState>>;

/// Take the session lock, recovering the data from a poisoned mutex. A
/// panicking frame must not wedge the invocation thread.
pub(crate) fn lock_session(shared: &SharedSession) -> MutexGuard<'_, SessionState> {
    shared.lock().unwrap_or_else(|poison| poison.into_inner())
}

/// Immutable copy of everything one frame needs, taken under the lock and
/// released before any compositing work starts.
#[derive(Debug, Clone)]
pub(crate) struct FrameSnapshot {
    pub running: bool,
    pub visible: bool,
    pub primary: Option<Arc<CanonicalImage>>,
    pub secondary: Option<Arc<CanonicalImage>>,
    pub display_mode: DisplayMode,
    pub settings: DisplaySettings,
    pub zoom: f32,
    pub pan_x: f32,
    pub pan_y: f32,
    pub current_index: Option<u64>,
    pub position: (usize, usize),
}

pub(crate) fn snapshot(state: &SessionState) -> FrameSnapshot {
    let entry = state.queue.current_entry();
    FrameSnapshot {
        running: state.running,
        visible: state.visible,
        primary: entry.map(|(_, e)| e.primary.clone()),
        secondary: entry.and_then(|(_, e)| e.secondary.clone()),
        display_mode: state.display_mode,
        settings: state.settings.clone(),
        zoom: state.zoom,
        pan_x: state.pan_x,
        pan_y: state.pan_y,
        current_index: state.queue.current_index(),
        position: state.queue.position(),
    }
}

/// Everything that, when unchanged between frames, lets smart mode skip
/// recompositing. Pan/zoom are compared bit-exactly.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RenderStamp {
    image_hash: Option<u64>,
    compare_hash: Option<u64>,
    settings: DisplaySettings,
    display_mode: DisplayMode,
    current_index: Option<u64>,
    zoom_bits: u32,
    pan_x_bits: u32,
    pan_y_bits: u32,
    split_x: u32,
    visible: bool,
}

pub(crate) fn render_stamp(snap: &FrameSnapshot, split_x: u32) -> RenderStamp {
    RenderStamp {
        image_hash: snap.primary.as_ref().map(|i| i.content_hash()),
        compare_hash: snap.secondary.as_ref().map(|i| i.content_hash()),
        settings: snap.settings.clone(),
        display_mode: snap.display_mode,
        current_index: snap.current_index,
        zoom_bits: snap.zoom.to_bits(),
        pan_x_bits: snap.pan_x.to_bits(),
        pan_y_bits: snap.pan_y.to_bits(),
        // The split only matters while comparing; ignore it otherwise so
        // idle mouse motion does not defeat the smart mode.
        split_x: if snap.display_mode == DisplayMode::Comparison {
            split_x
        } else {
            0
        },
        visible: snap.visible,
    }
}

/// Redraw decision for one frame. Fixed-FPS modes always recomposite;
/// smart mode only when the stamp moved.
pub(crate) fn needs_redraw(
    snap: &FrameSnapshot,
    split_x: u32,
    last: Option<&RenderStamp>,
) -> (bool, RenderStamp) {
    let stamp = render_stamp(snap, split_x);
    if !snap.settings.fps_mode.is_smart() {
        return (true, stamp);
    }
    let changed = last != Some(&stamp);
    (changed, stamp)
}

/// Rolling frames-per-second measurement, sampled once per second.
pub(crate) struct FpsTracker {
    frames: u32,
    window_start: Instant,
}

impl FpsTracker {
    pub fn new() -> Self {
        Self {
            frames: 0,
            window_start: Instant::now(),
        }
    }

    /// Count one frame; returns the measured FPS when a full second of
    /// samples has accumulated.
    pub fn tick(&mut self) -> Option<f32> {
        self.frames += 1;
        let elapsed = self.window_start.elapsed();
        if elapsed < Duration::from_secs(1) {
            return None;
        }
        let fps = self.frames as f32 / elapsed.as_secs_f32();
        self.frames = 0;
        self.window_start = Instant::now();
        Some(fps)
    }
}

/// Widen or narrow the mouse-move interval based on measured FPS.
pub(crate) fn adapt_mouse_interval(
    current: Duration,
    actual_fps: f32,
    target_fps: u32,
) -> Duration {
    let target = target_fps as f32;
    if actual_fps < target * 0.7 {
        MOUSE_INTERVAL_DEGRADED
    } else if actual_fps > target * 0.9 {
        MOUSE_INTERVAL_NORMAL
    } else {
        current
    }
}

/// Accumulates typed digits for a direct index jump; commits on Enter or
/// after a short idle timeout.
#[derive(Debug, Default)]
pub(crate) struct NumberJump {
    digits: String,
    deadline: Option<Instant>,
}

impl NumberJump {
    pub fn push_digit(&mut self, digit: char) {
        self.digits.push(digit);
        self.deadline = Some(Instant::now() + NUMBER_JUMP_TIMEOUT);
    }

    pub fn is_active(&self) -> bool {
        !self.digits.is_empty()
    }

    pub fn cancel(&mut self) {
        self.digits.clear();
        self.deadline = None;
    }

    /// The pending target, consumed on commit.
    pub fn commit(&mut self) -> Option<u64> {
        let target = self.digits.parse().ok();
        self.cancel();
        target
    }

    /// Commit automatically once the idle timeout passed.
    pub fn poll_timeout(&mut self) -> Option<u64> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => self.commit(),
            _ => None,
        }
    }
}

pub(crate) fn window_title(monitor_index: usize, snap: &FrameSnapshot, split_x: u32) -> String {
    let mode = match snap.display_mode {
        DisplayMode::Single => "Single",
        DisplayMode::Comparison => "Comparison",
        DisplayMode::Slideshow => "Slideshow",
    };
    let mut title = format!("Preview Monitor {monitor_index} - {mode}");
    let (pos, total) = snap.position;
    if snap.display_mode == DisplayMode::Slideshow && total > 1 {
        title.push_str(&format!(" ({pos}/{total})"));
    }
    if snap.display_mode == DisplayMode::Comparison && snap.secondary.is_some() {
        title.push_str(&format!(" (Split: {split_x}px)"));
    }
    if snap.zoom != 1.0 {
        title.push_str(&format!(" - Zoom: {:.1}x", snap.zoom));
    }
    title.push_str(" - Press H for help");
    title
}

fn digit_for_key(key: Key) -> Option<char> {
    let c = match key {
        Key::Key0 | Key::NumPad0 => '0',
        Key::Key1 | Key::NumPad1 => '1',
        Key::Key2 | Key::NumPad2 => '2',
        Key::Key3 | Key::NumPad3 => '3',
        Key::Key4 | Key::NumPad4 => '4',
        Key::Key5 | Key::NumPad5 => '5',
        Key::Key6 | Key::NumPad6 => '6',
        Key::Key7 | Key::NumPad7 => '7',
        Key::Key8 | Key::NumPad8 => '8',
        Key::Key9 | Key::NumPad9 => '9',
        _ => return None,
    };
    Some(c)
}

fn log_key_help() {
    info!("preview controls:");
    info!("  ESC           hide window");
    info!("  S             toggle slideshow mode");
    info!("  C             toggle comparison mode");
    info!("  Left/Right    previous/next entry (slideshow)");
    info!("  Space         next entry (slideshow)");
    info!("  digits+Enter  jump to entry index");
    info!("  mouse move    split line (comparison)");
    info!("  wheel / +/-   zoom, left-drag pans");
    info!("  R             reset zoom and pan");
}

/// Render-loop half of a session. Runs on its own dedicated thread; the
/// window lives and dies on this thread.
///
/// `init_tx` reports whether the window came up, so session creation can
/// fail synchronously at the registry. `done_tx` fires on exit and backs
/// the registry's bounded join.
pub(crate) fn run_session(
    monitor: MonitorInfo,
    canvas_w: u32,
    canvas_h: u32,
    shared: SharedSession,
    init_tx: Sender<Result<(), String>>,
    done_tx: Sender<()>,
) {
    let mut window = match Window::new(
        &format!("Preview Monitor {} - Press H for help", monitor.index),
        canvas_w as usize,
        canvas_h as usize,
        WindowOptions {
            borderless: true,
            ..WindowOptions::default()
        },
    ) {
        Ok(w) => w,
        Err(e) => {
            let _ = init_tx.send(Err(e.to_string()));
            let _ = done_tx.send(());
            return;
        }
    };
    window.set_position(monitor.x as isize, monitor.y as isize);
    let _ = init_tx.send(Ok(()));
    info!(
        monitor = monitor.index,
        x = monitor.x,
        y = monitor.y,
        width = canvas_w,
        height = canvas_h,
        "preview window created"
    );

    let blank = |white: bool| -> Vec<u32> {
        let matte = if white { 0x00ff_ffff } else { 0 };
        vec![matte; canvas_w as usize * canvas_h as usize]
    };

    let mut split_x = canvas_w / 2;
    let mut dragging = false;
    let mut last_mouse = (0.0f32, 0.0f32);
    let mut last_mouse_update = Instant::now();
    let mut mouse_interval = MOUSE_INTERVAL_NORMAL;
    let mut last_stamp: Option<RenderStamp> = None;
    let mut last_frame: Option<Vec<u32>> = None;
    let mut fps = FpsTracker::new();
    let mut target_fps = 0u32;
    let mut jump = NumberJump::default();
    let mut warned_missing_secondary = false;

    while window.is_open() {
        // 1. Snapshot under the lock; never hold it across compose/blit.
        let snap = {
            let state = lock_session(&shared);
            if !state.running {
                break;
            }
            snapshot(&state)
        };

        let target = snap.settings.fps_mode.target_fps();
        if target != target_fps {
            target_fps = target;
            window.set_target_fps(target as usize);
        }

        // 2. Recomposite only when needed.
        let (redraw, stamp) = needs_redraw(&snap, split_x, last_stamp.as_ref());
        last_stamp = Some(stamp);

        if redraw && snap.visible {
            if let Some(primary) = snap.primary.as_ref() {
                let split = if snap.display_mode == DisplayMode::Comparison {
                    if snap.secondary.is_none() && !warned_missing_secondary {
                        warn!(
                            monitor = monitor.index,
                            "comparison mode without a secondary image, showing primary only"
                        );
                        warned_missing_secondary = true;
                    }
                    Some(split_x)
                } else {
                    warned_missing_secondary = false;
                    None
                };
                let params = ComposeParams {
                    canvas_w,
                    canvas_h,
                    fit_mode: snap.settings.fit_mode,
                    zoom: snap.zoom,
                    pan_x: snap.pan_x,
                    pan_y: snap.pan_y,
                    white_matte: snap.settings.white_matte,
                };
                let secondary = snap.secondary.as_deref();
                let composed = panic::catch_unwind(AssertUnwindSafe(|| {
                    compose(primary, secondary, split, &params)
                }));
                match composed {
                    Ok(img) => {
                        last_frame = Some(to_argb_buffer(&img));
                        window.set_title(&window_title(monitor.index, &snap, split_x));
                    }
                    Err(_) => {
                        // One bad frame must not kill the window; keep
                        // showing the previous composite.
                        error!(
                            monitor = monitor.index,
                            "frame composition panicked, keeping previous frame"
                        );
                    }
                }
            } else {
                last_frame = None;
                window.set_title(&format!(
                    "Preview Monitor {} - No Image Available",
                    monitor.index
                ));
            }
        }

        // 3. Always present the most recent composite (or bare matte).
        let matte_frame;
        let present: &[u32] = match (&last_frame, snap.visible) {
            (Some(frame), true) => frame,
            _ => {
                matte_frame = blank(snap.settings.white_matte);
                &matte_frame
            }
        };
        if let Err(e) = window.update_with_buffer(present, canvas_w as usize, canvas_h as usize) {
            error!(monitor = monitor.index, error = %e, "frame blit failed");
            continue;
        }

        // 4. Input.
        handle_mouse(
            &window,
            &shared,
            &snap,
            canvas_w,
            &mut split_x,
            &mut dragging,
            &mut last_mouse,
            &mut last_mouse_update,
            mouse_interval,
        );
        handle_keys(&window, &shared, &snap, &mut jump);
        if let Some(target) = jump.poll_timeout() {
            apply_jump(&shared, target);
        }

        // 5. Adaptive throttle.
        if let Some(actual) = fps.tick() {
            let next = adapt_mouse_interval(mouse_interval, actual, target_fps);
            if next != mouse_interval {
                debug!(
                    monitor = monitor.index,
                    actual_fps = actual,
                    interval_ms = next.as_millis() as u64,
                    "adjusted mouse-move interval"
                );
                mouse_interval = next;
            }
        }
    }

    // Window closed by the user or running flag cleared.
    {
        let mut state = lock_session(&shared);
        state.visible = false;
        state.running = false;
    }
    drop(window);
    info!(monitor = monitor.index, "preview window closed");
    let _ = done_tx.send(());
}

#[allow(clippy::too_many_arguments)]
fn handle_mouse(
    window: &Window,
    shared: &SharedSession,
    snap: &FrameSnapshot,
    canvas_w: u32,
    split_x: &mut u32,
    dragging: &mut bool,
    last_mouse: &mut (f32, f32),
    last_mouse_update: &mut Instant,
    mouse_interval: Duration,
) {
    if let Some((_, dy)) = window.get_scroll_wheel() {
        if dy > 0.0 {
            lock_session(shared).zoom_by(WHEEL_ZOOM_IN);
        } else if dy < 0.0 {
            lock_session(shared).zoom_by(WHEEL_ZOOM_OUT);
        }
    }

    let left_down = window.get_mouse_down(MouseButton::Left);
    let Some(pos) = window.get_mouse_pos(MouseMode::Clamp) else {
        *dragging = false;
        return;
    };

    if left_down && !*dragging {
        *dragging = true;
        *last_mouse = pos;
    } else if !left_down {
        *dragging = false;
    }

    let moved = pos != *last_mouse;
    if moved && last_mouse_update.elapsed() >= mouse_interval {
        if *dragging {
            let (dx, dy) = (pos.0 - last_mouse.0, pos.1 - last_mouse.1);
            lock_session(shared).pan_by(dx, dy);
        } else if snap.display_mode == DisplayMode::Comparison {
            *split_x = (pos.0.max(0.0) as u32).min(canvas_w);
        }
        *last_mouse = pos;
        *last_mouse_update = Instant::now();
    }
}

fn handle_keys(
    window: &Window,
    shared: &SharedSession,
    snap: &FrameSnapshot,
    jump: &mut NumberJump,
) {
    for key in window.get_keys_pressed(KeyRepeat::No) {
        if let Some(digit) = digit_for_key(key) {
            jump.push_digit(digit);
            continue;
        }
        match key {
            Key::Enter | Key::NumPadEnter => {
                if let Some(target) = jump.commit() {
                    apply_jump(shared, target);
                }
            }
            Key::Escape => {
                if jump.is_active() {
                    jump.cancel();
                } else {
                    lock_session(shared).visible = false;
                    debug!("window hidden");
                }
            }
            Key::Left if snap.display_mode == DisplayMode::Slideshow => {
                let mut state = lock_session(shared);
                state.queue.advance(-1);
                let (pos, total) = state.queue.position();
                info!("showing entry {pos}/{total}");
            }
            Key::Right | Key::Space if snap.display_mode == DisplayMode::Slideshow => {
                let mut state = lock_session(shared);
                state.queue.advance(1);
                let (pos, total) = state.queue.position();
                info!("showing entry {pos}/{total}");
            }
            Key::C => {
                let mut state = lock_session(shared);
                state.toggle_comparison();
                info!(mode = %state.display_mode, "display mode toggled");
            }
            Key::S => {
                let mut state = lock_session(shared);
                state.toggle_slideshow();
                info!(mode = %state.display_mode, "display mode toggled");
            }
            Key::R => {
                lock_session(shared).reset_view();
                debug!("zoom and pan reset");
            }
            Key::Equal | Key::NumPadPlus => lock_session(shared).zoom_by(KEY_ZOOM_IN),
            Key::Minus | Key::NumPadMinus => lock_session(shared).zoom_by(KEY_ZOOM_OUT),
            Key::H => log_key_help(),
            _ => {}
        }
    }
}

fn apply_jump(shared: &SharedSession, target: u64) {
    let mut state = lock_session(shared);
    if state.queue.jump(target) {
        info!(index = target, "jumped to entry");
    } else {
        debug!(index = target, "no entry at requested index");
    }
}
