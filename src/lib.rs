//! Interactive image-preview window manager.
//!
//! Receives batches of images from an external pipeline and displays them
//! in persistent, monitor-pinned windows with pan/zoom, side-by-side
//! comparison and slideshow navigation. The pipeline-facing surface is
//! [`invoke`]; everything behind it degrades to "display skipped, data
//! passed through" on failure.

pub mod compose;
pub mod error;
pub mod invoke;
pub mod monitor;
pub mod normalize;
pub mod queue;
pub mod registry;
pub mod session;
pub mod settings;
pub mod tensor;

pub use error::{PreviewError, Result};
pub use invoke::{invoke, Invocation};
pub use monitor::{MonitorInfo, MonitorLayout};
pub use normalize::CanonicalImage;
pub use registry::{SessionRegistry, SessionUpdate};
pub use settings::{DisplayMode, DisplaySettings, FitMode, FpsMode, PowerState, SubmitMode};
pub use tensor::{ImageTensor, TensorData};
