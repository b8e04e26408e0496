use thiserror::Error;

/// Library error type for preview-monitor operations.
///
/// Nothing in this taxonomy is allowed to escape the invocation boundary;
/// `invoke` catches, logs, and passes the input batch through unchanged.
#[derive(Debug, Error)]
pub enum PreviewError {
    /// Input tensor has an unsupported dimensionality or channel count.
    #[error("unsupported image tensor shape: {0}")]
    Shape(String),

    /// No display backend is reachable; the subsystem degrades to a no-op.
    #[error("display backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Malformed monitor or resolution selector. Always recovered locally
    /// with a default; never propagated past the parsing call site.
    #[error("invalid monitor or resolution selector: {0:?}")]
    MonitorResolution(String),

    /// Compositing or blitting one frame failed. Caught inside the render
    /// loop; the loop continues with the next frame.
    #[error("frame render failed: {0}")]
    RenderFrame(String),

    /// The window or display surface could not be created.
    #[error("session init failed on monitor {monitor}: {reason}")]
    SessionInit { monitor: usize, reason: String },

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// YAML/serde configuration error.
    #[error(transparent)]
    Config(#[from] serde_yaml::Error),

    /// Image encode/decode error.
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, PreviewError>;
